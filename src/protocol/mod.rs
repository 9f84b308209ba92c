pub mod codec;
pub mod matrix;
