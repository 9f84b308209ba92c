/// Input-to-output interconnection grid decoded from a matrix report.
///
/// Row `o` describes output `o`; character `i` of that row is `+` when input
/// `i` is wired to it. Rows may have ragged lengths, missing cells read as
/// unconnected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matrix {
    cells: Vec<Vec<bool>>,
    inputs: usize,
}

pub const CONNECTED_CELL: char = '+';

impl Matrix {
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Self {
        let cells: Vec<Vec<bool>> = rows
            .iter()
            .map(|row| row.as_ref().chars().map(|c| c == CONNECTED_CELL).collect())
            .collect();
        // Column count follows the first row, the same way the board pads its output.
        let inputs = cells.first().map(Vec::len).unwrap_or(0);
        Self { cells, inputs }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn output_count(&self) -> usize {
        self.cells.len()
    }

    pub fn input_count(&self) -> usize {
        self.inputs
    }

    pub fn is_connected(&self, output: usize, input: usize) -> bool {
        self.cells
            .get(output)
            .and_then(|row| row.get(input))
            .copied()
            .unwrap_or(false)
    }

    fn output_used(&self, output: usize) -> bool {
        self.cells
            .get(output)
            .map(|row| row.iter().any(|c| *c))
            .unwrap_or(false)
    }

    fn input_used(&self, input: usize) -> bool {
        (0..self.output_count()).any(|o| self.is_connected(o, input))
    }

    /// Output indices with at least one connection first, then the rest,
    /// each part in ascending order.
    pub fn ordered_outputs(&self) -> Vec<usize> {
        used_first(self.output_count(), |o| self.output_used(o))
    }

    /// Input indices with at least one connection first, then the rest.
    pub fn ordered_inputs(&self) -> Vec<usize> {
        used_first(self.input_count(), |i| self.input_used(i))
    }
}

fn used_first(count: usize, used: impl Fn(usize) -> bool) -> Vec<usize> {
    let (mut ordered, unused): (Vec<usize>, Vec<usize>) = (0..count).partition(|idx| used(*idx));
    ordered.extend(unused);
    ordered
}
