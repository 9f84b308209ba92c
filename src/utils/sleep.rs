//! Sleep utilities

use std::time::Duration;

/// Sleep for an arbitrary configured delay
pub async fn sleep_for(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Sleep for 1 second (1000ms) - standard delay between console redraws
pub async fn sleep_1s() {
    tokio::time::sleep(Duration::from_millis(1000)).await;
}
