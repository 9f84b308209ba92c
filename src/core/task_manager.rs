use std::time::Duration;

/// Spawn a task on the current runtime
pub fn spawn_task<F>(future: F) -> tokio::task::JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::task::spawn(future)
}

/// Spawn a task that runs `work` once `delay` has elapsed
pub fn spawn_delayed_task<F>(delay: Duration, work: F) -> tokio::task::JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::task::spawn(async move {
        crate::utils::sleep::sleep_for(delay).await;
        work();
    })
}

/// Spawn a blocking task, used for every synchronous HTTP call
pub fn spawn_blocking_task<F, R>(func: F) -> tokio::task::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(func)
}
