use std::time::Duration;

/// Every delay and period the dashboard runtime uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Period of the state reconciliation loop.
    pub poll_interval: Duration,
    /// Period of the connectivity monitor.
    pub connectivity_interval: Duration,
    /// Hard timeout of one reachability probe.
    pub probe_timeout: Duration,
    /// Timeout of requests sent through the proxy.
    pub request_timeout: Duration,
    /// Delay between a dispatch settling and polling resuming.
    pub resume_delay: Duration,
    /// How long acted-upon identities stay suppressed after a dispatch.
    pub suppression_window: Duration,
    /// Gap between the on and off halves of a trigger pulse.
    pub trigger_settle: Duration,
    /// How long an input transition stays highlighted.
    pub input_highlight: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            connectivity_interval: Duration::from_millis(10000),
            probe_timeout: Duration::from_millis(5000),
            request_timeout: Duration::from_millis(10000),
            resume_delay: Duration::from_millis(1000),
            suppression_window: Duration::from_millis(3000),
            trigger_settle: Duration::from_millis(300),
            input_highlight: Duration::from_millis(4000),
        }
    }
}
