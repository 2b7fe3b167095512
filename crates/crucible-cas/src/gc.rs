use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GcPolicy {
    pub grace_period: Duration,
}

impl Default for GcPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(24 * 3600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GcReport {
    pub scanned: u64,
    pub deleted: u64,
    pub reclaimed_bytes: u64,
}
