use crucible_types::BackoffPolicy;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub parallelism: usize,
    pub max_concurrent_subprocesses: usize,
    pub keep_going: bool,
    pub retry_policy: BackoffPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            parallelism: cpus,
            max_concurrent_subprocesses: cpus,
            keep_going: false,
            retry_policy: BackoffPolicy::default(),
        }
    }
}
