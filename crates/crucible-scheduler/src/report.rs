use crucible_types::Label;

#[derive(Debug, Clone, Default)]
pub struct SchedulerReport {
    pub built: usize,
    pub cached: usize,
    pub failed: Vec<(Label, String)>,
    pub skipped: usize,
}

impl SchedulerReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
