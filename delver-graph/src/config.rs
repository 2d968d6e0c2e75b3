use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ExecutionConfig {
    pub max_steps: Option<usize>,
    /// Whole-run budget, checked at every node boundary.
    pub deadline: Option<Duration>,
    pub node_timeout: Option<Duration>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(50),
            deadline: None,
            node_timeout: None,
        }
    }
}
