use std::time::Duration;

use delver_core::DelverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node '{node}' is not registered")]
    MissingNode { node: String },
    #[error("edge routed to unknown node '{node}'")]
    InvalidEdge { node: String },
    #[error("node '{node}' failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: DelverError,
    },
    #[error("max steps exceeded: reached {reached}, limit {max}")]
    MaxStepsExceeded { max: usize, reached: usize },
    #[error("deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },
    #[error("node '{node}' timed out after {timeout:?}")]
    NodeTimeout { node: String, timeout: Duration },
}
