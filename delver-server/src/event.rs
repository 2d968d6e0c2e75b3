use serde::{Deserialize, Serialize};

use delver_research::StateSnapshot;

/// Wire shape of a streamed research event.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Update { node: String, state: StateSnapshot },
    Complete { state: StateSnapshot },
    Error { message: String },
}
