use std::time::Duration;

use crate::DelverError;

/// Transient failures worth one more attempt. Parse failures are excluded:
/// callers retry those with the error fed back into the prompt instead.
pub fn is_retryable(error: &DelverError) -> bool {
    matches!(
        error,
        DelverError::LlmProvider(_)
            | DelverError::EmptyResponse
            | DelverError::Timeout(_)
            | DelverError::Store(crate::StoreError::Transport(_))
            | DelverError::Search(crate::SearchError::Transport(_))
    )
}

/// Linear backoff keyed on the attempt number (1-based).
pub fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_millis(500 * attempt as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failures_are_not_retryable() {
        let err = DelverError::ParseFailed {
            output: "x".into(),
            reason: "bad".into(),
        };
        assert!(!is_retryable(&err));
        assert!(is_retryable(&DelverError::EmptyResponse));
    }
}
