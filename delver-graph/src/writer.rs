use std::sync::{Arc, Mutex};

/// Step-scoped progress log. The runtime hands each node invocation a fresh
/// writer; tools clone it freely and the node folds the drained lines into
/// its state update.
#[derive(Clone, Debug, Default)]
pub struct StepWriter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl StepWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, line: impl Into<String>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.into());
        }
    }

    pub fn drain(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(mut lines) => std::mem::take(&mut *lines),
            Err(_) => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().map(|lines| lines.is_empty()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_writer() {
        let writer = StepWriter::new();
        writer.write("one");
        writer.clone().write("two");
        assert_eq!(writer.drain(), vec!["one".to_string(), "two".to_string()]);
        assert!(writer.is_empty());
    }
}
