pub struct AppendVec;
impl AppendVec {
    pub fn merge<T: Clone>(current: &Vec<T>, mut update: Vec<T>) -> Vec<T> {
        let mut out = current.clone();
        out.append(&mut update);
        out
    }
}

pub struct AddCounter;
impl AddCounter {
    pub fn merge(current: &u32, update: u32) -> u32 {
        current + update
    }
}

pub struct Override;
impl Override {
    pub fn merge<T>(_current: &T, update: T) -> T {
        update
    }
}

/// Scalar overwrite that treats an empty update as "not set".
pub struct OverwriteIfSet;
impl OverwriteIfSet {
    pub fn merge(current: &String, update: String) -> String {
        if update.is_empty() {
            current.clone()
        } else {
            update
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_vec_concatenates() {
        let merged = AppendVec::merge(&vec![1, 2], vec![3]);
        assert_eq!(merged, vec![1, 2, 3]);
    }

    #[test]
    fn add_counter_and_override() {
        assert_eq!(AddCounter::merge(&2, 3), 5);
        assert_eq!(Override::merge(&1, 9), 9);
    }

    #[test]
    fn overwrite_if_set_keeps_current_on_empty() {
        let merged = OverwriteIfSet::merge(&"kept".to_string(), String::new());
        assert_eq!(merged, "kept");
        let merged = OverwriteIfSet::merge(&"old".to_string(), "new".to_string());
        assert_eq!(merged, "new");
    }
}
