//! Round-robin operator assignment.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed pool of operator addresses handed out in turn.
///
/// No stickiness: the same user's next message may go to a different
/// operator.
#[derive(Debug)]
pub struct OperatorRotation {
    operators: Vec<String>,
    cursor: AtomicUsize,
}

impl OperatorRotation {
    pub fn new(operators: Vec<String>) -> Self {
        Self {
            operators,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next operator, or `None` when the pool is empty.
    pub fn next(&self) -> Option<&str> {
        let len = self.operators.len();
        if len == 0 {
            return None;
        }

        let idx = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or(0);

        self.operators.get(idx).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pool(names: &[&str]) -> OperatorRotation {
        OperatorRotation::new(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn empty_pool_yields_none() {
        let rotation = pool(&[]);
        for _ in 0..3 {
            assert!(rotation.next().is_none());
        }
    }

    #[test]
    fn cycles_in_fixed_order() {
        let rotation = pool(&["a", "b", "c"]);
        let seen: Vec<&str> = (0..7).filter_map(|_| rotation.next()).collect();
        assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn assignments_are_balanced() {
        let rotation = pool(&["a", "b", "c", "d"]);
        let mut counts: HashMap<String, usize> = HashMap::new();
        let k = 10;
        for _ in 0..k {
            let op = rotation.next().unwrap().to_string();
            *counts.entry(op).or_default() += 1;
        }
        for count in counts.values() {
            assert!(*count == k / 4 || *count == k / 4 + 1);
        }
        assert_eq!(counts.values().sum::<usize>(), k);
    }

    #[test]
    fn concurrent_callers_share_the_cursor() {
        let rotation = std::sync::Arc::new(pool(&["a", "b"]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rotation = rotation.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| rotation.next() == Some("a"))
                        .count()
                })
            })
            .collect();
        let a_count: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(a_count, 100);
    }
}
