use std::sync::atomic::{AtomicU64, Ordering};

/// Source of correlation ids stamped on every outgoing command.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Process-wide counter starting at 1.
#[derive(Debug)]
pub struct MonotonicIds {
    next: AtomicU64,
}

impl MonotonicIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for MonotonicIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for MonotonicIds {
    fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ids_are_unique_and_increasing() {
        let ids = MonotonicIds::new();
        assert_eq!(ids.next_id(), "1");
        assert_eq!(ids.next_id(), "2");
        let shared: Arc<dyn IdGenerator> =
            Arc::new(MonotonicIds::starting_at(41));
        assert_eq!(shared.next_id(), "41");
        assert_eq!(shared.next_id(), "42");
    }
}
