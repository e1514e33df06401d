use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shareable cancellation flag for a running audit.
#[derive(Debug, Clone, Default)]
pub struct AuditCancel {
    flag: Arc<AtomicBool>,
}

impl AuditCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let cancel = AuditCancel::new();
        let handle = cancel.clone();
        assert!(!cancel.is_cancelled());
        handle.cancel();
        assert!(cancel.is_cancelled());
    }
}
