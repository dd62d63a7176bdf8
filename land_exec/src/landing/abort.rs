//! # Operator abort

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared flag requesting that the approach be abandoned and the vehicle landed.
///
/// Clones refer to the same flag. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let a = AbortHandle::new();
        let b = a.clone();

        assert!(!b.is_raised());
        a.raise();
        assert!(b.is_raised());
    }
}
