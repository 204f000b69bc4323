// Busy flag
//
// One in-flight operation at a time. The flag is taken with `try_acquire` and released when
// the returned guard drops, so every exit path (success, error, early return) clears it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new(initial: bool) -> Self {
        Self(Arc::new(AtomicBool::new(initial)))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `None` while another holder owns the flag.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(self.0.clone()))
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_guard_drops() {
        let flag = BusyFlag::default();
        let guard = flag.try_acquire().expect("first acquire");
        assert!(flag.is_set());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_set());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn guard_clears_on_error_path() {
        fn failing(flag: &BusyFlag) -> Result<(), &'static str> {
            let _busy = flag.try_acquire().ok_or("busy")?;
            Err("remote failed")
        }

        let flag = BusyFlag::new(false);
        assert_eq!(failing(&flag), Err("remote failed"));
        assert!(!flag.is_set());
    }

    #[test]
    fn clones_share_state() {
        let flag = BusyFlag::new(true);
        let view = flag.clone();
        assert!(view.is_set());
        flag.clear();
        assert!(!view.is_set());
    }
}
