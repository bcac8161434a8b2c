use super::Layout;
use crate::error::Result;
use std::sync::{Arc, RwLock};

/// Shared, swappable reference to the current Layout.
///
/// Readers clone the inner `Arc` and keep querying it while a rebuild runs;
/// a successful rebuild replaces the whole index at once.
#[derive(Debug, Clone)]
pub struct LayoutHandle {
    inner: Arc<RwLock<Arc<Layout>>>,
}

impl LayoutHandle {
    pub fn new(layout: Layout) -> Self {
        LayoutHandle {
            inner: Arc::new(RwLock::new(Arc::new(layout))),
        }
    }

    pub fn current(&self) -> Arc<Layout> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Install a new layout, returning the previous one.
    pub fn replace(&self, layout: Layout) -> Arc<Layout> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(layout))
    }

    /// Build a new layout outside the lock and swap it in. On failure the
    /// current layout stays in place.
    pub fn rebuild<F>(&self, build: F) -> Result<Arc<Layout>>
    where
        F: FnOnce() -> Result<Layout>,
    {
        let layout = build()?;
        self.replace(layout);
        Ok(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::{bids_domain, bids_layout};
    use crate::scanner::StaticScanner;
    use crate::PathGrabError;

    #[test]
    fn test_readers_keep_old_snapshot() {
        let handle = LayoutHandle::new(bids_layout());
        let before = handle.current();
        assert_eq!(before.len(), 11);

        handle
            .rebuild(|| {
                Layout::builder()
                    .domain(bids_domain(), StaticScanner::new(["ds/sub-01/sub-01_T1w.nii"]))
                    .build()
            })
            .unwrap();

        assert_eq!(before.len(), 11);
        assert_eq!(handle.current().len(), 1);
    }

    #[test]
    fn test_failed_rebuild_keeps_current() {
        let handle = LayoutHandle::new(bids_layout());
        let err = handle
            .rebuild(|| Err(PathGrabError::Configuration("broken".into())))
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(handle.current().len(), 11);
    }

    #[test]
    fn test_shared_across_threads() {
        let handle = LayoutHandle::new(bids_layout());
        let reader = handle.clone();
        let count = std::thread::spawn(move || reader.current().count("subject").unwrap())
            .join()
            .unwrap();
        assert_eq!(count, 3);
    }
}
