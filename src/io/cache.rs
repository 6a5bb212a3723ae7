use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::MappedView;
use crate::error::Result;

/// Open-once cache of file mappings, keyed by canonical path.
///
/// The cache only holds weak references: a mapping is unmapped as soon as
/// the last accessor using it is dropped.
#[derive(Debug, Default)]
pub struct ViewCache {
    views: Mutex<HashMap<PathBuf, Weak<MappedView>>>,
}

impl ViewCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Return the live mapping for `path`, mapping the file if needed.
    pub fn open(&self, path: &Path) -> Result<Arc<MappedView>> {
        let key = std::fs::canonicalize(path)?;
        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(view) = views.get(&key).and_then(Weak::upgrade) {
            return Ok(view);
        }

        let view = Arc::new(MappedView::open(&key)?);
        views.retain(|_, weak| weak.strong_count() > 0);
        views.insert(key, Arc::downgrade(&view));
        Ok(view)
    }

    /// Number of mappings currently alive
    pub fn live(&self) -> usize {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
