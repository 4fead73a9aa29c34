//! Process-wide, load-once classifier cache.
//!
//! The classifier is read-only after loading, so one instance is shared by
//! every caller for the life of the process. Nothing is torn down.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::adapters::model::ModelLoader;
use crate::config::Settings;
use crate::ports::ClassifierHandle;

/// A lazily initialized, immutable classifier slot.
///
/// The loader runs at most once, even when several threads race on first use.
/// A failed load leaves the cell empty so a later call may retry.
pub struct ClassifierCell {
    cell: OnceLock<Arc<dyn ClassifierHandle>>,
    init: Mutex<()>,
}

impl ClassifierCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The cached classifier, if it has been loaded.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn ClassifierHandle>> {
        self.cell.get().cloned()
    }

    /// Return the cached classifier, running `load` if the cell is empty.
    ///
    /// # Errors
    /// Propagates the loader's error; the cell stays empty.
    pub fn get_or_try_load<F>(&self, load: F) -> crate::Result<Arc<dyn ClassifierHandle>>
    where
        F: FnOnce() -> crate::Result<Arc<dyn ClassifierHandle>>,
    {
        if let Some(classifier) = self.cell.get() {
            return Ok(Arc::clone(classifier));
        }

        // The guard protects no data, so a poisoned lock is still usable.
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(classifier) = self.cell.get() {
            return Ok(Arc::clone(classifier));
        }

        let classifier = load()?;
        Ok(Arc::clone(self.cell.get_or_init(|| classifier)))
    }
}

impl Default for ClassifierCell {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED: ClassifierCell = ClassifierCell::new();

/// The process-wide classifier, loaded from `settings.model_dir` on first use.
///
/// Settings passed on later calls are ignored once the classifier is cached.
///
/// # Errors
/// Returns `ModelLoad` if the first load fails.
pub fn shared_classifier(settings: &Settings) -> crate::Result<Arc<dyn ClassifierHandle>> {
    SHARED.get_or_try_load(|| {
        let loader = ModelLoader::from_settings(settings)?;
        let classifier = loader.load(&settings.model_dir)?;
        Ok(Arc::new(classifier) as Arc<dyn ClassifierHandle>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::model::tests::logistic_artifact;
    use crate::adapters::model::LoadedClassifier;
    use crate::HeartsenseError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn load_test_classifier() -> crate::Result<Arc<dyn ClassifierHandle>> {
        let classifier = LoadedClassifier::from_artifact(logistic_artifact())?;
        Ok(Arc::new(classifier))
    }

    #[test]
    fn test_loads_once() {
        let cell = ClassifierCell::new();
        let loads = AtomicUsize::new(0);

        assert!(cell.get().is_none());
        for _ in 0..3 {
            cell.get_or_try_load(|| {
                loads.fetch_add(1, Ordering::SeqCst);
                load_test_classifier()
            })
            .expect("Should load");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cell.get().is_some());
    }

    #[test]
    fn test_loads_once_under_concurrent_first_use() {
        let cell = ClassifierCell::new();
        let loads = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let classifier = cell
                        .get_or_try_load(|| {
                            loads.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            load_test_classifier()
                        })
                        .expect("Should load");
                    assert_eq!(classifier.descriptor().name, "test-logistic");
                });
            }
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_leaves_cell_empty() {
        let cell = ClassifierCell::new();
        let err = cell
            .get_or_try_load(|| Err(HeartsenseError::InvalidFeatureVector("boom".into())))
            .err()
            .expect("Should fail");
        assert!(err.to_string().contains("boom"));
        assert!(cell.get().is_none());

        cell.get_or_try_load(load_test_classifier).expect("Retry should load");
        assert!(cell.get().is_some());
    }
}
