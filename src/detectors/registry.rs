//! Detector registry.
//!
//! One detector instance per distinct (kind, model-identifier) pair: model
//! construction may load weights or open an inference session, so identical
//! bindings referenced by several tasks must share one instance. The cache
//! lock is held across construction, which keeps concurrent first
//! resolutions of the same identifier from building the model twice.

use super::{
    ClassifierDetector, EntityDetector, GenerativeDetector, PatternDetector, TaggerDetector,
};
use crate::backends::ModelBackends;
use crate::models::{DetectorKind, TaskConfig};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Cache of constructed detectors, keyed by detector identity.
pub struct DetectorRegistry {
    backends: Arc<dyn ModelBackends>,
    cache: Mutex<HashMap<(DetectorKind, String), Arc<dyn EntityDetector>>>,
}

impl DetectorRegistry {
    /// Creates an empty registry over the given backends.
    #[must_use]
    pub fn new(backends: Arc<dyn ModelBackends>) -> Self {
        Self {
            backends,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The identity under which a task's detector is cached.
    ///
    /// Model-backed kinds are identified by their model reference; patterns
    /// by the pattern itself.
    fn identity(task: &TaskConfig) -> String {
        match task.model.kind {
            DetectorKind::Pattern => task.pattern.clone().unwrap_or_default(),
            _ => task
                .model
                .model_ref
                .clone()
                .unwrap_or_else(|| "default".to_string()),
        }
    }

    /// Resolves the detector bound to a task, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] or [`Error::Backend`] when the
    /// detector cannot be constructed.
    pub fn resolve(&self, task: &TaskConfig) -> Result<Arc<dyn EntityDetector>> {
        let key = (task.model.kind, Self::identity(task));

        let mut cache = self.cache.lock().map_err(|e| Error::OperationFailed {
            operation: "detector_cache_lock".to_string(),
            cause: e.to_string(),
        })?;

        if let Some(detector) = cache.get(&key) {
            return Ok(Arc::clone(detector));
        }

        tracing::info!(
            task = %task.name,
            kind = task.model.kind.as_str(),
            identity = %key.1,
            "constructing detector"
        );
        let detector = self.construct(task)?;
        cache.insert(key, Arc::clone(&detector));
        Ok(detector)
    }

    fn construct(&self, task: &TaskConfig) -> Result<Arc<dyn EntityDetector>> {
        let missing_ref = || Error::Configuration {
            name: task.name.clone(),
            cause: "missing 'model_ref'".to_string(),
        };

        Ok(match task.model.kind {
            DetectorKind::Pattern => {
                let pattern = task.pattern.as_deref().ok_or_else(|| Error::Configuration {
                    name: task.name.clone(),
                    cause: "missing 'pattern'".to_string(),
                })?;
                Arc::new(PatternDetector::new(&task.name, pattern)?)
            },
            DetectorKind::Classifier => {
                let model_ref = task.model.model_ref.as_deref().ok_or_else(missing_ref)?;
                Arc::new(ClassifierDetector::new(
                    self.backends.token_classifier(model_ref)?,
                ))
            },
            DetectorKind::Tagger => {
                let model_ref = task.model.model_ref.as_deref().ok_or_else(missing_ref)?;
                Arc::new(TaggerDetector::new(self.backends.span_tagger(model_ref)?))
            },
            DetectorKind::Generative => Arc::new(GenerativeDetector::new(
                self.backends.completion(task.model.model_ref.as_deref())?,
            )),
        })
    }
}
