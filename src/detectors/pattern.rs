//! Literal pattern detector.

use super::{EntityDetector, Granularity};
use crate::audit::AuditTrail;
use crate::models::{EntitySet, TaskConfig};
use crate::{Error, Result};
use regex::Regex;
use std::collections::BTreeSet;

/// Detector applying a configured regex to the text.
///
/// Deterministic; the only audit side effect is the merged match set the
/// pipeline records itself.
pub struct PatternDetector {
    regex: Regex,
}

impl PatternDetector {
    /// Compiles the task's pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the pattern does not compile.
    pub fn new(name: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::Configuration {
            name: name.to_string(),
            cause: format!("invalid pattern: {e}"),
        })?;
        Ok(Self { regex })
    }
}

impl EntityDetector for PatternDetector {
    fn granularity(&self) -> Granularity {
        Granularity::Document
    }

    fn detect(
        &self,
        unit: &str,
        _task: &TaskConfig,
        _audit: &mut AuditTrail,
    ) -> Result<EntitySet> {
        let matches: BTreeSet<String> = self
            .regex
            .find_iter(unit)
            .map(|m| m.as_str().to_string())
            .collect();
        Ok(EntitySet::Flat(matches))
    }
}
