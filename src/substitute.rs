//! Literal entity substitution.
//!
//! Replacement is case-sensitive and hits **all** occurrences of each entity
//! string. Candidates are ordered by descending length, then
//! lexicographically, so a longer entity containing a shorter one is always
//! substituted first and the output is deterministic for any entity set.

use crate::models::{EntitySet, ReplaceSpec};
use crate::{Error, Result};

/// Rewrites `text` by substituting every entity with its replacement token.
///
/// Flat sets take a single token; typed maps look each label's token up in
/// the configured label map.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] when the entity-set shape does not
/// match the replace spec or a label has no configured token. Task validation
/// rules this out at pipeline construction, so hitting it indicates a
/// detector bug.
pub fn substitute(text: &str, entities: &EntitySet, replace: &ReplaceSpec) -> Result<String> {
    let mut pairs: Vec<(&str, &str)> = match (entities, replace) {
        (EntitySet::Flat(set), ReplaceSpec::Token(token)) => {
            set.iter().map(|e| (e.as_str(), token.as_str())).collect()
        },
        (EntitySet::Typed(map), ReplaceSpec::ByLabel(tokens)) => {
            let mut pairs = Vec::new();
            for (label, set) in map {
                let token = tokens.get(label).ok_or_else(|| Error::OperationFailed {
                    operation: "substitute".to_string(),
                    cause: format!("no replace token configured for label '{label}'"),
                })?;
                pairs.extend(set.iter().map(|e| (e.as_str(), token.as_str())));
            }
            pairs
        },
        _ => {
            return Err(Error::OperationFailed {
                operation: "substitute".to_string(),
                cause: "entity-set shape does not match replace-token spec".to_string(),
            });
        },
    };

    // Longest first; lexical order breaks length ties.
    pairs.sort_unstable_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    let mut output = text.to_string();
    for (entity, token) in pairs {
        if !entity.is_empty() {
            output = output.replace(entity, token);
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn test_flat_substitution() {
        let entities = EntitySet::flat(["christian.mayer@gmx.de"]);
        let replace = ReplaceSpec::Token("EMAIL@EMAIL.DE".to_string());

        let out = substitute("Contact: christian.mayer@gmx.de", &entities, &replace).unwrap();
        assert_eq!(out, "Contact: EMAIL@EMAIL.DE");
    }

    #[test]
    fn test_all_occurrences_replaced() {
        let entities = EntitySet::flat(["Alice"]);
        let replace = ReplaceSpec::Token("[NAME]".to_string());

        let out = substitute("Alice met Alice's sister", &entities, &replace).unwrap();
        assert_eq!(out, "[NAME] met [NAME]'s sister");
    }

    #[test]
    fn test_longer_entity_substituted_first() {
        // "Christian Mayer" contains "Christian"; the longer span must win.
        let entities = EntitySet::flat(["Christian", "Christian Mayer"]);
        let replace = ReplaceSpec::Token("X".to_string());

        let out = substitute("Christian Mayer wrote this", &entities, &replace).unwrap();
        assert_eq!(out, "X wrote this");
    }

    #[test]
    fn test_typed_substitution() {
        let entities = EntitySet::Typed(BTreeMap::from([
            (
                "PER".to_string(),
                BTreeSet::from(["Alice".to_string()]),
            ),
            (
                "LOC".to_string(),
                BTreeSet::from(["Berlin".to_string()]),
            ),
        ]));
        let replace = ReplaceSpec::ByLabel(BTreeMap::from([
            ("PER".to_string(), "[NAME]".to_string()),
            ("LOC".to_string(), "[PLACE]".to_string()),
        ]));

        let out = substitute("Alice lives in Berlin", &entities, &replace).unwrap();
        assert_eq!(out, "[NAME] lives in [PLACE]");
    }

    #[test]
    fn test_missing_label_token() {
        let entities = EntitySet::Typed(BTreeMap::from([(
            "ORG".to_string(),
            BTreeSet::from(["Acme".to_string()]),
        )]));
        let replace = ReplaceSpec::ByLabel(BTreeMap::new());

        assert!(substitute("Acme", &entities, &replace).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let entities = EntitySet::flat(["Alice"]);
        let replace = ReplaceSpec::ByLabel(BTreeMap::new());

        assert!(substitute("Alice", &entities, &replace).is_err());
    }

    #[test]
    fn test_case_sensitive() {
        let entities = EntitySet::flat(["alice"]);
        let replace = ReplaceSpec::Token("[NAME]".to_string());

        let out = substitute("Alice and alice", &entities, &replace).unwrap();
        assert_eq!(out, "Alice and [NAME]");
    }

    #[test]
    fn test_idempotent_after_full_redaction() {
        let entities = EntitySet::flat(["secret"]);
        let replace = ReplaceSpec::Token("[X]".to_string());

        let once = substitute("a secret here", &entities, &replace).unwrap();
        let twice = substitute(&once, &entities, &replace).unwrap();
        assert_eq!(once, twice);
    }
}
