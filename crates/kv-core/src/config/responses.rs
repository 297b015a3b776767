//! Response template index
//!
//! Free-text firmware lines are only surfaced to consumers when they match
//! one of these templates exactly. Templates are grouped by category, and
//! each category maps an identifier to its accepted lines:
//!
//! ```toml
//! [response.filament]
//! runout = ["// Filament runout"]
//!
//! [response.macros]
//! parking = ["// Parking head", "// Head parked"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Nested category → identifier → templates index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseTemplates(pub BTreeMap<String, BTreeMap<String, Vec<String>>>);

/// Location of a matched template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateMatch<'a> {
    pub category: &'a str,
    pub identifier: &'a str,
}

impl ResponseTemplates {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, creating the category and identifier as needed
    pub fn insert(
        &mut self,
        category: impl Into<String>,
        identifier: impl Into<String>,
        template: impl Into<String>,
    ) {
        self.0
            .entry(category.into())
            .or_default()
            .entry(identifier.into())
            .or_default()
            .push(template.into());
    }

    /// Find the first category/identifier whose templates contain `text` verbatim
    pub fn find(&self, text: &str) -> Option<TemplateMatch<'_>> {
        self.0.iter().find_map(|(category, ids)| {
            ids.iter()
                .find(|(_, templates)| templates.iter().any(|t| t == text))
                .map(|(identifier, _)| TemplateMatch {
                    category: category.as_str(),
                    identifier: identifier.as_str(),
                })
        })
    }

    /// Whether no template is configured
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|ids| ids.values().all(Vec::is_empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResponseTemplates {
        toml::from_str::<BTreeMap<String, ResponseTemplates>>(
            r#"
            [response.filament]
            runout = ["// Filament runout"]

            [response.macros]
            parking = ["// Parking head", "// Head parked"]
            "#,
        )
        .unwrap()
        .remove("response")
        .unwrap()
    }

    #[test]
    fn test_exact_match() {
        let templates = sample();
        let found = templates.find("// Head parked").unwrap();
        assert_eq!(found.category, "macros");
        assert_eq!(found.identifier, "parking");
    }

    #[test]
    fn test_no_partial_match() {
        let templates = sample();
        assert!(templates.find("// Head parked at X10").is_none());
        assert!(templates.find("// head parked").is_none());
        assert!(templates.find("").is_none());
    }

    #[test]
    fn test_insert_and_empty() {
        let mut templates = ResponseTemplates::new();
        assert!(templates.is_empty());
        templates.insert("probe", "done", "// Probing finished");
        assert!(!templates.is_empty());
        assert_eq!(templates.find("// Probing finished").unwrap().identifier, "done");
    }
}
