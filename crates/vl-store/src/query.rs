//! Derived read queries over a ledger document.
//!
//! Every function here is pure; the store wraps them around its current
//! snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vl_types::{compare_tags, Component, LedgerDocument, TestResult, Version};

use crate::error::{LedgerError, LedgerResult};
use crate::warning::{LedgerWarning, Warned};

/// The highest tag recorded for `component_id`.
///
/// When several entries carry equal tags the most recently appended wins.
pub fn latest_component_version<'a>(
    document: &'a LedgerDocument,
    component_id: &str,
) -> Option<&'a Version> {
    document
        .component_versions(component_id)
        .max_by(|a, b| compare_tags(&a.tag, &b.tag))
}

/// Latest version of each component, in component order.
///
/// With a `setup_id` only that setup's components are considered. Components
/// without any recorded version are skipped.
pub fn latest_versions<'a>(
    document: &'a LedgerDocument,
    setup_id: Option<&str>,
) -> LedgerResult<Vec<&'a Version>> {
    let scope: Option<BTreeSet<&str>> = match setup_id {
        Some(id) => Some(
            document
                .setup(id)
                .ok_or_else(|| not_found("setup", id))?
                .component_set(),
        ),
        None => None,
    };
    Ok(document
        .components
        .iter()
        .filter(|c| scope.as_ref().map_or(true, |s| s.contains(c.id.as_str())))
        .filter_map(|c| latest_component_version(document, &c.id))
        .collect())
}

/// Components that belong to `setup_id`.
pub fn setup_components<'a>(
    document: &'a LedgerDocument,
    setup_id: &str,
) -> LedgerResult<Warned<Vec<&'a Component>>> {
    let setup = document
        .setup(setup_id)
        .ok_or_else(|| not_found("setup", setup_id))?;
    let components: Vec<&Component> = document
        .components
        .iter()
        .filter(|c| setup.includes(&c.id))
        .collect();
    if components.is_empty() {
        return Ok(Warned::new(
            components,
            vec![LedgerWarning::EmptySetup {
                setup_id: setup_id.to_string(),
            }],
        ));
    }
    Ok(Warned::clean(components))
}

/// Tests recorded against `setup_id`, in insertion order.
pub fn setup_tests<'a>(document: &'a LedgerDocument, setup_id: &str) -> Vec<&'a TestResult> {
    document
        .tests
        .iter()
        .filter(|t| t.setup_id == setup_id)
        .collect()
}

/// Distinct tags per requested component, newest first.
///
/// Unknown ids map to an empty list.
pub fn component_versions(
    document: &LedgerDocument,
    component_ids: &[String],
) -> BTreeMap<String, Vec<String>> {
    component_ids
        .iter()
        .map(|id| {
            let mut tags: Vec<String> = Vec::new();
            for version in document.component_versions(id) {
                if !tags.contains(&version.tag) {
                    tags.push(version.tag.clone());
                }
            }
            tags.sort_by(|a, b| compare_tags(b, a));
            (id.clone(), tags)
        })
        .collect()
}

/// All versions, most recently recorded first.
pub fn release_history(document: &LedgerDocument) -> Vec<&Version> {
    let mut versions: Vec<&Version> = document.versions.iter().collect();
    // Stable sort keeps append order among equal dates; reverse afterwards
    // so later appends come first.
    versions.sort_by_key(|v| v.date);
    versions.reverse();
    versions
}

/// Criteria for listing test results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFilter {
    pub setup_id: Option<String>,
    /// Exact status match.
    pub status: Option<String>,
    /// Keep tests whose version map names this component.
    pub component_id: Option<String>,
    #[serde(default)]
    pub newest_first: bool,
}

impl TestFilter {
    pub fn matches(&self, test: &TestResult) -> bool {
        self.setup_id.as_ref().map_or(true, |id| &test.setup_id == id)
            && self.status.as_ref().map_or(true, |s| &test.status == s)
            && self
                .component_id
                .as_ref()
                .map_or(true, |id| test.component_version_map.contains_key(id))
    }

    pub fn apply<'a>(&self, document: &'a LedgerDocument) -> Vec<&'a TestResult> {
        let mut tests: Vec<&TestResult> =
            document.tests.iter().filter(|t| self.matches(t)).collect();
        if self.newest_first {
            tests.sort_by_key(|t| t.date);
            tests.reverse();
        }
        tests
    }
}

fn not_found(kind: &'static str, id: &str) -> LedgerError {
    LedgerError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use vl_types::Setup;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn version(ms: i64, component: &str, tag: &str) -> Version {
        Version { date: at(ms), component_id: component.into(), tag: tag.into() }
    }

    fn test(ms: i64, setup: &str, status: &str, map: &[(&str, &str)]) -> TestResult {
        TestResult {
            date: at(ms),
            setup_id: setup.into(),
            status: status.into(),
            description: None,
            component_version_map: map.iter().map(|(c, t)| (c.to_string(), t.to_string())).collect(),
        }
    }

    fn sample() -> LedgerDocument {
        LedgerDocument {
            components: vec![
                Component::new("fw", "Firmware"),
                Component::new("app", "App"),
                Component::new("srv", "Server"),
            ],
            versions: vec![
                version(1, "fw", "1.2.0"),
                version(2, "fw", "1.10.0"),
                version(3, "app", "v2.0.0"),
                version(4, "fw", "1.9.9"),
            ],
            setups: vec![
                Setup { id: "bench".into(), name: "Bench".into(), component_ids: vec!["app".into(), "fw".into()] },
                Setup { id: "ghost".into(), name: "Ghost".into(), component_ids: vec!["removed".into()] },
            ],
            tests: vec![
                test(10, "bench", "passed", &[("fw", "1.2.0")]),
                test(30, "other", "failed", &[("srv", "0.1.0")]),
                test(20, "bench", "failed", &[("fw", "1.10.0"), ("app", "v2.0.0")]),
            ],
            ..LedgerDocument::default()
        }
    }

    #[test]
    fn latest_uses_semver_not_lexicographic() {
        let doc = sample();
        assert_eq!(latest_component_version(&doc, "fw").unwrap().tag, "1.10.0");
        assert!(latest_component_version(&doc, "srv").is_none());
    }

    #[test]
    fn latest_tie_prefers_last_appended() {
        let mut doc = sample();
        doc.versions.push(version(99, "fw", "1.10.0"));
        assert_eq!(latest_component_version(&doc, "fw").unwrap().date, at(99));
    }

    #[test]
    fn latest_versions_scoped_to_setup() {
        let doc = sample();
        let all: Vec<&str> = latest_versions(&doc, None).unwrap().iter().map(|v| v.tag.as_str()).collect();
        assert_eq!(all, ["1.10.0", "v2.0.0"]);

        let bench = latest_versions(&doc, Some("bench")).unwrap();
        assert_eq!(bench.len(), 2);

        assert!(matches!(
            latest_versions(&doc, Some("nope")),
            Err(LedgerError::NotFound { kind: "setup", .. })
        ));
    }

    #[test]
    fn setup_components_resolve_or_warn() {
        let doc = sample();
        let bench = setup_components(&doc, "bench").unwrap();
        assert!(!bench.has_warnings());
        let ids: Vec<&str> = bench.value.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["fw", "app"]);

        let ghost = setup_components(&doc, "ghost").unwrap();
        assert!(ghost.value.is_empty());
        assert_eq!(ghost.warnings, [LedgerWarning::EmptySetup { setup_id: "ghost".into() }]);

        assert!(matches!(setup_components(&doc, "nope"), Err(LedgerError::NotFound { .. })));
    }

    #[test]
    fn setup_tests_keep_insertion_order() {
        let doc = sample();
        let dates: Vec<i64> = setup_tests(&doc, "bench").iter().map(|t| t.date.timestamp_millis()).collect();
        assert_eq!(dates, [10, 20]);
        assert!(setup_tests(&doc, "nope").is_empty());
    }

    #[test]
    fn catalog_is_newest_first_and_distinct() {
        let mut doc = sample();
        doc.versions.push(version(5, "fw", "1.2.0"));
        let catalog = component_versions(&doc, &["fw".into(), "srv".into()]);
        assert_eq!(catalog["fw"], ["1.10.0", "1.9.9", "1.2.0"]);
        assert!(catalog["srv"].is_empty());
    }

    #[test]
    fn release_history_newest_first() {
        let doc = sample();
        let dates: Vec<i64> = release_history(&doc).iter().map(|v| v.date.timestamp_millis()).collect();
        assert_eq!(dates, [4, 3, 2, 1]);
    }

    #[test]
    fn filter_combines_criteria() {
        let doc = sample();
        let failed = TestFilter { status: Some("failed".into()), ..Default::default() };
        assert_eq!(failed.apply(&doc).len(), 2);

        let fw_bench = TestFilter {
            setup_id: Some("bench".into()),
            component_id: Some("fw".into()),
            newest_first: true,
            ..Default::default()
        };
        let dates: Vec<i64> = fw_bench.apply(&doc).iter().map(|t| t.date.timestamp_millis()).collect();
        assert_eq!(dates, [20, 10]);

        assert_eq!(TestFilter::default().apply(&doc).len(), 3);
    }
}
