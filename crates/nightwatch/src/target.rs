//! Target registry, tag filter profiles and selector resolution.

use crate::error::{ResolutionError, SchedulerError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// An individually addressable, independently pass/fail test unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestTarget {
    /// Bazel-style label, e.g. `//tests/consensus:liveness`.
    pub label: String,

    /// Tags the target carries, e.g. `k8s`, `system_test_hourly`.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl TestTarget {
    pub fn new(label: impl Into<String>, tags: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            label: label.into(),
            tags: tags.into_iter().map(String::from).collect(),
        }
    }
}

/// The universe of registered targets, in registration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetRegistry {
    targets: Vec<TestTarget>,
}

impl TargetRegistry {
    /// Build a registry, rejecting duplicate labels and targets tagged with
    /// both hourly and nightly tiers (a target must belong to at most one).
    pub fn new(targets: Vec<TestTarget>) -> Result<Self, SchedulerError> {
        let mut seen = BTreeSet::new();
        for target in &targets {
            if !seen.insert(target.label.as_str()) {
                return Err(SchedulerError::InvalidRegistry(format!(
                    "duplicate target label '{}'",
                    target.label
                )));
            }
            if target.tags.contains("system_test_hourly")
                && target.tags.contains("system_test_nightly")
            {
                return Err(SchedulerError::InvalidRegistry(format!(
                    "target '{}' is tagged with both system_test_hourly and system_test_nightly",
                    target.label
                )));
            }
        }
        Ok(Self { targets })
    }

    /// Parse a registry from its JSON representation.
    pub fn from_json(raw: &str) -> Result<Self, SchedulerError> {
        let targets: Vec<TestTarget> = serde_json::from_str(raw)?;
        Self::new(targets)
    }

    pub fn targets(&self) -> &[TestTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Deterministic digest of ordered labels, used to tag runs.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for target in &self.targets {
            hasher.update(target.label.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

/// Named filter profile selecting one tier of the tag space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProfileName {
    /// Primary tier: nightly base suite.
    Base,

    /// Secondary tier: the hourly superset chained off a scheduled run.
    Hourly,
}

impl ProfileName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Base => "base",
            ProfileName::Hourly => "hourly",
        }
    }
}

/// A named pair of include/exclude tag sets carving the target universe
/// into a runnable subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagFilterProfile {
    pub name: ProfileName,
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
}

impl TagFilterProfile {
    pub fn named(name: ProfileName) -> Self {
        match name {
            ProfileName::Base => Self::base(),
            ProfileName::Hourly => Self::hourly(),
        }
    }

    /// Primary tier: k8s targets minus manual, colocated and both
    /// tier-specific tags.
    pub fn base() -> Self {
        Self {
            name: ProfileName::Base,
            include: tags(["k8s"]),
            exclude: tags([
                "manual",
                "colocated",
                "system_test_hourly",
                "system_test_nightly",
            ]),
        }
    }

    /// Secondary tier: the hourly superset. Complements the base profile by
    /// moving `system_test_hourly` from exclude to include.
    pub fn hourly() -> Self {
        Self {
            name: ProfileName::Hourly,
            include: tags(["k8s", "system_test_hourly"]),
            exclude: tags(["manual", "colocated", "system_test_nightly"]),
        }
    }

    /// Render the runner's tag filter expression: includes first, then
    /// `-`-prefixed excludes, e.g. `k8s,-colocated,-manual`.
    pub fn expression(&self) -> String {
        let mut parts: Vec<String> = self.include.iter().cloned().collect();
        parts.extend(self.exclude.iter().map(|t| format!("-{}", t)));
        parts.join(",")
    }
}

fn tags<const N: usize>(names: [&str; N]) -> BTreeSet<String> {
    names.into_iter().map(String::from).collect()
}

/// Ordered, deduplicated list of runnable target labels. Empty is valid
/// and produces a no-op run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedTargetSet {
    labels: Vec<String>,
}

impl ResolvedTargetSet {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Whether a single target survives a filter profile.
///
/// Exclude wins: a target carrying any exclude tag is removed regardless of
/// include-tag matches. Otherwise the target must carry at least one
/// include tag.
pub fn apply_filters(target: &TestTarget, profile: &TagFilterProfile) -> bool {
    if target.tags.iter().any(|t| profile.exclude.contains(t)) {
        return false;
    }
    target.tags.iter().any(|t| profile.include.contains(t))
}

/// Expand a selector against the registry and apply the filter profile.
///
/// `"all"` expands to every registered target. Anything else is an explicit
/// label or `//pkg/...` wildcard matched against the registry. The result
/// keeps registry order and never contains duplicates.
pub fn resolve(
    selector: &str,
    registry: &TargetRegistry,
    profile: &TagFilterProfile,
) -> Result<ResolvedTargetSet, ResolutionError> {
    let matched: Vec<&TestTarget> = if selector == "all" {
        registry.targets().iter().collect()
    } else {
        let matched: Vec<&TestTarget> = registry
            .targets()
            .iter()
            .filter(|t| selector_matches(selector, &t.label))
            .collect();
        if matched.is_empty() {
            return Err(ResolutionError::new(selector));
        }
        matched
    };

    let mut seen = BTreeSet::new();
    let labels = matched
        .into_iter()
        .filter(|t| apply_filters(t, profile))
        .filter(|t| seen.insert(t.label.clone()))
        .map(|t| t.label.clone())
        .collect();

    Ok(ResolvedTargetSet { labels })
}

/// Match an explicit selector against a label: exact, or a `/...` package
/// wildcard covering everything under the package.
fn selector_matches(selector: &str, label: &str) -> bool {
    if let Some(prefix) = selector.strip_suffix("/...") {
        match label.strip_prefix(prefix) {
            Some(rest) => rest.starts_with(':') || rest.starts_with('/'),
            None => false,
        }
    } else {
        label == selector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TargetRegistry {
        TargetRegistry::new(vec![
            TestTarget::new("//tests/consensus:liveness", ["k8s"]),
            TestTarget::new("//tests/consensus:safety", ["k8s"]),
            TestTarget::new("//tests/xnet:slo", ["k8s", "system_test_hourly"]),
            TestTarget::new("//tests/nns:upgrade", ["k8s", "system_test_nightly"]),
            TestTarget::new("//tests/manual:stress", ["k8s", "manual"]),
            TestTarget::new("//tests/colo:bench", ["k8s", "colocated"]),
            TestTarget::new("//tests/smoke:basic_health", ["k8s"]),
        ])
        .expect("registry should build")
    }

    #[test]
    fn test_base_profile_tags() {
        let base = TagFilterProfile::base();
        assert!(base.include.contains("k8s"));
        assert!(base.exclude.contains("system_test_hourly"));
        assert!(base.exclude.contains("system_test_nightly"));
        assert!(base.exclude.contains("manual"));
        assert!(base.exclude.contains("colocated"));
    }

    #[test]
    fn test_hourly_profile_complements_base() {
        let hourly = TagFilterProfile::hourly();
        assert!(hourly.include.contains("system_test_hourly"));
        assert!(!hourly.exclude.contains("system_test_hourly"));
        assert!(hourly.exclude.contains("system_test_nightly"));
    }

    #[test]
    fn test_expression_rendering() {
        let expr = TagFilterProfile::base().expression();
        assert!(expr.starts_with("k8s"));
        assert!(expr.contains("-manual"));
        assert!(expr.contains("-system_test_hourly"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        // Carries both an include tag and an exclude tag from the profile.
        let target = TestTarget::new("//tests/manual:stress", ["k8s", "manual"]);
        assert!(!apply_filters(&target, &TagFilterProfile::base()));
    }

    #[test]
    fn test_target_without_include_tag_is_dropped() {
        let target = TestTarget::new("//tests/local:unit", ["cpu:2"]);
        assert!(!apply_filters(&target, &TagFilterProfile::base()));
    }

    #[test]
    fn test_resolve_all_with_base_profile() {
        let set = resolve("all", &registry(), &TagFilterProfile::base()).expect("resolve failed");
        assert_eq!(
            set.labels(),
            &[
                "//tests/consensus:liveness",
                "//tests/consensus:safety",
                "//tests/smoke:basic_health",
            ]
        );
    }

    #[test]
    fn test_resolve_all_with_hourly_profile_adds_hourly_targets() {
        let set = resolve("all", &registry(), &TagFilterProfile::hourly()).expect("resolve failed");
        assert!(set.contains("//tests/xnet:slo"));
        assert!(set.contains("//tests/consensus:liveness"));
        assert!(!set.contains("//tests/nns:upgrade"));
    }

    #[test]
    fn test_resolve_explicit_label() {
        let set = resolve(
            "//tests/consensus:safety",
            &registry(),
            &TagFilterProfile::base(),
        )
        .expect("resolve failed");
        assert_eq!(set.labels(), &["//tests/consensus:safety"]);
    }

    #[test]
    fn test_resolve_package_wildcard() {
        let set = resolve(
            "//tests/consensus/...",
            &registry(),
            &TagFilterProfile::base(),
        )
        .expect("resolve failed");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_resolve_unknown_selector_is_an_error() {
        let err = resolve("//nope:missing", &registry(), &TagFilterProfile::base())
            .expect_err("should fail");
        assert_eq!(err.selector, "//nope:missing");
    }

    #[test]
    fn test_resolve_filtered_to_zero_is_valid() {
        // The target exists but the base profile excludes it: empty set,
        // not an error.
        let set = resolve(
            "//tests/manual:stress",
            &registry(),
            &TagFilterProfile::base(),
        )
        .expect("resolve failed");
        assert!(set.is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let first = resolve("all", &registry(), &TagFilterProfile::hourly()).unwrap();
        let second = resolve("all", &registry(), &TagFilterProfile::hourly()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_registry_rejects_duplicate_labels() {
        let err = TargetRegistry::new(vec![
            TestTarget::new("//a:b", ["k8s"]),
            TestTarget::new("//a:b", ["k8s"]),
        ])
        .expect_err("should fail");
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_registry_rejects_hourly_and_nightly_overlap() {
        let err = TargetRegistry::new(vec![TestTarget::new(
            "//a:b",
            ["k8s", "system_test_hourly", "system_test_nightly"],
        )])
        .expect_err("should fail");
        assert!(err.to_string().contains("system_test_hourly"));
    }

    #[test]
    fn test_registry_digest_is_order_sensitive() {
        let r1 = TargetRegistry::new(vec![
            TestTarget::new("//a:b", ["k8s"]),
            TestTarget::new("//c:d", ["k8s"]),
        ])
        .unwrap();
        let r2 = TargetRegistry::new(vec![
            TestTarget::new("//c:d", ["k8s"]),
            TestTarget::new("//a:b", ["k8s"]),
        ])
        .unwrap();
        assert_ne!(r1.digest(), r2.digest());
    }

    #[test]
    fn test_registry_from_json() {
        let raw = r#"[
            { "label": "//a:b", "tags": ["k8s"] },
            { "label": "//c:d" }
        ]"#;
        let registry = TargetRegistry::from_json(raw).expect("parse failed");
        assert_eq!(registry.len(), 2);
        assert!(registry.targets()[1].tags.is_empty());
    }
}
