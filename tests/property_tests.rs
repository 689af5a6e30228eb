//! Property-based tests for version comparison, names, and merging.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;

use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use modweave::core::config::MergePolicy;
use modweave::core::graph::Resolver;
use modweave::core::types::ModuleName;
use modweave::core::version::{compare_versions, is_newer, versions_differ};
use modweave::engine::merge::merge_manifests;

/// Strategy for dotted numeric versions with one to four segments.
fn numeric_version() -> impl Strategy<Value = String> {
    prop::collection::vec(0u32..30, 1..=4).prop_map(|parts| {
        parts
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    })
}

/// Strategy for valid module names.
fn module_name() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9_-]{0,20}"
}

/// Strategy for package maps with names that never collide with module names.
fn package_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("pkg-[a-z]{1,6}", numeric_version(), 0..6)
}

proptest! {
    #[test]
    fn comparison_is_antisymmetric(a in numeric_version(), b in numeric_version()) {
        let forward = compare_versions(&a, &b).unwrap();
        let backward = compare_versions(&b, &a).unwrap();
        prop_assert_eq!(forward, backward.reverse());
    }

    #[test]
    fn trailing_zero_segments_are_insignificant(v in numeric_version()) {
        let padded = format!("{}.0", v);
        // Four segments is the limit, so only pad shorter versions.
        prop_assume!(v.split('.').count() < 4);
        prop_assert_eq!(compare_versions(&v, &padded).unwrap(), Ordering::Equal);
        prop_assert!(!versions_differ(&v, &padded));
    }

    #[test]
    fn range_markers_do_not_change_equality(v in numeric_version()) {
        let caret = format!("^{}", v);
        let tilde = format!("~{}", v);
        prop_assert!(!versions_differ(&caret, &v));
        prop_assert!(!versions_differ(&tilde, &v));
        prop_assert!(!is_newer(&v, &v));
    }

    #[test]
    fn newer_agrees_with_comparison(a in numeric_version(), b in numeric_version()) {
        let greater = compare_versions(&a, &b).unwrap() == Ordering::Greater;
        prop_assert_eq!(is_newer(&a, &b), greater);
    }

    #[test]
    fn generated_names_are_valid(name in module_name()) {
        prop_assert!(ModuleName::new(name.as_str()).is_ok());
    }

    #[test]
    fn names_with_separators_are_rejected(a in module_name(), b in module_name()) {
        let joined = format!("{}/{}", a, b);
        prop_assert!(ModuleName::new(joined).is_err());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// With one non-entry module, the merged version of every module package
    /// is the module's under the legacy policy and the greater one under the
    /// newer policy. Host-only packages are untouched.
    #[test]
    fn merge_outcome_matches_policy(host in package_map(), module in package_map()) {
        let temp = TempDir::new().unwrap();
        let host_dir = temp.path().join("host");
        let module_dir = temp.path().join("feature");
        fs::create_dir_all(&host_dir).unwrap();
        fs::create_dir_all(&module_dir).unwrap();

        fs::write(
            host_dir.join("modweave-host.json"),
            json!({ "modules": [{ "path": "../feature", "names": ["feature"] }] }).to_string(),
        ).unwrap();
        fs::write(
            host_dir.join("package.json"),
            json!({ "dependencies": host }).to_string(),
        ).unwrap();
        fs::write(
            module_dir.join("modweave-module.json"),
            json!({ "modules": [{ "name": "feature" }] }).to_string(),
        ).unwrap();
        fs::write(
            module_dir.join("package.json"),
            json!({ "dependencies": module }).to_string(),
        ).unwrap();

        let graph = Resolver::resolve(&host_dir.join("modweave-host.json")).unwrap();

        for policy in [MergePolicy::Legacy, MergePolicy::Newer] {
            let mut merged = graph.host().manifest.clone();
            merge_manifests(&mut merged, &graph, policy);

            for (package, module_version) in &module {
                let expected = match (host.get(package), policy) {
                    (None, _) => module_version,
                    (Some(_), MergePolicy::Legacy) => module_version,
                    (Some(host_version), MergePolicy::Newer) => {
                        if is_newer(module_version, host_version) {
                            module_version
                        } else {
                            host_version
                        }
                    }
                };
                prop_assert_eq!(&merged.dependencies[package], expected);
            }
            for (package, host_version) in &host {
                if !module.contains_key(package) {
                    prop_assert_eq!(&merged.dependencies[package], host_version);
                }
            }
        }
    }
}
