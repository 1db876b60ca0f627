//! Configuration layering tests
//!
//! Builtin defaults, a project TOML file and JSON overrides, merged in
//! precedence order and applied to a verifier.

mod support;

use std::fs;

use codegen_verify::config::{ConfigOrigin, EffectiveConfig};
use codegen_verify::{ArtifactSet, Verifier, VerifyConfig};
use serde_json::json;
use support::{greeter, Encoding};
use tempfile::TempDir;

/// Test 1: override beats project file beats defaults
#[test]
fn test_layer_precedence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("verify.toml");
    fs::write(
        &path,
        "[sources]\nsource_suffix = \".kt\"\n\n[report]\ncontext_lines = 5\n",
    )
    .unwrap();

    let effective = EffectiveConfig::build(
        Some(&path),
        Some(json!({"report": {"context_lines": 1}})),
    )
    .unwrap();

    assert_eq!(effective.get_str("sources.source_suffix"), Some(".kt"));
    assert_eq!(effective.get_u64("report.context_lines"), Some(1));
    assert_eq!(effective.get_str("sources.binary_suffix"), Some(".class"));

    let origins: Vec<ConfigOrigin> = effective.sources.iter().map(|s| s.origin.clone()).collect();
    assert_eq!(
        origins,
        vec![ConfigOrigin::Builtin, ConfigOrigin::Project, ConfigOrigin::Override]
    );

    let config = effective.verify_config().unwrap();
    assert_eq!(config.sources.source_suffix, ".kt");
    assert_eq!(config.report.context_lines, 1);
}

/// Test 2: overrides replace arrays rather than appending
#[test]
fn test_strip_list_replaced() {
    let effective = EffectiveConfig::build(
        None,
        Some(json!({"normalize": {"strip_attributes": ["LineNumberTable"]}})),
    )
    .unwrap();
    let config = effective.verify_config().unwrap();
    assert_eq!(config.normalize.strip_attributes, vec!["LineNumberTable"]);
}

/// Test 3: a loaded config changes verification outcomes
#[test]
fn test_loaded_config_drives_verifier() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("verify.toml");
    fs::write(&path, "[normalize]\nstrip_attributes = []\n").unwrap();
    let strict = VerifyConfig::load(&path).unwrap();

    let expected = ArtifactSet::new().with_binary("Foo.class", greeter("Foo", "hi", &Encoding::default()));
    let actual = ArtifactSet::new().with_binary("Foo.class", greeter("Foo", "hi", &Encoding::debug()));

    assert!(Verifier::default().verify(&expected, &actual, None).passed());
    assert!(!Verifier::new(strict).verify(&expected, &actual, None).passed());
}

/// Test 4: invalid values are rejected before verification
#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("verify.toml");
    fs::write(&path, "[sources]\nnested_separators = [\"::\"]\n").unwrap();

    let err = VerifyConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("single characters"));
}

/// Test 5: effective config serializes with its schema id
#[test]
fn test_effective_config_json() {
    let effective = EffectiveConfig::build(None, None).unwrap();
    let json: serde_json::Value = serde_json::from_str(&effective.to_json().unwrap()).unwrap();
    assert_eq!(json["schema_id"], "codegen-verify/effective_config@1");
    assert_eq!(json["config"]["sources"]["nested_separators"], json!(["$"]));
}

/// Test 6: empty suffixes let bare type names resolve to their outer source
#[test]
fn test_empty_suffixes_resolve_bare_names() {
    let config = VerifyConfig::from_toml_str(
        "[sources]\nbinary_location = \"\"\nbinary_suffix = \"\"\nsource_suffix = \"\"\n",
    )
    .unwrap();
    assert_eq!(config.sources.source_suffix, "");

    let expected = ArtifactSet::new().with_binary(
        "Outer$Inner",
        greeter("Outer$Inner", "hi", &Encoding::default()),
    );
    let actual = ArtifactSet::new().with_binary(
        "Outer$Inner",
        greeter("Outer$Inner", "bye", &Encoding::default()),
    );
    let sources = ArtifactSet::new().with_source("Outer", "class Outer { class Inner {} }");

    let run = Verifier::new(config).verify(&expected, &actual, Some(&sources));
    assert!(!run.passed());
    assert_eq!(run.results()[0].source_hint.unwrap().name(), "Outer");
}
