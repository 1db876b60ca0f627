//! Normalization tests
//!
//! Class files that differ only in encoding must share a canonical form;
//! structural differences must survive normalization.

mod support;

use codegen_verify::{NamedArtifact, NormalizeOptions, Normalizer};
use support::{greeter, local_slot_user, Encoding};

fn canonical_text(bytes: Vec<u8>) -> String {
    Normalizer::default()
        .normalize(&NamedArtifact::binary("com/example/Greeter.class", bytes))
        .unwrap()
        .text
}

// =============================================================================
// Equivalence
// =============================================================================

/// Test 1: normalizing the same bytes twice gives the same form
#[test]
fn test_normalization_is_deterministic() {
    let bytes = greeter("com/example/Greeter", "hi", &Encoding::debug());
    let normalizer = Normalizer::default();
    let artifact = NamedArtifact::binary("com/example/Greeter.class", bytes);

    let first = normalizer.normalize(&artifact).unwrap();
    let second = normalizer.normalize(&artifact).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.format, "jvm-class");
}

/// Test 2: line tables, local variable tables and SourceFile are ignored
#[test]
fn test_debug_metadata_ignored() {
    let plain = greeter("com/example/Greeter", "hi", &Encoding::default());
    let debug = greeter("com/example/Greeter", "hi", &Encoding::debug());
    assert_ne!(plain, debug);
    assert_eq!(canonical_text(plain), canonical_text(debug));
}

/// Test 3: shifted constant pool indices are ignored
#[test]
fn test_constant_pool_layout_ignored() {
    let compact = greeter("com/example/Greeter", "hi", &Encoding::default());
    let shifted = greeter(
        "com/example/Greeter",
        "hi",
        &Encoding {
            padding: 7,
            ..Encoding::default()
        },
    );
    assert_ne!(compact, shifted);
    assert_eq!(canonical_text(compact), canonical_text(shifted));
}

/// Test 4: ldc and ldc_w spellings of the same load are equivalent
#[test]
fn test_ldc_wide_index_equivalent() {
    let narrow = greeter("com/example/Greeter", "hi", &Encoding::default());
    let wide = greeter(
        "com/example/Greeter",
        "hi",
        &Encoding {
            padding: 300,
            ..Encoding::default()
        },
    );
    assert_eq!(canonical_text(narrow), canonical_text(wide));
}

/// Test 5: wide-prefixed local access equals the short form
#[test]
fn test_wide_local_equivalent() {
    assert_eq!(
        canonical_text(local_slot_user(false)),
        canonical_text(local_slot_user(true))
    );
}

/// Test 6: member declaration order is ignored
#[test]
fn test_member_order_ignored() {
    let forward = greeter("com/example/Greeter", "hi", &Encoding::default());
    let reversed = greeter(
        "com/example/Greeter",
        "hi",
        &Encoding {
            reverse_members: true,
            debug: true,
            padding: 3,
        },
    );
    assert_eq!(canonical_text(forward), canonical_text(reversed));
}

// =============================================================================
// Differences
// =============================================================================

/// Test 7: a different constant is a different form
#[test]
fn test_structural_difference_kept() {
    let a = canonical_text(greeter("com/example/Greeter", "hi", &Encoding::default()));
    let b = canonical_text(greeter("com/example/Greeter", "bye", &Encoding::default()));
    assert_ne!(a, b);
    assert!(a.contains("ldc \"hi\""));
    assert!(b.contains("ldc \"bye\""));
}

/// Test 8: debug metadata becomes visible when nothing is stripped
#[test]
fn test_stripping_is_configurable() {
    let normalizer = Normalizer::new(NormalizeOptions {
        strip_attributes: Vec::new(),
        ..NormalizeOptions::default()
    });
    let plain = NamedArtifact::binary(
        "G.class",
        greeter("com/example/Greeter", "hi", &Encoding::default()),
    );
    let debug = NamedArtifact::binary(
        "G.class",
        greeter("com/example/Greeter", "hi", &Encoding::debug()),
    );
    assert_ne!(
        normalizer.normalize(&plain).unwrap(),
        normalizer.normalize(&debug).unwrap()
    );
}

/// Test 9: member order matters once sorting is disabled
#[test]
fn test_member_sorting_is_configurable() {
    let normalizer = Normalizer::new(NormalizeOptions {
        sort_members: false,
        ..NormalizeOptions::default()
    });
    let forward = NamedArtifact::binary(
        "G.class",
        greeter("com/example/Greeter", "hi", &Encoding::default()),
    );
    let reversed = NamedArtifact::binary(
        "G.class",
        greeter(
            "com/example/Greeter",
            "hi",
            &Encoding {
                reverse_members: true,
                ..Encoding::default()
            },
        ),
    );
    assert_ne!(
        normalizer.normalize(&forward).unwrap(),
        normalizer.normalize(&reversed).unwrap()
    );
}

/// Test 10: truncated class files are malformed, not just different
#[test]
fn test_truncated_class_is_malformed() {
    let mut bytes = greeter("com/example/Greeter", "hi", &Encoding::default());
    bytes.truncate(bytes.len() / 2);
    let err = Normalizer::default()
        .normalize(&NamedArtifact::binary("G.class", bytes))
        .unwrap_err();
    assert_eq!(err.format, "jvm-class");
    assert_eq!(err.name, "G.class");
}
