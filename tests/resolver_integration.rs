//! Integration tests for grammar inheritance resolution
//!
//! These tests cover hierarchy ordering, conflict resolution, topology
//! errors and generation-based cache invalidation through the registry.

use gramstep::grammar::{GrammarRegistry, Matcher, MemoryLoader, Part};
use gramstep::GrammarError;
use std::sync::Arc;

fn load(texts: &[&str]) -> GrammarRegistry {
    let mut registry = GrammarRegistry::new();
    for text in texts {
        registry.register_text(text).unwrap();
    }
    registry
}

fn hierarchy(registry: &mut GrammarRegistry, name: &str) -> Vec<String> {
    registry
        .get_inheritance_hierarchy(name)
        .unwrap()
        .iter()
        .map(|g| g.name.clone())
        .collect()
}

// ============================================================================
// Hierarchy Order
// ============================================================================

#[test]
fn test_diamond_hierarchy_lists_shared_base_once() {
    let mut registry = load(&[
        "Grammar: D\n<d> ::= 'd'",
        "Grammar: B\nExtends Grammar: D\n<b> ::= 'b'",
        "Grammar: C\nExtends Grammar: D\n<c> ::= 'c'",
        "Grammar: A\nExtends Grammar: B, C\n<a> ::= <b> <c> <d>",
    ]);
    assert_eq!(hierarchy(&mut registry, "A"), vec!["D", "B", "C", "A"]);
}

#[test]
fn test_extends_precede_includes() {
    let mut registry = load(&[
        "Grammar: Lex\nN := /[0-9]+/",
        "Grammar: Base\n<v> ::= N\nN := /[0-9]/",
        "Grammar: Top\nInclude: Lex\nExtends Grammar: Base\n<s> ::= <v>",
    ]);
    assert_eq!(hierarchy(&mut registry, "Top"), vec!["Base", "Lex", "Top"]);
    // the Extends base overrides the Include for N
    let effective = registry.effective("Top").unwrap();
    let n = effective.terminal("N").unwrap();
    assert_eq!(n.matcher, Matcher::Regex("[0-9]".into()));
}

// ============================================================================
// Conflict Resolution
// ============================================================================

#[test]
fn test_nearest_definition_wins() {
    let mut registry = load(&[
        "Grammar: Base\nN := /[0-9]+/\n<v> ::= N\n<w> ::= N N",
        "Grammar: Child\nExtends Grammar: Base\n<s> ::= <v> | <w>\n<v> ::= N N N",
    ]);
    let effective = registry.effective("Child").unwrap();
    let v = effective.find_rule("v");
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].parts.len(), 3);
    assert_eq!(effective.find_rule("w").len(), 1);
    assert_eq!(effective.start, "s");
}

#[test]
fn test_extend_appends_to_inherited_alternatives() {
    let mut registry = load(&[
        "Grammar: Base\nN := /[0-9]+/\n<v> ::= N | '(' <v> ')'",
        "Grammar: Child\nExtends Grammar: Base\n<v> |= '-' <v>",
    ]);
    let effective = registry.effective("Child").unwrap();
    let firsts: Vec<&Part> = effective
        .find_rule("v")
        .iter()
        .filter_map(|p| p.parts.first())
        .collect();
    assert_eq!(
        firsts,
        vec![
            &Part::Terminal("N".into()),
            &Part::Terminal("'('".into()),
            &Part::Terminal("'-'".into()),
        ]
    );
}

#[test]
fn test_first_base_wins_between_siblings() {
    let mut registry = load(&[
        "Grammar: Left\n<r> ::= 'left'",
        "Grammar: Right\n<r> ::= 'right'",
        "Grammar: Both\nExtends Grammar: Left, Right\n<s> ::= <r>",
    ]);
    let effective = registry.effective("Both").unwrap();
    let r = effective.find_rule("r");
    assert_eq!(r[0].parts, vec![Part::Terminal("'left'".into())]);
}

// ============================================================================
// Topology Errors
// ============================================================================

#[test]
fn test_cycle_names_every_member() {
    let mut registry = load(&[
        "Grammar: A\nExtends Grammar: B\n<a> ::= 'a'",
        "Grammar: B\nExtends Grammar: A\n<b> ::= 'b'",
    ]);
    match registry.effective("A") {
        Err(GrammarError::CyclicDependency { cycle }) => assert_eq!(cycle, vec!["A", "B", "A"]),
        other => panic!("expected a cycle, got {:?}", other),
    }
    assert!(matches!(
        registry.get_inheritance_hierarchy("B"),
        Err(GrammarError::CyclicDependency { .. })
    ));
}

#[test]
fn test_self_inheritance_rejected_at_registration() {
    let mut registry = GrammarRegistry::new();
    let err = registry
        .register_text("Grammar: Loop\nExtends Grammar: Loop\n<s> ::= 'x'")
        .unwrap_err();
    assert!(matches!(err, GrammarError::SelfInheritance { .. }));
}

#[test]
fn test_missing_base_names_both_grammars() {
    let mut registry = load(&["Grammar: A\nExtends Grammar: Ghost\n<a> ::= 'a'"]);
    assert_eq!(
        registry.effective("A").unwrap_err(),
        GrammarError::MissingBaseGrammar {
            grammar: "A".into(),
            base: "Ghost".into(),
        }
    );
}

#[test]
fn test_sealed_base() {
    let mut registry = load(&[
        "Grammar: Sealed\nInheritable: false\n<x> ::= 'x'",
        "Grammar: A\nExtends Grammar: Sealed\n<a> ::= <x>",
    ]);
    assert!(matches!(
        registry.effective("A"),
        Err(GrammarError::NotInheritable { .. })
    ));
}

#[test]
fn test_incompatible_formats() {
    let mut registry = load(&[
        "Grammar: Bnf\nFormat: bnf\n<x> ::= 'x'",
        "Grammar: Peg\nFormat: peg\nExtends Grammar: Bnf\n<a> ::= <x>",
        "Grammar: Loose\nTokenSplitter: whitespace\nExtends Grammar: Strict\n<a> ::= <x>",
        "Grammar: Strict\nTokenSplitter: none\n<x> ::= 'x'",
    ]);
    assert!(matches!(
        registry.effective("Peg"),
        Err(GrammarError::IncompatibleFormat { .. })
    ));
    assert!(matches!(
        registry.effective("Loose"),
        Err(GrammarError::IncompatibleFormat { .. })
    ));
}

#[test]
fn test_reference_validation() {
    let mut registry = load(&["Grammar: G\n<s> ::= <nowhere>"]);
    assert!(matches!(
        registry.effective("G"),
        Err(GrammarError::UndefinedRule { .. })
    ));

    let mut registry = load(&["Grammar: G\nNUMBER := /[0-9]+/\n<s> ::= NUMBR"]);
    assert!(matches!(
        registry.effective("G"),
        Err(GrammarError::UndefinedTerminal { .. })
    ));

    let mut registry = load(&["Grammar: G\nBAD := /[unclosed/\n<s> ::= BAD"]);
    assert!(matches!(
        registry.effective("G"),
        Err(GrammarError::InvalidPattern { .. })
    ));
}

// ============================================================================
// Caching and Invalidation
// ============================================================================

#[test]
fn test_effective_grammar_memoized_per_generation() {
    let mut registry = load(&[
        "Grammar: Base\n<v> ::= 'v'",
        "Grammar: Extra\n<w> ::= 'w'",
        "Grammar: Child\nExtends Grammar: Base\n<s> ::= <v>",
    ]);
    let first = registry.effective("Child").unwrap();
    let again = registry.effective("Child").unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let generation = registry.generation();
    assert!(registry.add_base_grammar("Child", "Extra").unwrap());
    assert!(registry.generation() > generation);

    let fresh = registry.effective("Child").unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert!(fresh.defines_rule("w"));
    assert!(!first.defines_rule("w"));
}

#[test]
fn test_noop_mutations_keep_generation() {
    let mut registry = load(&[
        "Grammar: Base\n<v> ::= 'v'",
        "Grammar: Child\nExtends Grammar: Base\n<s> ::= <v>",
    ]);
    let generation = registry.generation();
    assert!(!registry.add_base_grammar("Child", "Base").unwrap());
    assert!(!registry.remove_base_grammar("Child", "Nope").unwrap());
    assert!(!registry.relink_base_grammar("Child", "Nope", "Base").unwrap());
    assert_eq!(registry.generation(), generation);
}

#[test]
fn test_relink_keeps_position() {
    let mut registry = load(&[
        "Grammar: Old\n<r> ::= 'old'",
        "Grammar: New\n<r> ::= 'new'",
        "Grammar: Other\n<r> ::= 'other'",
        "Grammar: Child\nExtends Grammar: Old, Other\n<s> ::= <r>",
    ]);
    assert!(registry.relink_base_grammar("Child", "Old", "New").unwrap());
    assert_eq!(hierarchy(&mut registry, "Child"), vec!["New", "Other", "Child"]);
    let effective = registry.effective("Child").unwrap();
    assert_eq!(effective.find_rule("r")[0].parts, vec![Part::Terminal("'new'".into())]);
}

#[test]
fn test_removing_base_invalidates_dependents() {
    let mut registry = load(&[
        "Grammar: Base\n<v> ::= 'v'",
        "Grammar: Child\nExtends Grammar: Base\n<s> ::= <v>",
    ]);
    assert!(registry.effective("Child").is_ok());
    assert!(registry.remove_base_grammar("Child", "Base").unwrap());
    assert!(matches!(
        registry.effective("Child"),
        Err(GrammarError::UndefinedRule { .. })
    ));
}

#[test]
fn test_serialization_is_byte_identical_across_resolutions() {
    let mut registry = load(&[
        "Grammar: Base\nN := /[0-9]+/\n<v> ::= N\nPrecedence: left '+'\nAction add: callback add_numbers",
        "Grammar: Child\nExtends Grammar: Base\n<s> ::= <v> '+' <v> => { add($1, $3) }",
    ]);
    let first = registry.effective("Child").unwrap().to_json().unwrap();
    registry.invalidate();
    let second = registry.effective("Child").unwrap().to_json().unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Loader
// ============================================================================

#[test]
fn test_loader_supplies_missing_bases() {
    let loader = MemoryLoader::new()
        .with("Numbers", "Grammar: Numbers\nN := /[0-9]+/\n<num> ::= N")
        .with("Calc", "Grammar: Calc\nExtends Grammar: Numbers\n<sum> ::= <num> '+' <num>");
    let mut registry = GrammarRegistry::new().with_loader(loader);

    let effective = registry.effective("Calc").unwrap();
    assert_eq!(effective.hierarchy, vec!["Numbers", "Calc"]);
    assert!(registry.contains("Numbers"));
}

#[test]
fn test_loader_errors_propagate() {
    let mut registry = GrammarRegistry::new().with_loader(|name: &str| -> Result<Option<String>, GrammarError> {
        if name == "Broken" {
            Err(GrammarError::Syntax {
                line: 3,
                message: "unreadable".into(),
            })
        } else {
            Ok(None)
        }
    });
    assert!(matches!(
        registry.effective("Broken"),
        Err(GrammarError::Syntax { line: 3, .. })
    ));
    assert!(matches!(
        registry.effective("Absent"),
        Err(GrammarError::UnknownGrammar { .. })
    ));
}
