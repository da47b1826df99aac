//! End-to-end parsing tests
//!
//! These tests drive whole sessions through the public API: plain parses,
//! ambiguity, contexts and embedded grammars, incremental input and the
//! reported failures.

use gramstep::engine::{NamedSource, ParseSession, StepOutcome};
use gramstep::prelude::*;
use gramstep::ProductionMatch;

const CALC: &str = "Grammar: Calc\nTokenSplitter: whitespace\nNUMBER := /[0-9]+/\n<expr> ::= NUMBER '+' NUMBER | NUMBER '-' NUMBER";

const ARITH: &str = "Grammar: Arith\nN := /[0-9]+/\n<e> ::= <e> '+' <e> | <e> '*' <e> | N\nPrecedence: left '+'\nPrecedence: left '*'";

const SQL: &str = "Grammar: Sql\nTokenSplitter: whitespace\nSELECT := 'SELECT'\nN := /[0-9]+/\n<select> ::= SELECT N";

const HOST: &str = "Grammar: Host\nTokenSplitter: whitespace\nEmbed: sql => Sql\n<s> ::= 'q' Context(sql, on) <select> Context(sql, off)";

fn load(texts: &[&str]) -> GrammarRegistry {
    let mut registry = GrammarRegistry::new();
    for text in texts {
        registry.register_text(text).unwrap();
    }
    registry
}

fn binary_spans(matches: &[ProductionMatch]) -> Vec<Span> {
    matches
        .iter()
        .filter(|m| m.children.len() == 3)
        .map(|m| m.span)
        .collect()
}

// ============================================================================
// Plain Parses
// ============================================================================

#[test]
fn test_unambiguous_parse_uses_one_path() {
    let mut registry = load(&[CALC]);
    let mut session =
        ParseSession::from_registry(&mut registry, "Calc", SessionConfig::default()).unwrap();
    session.feed("3+4");
    match session.run().unwrap() {
        ParseOutcome::Matched(matches) => {
            assert_eq!(matches.len(), 1);
            assert_eq!(matches[0].name, "expr");
            assert_eq!(matches[0].span, Span::new(0, 3));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(session.parser().paths().len(), 1);
}

#[test]
fn test_left_recursive_list() {
    let mut registry = load(&["Grammar: L\nN := /[0-9]+/\n<list> ::= <list> ',' N | N"]);
    match parse(&mut registry, "L", "1,2,3").unwrap() {
        ParseOutcome::Matched(matches) => {
            let spans: Vec<Span> = matches
                .iter()
                .filter(|m| m.name == "list")
                .map(|m| m.span)
                .collect();
            assert_eq!(spans, vec![Span::new(0, 1), Span::new(0, 3), Span::new(0, 5)]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_named_source() {
    let mut registry = load(&[CALC]);
    let source = NamedSource::new("calc.txt", "10 - 4");
    assert!(matches!(
        parse(&mut registry, "Calc", &source),
        Ok(ParseOutcome::Matched(_))
    ));
}

// ============================================================================
// Ambiguity
// ============================================================================

#[test]
fn test_token_ambiguity_surfaces_both_derivations() {
    let mut registry = load(&[
        "Grammar: K\nID := /[a-z]+/\nKEYWORD := 'if'\n<stmt> ::= ID | KEYWORD",
    ]);
    match parse(&mut registry, "K", "if").unwrap() {
        ParseOutcome::Ambiguous(parses) => {
            assert_eq!(parses.len(), 2);
            assert!(parses.iter().all(|p| p.last().map(|m| m.span) == Some(Span::new(0, 2))));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_lexer_split_paths_rejoin() {
    let mut registry = load(&[
        "Grammar: K\nTokenSplitter: whitespace\nID := /[a-z]+/\nKEYWORD := 'if'\n<s> ::= <word> ';'\n<word> ::= ID | KEYWORD",
    ]);
    let mut session =
        ParseSession::from_registry(&mut registry, "K", SessionConfig::default()).unwrap();
    session.feed("if ;");
    session.finish();

    assert_eq!(session.step(), StepOutcome::Progress);
    assert_eq!(session.live_paths().len(), 2);
    assert_eq!(session.lexer().paths().len(), 2);

    match session.run().unwrap() {
        ParseOutcome::Ambiguous(parses) => assert_eq!(parses.len(), 2),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(session.parser().paths().len(), 1);
}

#[test]
fn test_precedence_picks_one_tree() {
    let mut registry = load(&[ARITH]);
    match parse(&mut registry, "Arith", "1+2*3").unwrap() {
        ParseOutcome::Matched(matches) => {
            assert_eq!(binary_spans(&matches), vec![Span::new(2, 5), Span::new(0, 5)]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_precedence_across_operator_chain() {
    let mut registry = load(&[ARITH]);
    match parse(&mut registry, "Arith", "1+2*3+4").unwrap() {
        ParseOutcome::Matched(matches) => {
            assert_eq!(
                binary_spans(&matches),
                vec![Span::new(2, 5), Span::new(0, 5), Span::new(0, 7)]
            );
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_precedence_groups_both_products() {
    let mut registry = load(&[ARITH]);
    match parse(&mut registry, "Arith", "1*2+3*4").unwrap() {
        ParseOutcome::Matched(matches) => {
            assert_eq!(
                binary_spans(&matches),
                vec![Span::new(0, 3), Span::new(4, 7), Span::new(0, 7)]
            );
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_disabled_precedence_keeps_both_trees() {
    let mut registry = load(&[ARITH]);
    let config = SessionConfig::default().with_apply_precedence(false);
    let outcome = parse_with_config(&mut registry, "Arith", "1+2*3", config).unwrap();
    assert_eq!(outcome.derivations().len(), 2);
}

#[test]
fn test_first_match_returns_single_derivation() {
    let mut registry = load(&["Grammar: G\nN := /[0-9]+/\n<e> ::= <e> '+' <e> | N"]);
    let config = SessionConfig::default().with_first_match(true);
    let outcome = parse_with_config(&mut registry, "G", "1+2+3", config).unwrap();
    assert!(!outcome.is_ambiguous());
}

#[test]
fn test_parse_is_deterministic() {
    let mut registry = load(&["Grammar: G\nN := /[0-9]+/\n<e> ::= <e> '+' <e> | N"]);
    let first = parse(&mut registry, "G", "1+2+3+4").unwrap();
    let second = parse(&mut registry, "G", "1+2+3+4").unwrap();
    assert_eq!(first, second);
    assert!(first.is_ambiguous());
}

// ============================================================================
// Contexts and Embedded Grammars
// ============================================================================

#[test]
fn test_embedded_grammar_is_entered_by_context() {
    let mut registry = load(&[SQL, HOST]);
    match parse(&mut registry, "Host", "q SELECT 1").unwrap() {
        ParseOutcome::Matched(matches) => {
            let owners: Vec<(&str, &str)> = matches
                .iter()
                .map(|m| (m.name.as_str(), m.grammar.as_str()))
                .collect();
            assert_eq!(owners, vec![("select", "Sql"), ("s", "Host")]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_context_alternative_beside_plain_one() {
    let host = "Grammar: Host\nEmbed: sql => Sql\n<s> ::= 'q' Context(sql, on) <select> Context(sql, off) | 'q' 'x'";
    let mut registry = load(&[SQL, host]);
    let mut session =
        ParseSession::from_registry(&mut registry, "Host", SessionConfig::default()).unwrap();
    session.feed("q SELECT 1");
    session.finish();

    assert_eq!(session.step(), StepOutcome::Progress);
    let live = session.live_paths();
    assert_eq!(live.len(), 2);
    let mut contexts: Vec<Vec<String>> = live
        .iter()
        .map(|&id| session.parser().get_active_contexts(id))
        .collect();
    contexts.sort();
    assert_eq!(contexts, vec![Vec::<String>::new(), vec!["sql".to_string()]]);

    match session.run().unwrap() {
        ParseOutcome::Matched(matches) => {
            let owners: Vec<(&str, &str)> = matches
                .iter()
                .map(|m| (m.name.as_str(), m.grammar.as_str()))
                .collect();
            assert_eq!(owners, vec![("select", "Sql"), ("s", "Host")]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_embedded_terminals_unreachable_without_context() {
    let mut registry = load(&[SQL, HOST]);
    match parse(&mut registry, "Host", "SELECT 1") {
        Err(Error::Parse(ParseFailure::Lexical { position, attempted })) => {
            assert_eq!(position, 0);
            assert_eq!(attempted, vec!["'q'"]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

// ============================================================================
// Incremental Input
// ============================================================================

#[test]
fn test_char_by_char_feed_matches_one_shot() {
    let text = "12 + 345";
    let mut registry = load(&[CALC]);
    let expected = parse(&mut registry, "Calc", text).unwrap();

    let mut session =
        ParseSession::from_registry(&mut registry, "Calc", SessionConfig::default()).unwrap();
    for ch in text.chars() {
        session.feed(&ch.to_string());
        assert_eq!(session.run_available(), StepOutcome::NeedInput);
    }
    assert_eq!(session.run().unwrap(), expected);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_syntax_error_renders_with_caret() {
    let mut registry = load(&[CALC]);
    let failure = match parse(&mut registry, "Calc", "3 + + 4") {
        Err(Error::Parse(failure)) => failure,
        other => panic!("unexpected outcome {:?}", other),
    };
    match &failure {
        ParseFailure::Syntax {
            position,
            found,
            expected,
            ..
        } => {
            assert_eq!(*position, 4);
            assert_eq!(found.as_deref(), Some("'+'"));
            assert_eq!(expected, &vec!["NUMBER".to_string()]);
        }
        other => panic!("unexpected failure {:?}", other),
    }
    let rendered = failure.format_with_source("3 + + 4");
    assert!(rendered.contains("line 1, column 5"));
    assert!(rendered.ends_with("3 + + 4\n    ^\n"));
}

#[test]
fn test_path_ceiling_reports_exhaustion() {
    let mut registry = load(&["Grammar: G\nN := /[0-9]+/\n<e> ::= <e> '+' <e> | N"]);
    let config = SessionConfig::default().with_max_paths(1);
    assert!(matches!(
        parse_with_config(&mut registry, "G", "1+2+3+", config),
        Err(Error::Parse(ParseFailure::AmbiguityExhaustion { max_paths: 1, .. }))
    ));
}

#[test]
fn test_path_ceiling_on_valid_input_still_parses() {
    let mut registry = load(&["Grammar: G\nN := /[0-9]+/\n<e> ::= <e> '+' <e> | N"]);
    let config = SessionConfig::default().with_max_paths(1);
    let outcome = parse_with_config(&mut registry, "G", "1+2+3+4", config).unwrap();
    assert!(!outcome.is_ambiguous());
}

#[test]
fn test_cyclic_hierarchy_fails_before_parsing() {
    let mut registry = load(&[
        "Grammar: A\nExtends Grammar: B\n<a> ::= 'a'",
        "Grammar: B\nExtends Grammar: A\n<b> ::= 'b'",
    ]);
    assert!(matches!(
        parse(&mut registry, "A", "a"),
        Err(Error::Grammar(GrammarError::CyclicDependency { .. }))
    ));
}
