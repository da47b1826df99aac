//! Integration tests for the step lexer
//!
//! These tests cover ambiguous token splits, priority, per-grammar token
//! splitters and the standalone tokenizer.

use gramstep::engine::lexer::BlockedPath;
use gramstep::engine::{
    tokenize, ContextStack, GrammarSet, LexerPathId, LexerStatus, SourceBuffer, StepLexer,
};
use gramstep::grammar::GrammarRegistry;
use gramstep::source_location::Span;
use gramstep::ParseFailure;
use std::sync::Arc;

fn grammars(texts: &[&str], root: &str) -> Arc<GrammarSet> {
    let mut registry = GrammarRegistry::new();
    for text in texts {
        registry.register_text(text).unwrap();
    }
    Arc::new(GrammarSet::resolve(&mut registry, root).unwrap())
}

const KEYWORDS: &str = "Grammar: K\nTokenSplitter: whitespace\nID := /[a-z]+/\nKEYWORD := 'if'\n<s> ::= ID | KEYWORD";

// ============================================================================
// Ambiguity
// ============================================================================

#[test]
fn test_ambiguous_pair_spawns_two_traceable_paths() {
    let mut lexer = StepLexer::new(grammars(&[KEYWORDS], "K"), true);
    let root = lexer.spawn(ContextStack::new());
    let step = lexer.next_tokens(&SourceBuffer::complete("if"), |_| None);

    assert_eq!(lexer.paths().len(), 2);
    assert!(lexer.paths().iter().all(|p| p.parent == Some(root)));
    assert!(lexer.path(root).is_none());

    let ids: Vec<LexerPathId> = lexer.paths().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![LexerPathId(1), LexerPathId(2)]);
    assert_eq!(step.splits[0].children, ids);
}

#[test]
fn test_priority_prevents_split() {
    let grammar = KEYWORDS.replace("'if'", "'if' @priority(5) @ordered");
    let mut lexer = StepLexer::new(grammars(&[&grammar], "K"), true);
    lexer.spawn(ContextStack::new());
    let step = lexer.next_tokens(&SourceBuffer::complete("if"), |_| None);

    assert_eq!(lexer.paths().len(), 1);
    assert_eq!(step.tokens[0].1.terminal.name, "KEYWORD");
}

#[test]
fn test_split_children_own_their_state() {
    let mut lexer = StepLexer::new(grammars(&[KEYWORDS], "K"), true);
    lexer.spawn(ContextStack::new());
    let source = SourceBuffer::complete("if x");
    lexer.next_tokens(&source, |_| None);

    let first = lexer.paths()[0].id;
    let second = lexer.paths()[1].id;
    lexer.accept_pending(first);
    let mut ctx = ContextStack::new();
    ctx.push("only-first");
    lexer.set_contexts(first, ctx);

    let second_path = lexer.path(second).unwrap();
    assert_eq!(second_path.status, LexerStatus::TokenReady);
    assert_eq!(second_path.cursor, 0);
    assert!(second_path.contexts.is_empty());
    assert_eq!(lexer.path(first).unwrap().cursor, 2);
}

#[test]
fn test_invalidate_releases_path() {
    let mut lexer = StepLexer::new(grammars(&[KEYWORDS], "K"), true);
    lexer.spawn(ContextStack::new());
    lexer.next_tokens(&SourceBuffer::complete("if"), |_| None);
    let doomed = lexer.paths()[1].id;

    assert!(lexer.invalidate_lexer_path(doomed));
    assert!(!lexer.invalidate_lexer_path(doomed));
    assert_eq!(lexer.paths().len(), 1);
}

// ============================================================================
// Splitters and Embedded Grammars
// ============================================================================

#[test]
fn test_splitter_follows_active_grammar() {
    let set = grammars(
        &[
            "Grammar: Sql\nTokenSplitter: /_+/\nSELECT := 'SELECT'\n<select> ::= SELECT",
            "Grammar: Host\nEmbed: sql => Sql\n<s> ::= 'q' Context(sql, on) <select> Context(sql, off)",
        ],
        "Host",
    );
    let source = SourceBuffer::complete("__SELECT");

    let mut host = StepLexer::new(Arc::clone(&set), true);
    host.spawn(ContextStack::new());
    let step = host.next_tokens(&source, |_| None);
    assert_eq!(
        step.blocked,
        vec![BlockedPath {
            id: LexerPathId(0),
            position: 0,
            attempted: vec!["'q'".to_string()],
        }]
    );

    let mut embedded = StepLexer::new(set, true);
    let mut ctx = ContextStack::new();
    ctx.push("sql");
    embedded.spawn(ctx);
    let step = embedded.next_tokens(&source, |_| None);
    let token = &step.tokens[0].1;
    assert_eq!(token.terminal.slot, 1);
    assert_eq!(token.span, Span::new(2, 8));
}

#[test]
fn test_regex_splitter_skips_comments() {
    let set = grammars(
        &["Grammar: C\nTokenSplitter: /\\s+|#[^\\n]*/\nN := /[0-9]+/\n<s> ::= N N"],
        "C",
    );
    let streams = tokenize(set, "1 # one\n 2", 4).unwrap();
    let texts: Vec<&str> = streams[0].iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["1", "2", ""]);
}

// ============================================================================
// Tokenizer
// ============================================================================

#[test]
fn test_tokenize_is_deterministic() {
    let set = grammars(&[KEYWORDS], "K");
    let a = tokenize(Arc::clone(&set), "if if", 16).unwrap();
    let b = tokenize(set, "if if", 16).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 4);
}

#[test]
fn test_tokenize_respects_path_ceiling() {
    let set = grammars(&[KEYWORDS], "K");
    let streams = tokenize(set, "if if if if", 2).unwrap();
    assert_eq!(streams.len(), 2);
    assert!(streams.iter().all(|s| s.len() == 5));
}

#[test]
fn test_tokenize_lexical_failure_reports_furthest_position() {
    let set = grammars(&[KEYWORDS], "K");
    match tokenize(set, "if if 9", 16) {
        Err(ParseFailure::Lexical { position, attempted }) => {
            assert_eq!(position, 6);
            assert_eq!(attempted, vec!["ID", "KEYWORD"]);
        }
        other => panic!("unexpected result {:?}", other),
    }
}
