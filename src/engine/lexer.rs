//! Step Lexer - multi-path incremental tokenizer
//!
//! Every live [`LexerPath`] owns a cursor, an optional pending token and a
//! context stack. [`StepLexer::next_tokens`] advances each scanning path by
//! one token:
//!
//! 1. skip inter-token text with the splitter of the grammar active on the
//!    path
//! 2. at the end of finished input, produce the `$eof` token
//! 3. try the terminals the parser allows (or every eligible terminal) at
//!    the cursor and pick winners:
//!    - if any candidate has order importance set, only the highest
//!      priority survives
//!    - then the longest match wins
//!    - remaining ties split the path, one child per token
//!
//! A path whose candidates could still grow with more input waits instead
//! of committing to a token. A path nothing matches becomes blocked and is
//! dropped.
//!
//! Splitting retires the original path. Each child records it as parent and
//! owns a copy of its cursor, contexts and pending token.

use super::context::{ContextStack, GrammarSet};
use super::{IdCounter, LexerPathId, SourceBuffer, TerminalRef, Token};
use crate::error::ParseFailure;
use crate::grammar::{Matcher, TokenSplitter};
use crate::logging::{log_debug, log_trace};
use crate::regex_cache;
use crate::source_location::Span;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Lexer path state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexerStatus {
    /// Waiting to scan its next token
    Scanning,
    /// Holding a token the parser has not consumed yet
    TokenReady,
    /// No terminal matches at the cursor
    Blocked,
    /// Its parser path died
    Invalidated,
    /// End of input delivered and consumed
    Exhausted,
}

/// One tokenization branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerPath {
    /// Unique id
    pub id: LexerPathId,
    /// Path this one was split or forked from
    pub parent: Option<LexerPathId>,
    /// Byte offset of the next scan
    pub cursor: usize,
    /// Token produced but not yet consumed
    pub pending: Option<Token>,
    /// State
    pub status: LexerStatus,
    /// Contexts active on this path
    pub contexts: ContextStack,
}

/// A path that matched nothing in the last sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedPath {
    /// The dropped path
    pub id: LexerPathId,
    /// Cursor after splitter skipping
    pub position: usize,
    /// Terminals attempted there
    pub attempted: Vec<String>,
}

/// A path replaced by one child per ambiguous token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerSplit {
    /// Retired path
    pub parent: LexerPathId,
    /// Children in id order
    pub children: Vec<LexerPathId>,
}

/// Result of one [`StepLexer::next_tokens`] sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexerStep {
    /// Tokens produced, by path id
    pub tokens: Vec<(LexerPathId, Token)>,
    /// Paths that were split
    pub splits: Vec<LexerSplit>,
    /// Paths that matched nothing and were dropped
    pub blocked: Vec<BlockedPath>,
    /// Paths waiting for more input
    pub waiting: Vec<LexerPathId>,
}

impl LexerStep {
    /// Tokens grouped per path, ordered by path id
    pub fn grouped(&self) -> Vec<Vec<Token>> {
        let mut tokens = self.tokens.clone();
        tokens.sort_by_key(|(id, _)| *id);
        let mut groups: Vec<(LexerPathId, Vec<Token>)> = Vec::new();
        for (id, token) in tokens {
            match groups.last_mut() {
                Some((last, group)) if *last == id => group.push(token),
                _ => groups.push((id, vec![token])),
            }
        }
        groups.into_iter().map(|(_, group)| group).collect()
    }
}

/// Outcome of scanning one path
#[derive(Debug, Clone)]
enum Scan {
    Wait,
    Matched { tokens: Vec<Token> },
    Blocked { position: usize, attempted: Vec<String> },
}

/// A terminal that matched at the cursor
#[derive(Debug, Clone)]
struct Candidate {
    terminal: TerminalRef,
    len: usize,
    priority: i32,
    order_important: bool,
}

/// The multi-path lexer
#[derive(Debug, Clone)]
pub struct StepLexer {
    grammars: Arc<GrammarSet>,
    paths: Vec<LexerPath>,
    ids: IdCounter,
    fallback: bool,
}

impl StepLexer {
    /// Create a lexer with no paths
    ///
    /// With `fallback` set, a path whose allowed terminals all fail retries
    /// with every eligible terminal, so the parser sees the unexpected token.
    pub fn new(grammars: Arc<GrammarSet>, fallback: bool) -> Self {
        Self {
            grammars,
            paths: Vec::new(),
            ids: IdCounter::default(),
            fallback,
        }
    }

    /// Create a root path at offset 0
    pub fn spawn(&mut self, contexts: ContextStack) -> LexerPathId {
        let id = LexerPathId(self.ids.next());
        self.paths.push(LexerPath {
            id,
            parent: None,
            cursor: 0,
            pending: None,
            status: LexerStatus::Scanning,
            contexts,
        });
        id
    }

    /// Live paths, ordered by id
    #[inline]
    pub fn paths(&self) -> &[LexerPath] {
        &self.paths
    }

    /// Live path by id
    pub fn path(&self, id: LexerPathId) -> Option<&LexerPath> {
        self.index(id).map(|idx| &self.paths[idx])
    }

    fn index(&self, id: LexerPathId) -> Option<usize> {
        self.paths.binary_search_by_key(&id, |p| p.id).ok()
    }

    /// Advance every scanning path by one token
    ///
    /// `allowed` returns the terminals the owning parser path can accept,
    /// or `None` to attempt every eligible terminal.
    pub fn next_tokens<F>(&mut self, source: &SourceBuffer, allowed: F) -> LexerStep
    where
        F: Fn(LexerPathId) -> Option<Vec<TerminalRef>>,
    {
        let targets: Vec<(usize, Option<Vec<TerminalRef>>)> = self
            .paths
            .iter()
            .enumerate()
            .filter(|(_, p)| p.status == LexerStatus::Scanning)
            .map(|(idx, p)| (idx, allowed(p.id)))
            .collect();

        let grammars = &*self.grammars;
        let paths = &self.paths;
        let fallback = self.fallback;

        #[cfg(feature = "parallel")]
        let scans: Vec<Scan> = targets
            .par_iter()
            .map(|(idx, allow)| scan(&paths[*idx], source, grammars, allow.as_deref(), fallback))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let scans: Vec<Scan> = targets
            .iter()
            .map(|(idx, allow)| scan(&paths[*idx], source, grammars, allow.as_deref(), fallback))
            .collect();

        let mut step = LexerStep::default();
        let mut retired: Vec<usize> = Vec::new();
        let mut spawned: Vec<LexerPath> = Vec::new();

        for ((idx, _), outcome) in targets.into_iter().zip(scans) {
            let path = &mut self.paths[idx];
            match outcome {
                Scan::Wait => step.waiting.push(path.id),
                Scan::Blocked {
                    position,
                    attempted,
                } => {
                    log_trace!("{} blocked at {} (tried {:?})", path.id, position, attempted);
                    path.status = LexerStatus::Blocked;
                    step.blocked.push(BlockedPath {
                        id: path.id,
                        position,
                        attempted,
                    });
                    retired.push(idx);
                }
                Scan::Matched { mut tokens } if tokens.len() == 1 => {
                    let token = tokens.remove(0);
                    path.cursor = token.span.start;
                    path.pending = Some(token.clone());
                    path.status = LexerStatus::TokenReady;
                    step.tokens.push((path.id, token));
                }
                Scan::Matched { tokens } => {
                    let parent = path.id;
                    let mut children = Vec::with_capacity(tokens.len());
                    for token in tokens {
                        let id = LexerPathId(self.ids.next());
                        spawned.push(LexerPath {
                            id,
                            parent: Some(parent),
                            cursor: token.span.start,
                            pending: Some(token.clone()),
                            status: LexerStatus::TokenReady,
                            contexts: self.paths[idx].contexts.clone(),
                        });
                        step.tokens.push((id, token));
                        children.push(id);
                    }
                    log_debug!("{} split into {:?}", parent, children);
                    self.paths[idx].status = LexerStatus::Invalidated;
                    step.splits.push(LexerSplit { parent, children });
                    retired.push(idx);
                }
            }
        }

        retired.sort_unstable();
        for idx in retired.into_iter().rev() {
            self.paths.remove(idx);
        }
        // new ids are larger than every existing one
        self.paths.extend(spawned);
        step
    }

    /// Consume the pending token of `id`, moving the cursor past it
    pub fn accept_pending(&mut self, id: LexerPathId) -> Option<Token> {
        let idx = self.index(id)?;
        let path = &mut self.paths[idx];
        let token = path.pending.take()?;
        path.cursor = token.span.end;
        path.status = if token.is_eof() {
            LexerStatus::Exhausted
        } else {
            LexerStatus::Scanning
        };
        Some(token)
    }

    /// Mark `id` invalidated and drop it
    pub fn invalidate_lexer_path(&mut self, id: LexerPathId) -> bool {
        match self.index(id) {
            Some(idx) => {
                self.paths[idx].status = LexerStatus::Invalidated;
                self.paths.remove(idx);
                log_trace!("{} invalidated", id);
                true
            }
            None => false,
        }
    }

    /// Copy `id` into a new path parented to it
    pub fn fork(&mut self, id: LexerPathId) -> Option<LexerPathId> {
        let idx = self.index(id)?;
        let mut copy = self.paths[idx].clone();
        copy.id = LexerPathId(self.ids.next());
        copy.parent = Some(id);
        let new_id = copy.id;
        self.paths.push(copy);
        Some(new_id)
    }

    /// Replace the context stack of `id`
    pub fn set_contexts(&mut self, id: LexerPathId, contexts: ContextStack) {
        if let Some(idx) = self.index(id) {
            self.paths[idx].contexts = contexts;
        }
    }

    /// Whether two paths are structurally equal (cursor, contexts, pending)
    pub fn converges(&self, a: LexerPathId, b: LexerPathId) -> bool {
        match (self.path(a), self.path(b)) {
            (Some(a), Some(b)) => {
                a.cursor == b.cursor
                    && a.contexts == b.contexts
                    && a.pending == b.pending
                    && a.status == b.status
            }
            _ => false,
        }
    }

    /// Merge two converged paths, keeping the lower id
    ///
    /// Returns the surviving id, or `None` if the paths differ.
    pub fn merge(&mut self, a: LexerPathId, b: LexerPathId) -> Option<LexerPathId> {
        if a == b || !self.converges(a, b) {
            return None;
        }
        let (keep, drop) = if a < b { (a, b) } else { (b, a) };
        if let Some(idx) = self.index(drop) {
            self.paths.remove(idx);
        }
        log_debug!("{} merged into {}", drop, keep);
        Some(keep)
    }
}

// =============================================================================
// Scanning
// =============================================================================

/// Scan one path; pure, so paths can be scanned on any thread
fn scan(
    path: &LexerPath,
    source: &SourceBuffer,
    grammars: &GrammarSet,
    allowed: Option<&[TerminalRef]>,
    fallback: bool,
) -> Scan {
    let text = source.text();
    let slot = grammars.active_slot(&path.contexts);

    let Some(cursor) = skip_splitter(&grammars.get(slot).token_splitter, source, path.cursor) else {
        return Scan::Wait;
    };
    if cursor >= text.len() {
        return if source.is_complete() {
            Scan::Matched {
                tokens: vec![Token::eof(text.len())],
            }
        } else {
            Scan::Wait
        };
    }

    let eligible = || eligible_terminals(grammars, slot, &path.contexts);
    let primary: Vec<TerminalRef> = match allowed {
        Some(list) => list.iter().filter(|t| !t.is_eof()).cloned().collect(),
        None => eligible(),
    };

    let mut attempted: Vec<String> = primary.iter().map(|t| t.name.clone()).collect();
    let mut candidates = match match_candidates(&primary, grammars, source, cursor) {
        Some(c) => c,
        None => return Scan::Wait,
    };

    if candidates.is_empty() && fallback && allowed.is_some() {
        let rest: Vec<TerminalRef> = eligible()
            .into_iter()
            .filter(|t| !primary.contains(t))
            .collect();
        attempted.extend(rest.iter().map(|t| t.name.clone()));
        candidates = match match_candidates(&rest, grammars, source, cursor) {
            Some(c) => c,
            None => return Scan::Wait,
        };
    }

    if candidates.is_empty() {
        attempted.sort();
        attempted.dedup();
        return Scan::Blocked {
            position: cursor,
            attempted,
        };
    }

    let winners = select_winners(candidates);
    let tokens = winners
        .into_iter()
        .map(|c| Token {
            span: Span::new(cursor, cursor + c.len),
            text: text[cursor..cursor + c.len].to_string(),
            terminal: c.terminal,
        })
        .collect();
    Scan::Matched { tokens }
}

/// Cursor after inter-token text, or `None` if the skipped run touches the
/// end of unfinished input and might continue
fn skip_splitter(splitter: &TokenSplitter, source: &SourceBuffer, cursor: usize) -> Option<usize> {
    let text = source.text();
    let mut pos = cursor.min(text.len());
    match splitter {
        TokenSplitter::None => {}
        TokenSplitter::Whitespace => {
            let rest = &text[pos..];
            pos += rest.len() - rest.trim_start().len();
        }
        TokenSplitter::Regex(pattern) => {
            while let Some(len) = regex_cache::match_len(pattern, &text[pos..]) {
                if len == 0 {
                    break;
                }
                pos += len;
            }
        }
    }
    if pos > cursor && pos == text.len() && !source.is_complete() {
        return None;
    }
    Some(pos)
}

/// Terminals of `slot` whose context gate is open on `contexts`
fn eligible_terminals(grammars: &GrammarSet, slot: usize, contexts: &ContextStack) -> Vec<TerminalRef> {
    grammars
        .get(slot)
        .terminals
        .iter()
        .filter(|t| contexts.allows(t.context.as_deref()))
        .map(|t| TerminalRef::new(slot, t.name.as_str()))
        .collect()
}

/// Non-empty matches at `cursor`, or `None` if any terminal could still
/// match differently once more input arrives
fn match_candidates(
    terminals: &[TerminalRef],
    grammars: &GrammarSet,
    source: &SourceBuffer,
    cursor: usize,
) -> Option<Vec<Candidate>> {
    let rest = &source.text()[cursor..];
    let open = !source.is_complete();
    let mut out = Vec::new();
    for terminal in terminals {
        let Some(def) = grammars.get(terminal.slot).terminal(&terminal.name) else {
            continue;
        };
        let len = match &def.matcher {
            Matcher::Literal(lit) => {
                if open && lit.len() > rest.len() && lit.starts_with(rest) {
                    return None;
                }
                rest.starts_with(lit.as_str()).then_some(lit.len())
            }
            Matcher::Regex(pattern) => regex_cache::match_len(pattern, rest),
        };
        let Some(len) = len.filter(|&l| l > 0) else {
            continue;
        };
        if open && len == rest.len() {
            return None;
        }
        out.push(Candidate {
            terminal: terminal.clone(),
            len,
            priority: def.priority,
            order_important: def.order_important,
        });
    }
    Some(out)
}

/// Priority first (when any candidate declares order importance), then
/// longest match; whatever is left is a true tie
fn select_winners(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    if candidates.iter().any(|c| c.order_important) {
        let top = candidates.iter().map(|c| c.priority).max().unwrap_or(0);
        candidates.retain(|c| c.priority == top);
    }
    let longest = candidates.iter().map(|c| c.len).max().unwrap_or(0);
    candidates.retain(|c| c.len == longest);
    candidates.sort_by(|a, b| a.terminal.cmp(&b.terminal));
    candidates
}

/// Tokenize `text` without a parser, following every ambiguity
///
/// Returns one token stream per surviving path, ordered by path id. Each
/// stream ends with the `$eof` token.
pub fn tokenize(
    grammars: Arc<GrammarSet>,
    text: &str,
    max_paths: usize,
) -> Result<Vec<Vec<Token>>, ParseFailure> {
    let source = SourceBuffer::complete(text);
    let mut lexer = StepLexer::new(grammars, false);
    let root = lexer.spawn(ContextStack::new());
    let mut streams: Vec<(LexerPathId, Vec<Token>)> = vec![(root, Vec::new())];
    let mut dropped = 0;
    let mut furthest: Option<(usize, Vec<String>)> = None;

    while lexer.paths().iter().any(|p| p.status == LexerStatus::Scanning) {
        let step = lexer.next_tokens(&source, |_| None);

        for blocked in &step.blocked {
            streams.retain(|(id, _)| *id != blocked.id);
            if furthest.as_ref().map_or(true, |(pos, _)| blocked.position > *pos) {
                furthest = Some((blocked.position, blocked.attempted.clone()));
            }
        }
        for split in &step.splits {
            if let Some(idx) = streams.iter().position(|(id, _)| *id == split.parent) {
                let (_, prefix) = streams.remove(idx);
                for child in &split.children {
                    streams.push((*child, prefix.clone()));
                }
            }
        }
        for (id, _) in &step.tokens {
            if let (Some(token), Some(stream)) = (
                lexer.accept_pending(*id),
                streams.iter_mut().find(|(sid, _)| sid == id),
            ) {
                stream.1.push(token);
            }
        }

        if lexer.paths().len() > max_paths {
            let excess: Vec<LexerPathId> = lexer.paths()[..lexer.paths().len() - max_paths]
                .iter()
                .map(|p| p.id)
                .collect();
            for id in excess {
                lexer.invalidate_lexer_path(id);
                streams.retain(|(sid, _)| *sid != id);
                dropped += 1;
            }
        }
    }

    if streams.is_empty() {
        if dropped > 0 {
            return Err(ParseFailure::AmbiguityExhaustion { max_paths, dropped });
        }
        let (position, attempted) = furthest.unwrap_or_default();
        return Err(ParseFailure::Lexical {
            position,
            attempted,
        });
    }
    streams.sort_by_key(|(id, _)| *id);
    Ok(streams.into_iter().map(|(_, s)| s).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarRegistry;

    fn set(text: &str) -> Arc<GrammarSet> {
        let mut registry = GrammarRegistry::new();
        let name = registry.register_text(text).unwrap();
        Arc::new(GrammarSet::resolve(&mut registry, &name).unwrap())
    }

    const KEYWORDS: &str = "Grammar: K\nTokenSplitter: whitespace\nID := /[a-z]+/\nKEYWORD := 'if'\n<s> ::= ID | KEYWORD";

    #[test]
    fn test_true_tie_splits_with_parent_links() {
        let mut lexer = StepLexer::new(set(KEYWORDS), true);
        let root = lexer.spawn(ContextStack::new());
        let step = lexer.next_tokens(&SourceBuffer::complete("if"), |_| None);

        assert_eq!(step.splits.len(), 1);
        assert_eq!(step.splits[0].parent, root);
        assert_eq!(lexer.paths().len(), 2);
        for path in lexer.paths() {
            assert_eq!(path.parent, Some(root));
            assert_eq!(path.status, LexerStatus::TokenReady);
        }
        let names: Vec<&str> = step.tokens.iter().map(|(_, t)| t.terminal.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "KEYWORD"]);
        assert_eq!(step.grouped().len(), 2);
    }

    #[test]
    fn test_priority_wins_outright() {
        let grammar = KEYWORDS.replace("KEYWORD := 'if'", "KEYWORD := 'if' @priority(10)");
        let mut lexer = StepLexer::new(set(&grammar), true);
        lexer.spawn(ContextStack::new());
        let step = lexer.next_tokens(&SourceBuffer::complete("if"), |_| None);
        assert!(step.splits.is_empty());
        assert_eq!(step.tokens.len(), 1);
        assert_eq!(step.tokens[0].1.terminal.name, "KEYWORD");
    }

    #[test]
    fn test_longest_match_wins_without_priority() {
        let mut lexer = StepLexer::new(set(KEYWORDS), true);
        lexer.spawn(ContextStack::new());
        let step = lexer.next_tokens(&SourceBuffer::complete("iffy"), |_| None);
        assert_eq!(step.tokens.len(), 1);
        assert_eq!(step.tokens[0].1.text, "iffy");
    }

    #[test]
    fn test_splitter_then_eof() {
        let mut lexer = StepLexer::new(set(KEYWORDS), true);
        let id = lexer.spawn(ContextStack::new());
        let source = SourceBuffer::complete("  abc  ");
        let step = lexer.next_tokens(&source, |_| None);
        assert_eq!(step.tokens[0].1.span, Span::new(2, 5));
        lexer.accept_pending(id);

        let step = lexer.next_tokens(&source, |_| None);
        assert!(step.tokens[0].1.is_eof());
        assert_eq!(step.tokens[0].1.span, Span::empty(7));
        lexer.accept_pending(id);
        assert_eq!(lexer.path(id).map(|p| p.status), Some(LexerStatus::Exhausted));
    }

    #[test]
    fn test_waits_on_unfinished_input() {
        let mut lexer = StepLexer::new(set(KEYWORDS), true);
        let id = lexer.spawn(ContextStack::new());
        let mut source = SourceBuffer::new();
        source.push("ab");
        let step = lexer.next_tokens(&source, |_| None);
        assert_eq!(step.waiting, vec![id]);
        assert!(step.tokens.is_empty());

        source.push("c d");
        let step = lexer.next_tokens(&source, |_| None);
        assert_eq!(step.tokens[0].1.text, "abc");
    }

    #[test]
    fn test_allowed_set_and_fallback() {
        let grammars = set(KEYWORDS);
        let only_keyword = vec![TerminalRef::new(0, "KEYWORD")];

        let mut lexer = StepLexer::new(Arc::clone(&grammars), true);
        lexer.spawn(ContextStack::new());
        let step = lexer.next_tokens(&SourceBuffer::complete("xyz"), |_| Some(only_keyword.clone()));
        assert_eq!(step.tokens[0].1.terminal.name, "ID");

        let mut strict = StepLexer::new(grammars, false);
        strict.spawn(ContextStack::new());
        let step = strict.next_tokens(&SourceBuffer::complete("xyz"), |_| Some(only_keyword.clone()));
        assert_eq!(step.blocked.len(), 1);
        assert_eq!(step.blocked[0].attempted, vec!["KEYWORD"]);
        assert!(strict.paths().is_empty());
    }

    #[test]
    fn test_context_gated_terminal() {
        let grammars = set("Grammar: G\nSELECT (sql) := 'SELECT'\nW := /[A-Z]+/\n<s> ::= W | SELECT");
        let mut lexer = StepLexer::new(Arc::clone(&grammars), true);
        lexer.spawn(ContextStack::new());
        let step = lexer.next_tokens(&SourceBuffer::complete("SELECT"), |_| None);
        assert_eq!(step.tokens.len(), 1);
        assert_eq!(step.tokens[0].1.terminal.name, "W");

        let mut sql = ContextStack::new();
        sql.push("sql");
        let mut lexer = StepLexer::new(grammars, true);
        lexer.spawn(sql);
        let step = lexer.next_tokens(&SourceBuffer::complete("SELECT"), |_| None);
        assert_eq!(step.splits.len(), 1);
    }

    #[test]
    fn test_fork_converge_merge() {
        let mut lexer = StepLexer::new(set(KEYWORDS), true);
        let a = lexer.spawn(ContextStack::new());
        let b = lexer.fork(a).unwrap();
        assert_eq!(lexer.path(b).and_then(|p| p.parent), Some(a));
        assert!(lexer.converges(a, b));
        assert_eq!(lexer.merge(b, a), Some(a));
        assert_eq!(lexer.paths().len(), 1);

        let c = lexer.fork(a).unwrap();
        let mut ctx = ContextStack::new();
        ctx.push("x");
        lexer.set_contexts(c, ctx);
        assert!(!lexer.converges(a, c));
        assert_eq!(lexer.merge(a, c), None);
    }

    #[test]
    fn test_tokenize_follows_ambiguity() {
        let streams = tokenize(set(KEYWORDS), "if x", 16).unwrap();
        assert_eq!(streams.len(), 2);
        let first: Vec<&str> = streams[0].iter().map(|t| t.terminal.name.as_str()).collect();
        assert_eq!(first, vec!["ID", "ID", "$eof"]);
        let second: Vec<&str> = streams[1].iter().map(|t| t.terminal.name.as_str()).collect();
        assert_eq!(second, vec!["KEYWORD", "ID", "$eof"]);
    }

    #[test]
    fn test_tokenize_lexical_error() {
        let err = tokenize(set(KEYWORDS), "ab 42", 16).unwrap_err();
        assert!(matches!(err, ParseFailure::Lexical { position: 3, .. }));
    }
}
