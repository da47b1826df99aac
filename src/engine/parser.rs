//! Step Parser - multi-path, GLR-style
//!
//! Each [`ParserPath`] is bound to exactly one lexer path and holds a
//! frontier of [`Continuation`]s. On every token:
//!
//! - no satisfying member: the path is dead, its lexer path invalidated and
//!   a [`DeadPathReport`] kept for the final error
//! - one satisfying member: the path advances in place
//! - several satisfying members (after the precedence filter): members
//!   that completed the same productions advance together on one path;
//!   members whose pending matches differ split the path, one child per
//!   group, each child parented to the old path
//! - advanced members whose context stacks differ split as well, so every
//!   path has exactly one context stack and its lexer path follows it
//!
//! Productions a member completed are committed to the path's history only
//! once the member is chosen by the next token, so abandoned members never
//! leave matches behind.
//!
//! After each sweep, paths with equal frontier, contexts and converging
//! lexer paths merge into the lower id. Their histories are unioned, so
//! distinct derivations survive the merge and surface as ambiguity.

use super::context::{ContextStack, GrammarSet};
use super::disambiguation::filter_by_precedence;
use super::frontier::{valid_terminals, Continuation, FrontierBuilder, PendingMatch};
use super::lexer::{LexerStep, StepLexer};
use super::session::{ParseOutcome, SessionConfig};
use super::{IdCounter, LexerPathId, ParserPathId, TerminalRef, Token};
use crate::error::{DeadPathReport, ParseFailure};
use crate::grammar::{ActionRef, ContextDirective};
use crate::logging::{log_debug, log_trace, log_warn};
use crate::source_location::Span;
use ahash::AHasher;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Parser path state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserStatus {
    /// Still consuming tokens
    Active,
    /// Consumed end of input
    Accepted,
    /// No frontier member accepted a token
    Dead,
}

/// A completed production, as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductionMatch {
    /// Rule name
    pub name: String,
    /// Grammar the production came from
    pub grammar: String,
    /// Production index in that grammar's effective productions
    pub production: usize,
    /// Covered input
    pub span: Span,
    /// Spans of the consuming parts
    pub children: Vec<Span>,
    /// Path that recorded the match
    pub path: ParserPathId,
    /// Action bound to the production
    pub action: Option<ActionRef>,
}

impl ProductionMatch {
    /// Equal apart from the recording path
    pub fn same_derivation(&self, other: &ProductionMatch) -> bool {
        self.production == other.production
            && self.span == other.span
            && self.children == other.children
            && self.name == other.name
            && self.grammar == other.grammar
    }
}

// =============================================================================
// History
// =============================================================================

#[derive(Debug)]
struct HistoryNode {
    entry: ProductionMatch,
    prev: Option<Arc<HistoryNode>>,
}

impl Drop for HistoryNode {
    // unlink iteratively; long histories would overflow the stack otherwise
    fn drop(&mut self) {
        let mut next = self.prev.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.prev.take(),
                Err(_) => break,
            }
        }
    }
}

/// Persistent list of production matches
///
/// Split paths share the prefix recorded before the split; pushing never
/// copies it.
#[derive(Debug, Clone, Default)]
pub struct History {
    head: Option<Arc<HistoryNode>>,
    len: usize,
}

impl History {
    /// Empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// This history with `entry` appended
    pub fn push(&self, entry: ProductionMatch) -> Self {
        Self {
            head: Some(Arc::new(HistoryNode {
                entry,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Number of matches
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no match is recorded
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recent match
    pub fn last(&self) -> Option<&ProductionMatch> {
        self.head.as_deref().map(|n| &n.entry)
    }

    /// Matches, newest first
    pub fn iter(&self) -> HistoryIter<'_> {
        HistoryIter {
            next: self.head.as_deref(),
        }
    }

    /// Matches, oldest first
    pub fn to_vec(&self) -> Vec<ProductionMatch> {
        let mut out: Vec<ProductionMatch> = self.iter().cloned().collect();
        out.reverse();
        out
    }

    /// Whether both record the same derivation, ignoring path ids
    pub fn same_derivation(&self, other: &History) -> bool {
        if self.len != other.len {
            return false;
        }
        if let (Some(a), Some(b)) = (&self.head, &other.head) {
            if Arc::ptr_eq(a, b) {
                return true;
            }
        }
        self.iter().zip(other.iter()).all(|(a, b)| a.same_derivation(b))
    }
}

/// Iterator over a [`History`], newest first
#[derive(Debug, Clone)]
pub struct HistoryIter<'a> {
    next: Option<&'a HistoryNode>,
}

impl<'a> Iterator for HistoryIter<'a> {
    type Item = &'a ProductionMatch;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.prev.as_deref();
        Some(&node.entry)
    }
}

// =============================================================================
// Paths
// =============================================================================

/// One parsing branch
#[derive(Debug, Clone)]
pub struct ParserPath {
    /// Unique id
    pub id: ParserPathId,
    /// Path this one split from
    pub parent: Option<ParserPathId>,
    /// The lexer path feeding this one
    pub lexer: LexerPathId,
    /// Members waiting for the next token
    pub frontier: Vec<Continuation>,
    /// Contexts shared by every frontier member
    pub contexts: ContextStack,
    /// Every distinct derivation that reached this state
    pub histories: Vec<History>,
    /// State
    pub status: ParserStatus,
    /// Byte offset after the last consumed token
    pub position: usize,
}

impl ParserPath {
    fn fingerprint(&self) -> u64 {
        let mut hasher = AHasher::default();
        self.frontier.hash(&mut hasher);
        self.contexts.hash(&mut hasher);
        self.status.hash(&mut hasher);
        hasher.finish()
    }
}

/// The multi-path parser
#[derive(Debug, Clone)]
pub struct StepParser {
    grammars: Arc<GrammarSet>,
    config: SessionConfig,
    paths: Vec<ParserPath>,
    ids: IdCounter,
    dead: Vec<DeadPathReport>,
    lexical: Vec<(usize, Vec<String>)>,
    dropped: usize,
    dropped_at: usize,
}

impl StepParser {
    /// Create a parser with no paths; see [`StepParser::start`]
    pub fn new(grammars: Arc<GrammarSet>, config: SessionConfig) -> Self {
        Self {
            grammars,
            config,
            paths: Vec::new(),
            ids: IdCounter::default(),
            dead: Vec::new(),
            lexical: Vec::new(),
            dropped: 0,
            dropped_at: 0,
        }
    }

    /// Create the root paths and their lexer paths
    ///
    /// A start rule whose alternatives enter different contexts right away
    /// yields one root path per context stack. Returns the first root.
    pub fn start(&mut self, lexer: &mut StepLexer) -> ParserPathId {
        let builder = FrontierBuilder::new(&self.grammars, self.config.max_frontier);
        let expansion = builder.initial(ContextStack::new());
        let mut roots = partition_by_contexts(expansion.members);
        if roots.is_empty() {
            roots.push((ContextStack::new(), Vec::new()));
        }

        let first = ParserPathId(self.ids.next());
        for (i, (contexts, frontier)) in roots.into_iter().enumerate() {
            let id = if i == 0 {
                first
            } else {
                ParserPathId(self.ids.next())
            };
            let lexer_id = lexer.spawn(contexts.clone());
            self.paths.push(ParserPath {
                id,
                parent: None,
                lexer: lexer_id,
                frontier,
                contexts,
                histories: vec![History::new()],
                status: ParserStatus::Active,
                position: 0,
            });
        }
        first
    }

    /// Live and accepted paths, ordered by id
    #[inline]
    pub fn paths(&self) -> &[ParserPath] {
        &self.paths
    }

    /// Path by id
    pub fn path(&self, id: ParserPathId) -> Option<&ParserPath> {
        self.paths.iter().find(|p| p.id == id)
    }

    /// Ids of the paths still consuming input
    pub fn live_paths(&self) -> Vec<ParserPathId> {
        self.paths
            .iter()
            .filter(|p| p.status == ParserStatus::Active)
            .map(|p| p.id)
            .collect()
    }

    /// Reports for every path that died so far, ordered by id
    pub fn dead_paths(&self) -> Vec<DeadPathReport> {
        let mut dead = self.dead.clone();
        dead.sort_by_key(|d| d.path);
        dead
    }

    /// Paths dropped by the live-path cap
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Whether no path is still consuming input
    pub fn is_finished(&self) -> bool {
        !self.paths.iter().any(|p| p.status == ParserStatus::Active)
    }

    /// Terminals the parser path bound to lexer path `id` can accept next
    pub fn valid_terminals_for_lexer_path(&self, id: LexerPathId) -> Option<Vec<TerminalRef>> {
        self.paths
            .iter()
            .find(|p| p.lexer == id && p.status == ParserStatus::Active)
            .map(|p| valid_terminals(&p.frontier, &self.grammars))
    }

    /// Contexts active on path `id`, outermost first
    pub fn get_active_contexts(&self, id: ParserPathId) -> Vec<String> {
        self.path(id).map(|p| p.contexts.names()).unwrap_or_default()
    }

    /// Apply a context directive to one path, its frontier and its lexer
    ///
    /// Siblings are untouched. Returns `false` if `id` is not live.
    pub fn set_context(
        &mut self,
        lexer: &mut StepLexer,
        id: ParserPathId,
        directive: &ContextDirective,
    ) -> bool {
        let Some(path) = self
            .paths
            .iter_mut()
            .find(|p| p.id == id && p.status == ParserStatus::Active)
        else {
            return false;
        };
        path.contexts.apply(directive);
        for member in &mut path.frontier {
            member.contexts.apply(directive);
        }
        lexer.set_contexts(path.lexer, path.contexts.clone());
        log_debug!("{} context {:?} {:?}", id, directive.name, directive.action);
        true
    }

    /// Consume the tokens of one lexer sweep
    pub fn consume(&mut self, lexer: &mut StepLexer, step: &LexerStep) {
        self.follow_lexer_splits(step);
        self.bury_blocked(step);

        let current = std::mem::take(&mut self.paths);
        let mut next = Vec::with_capacity(current.len());
        for path in current {
            if path.status != ParserStatus::Active {
                next.push(path);
                continue;
            }
            match lexer.accept_pending(path.lexer) {
                Some(token) => self.feed_token(path, &token, lexer, &mut next),
                None => next.push(path),
            }
        }
        next.sort_by_key(|p| p.id);
        self.paths = next;

        self.merge_converged(lexer);
        self.enforce_cap(lexer);
        if self.config.first_match {
            self.keep_first_accepted(lexer);
        }
    }

    /// Result once every path finished, `None` while paths are live
    pub fn outcome(&self) -> Option<Result<ParseOutcome, ParseFailure>> {
        if !self.is_finished() {
            return None;
        }
        let mut derivations: Vec<&History> = Vec::new();
        for path in self.paths.iter().filter(|p| p.status == ParserStatus::Accepted) {
            for history in &path.histories {
                if !derivations.iter().any(|d| d.same_derivation(history)) {
                    derivations.push(history);
                }
            }
        }
        Some(match derivations.as_slice() {
            [] => Err(self.failure()),
            [only] => Ok(ParseOutcome::Matched(only.to_vec())),
            many => Ok(ParseOutcome::Ambiguous(
                many.iter().map(|h| h.to_vec()).collect(),
            )),
        })
    }

    // =========================================================================
    // Sweep phases
    // =========================================================================

    /// Rebind parser paths whose lexer path split, one copy per child
    fn follow_lexer_splits(&mut self, step: &LexerStep) {
        for split in &step.splits {
            let Some(idx) = self
                .paths
                .iter()
                .position(|p| p.lexer == split.parent && p.status == ParserStatus::Active)
            else {
                continue;
            };
            let Some((first, rest)) = split.children.split_first() else {
                continue;
            };
            self.paths[idx].lexer = *first;
            for &child in rest {
                let mut copy = self.paths[idx].clone();
                copy.parent = Some(copy.id);
                copy.id = ParserPathId(self.ids.next());
                copy.lexer = child;
                log_trace!("{} follows lexer split into {}", copy.id, child);
                self.paths.push(copy);
            }
        }
    }

    /// Kill parser paths whose lexer path matched nothing
    fn bury_blocked(&mut self, step: &LexerStep) {
        for blocked in &step.blocked {
            let Some(idx) = self.paths.iter().position(|p| p.lexer == blocked.id) else {
                continue;
            };
            let path = self.paths.remove(idx);
            log_debug!("{} dead: nothing lexes at {}", path.id, blocked.position);
            self.lexical
                .push((blocked.position, blocked.attempted.clone()));
            self.dead.push(DeadPathReport {
                path: path.id,
                position: blocked.position,
                found: None,
                expected: terminal_names(&path.frontier, &self.grammars),
            });
        }
    }

    fn feed_token(
        &mut self,
        path: ParserPath,
        token: &Token,
        lexer: &mut StepLexer,
        out: &mut Vec<ParserPath>,
    ) {
        let grammars = Arc::clone(&self.grammars);
        let mut satisfying: Vec<&Continuation> = path
            .frontier
            .iter()
            .filter(|m| m.accepts(token, &grammars))
            .collect();
        if self.config.apply_precedence {
            satisfying = filter_by_precedence(satisfying, token, &grammars);
        }

        if satisfying.is_empty() {
            log_debug!("{} dead at {}: unexpected {}", path.id, token.span.start, token.terminal);
            self.dead.push(DeadPathReport {
                path: path.id,
                position: token.span.start,
                found: Some(token.terminal.name.clone()),
                expected: terminal_names(&path.frontier, &grammars),
            });
            lexer.invalidate_lexer_path(path.lexer);
            return;
        }

        // members that would commit the same matches share one path
        let mut groups: Vec<Vec<&Continuation>> = Vec::new();
        for member in satisfying {
            match groups.iter_mut().find(|g| g[0].completed == member.completed) {
                Some(group) => group.push(member),
                None => groups.push(vec![member]),
            }
        }

        // one child per pending-match group and context stack
        let builder = FrontierBuilder::new(&grammars, self.config.max_frontier);
        let mut children: Vec<(&[PendingMatch], ContextStack, Vec<Continuation>)> = Vec::new();
        for group in &groups {
            let completed = group[0].completed.as_slice();
            if token.is_eof() {
                children.push((completed, group[0].contexts.clone(), Vec::new()));
                continue;
            }
            let mut members: Vec<Continuation> = Vec::new();
            for member in group {
                members.extend(builder.advance(member, token).members);
            }
            members.sort();
            members.dedup();
            if members.len() > self.config.max_frontier {
                log_warn!("{} frontier truncated to {} members", path.id, self.config.max_frontier);
                members.truncate(self.config.max_frontier);
            }
            if members.is_empty() {
                children.push((completed, group[0].contexts.clone(), Vec::new()));
                continue;
            }
            for (contexts, part) in partition_by_contexts(members) {
                children.push((completed, contexts, part));
            }
        }

        let split = children.len() > 1;
        if split {
            log_debug!("{} splits {} ways on {}", path.id, children.len(), token.terminal);
        }
        let status = if token.is_eof() {
            ParserStatus::Accepted
        } else {
            ParserStatus::Active
        };

        for (i, (completed, contexts, frontier)) in children.into_iter().enumerate() {
            let (id, parent, lexer_id) = if split {
                let lexer_id = if i == 0 {
                    path.lexer
                } else {
                    match lexer.fork(path.lexer) {
                        Some(forked) => forked,
                        None => continue,
                    }
                };
                (ParserPathId(self.ids.next()), Some(path.id), lexer_id)
            } else {
                (path.id, path.parent, path.lexer)
            };

            let histories = path
                .histories
                .iter()
                .map(|h| self.commit(h, completed, id))
                .collect();
            lexer.set_contexts(lexer_id, contexts.clone());

            if status == ParserStatus::Accepted {
                log_debug!("{} accepted", id);
            }
            out.push(ParserPath {
                id,
                parent,
                lexer: lexer_id,
                frontier,
                contexts,
                histories,
                status,
                position: token.span.end,
            });
        }
    }

    fn commit(&self, history: &History, completed: &[PendingMatch], path: ParserPathId) -> History {
        completed.iter().fold(history.clone(), |acc, pending| {
            let grammar = self.grammars.get(pending.slot);
            let production = grammar.production(pending.production);
            acc.push(ProductionMatch {
                name: production.name.clone(),
                grammar: grammar.name.clone(),
                production: pending.production,
                span: pending.span,
                children: pending.children.clone(),
                path,
                action: production.action.clone(),
            })
        })
    }

    /// Merge structurally equal paths into the lower id
    fn merge_converged(&mut self, lexer: &mut StepLexer) {
        let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        for (idx, path) in self.paths.iter().enumerate() {
            buckets.entry(path.fingerprint()).or_default().push(idx);
        }
        let mut groups: Vec<Vec<usize>> = buckets.into_values().filter(|g| g.len() > 1).collect();
        groups.sort();

        let mut absorbed: Vec<usize> = Vec::new();
        for group in groups {
            for (pos, &keep) in group.iter().enumerate() {
                if absorbed.contains(&keep) {
                    continue;
                }
                for &drop in &group[pos + 1..] {
                    if absorbed.contains(&drop) || !self.mergeable(keep, drop) {
                        continue;
                    }
                    let Some(kept_lexer) = lexer.merge(self.paths[keep].lexer, self.paths[drop].lexer)
                    else {
                        continue;
                    };
                    let taken = std::mem::take(&mut self.paths[drop].histories);
                    let survivor = &mut self.paths[keep];
                    survivor.lexer = kept_lexer;
                    for history in taken {
                        if !survivor.histories.iter().any(|h| h.same_derivation(&history)) {
                            survivor.histories.push(history);
                        }
                    }
                    log_debug!("{} merged into {}", self.paths[drop].id, self.paths[keep].id);
                    absorbed.push(drop);
                }
            }
        }

        absorbed.sort_unstable();
        for idx in absorbed.into_iter().rev() {
            self.paths.remove(idx);
        }
    }

    fn mergeable(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.paths[a], &self.paths[b]);
        a.status == b.status && a.contexts == b.contexts && a.frontier == b.frontier
    }

    /// Drop the least advanced paths (oldest first) above the ceiling
    fn enforce_cap(&mut self, lexer: &mut StepLexer) {
        let mut active: Vec<usize> = self
            .paths
            .iter()
            .enumerate()
            .filter(|(_, p)| p.status == ParserStatus::Active)
            .map(|(idx, _)| idx)
            .collect();
        if active.len() <= self.config.max_paths {
            return;
        }
        active.sort_by(|&a, &b| {
            let (a, b) = (&self.paths[a], &self.paths[b]);
            a.position.cmp(&b.position).then(a.id.cmp(&b.id))
        });
        let excess = active.len() - self.config.max_paths;
        let mut doomed: Vec<usize> = active[..excess].to_vec();
        doomed.sort_unstable();
        for idx in doomed.into_iter().rev() {
            let path = self.paths.remove(idx);
            self.dropped_at = self.dropped_at.max(path.position);
            lexer.invalidate_lexer_path(path.lexer);
        }
        self.dropped += excess;
        log_warn!(
            "live-path ceiling {} exceeded, dropped {} paths",
            self.config.max_paths,
            excess
        );
    }

    /// First-match mode: the lowest accepted path ends the parse
    fn keep_first_accepted(&mut self, lexer: &mut StepLexer) {
        let Some(winner) = self
            .paths
            .iter()
            .find(|p| p.status == ParserStatus::Accepted)
            .map(|p| p.id)
        else {
            return;
        };
        for path in self.paths.iter().filter(|p| p.id != winner) {
            lexer.invalidate_lexer_path(path.lexer);
        }
        self.paths.retain(|p| p.id == winner);
        for path in &mut self.paths {
            path.histories.truncate(1);
        }
        log_debug!("first match on {}, siblings discarded", winner);
    }

    fn failure(&self) -> ParseFailure {
        // dropped paths only matter if no surviving path got further
        if self.dropped > 0 && self.dead.iter().all(|d| d.position <= self.dropped_at) {
            return ParseFailure::AmbiguityExhaustion {
                max_paths: self.config.max_paths,
                dropped: self.dropped,
            };
        }
        if self.dead.iter().all(|d| d.found.is_none()) {
            let furthest = self
                .lexical
                .iter()
                .fold(None::<&(usize, Vec<String>)>, |best, entry| match best {
                    Some(b) if b.0 >= entry.0 => Some(b),
                    _ => Some(entry),
                });
            if let Some((position, attempted)) = furthest {
                return ParseFailure::Lexical {
                    position: *position,
                    attempted: attempted.clone(),
                };
            }
        }
        let dead_paths = self.dead_paths();
        let worst = dead_paths
            .iter()
            .fold(None::<&DeadPathReport>, |best, report| match best {
                Some(b) if b.position >= report.position => Some(b),
                _ => Some(report),
            });
        match worst {
            Some(report) => ParseFailure::Syntax {
                position: report.position,
                found: report.found.clone(),
                expected: report.expected.clone(),
                dead_paths: dead_paths.clone(),
            },
            None => ParseFailure::Syntax {
                position: 0,
                found: None,
                expected: Vec::new(),
                dead_paths: Vec::new(),
            },
        }
    }
}

/// Members grouped by context stack, groups in order of first appearance
fn partition_by_contexts(members: Vec<Continuation>) -> Vec<(ContextStack, Vec<Continuation>)> {
    let mut parts: Vec<(ContextStack, Vec<Continuation>)> = Vec::new();
    for member in members {
        match parts.iter_mut().find(|(contexts, _)| *contexts == member.contexts) {
            Some((_, part)) => part.push(member),
            None => parts.push((member.contexts.clone(), vec![member])),
        }
    }
    parts
}

fn terminal_names(frontier: &[Continuation], grammars: &GrammarSet) -> Vec<String> {
    valid_terminals(frontier, grammars)
        .into_iter()
        .map(|t| t.name)
        .collect()
}
