//! Frontier computation
//!
//! A parser path's frontier is a set of [`Continuation`]s. Each one is a
//! stack of partially matched productions (innermost last) whose top frame
//! waits for one terminal, or an empty stack that accepts end of input.
//!
//! [`FrontierBuilder`] computes the closure after a token is scanned:
//! context directives are applied, rules are predicted and completed
//! productions are popped, until every member waits for a terminal.
//!
//! # Left recursion
//!
//! Alternatives of the form `<x> ::= <x> ...` are never predicted. Instead,
//! whenever an `<x>` frame completes, each such alternative is started with
//! the completed match as its first child ("growth"). Predicting a rule that
//! is already on the stack without input consumed since is pruned; this
//! cuts indirect left recursion, which grammar analysis reports.

use super::context::{ContextStack, GrammarSet};
use super::{TerminalRef, Token};
use crate::grammar::Part;
use crate::logging::log_warn;
use crate::source_location::Span;
use hashbrown::HashSet;

/// One partially matched production
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Frame {
    /// Grammar slot of the production
    pub slot: usize,
    /// Production index in that slot's effective grammar
    pub production: usize,
    /// Index of the next part to match
    pub dot: usize,
    /// Input position the frame was predicted at
    pub origin: usize,
    /// Spans of the consuming parts matched so far
    pub children: Vec<Span>,
}

impl Frame {
    fn new(slot: usize, production: usize, origin: usize) -> Self {
        Self {
            slot,
            production,
            dot: 0,
            origin,
            children: Vec::new(),
        }
    }

    /// Span covered by the non-empty children, or an empty span at the
    /// origin
    pub fn span(&self) -> Span {
        let mut consumed = self.children.iter().filter(|s| !s.is_empty());
        match (consumed.next(), consumed.last()) {
            (Some(first), Some(last)) => Span::new(first.start, last.end),
            (Some(only), None) => *only,
            _ => Span::empty(self.origin),
        }
    }
}

/// A production completed on a frontier member but not yet committed to
/// the path's history
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingMatch {
    /// Grammar slot
    pub slot: usize,
    /// Production index in that slot's effective grammar
    pub production: usize,
    /// Covered input
    pub span: Span,
    /// Spans of the consuming parts
    pub children: Vec<Span>,
}

/// What a frontier member waits for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expect {
    /// A token of this terminal
    Terminal(TerminalRef),
    /// End of input
    Accept,
}

/// One member of a parser path's frontier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Continuation {
    /// Open frames, innermost last
    pub stack: Vec<Frame>,
    /// Contexts active on this member
    pub contexts: ContextStack,
    /// Productions completed since the last token
    pub completed: Vec<PendingMatch>,
    /// What the member waits for
    pub expects: Expect,
}

impl Continuation {
    /// Whether `token` satisfies this member
    ///
    /// Context-gated terminals only count while their context is active on
    /// the member.
    pub fn accepts(&self, token: &Token, grammars: &GrammarSet) -> bool {
        match &self.expects {
            Expect::Accept => token.is_eof(),
            Expect::Terminal(expected) => {
                !token.is_eof() && &token.terminal == expected && self.allows(expected, grammars)
            }
        }
    }

    /// Whether the expected terminal exists and its gate is open
    pub fn allows(&self, terminal: &TerminalRef, grammars: &GrammarSet) -> bool {
        grammars
            .get(terminal.slot)
            .terminal(&terminal.name)
            .map_or(false, |t| self.contexts.allows(t.context.as_deref()))
    }
}

/// Result of a closure
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Sorted, deduplicated members
    pub members: Vec<Continuation>,
    /// Whether the member or work limit cut the closure short
    pub truncated: bool,
}

/// In-progress closure state: a member that does not wait on a terminal yet
#[derive(Debug, Clone)]
struct Work {
    stack: Vec<Frame>,
    contexts: ContextStack,
    completed: Vec<PendingMatch>,
}

/// Closure computation over a [`GrammarSet`]
#[derive(Debug, Clone, Copy)]
pub struct FrontierBuilder<'g> {
    grammars: &'g GrammarSet,
    max_members: usize,
}

impl<'g> FrontierBuilder<'g> {
    /// Create a builder capped at `max_members` members per closure
    pub fn new(grammars: &'g GrammarSet, max_members: usize) -> Self {
        Self {
            grammars,
            max_members: max_members.max(1),
        }
    }

    /// Frontier before any input: the closure of the host's start rule
    pub fn initial(&self, contexts: ContextStack) -> Expansion {
        let seed = Work {
            stack: Vec::new(),
            contexts,
            completed: Vec::new(),
        };
        let mut work = Vec::new();
        let start = self.grammars.host().start.clone();
        self.predict(seed, &start, 0, &mut work);
        self.run(work, 0)
    }

    /// Frontier after `member` consumes `token`
    ///
    /// The member's own pending matches are not carried over; the caller
    /// commits them.
    pub fn advance(&self, member: &Continuation, token: &Token) -> Expansion {
        let mut stack = member.stack.clone();
        let Some(top) = stack.last_mut() else {
            return Expansion::default();
        };
        top.children.push(token.span);
        top.dot += 1;
        let work = vec![Work {
            stack,
            contexts: member.contexts.clone(),
            completed: Vec::new(),
        }];
        self.run(work, token.span.end)
    }

    fn run(&self, mut work: Vec<Work>, pos: usize) -> Expansion {
        let mut members: HashSet<Continuation> = HashSet::new();
        let mut truncated = false;
        let mut budget = self.max_members.saturating_mul(64);

        while let Some(mut item) = work.pop() {
            if budget == 0 || members.len() >= self.max_members {
                truncated = true;
                break;
            }
            budget -= 1;

            let Some(top) = item.stack.last() else {
                members.insert(Continuation {
                    stack: Vec::new(),
                    contexts: item.contexts,
                    completed: item.completed,
                    expects: Expect::Accept,
                });
                continue;
            };
            let grammar = self.grammars.get(top.slot);
            let production = grammar.production(top.production);

            match production.parts.get(top.dot) {
                None => self.complete(item, &mut work),
                Some(Part::Context(directive)) => {
                    item.contexts.apply(directive);
                    if let Some(top) = item.stack.last_mut() {
                        top.dot += 1;
                    }
                    work.push(item);
                }
                Some(Part::Terminal(name)) => {
                    let expects = Expect::Terminal(TerminalRef::new(top.slot, name.as_str()));
                    members.insert(Continuation {
                        stack: item.stack,
                        contexts: item.contexts,
                        completed: item.completed,
                        expects,
                    });
                }
                Some(Part::NonTerminal(rule)) => {
                    let rule = rule.clone();
                    self.predict(item, &rule, pos, &mut work);
                }
            }
        }

        if truncated {
            log_warn!(
                "frontier closure at {} truncated at {} members",
                pos,
                members.len()
            );
        }
        let mut members: Vec<Continuation> = members.into_iter().collect();
        members.sort();
        Expansion { members, truncated }
    }

    /// Push one work item per eligible alternative of `rule`
    fn predict(&self, item: Work, rule: &str, pos: usize, work: &mut Vec<Work>) {
        let from_slot = item.stack.last().map_or(0, |f| f.slot);
        let active = self.grammars.active_slot(&item.contexts);
        let slot = if active != from_slot && self.grammars.get(active).defines_rule(rule) {
            active
        } else if self.grammars.get(from_slot).defines_rule(rule) {
            from_slot
        } else {
            active
        };
        let grammar = self.grammars.get(slot);

        let left_recursive = item.stack.iter().any(|f| {
            f.slot == slot && f.origin == pos && grammar.production(f.production).name == rule
        });
        if left_recursive {
            return;
        }

        for &alt in grammar.rule_alternatives(rule) {
            let production = grammar.production(alt);
            if !item.contexts.allows(production.context.as_deref()) {
                continue;
            }
            if is_self_left_recursive(production.parts.first(), rule) {
                continue;
            }
            let mut next = item.clone();
            next.stack.push(Frame::new(slot, alt, pos));
            work.push(next);
        }
    }

    /// Pop the finished top frame, record it, and resume its parent
    fn complete(&self, mut item: Work, work: &mut Vec<Work>) {
        let Some(frame) = item.stack.pop() else {
            return;
        };
        let grammar = self.grammars.get(frame.slot);
        let production = grammar.production(frame.production);
        let span = frame.span();
        item.completed.push(PendingMatch {
            slot: frame.slot,
            production: frame.production,
            span,
            children: frame.children.clone(),
        });

        // A left-recursive frame that added nothing past its first child
        // would grow forever.
        let stalled = is_self_left_recursive(production.parts.first(), &production.name)
            && frame.children.first().map_or(false, |first| *first == span);
        if !stalled {
            for &alt in grammar.rule_alternatives(&production.name) {
                let candidate = grammar.production(alt);
                if !is_self_left_recursive(candidate.parts.first(), &production.name)
                    || !item.contexts.allows(candidate.context.as_deref())
                {
                    continue;
                }
                let mut grown = item.clone();
                grown.stack.push(Frame {
                    slot: frame.slot,
                    production: alt,
                    dot: 1,
                    origin: frame.origin,
                    children: vec![span],
                });
                work.push(grown);
            }
        }

        if let Some(parent) = item.stack.last_mut() {
            parent.children.push(span);
            parent.dot += 1;
        }
        work.push(item);
    }
}

fn is_self_left_recursive(first: Option<&Part>, rule: &str) -> bool {
    matches!(first, Some(Part::NonTerminal(n)) if n == rule)
}

/// Distinct terminals a frontier can accept next, sorted
///
/// End of input is included as [`TerminalRef::eof`] when a member accepts.
pub fn valid_terminals(members: &[Continuation], grammars: &GrammarSet) -> Vec<TerminalRef> {
    let mut out: Vec<TerminalRef> = Vec::new();
    for member in members {
        let terminal = match &member.expects {
            Expect::Accept => TerminalRef::eof(),
            Expect::Terminal(t) if member.allows(t, grammars) => t.clone(),
            Expect::Terminal(_) => continue,
        };
        if !out.contains(&terminal) {
            out.push(terminal);
        }
    }
    out.sort();
    out
}
