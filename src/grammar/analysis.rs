//! Grammar analysis and warnings
//!
//! Static checks over an [`EffectiveGrammar`] that do not make it invalid
//! but usually point at a mistake:
//! - Indirect left recursion (pruned by the step parser, so those
//!   derivations are never found)
//! - Rules unreachable from the start rule
//! - Terminals no production references
//! - Context-gated rules whose context nothing ever activates
//!
//! Direct left recursion (`<e> ::= <e> '+' NUMBER`) is supported by the
//! parser and is not reported.
//!
//! # Example
//!
//! ```
//! use gramstep::grammar::{GrammarRegistry, GrammarAnalyzer, WarningKind};
//!
//! let mut registry = GrammarRegistry::new();
//! registry.register_text("Grammar: G\n<a> ::= <b> 'x'\n<b> ::= <a> 'y' | 'z'").unwrap();
//! let grammar = registry.effective("G").unwrap();
//!
//! let warnings = GrammarAnalyzer::new(&grammar).analyze();
//! assert!(warnings.iter().any(|w| w.kind == WarningKind::IndirectLeftRecursion));
//! ```

use super::effective::EffectiveGrammar;
use super::model::{ContextAction, Part};
use hashbrown::{HashMap, HashSet};

/// Kind of grammar warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// A rule reaches itself at its left edge through other rules or a
    /// nullable prefix
    ///
    /// Example: `<a> ::= <b> 'x'` with `<b> ::= <a> 'y'`
    IndirectLeftRecursion,

    /// A rule cannot be reached from the start rule
    UnusedRule,

    /// A terminal is defined but never referenced
    UnusedTerminal,

    /// A rule is gated on a context that no production activates
    UnreachableRule,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndirectLeftRecursion => write!(f, "indirect left recursion"),
            Self::UnusedRule => write!(f, "unused rule"),
            Self::UnusedTerminal => write!(f, "unused terminal"),
            Self::UnreachableRule => write!(f, "unreachable rule"),
        }
    }
}

/// A grammar warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarWarning {
    /// The kind of warning
    pub kind: WarningKind,
    /// Rule or terminal the warning is about
    pub subject: String,
    /// Human-readable message
    pub message: String,
    /// Related rules (e.g. the left-recursion chain)
    pub related: Vec<String>,
}

impl GrammarWarning {
    /// Create a new warning
    pub fn new(kind: WarningKind, subject: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.to_string(),
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Add related rules to the warning
    pub fn with_related(mut self, related: Vec<String>) -> Self {
        self.related = related;
        self
    }
}

impl std::fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.subject, self.kind, self.message)?;
        if !self.related.is_empty() {
            write!(f, " ({})", self.related.join(" -> "))?;
        }
        Ok(())
    }
}

/// Grammar analyzer
pub struct GrammarAnalyzer<'a> {
    grammar: &'a EffectiveGrammar,
    /// Contexts activated from outside the grammar (host grammars, callers)
    external_contexts: HashSet<String>,
    nullable: HashSet<&'a str>,
}

impl<'a> GrammarAnalyzer<'a> {
    /// Create a new analyzer for the given grammar
    pub fn new(grammar: &'a EffectiveGrammar) -> Self {
        let mut analyzer = Self {
            grammar,
            external_contexts: HashSet::new(),
            nullable: HashSet::new(),
        };
        analyzer.compute_nullable();
        analyzer
    }

    /// Treat `contexts` as activated elsewhere
    pub fn with_external_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_contexts
            .extend(contexts.into_iter().map(Into::into));
        self
    }

    /// Whether `rule` can derive the empty string
    pub fn is_nullable(&self, rule: &str) -> bool {
        self.nullable.contains(rule)
    }

    /// Analyze the grammar and return all warnings
    pub fn analyze(&self) -> Vec<GrammarWarning> {
        let mut warnings = Vec::new();
        self.detect_indirect_left_recursion(&mut warnings);
        self.detect_unused_rules(&mut warnings);
        self.detect_unused_terminals(&mut warnings);
        self.detect_unreachable_rules(&mut warnings);
        warnings
    }

    fn compute_nullable(&mut self) {
        let grammar = self.grammar;
        loop {
            let mut changed = false;
            for p in &grammar.productions {
                if self.nullable.contains(p.name.as_str()) {
                    continue;
                }
                let all_nullable = p.parts.iter().all(|part| match part {
                    Part::Terminal(_) => false,
                    Part::NonTerminal(n) => self.nullable.contains(n.as_str()),
                    Part::Context(_) => true,
                });
                if all_nullable {
                    self.nullable.insert(p.name.as_str());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Left-corner edges: rules that can start a derivation of each rule
    ///
    /// The supported `<x> ::= <x> ...` self edge (first part, no prefix)
    /// is left out.
    fn left_corners(&self) -> HashMap<&'a str, Vec<&'a str>> {
        let mut edges: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for p in &self.grammar.productions {
            for (idx, part) in p.parts.iter().enumerate() {
                match part {
                    Part::Context(_) => continue,
                    Part::Terminal(_) => break,
                    Part::NonTerminal(n) => {
                        let direct = idx == 0 && n == &p.name;
                        if !direct {
                            let targets = edges.entry(p.name.as_str()).or_default();
                            if !targets.contains(&n.as_str()) {
                                targets.push(n.as_str());
                            }
                        }
                        if !self.is_nullable(n) {
                            break;
                        }
                    }
                }
            }
        }
        edges
    }

    fn detect_indirect_left_recursion(&self, warnings: &mut Vec<GrammarWarning>) {
        let edges = self.left_corners();
        for rule in self.grammar.rule_names() {
            let mut visited = HashSet::new();
            if let Some(chain) = find_path(&edges, rule, rule, &mut visited) {
                let mut related = vec![rule.to_string()];
                related.extend(chain.into_iter().map(str::to_string));
                warnings.push(
                    GrammarWarning::new(
                        WarningKind::IndirectLeftRecursion,
                        rule,
                        "rule reaches itself at its left edge; those derivations are pruned",
                    )
                    .with_related(related),
                );
            }
        }
    }

    fn detect_unused_rules(&self, warnings: &mut Vec<GrammarWarning>) {
        let mut reachable: HashSet<&str> = HashSet::new();
        let mut stack = vec![self.grammar.start.as_str()];
        while let Some(rule) = stack.pop() {
            if !reachable.insert(rule) {
                continue;
            }
            for p in self.grammar.find_rule(rule) {
                stack.extend(p.rule_refs());
            }
        }
        for rule in self.grammar.rule_names() {
            if !reachable.contains(rule) {
                warnings.push(GrammarWarning::new(
                    WarningKind::UnusedRule,
                    rule,
                    format!("not reachable from start rule <{}>", self.grammar.start),
                ));
            }
        }
    }

    fn detect_unused_terminals(&self, warnings: &mut Vec<GrammarWarning>) {
        let referenced: HashSet<&str> = self
            .grammar
            .productions
            .iter()
            .flat_map(|p| p.terminal_refs())
            .collect();
        for terminal in &self.grammar.terminals {
            if !referenced.contains(terminal.name.as_str()) {
                warnings.push(GrammarWarning::new(
                    WarningKind::UnusedTerminal,
                    &terminal.name,
                    "no production references this terminal",
                ));
            }
        }
    }

    fn detect_unreachable_rules(&self, warnings: &mut Vec<GrammarWarning>) {
        let activated: HashSet<&str> = self
            .grammar
            .productions
            .iter()
            .flat_map(|p| p.parts.iter())
            .filter_map(|part| match part {
                Part::Context(d) if d.action == ContextAction::On => Some(d.name.as_str()),
                _ => None,
            })
            .collect();

        let mut reported: HashSet<&str> = HashSet::new();
        for p in &self.grammar.productions {
            let Some(ctx) = p.context.as_deref() else {
                continue;
            };
            if activated.contains(ctx) || self.external_contexts.contains(ctx) {
                continue;
            }
            if reported.insert(p.name.as_str()) {
                warnings.push(GrammarWarning::new(
                    WarningKind::UnreachableRule,
                    &p.name,
                    format!("gated on context '{}', which nothing activates", ctx),
                ));
            }
        }
    }
}

/// Path from `from` to `target` over `edges`, excluding `from` itself
fn find_path<'a>(
    edges: &HashMap<&'a str, Vec<&'a str>>,
    from: &'a str,
    target: &str,
    visited: &mut HashSet<&'a str>,
) -> Option<Vec<&'a str>> {
    if !visited.insert(from) {
        return None;
    }
    for &next in edges.get(from).map(Vec::as_slice).unwrap_or(&[]) {
        if next == target {
            return Some(vec![next]);
        }
        if let Some(mut path) = find_path(edges, next, target, visited) {
            path.insert(0, next);
            return Some(path);
        }
    }
    None
}
