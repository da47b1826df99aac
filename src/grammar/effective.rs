//! Effective grammar
//!
//! The fully resolved, flattened form of a grammar and every base it
//! inherits from. It is immutable once built: the registry hands it out as
//! `Arc<EffectiveGrammar>` and the engine only ever reads it.
//!
//! Serialization is deterministic. Every table is a `Vec` in resolution
//! order and the lookup indices are rebuilt rather than serialized, so two
//! resolutions of the same grammars produce byte-identical JSON.

use super::model::{
    Embedding, ErrorRecoveryStrategy, Matcher, Part, PrecedenceEntry, Production,
    SemanticActionBinding, Terminal, TokenSplitter,
};
use crate::error::GrammarError;
use crate::regex_cache;
use hashbrown::HashMap;
use serde::Serialize;

/// A resolved grammar, ready for the engine
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveGrammar {
    /// Name of the grammar this was resolved for
    pub name: String,
    /// Resolution order, most-base first, ending with `name`
    pub hierarchy: Vec<String>,
    /// Format tag (first declared in the hierarchy)
    pub format: Option<String>,
    /// Token splitter (first declared in the hierarchy)
    pub token_splitter: TokenSplitter,
    /// Start rule
    pub start: String,
    /// Flattened productions, grouped by rule
    pub productions: Vec<Production>,
    /// Flattened terminals
    pub terminals: Vec<Terminal>,
    /// Flattened precedence table
    pub precedence: Vec<PrecedenceEntry>,
    /// Flattened semantic-action bindings
    pub actions: Vec<SemanticActionBinding>,
    /// Flattened recovery strategies
    pub recovery: Vec<ErrorRecoveryStrategy>,
    /// Embedded grammars keyed by context
    pub embeds: Vec<Embedding>,

    /// Registry generation this grammar was resolved at
    #[serde(skip)]
    pub generation: u64,
    #[serde(skip)]
    rule_index: HashMap<String, Vec<usize>>,
    #[serde(skip)]
    terminal_index: HashMap<String, usize>,
}

impl PartialEq for EffectiveGrammar {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.hierarchy == other.hierarchy
            && self.format == other.format
            && self.token_splitter == other.token_splitter
            && self.start == other.start
            && self.productions == other.productions
            && self.terminals == other.terminals
            && self.precedence == other.precedence
            && self.actions == other.actions
            && self.recovery == other.recovery
            && self.embeds == other.embeds
    }
}

/// Tables produced by flattening, before indices are built
#[derive(Debug, Default)]
pub(crate) struct FlatTables {
    pub name: String,
    pub hierarchy: Vec<String>,
    pub format: Option<String>,
    pub token_splitter: Option<TokenSplitter>,
    pub start: Option<String>,
    pub productions: Vec<Production>,
    pub terminals: Vec<Terminal>,
    pub precedence: Vec<PrecedenceEntry>,
    pub actions: Vec<SemanticActionBinding>,
    pub recovery: Vec<ErrorRecoveryStrategy>,
    pub embeds: Vec<Embedding>,
}

impl EffectiveGrammar {
    /// Build indices over flattened tables
    pub(crate) fn from_tables(tables: FlatTables, generation: u64) -> Result<Self, GrammarError> {
        let mut rule_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, p) in tables.productions.iter().enumerate() {
            rule_index.entry(p.name.clone()).or_default().push(idx);
        }
        let terminal_index = tables
            .terminals
            .iter()
            .enumerate()
            .map(|(idx, t)| (t.name.clone(), idx))
            .collect();

        let start = match tables.start {
            Some(start) => start,
            None => tables
                .productions
                .first()
                .map(|p| p.name.clone())
                .ok_or_else(|| GrammarError::MissingStartRule {
                    grammar: tables.name.clone(),
                })?,
        };

        Ok(Self {
            name: tables.name,
            hierarchy: tables.hierarchy,
            format: tables.format,
            token_splitter: tables.token_splitter.unwrap_or(TokenSplitter::None),
            start,
            productions: tables.productions,
            terminals: tables.terminals,
            precedence: tables.precedence,
            actions: tables.actions,
            recovery: tables.recovery,
            embeds: tables.embeds,
            generation,
            rule_index,
            terminal_index,
        })
    }

    /// Check references, patterns and the start rule
    ///
    /// `embedded` holds the flattened grammars this one embeds; their rules
    /// count as defined for references made from this grammar.
    pub fn validate(&self, embedded: &[&EffectiveGrammar]) -> Result<(), GrammarError> {
        if !self.defines_rule(&self.start) {
            return Err(GrammarError::MissingStartRule {
                grammar: self.name.clone(),
            });
        }

        for terminal in &self.terminals {
            if let Matcher::Regex(pattern) = &terminal.matcher {
                regex_cache::get_or_compile(pattern).map_err(|reason| {
                    GrammarError::InvalidPattern {
                        grammar: self.name.clone(),
                        terminal: terminal.name.clone(),
                        reason,
                    }
                })?;
            }
        }
        if let TokenSplitter::Regex(pattern) = &self.token_splitter {
            regex_cache::get_or_compile(pattern).map_err(|reason| GrammarError::InvalidPattern {
                grammar: self.name.clone(),
                terminal: "TokenSplitter".into(),
                reason,
            })?;
        }

        for production in &self.productions {
            for part in &production.parts {
                match part {
                    Part::NonTerminal(rule) => {
                        let defined = self.defines_rule(rule)
                            || embedded.iter().any(|g| g.defines_rule(rule));
                        if !defined {
                            return Err(GrammarError::UndefinedRule {
                                grammar: self.name.clone(),
                                rule: rule.clone(),
                                referenced_by: production.name.clone(),
                            });
                        }
                    }
                    Part::Terminal(name) => {
                        if self.terminal(name).is_none() {
                            return Err(GrammarError::UndefinedTerminal {
                                grammar: self.name.clone(),
                                terminal: name.clone(),
                                referenced_by: production.name.clone(),
                            });
                        }
                    }
                    Part::Context(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Whether `rule` has at least one alternative
    #[inline]
    pub fn defines_rule(&self, rule: &str) -> bool {
        self.rule_index.contains_key(rule)
    }

    /// Production indices of `rule`, in resolution order
    #[inline]
    pub fn rule_alternatives(&self, rule: &str) -> &[usize] {
        self.rule_index.get(rule).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Alternatives of `rule`
    pub fn find_rule(&self, rule: &str) -> Vec<&Production> {
        self.rule_alternatives(rule)
            .iter()
            .map(|&idx| &self.productions[idx])
            .collect()
    }

    /// Production by index
    #[inline]
    pub fn production(&self, idx: usize) -> &Production {
        &self.productions[idx]
    }

    /// Terminal by name
    #[inline]
    pub fn terminal(&self, name: &str) -> Option<&Terminal> {
        self.terminal_index.get(name).map(|&idx| &self.terminals[idx])
    }

    /// Precedence entry of an operator terminal
    pub fn find_precedence(&self, operator: &str) -> Option<&PrecedenceEntry> {
        self.precedence.iter().find(|p| p.operator == operator)
    }

    /// Semantic-action binding by name
    pub fn find_action(&self, name: &str) -> Option<&SemanticActionBinding> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Recovery strategy by name
    pub fn find_recovery(&self, name: &str) -> Option<&ErrorRecoveryStrategy> {
        self.recovery.iter().find(|r| r.name == name)
    }

    /// Grammar embedded while `context` is active
    pub fn embedded_grammar(&self, context: &str) -> Option<&str> {
        self.embeds
            .iter()
            .find(|e| e.context == context)
            .map(|e| e.grammar.as_str())
    }

    /// Rule names in resolution order
    pub fn rule_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for p in &self.productions {
            if names.last() != Some(&p.name.as_str()) {
                names.push(&p.name);
            }
        }
        names
    }

    /// Deterministic JSON form
    #[inline]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
