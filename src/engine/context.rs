//! Context Manager
//!
//! Contexts are named flags scoped to one path. Each lexer path, parser path
//! and frontier member owns its own [`ContextStack`]; copying a path copies
//! its stack, so toggling a context on one path never reaches a sibling.
//!
//! Entering an embedded language is a context activation too: while a
//! context with an `Embed:` mapping is active, the [`GrammarSet`] routes rule
//! predictions and splitter selection to the embedded grammar's slot.

use crate::error::GrammarError;
use crate::grammar::{ContextAction, ContextDirective, EffectiveGrammar, GrammarRegistry};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-path stack of active contexts, innermost last
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextStack {
    active: Vec<String>,
}

impl ContextStack {
    /// Empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `name` (activations nest)
    pub fn push(&mut self, name: &str) {
        self.active.push(name.to_string());
    }

    /// Deactivate the most recent activation of `name`
    ///
    /// Returns `false` if `name` was not active.
    pub fn pop(&mut self, name: &str) -> bool {
        match self.active.iter().rposition(|c| c == name) {
            Some(idx) => {
                self.active.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Apply a `Context(name, on|off)` directive
    pub fn apply(&mut self, directive: &ContextDirective) {
        match directive.action {
            ContextAction::On => self.push(&directive.name),
            ContextAction::Off => {
                self.pop(&directive.name);
            }
        }
    }

    /// Whether `name` is active
    #[inline]
    pub fn is_active(&self, name: &str) -> bool {
        self.active.iter().any(|c| c == name)
    }

    /// Whether an optional gate is satisfied (`None` always is)
    #[inline]
    pub fn allows(&self, gate: Option<&str>) -> bool {
        gate.map_or(true, |g| self.is_active(g))
    }

    /// Active contexts, outermost first
    pub fn names(&self) -> Vec<String> {
        self.active.clone()
    }

    /// Active contexts, innermost first
    pub fn innermost_first(&self) -> impl Iterator<Item = &str> {
        self.active.iter().rev().map(String::as_str)
    }

    /// Number of activations
    #[inline]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether nothing is active
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// The grammars one session can switch between
///
/// Slot 0 holds the host grammar; every grammar it (transitively) embeds
/// gets a further slot. The embedding map is merged across slots, first
/// definition wins.
#[derive(Debug, Clone)]
pub struct GrammarSet {
    slots: Vec<Arc<EffectiveGrammar>>,
    embed_slots: HashMap<String, usize>,
}

impl GrammarSet {
    /// Build from a host grammar and its embedded grammars
    ///
    /// Every embedding must name a grammar present in `grammars`.
    pub fn new(
        host: Arc<EffectiveGrammar>,
        embedded: Vec<Arc<EffectiveGrammar>>,
    ) -> Result<Self, GrammarError> {
        let mut slots = vec![host];
        for grammar in embedded {
            if !slots.iter().any(|g| g.name == grammar.name) {
                slots.push(grammar);
            }
        }

        let mut embed_slots = HashMap::new();
        for grammar in &slots {
            for embed in &grammar.embeds {
                let slot = slots
                    .iter()
                    .position(|g| g.name == embed.grammar)
                    .ok_or_else(|| GrammarError::UnknownGrammar {
                        name: embed.grammar.clone(),
                    })?;
                embed_slots.entry(embed.context.clone()).or_insert(slot);
            }
        }
        Ok(Self { slots, embed_slots })
    }

    /// A set with no embedded grammars
    pub fn single(host: Arc<EffectiveGrammar>) -> Result<Self, GrammarError> {
        Self::new(host, Vec::new())
    }

    /// Resolve `name` and everything it embeds through `registry`
    pub fn resolve(registry: &mut GrammarRegistry, name: &str) -> Result<Self, GrammarError> {
        let host = registry.effective(name)?;
        let mut embedded: Vec<Arc<EffectiveGrammar>> = Vec::new();
        let mut pending: Vec<String> = host.embeds.iter().map(|e| e.grammar.clone()).collect();
        while let Some(next) = pending.pop() {
            if next == host.name || embedded.iter().any(|g| g.name == next) {
                continue;
            }
            let grammar = registry.effective(&next)?;
            pending.extend(grammar.embeds.iter().map(|e| e.grammar.clone()));
            embedded.push(grammar);
        }
        embedded.sort_by(|a, b| a.name.cmp(&b.name));
        Self::new(host, embedded)
    }

    /// Grammar in `slot`
    ///
    /// # Panics
    /// If `slot` is out of range; slots only come from this set.
    #[inline]
    pub fn get(&self, slot: usize) -> &EffectiveGrammar {
        &self.slots[slot]
    }

    /// Host grammar
    #[inline]
    pub fn host(&self) -> &EffectiveGrammar {
        &self.slots[0]
    }

    /// Number of slots
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; a set holds at least its host
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot of the grammar named `name`
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|g| g.name == name)
    }

    /// Slot selected by the innermost active context with an embedding
    pub fn active_slot(&self, contexts: &ContextStack) -> usize {
        contexts
            .innermost_first()
            .find_map(|c| self.embed_slots.get(c).copied())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_removes_latest_activation() {
        let mut stack = ContextStack::new();
        stack.push("a");
        stack.push("b");
        stack.push("a");
        assert!(stack.pop("a"));
        assert_eq!(stack.names(), vec!["a", "b"]);
        assert!(!stack.pop("zzz"));
    }

    #[test]
    fn test_apply_directives() {
        let mut stack = ContextStack::new();
        stack.apply(&ContextDirective::on("sql"));
        assert!(stack.is_active("sql"));
        assert!(stack.allows(Some("sql")));
        assert!(stack.allows(None));
        stack.apply(&ContextDirective::off("sql"));
        assert!(!stack.allows(Some("sql")));
        // off without a matching on is a no-op
        stack.apply(&ContextDirective::off("sql"));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_copies_are_independent() {
        let mut parent = ContextStack::new();
        parent.push("x");
        let mut child = parent.clone();
        child.push("y");
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
    }

    #[test]
    fn test_embedding_selects_slot() {
        let mut registry = GrammarRegistry::new();
        registry
            .register_text("Grammar: Sql\nSELECT := 'SELECT'\n<select> ::= SELECT")
            .unwrap();
        registry
            .register_text("Grammar: Host\nEmbed: sql => Sql\n<s> ::= 'q' Context(sql, on) <select> Context(sql, off)")
            .unwrap();
        let set = GrammarSet::resolve(&mut registry, "Host").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.slot_of("Sql"), Some(1));

        let mut ctx = ContextStack::new();
        assert_eq!(set.active_slot(&ctx), 0);
        ctx.push("other");
        ctx.push("sql");
        assert_eq!(set.active_slot(&ctx), 1);
        ctx.pop("sql");
        assert_eq!(set.active_slot(&ctx), 0);
    }
}
