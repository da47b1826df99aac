//! Grammar Registry
//!
//! Stores grammars by name and hands out memoized
//! [`EffectiveGrammar`]s. The registry is an explicit value passed by
//! handle, never an ambient singleton.
//!
//! Every topology change (registering, unregistering, adding, removing or
//! relinking a base) bumps a monotonic generation counter and drops every
//! cached resolution. Grammars that are not registered are pulled through
//! the optional [`GrammarLoader`] on demand.
//!
//! # Example
//!
//! ```rust
//! use gramstep::grammar::{GrammarRegistry, MemoryLoader};
//!
//! let loader = MemoryLoader::new()
//!     .with("Base", "Grammar: Base\nNUMBER := /[0-9]+/\n<num> ::= NUMBER")
//!     .with("Calc", "Grammar: Calc\nExtends Grammar: Base\n<expr> ::= <num> '+' <num>");
//!
//! let mut registry = GrammarRegistry::new().with_loader(loader);
//! let calc = registry.effective("Calc").unwrap();
//! assert_eq!(calc.hierarchy, vec!["Base", "Calc"]);
//! assert_eq!(calc.start, "expr");
//! ```

use super::dsl::load_grammar_text;
use super::effective::EffectiveGrammar;
use super::model::Grammar;
use super::resolver;
use crate::error::GrammarError;
use crate::logging::log_debug;
use hashbrown::HashMap;
use std::sync::Arc;

/// Source of grammar text for names the registry does not hold
///
/// Disk and embedded-resource resolution live behind this trait.
pub trait GrammarLoader: Send + Sync {
    /// Grammar text (DSL or JSON) for `name`, or `None` if not found
    fn load(&self, name: &str) -> Result<Option<String>, GrammarError>;
}

impl<F> GrammarLoader for F
where
    F: Fn(&str) -> Result<Option<String>, GrammarError> + Send + Sync,
{
    fn load(&self, name: &str) -> Result<Option<String>, GrammarError> {
        self(name)
    }
}

/// In-memory loader keyed by grammar name
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, String>,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add grammar text under `name`
    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.insert(name, text);
        self
    }

    /// Add grammar text under `name`
    pub fn insert(&mut self, name: &str, text: &str) {
        self.sources.insert(name.to_string(), text.to_string());
    }
}

impl GrammarLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<Option<String>, GrammarError> {
        Ok(self.sources.get(name).cloned())
    }
}

/// Named grammars plus memoized resolutions
pub struct GrammarRegistry {
    grammars: HashMap<String, Grammar>,
    loader: Option<Box<dyn GrammarLoader>>,
    generation: u64,
    effective_cache: HashMap<String, Arc<EffectiveGrammar>>,
    hierarchy_cache: HashMap<String, Vec<String>>,
}

impl std::fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarRegistry")
            .field("grammars", &self.names())
            .field("generation", &self.generation)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRegistry {
    /// Create an empty registry without a loader
    pub fn new() -> Self {
        Self {
            grammars: HashMap::new(),
            loader: None,
            generation: 0,
            effective_cache: HashMap::new(),
            hierarchy_cache: HashMap::new(),
        }
    }

    /// Attach a loader
    pub fn with_loader(mut self, loader: impl GrammarLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Replace the loader
    pub fn set_loader(&mut self, loader: impl GrammarLoader + 'static) {
        self.loader = Some(Box::new(loader));
    }

    /// Current generation
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Registered grammar names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.grammars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether `name` is registered
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.grammars.contains_key(name)
    }

    /// Registered grammar by name
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Grammar> {
        self.grammars.get(name)
    }

    /// Drop every cached resolution and advance the generation
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.effective_cache.clear();
        self.hierarchy_cache.clear();
        log_debug!("grammar registry advanced to generation {}", self.generation);
    }

    // =========================================================================
    // Topology mutation
    // =========================================================================

    /// Register (or replace) a grammar
    pub fn register(&mut self, grammar: Grammar) -> Result<(), GrammarError> {
        if grammar.inherit.iter().any(|d| d.grammar == grammar.name) {
            return Err(GrammarError::SelfInheritance {
                grammar: grammar.name,
            });
        }
        self.grammars.insert(grammar.name.clone(), grammar);
        self.invalidate();
        Ok(())
    }

    /// Parse grammar text (DSL or JSON) and register it; returns its name
    pub fn register_text(&mut self, text: &str) -> Result<String, GrammarError> {
        let grammar = load_grammar_text(text)?;
        let name = grammar.name.clone();
        self.register(grammar)?;
        Ok(name)
    }

    /// Remove a grammar
    pub fn unregister(&mut self, name: &str) -> Option<Grammar> {
        let removed = self.grammars.remove(name);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    /// Add an `Extends` base to a registered grammar
    pub fn add_base_grammar(&mut self, name: &str, base: &str) -> Result<bool, GrammarError> {
        let changed = self.grammar_mut(name)?.add_base_grammar(base)?;
        if changed {
            self.invalidate();
        }
        Ok(changed)
    }

    /// Remove a base from a registered grammar
    pub fn remove_base_grammar(&mut self, name: &str, base: &str) -> Result<bool, GrammarError> {
        let changed = self.grammar_mut(name)?.remove_base_grammar(base);
        if changed {
            self.invalidate();
        }
        Ok(changed)
    }

    /// Point the directive naming `old` at `new`, keeping its position
    pub fn relink_base_grammar(
        &mut self,
        name: &str,
        old: &str,
        new: &str,
    ) -> Result<bool, GrammarError> {
        let grammar = self.grammar_mut(name)?;
        if new == grammar.name {
            return Err(GrammarError::SelfInheritance {
                grammar: grammar.name.clone(),
            });
        }
        if grammar.inherit.iter().any(|d| d.grammar == new) {
            // already linked to `new`; relinking collapses the two directives
            if !grammar.remove_base_grammar(old) {
                return Ok(false);
            }
        } else {
            match grammar.inherit.iter_mut().find(|d| d.grammar == old) {
                Some(directive) => directive.grammar = new.to_string(),
                None => return Ok(false),
            }
        }
        self.invalidate();
        Ok(true)
    }

    fn grammar_mut(&mut self, name: &str) -> Result<&mut Grammar, GrammarError> {
        self.grammars
            .get_mut(name)
            .ok_or_else(|| GrammarError::UnknownGrammar {
                name: name.to_string(),
            })
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Pull `name` and everything it references through the loader
    ///
    /// Names the loader cannot supply are left missing; resolution reports
    /// them with the grammar that referenced them.
    fn ensure_loaded(&mut self, name: &str) -> Result<(), GrammarError> {
        let mut pending = vec![name.to_string()];
        let mut checked: Vec<String> = Vec::new();
        while let Some(next) = pending.pop() {
            if checked.contains(&next) {
                continue;
            }
            if !self.grammars.contains_key(&next) {
                let text = match &self.loader {
                    Some(loader) => loader.load(&next)?,
                    None => None,
                };
                if let Some(text) = text {
                    let grammar = load_grammar_text(&text)?;
                    if grammar.name != next {
                        return Err(GrammarError::Syntax {
                            line: 1,
                            message: format!(
                                "loader returned grammar '{}' for '{}'",
                                grammar.name, next
                            ),
                        });
                    }
                    log_debug!("loaded grammar '{}'", next);
                    self.grammars.insert(next.clone(), grammar);
                }
            }
            if let Some(grammar) = self.grammars.get(&next) {
                pending.extend(grammar.inherit.iter().map(|d| d.grammar.clone()));
                pending.extend(grammar.embeds.iter().map(|e| e.grammar.clone()));
            }
            checked.push(next);
        }
        Ok(())
    }

    /// Topological hierarchy of `name`, most-base first
    pub fn get_inheritance_hierarchy(&mut self, name: &str) -> Result<Vec<&Grammar>, GrammarError> {
        self.ensure_loaded(name)?;
        if !self.hierarchy_cache.contains_key(name) {
            let names: Vec<String> = resolver::resolve_hierarchy(name, |n| self.grammars.get(n))?
                .iter()
                .map(|g| g.name.clone())
                .collect();
            self.hierarchy_cache.insert(name.to_string(), names);
        }
        let names = self.hierarchy_cache.get(name).map(Vec::as_slice).unwrap_or(&[]);
        Ok(names.iter().filter_map(|n| self.grammars.get(n)).collect())
    }

    /// Resolved, validated grammar for `name`, memoized per generation
    pub fn effective(&mut self, name: &str) -> Result<Arc<EffectiveGrammar>, GrammarError> {
        if let Some(cached) = self.effective_cache.get(name) {
            return Ok(Arc::clone(cached));
        }
        self.ensure_loaded(name)?;

        let grammars = &self.grammars;
        let host = resolver::flatten(name, |n| grammars.get(n), self.generation)?;
        let mut embedded = Vec::with_capacity(host.embeds.len());
        for embed in &host.embeds {
            if embed.grammar != host.name {
                embedded.push(resolver::flatten(&embed.grammar, |n| grammars.get(n), self.generation)?);
            }
        }
        let refs: Vec<&EffectiveGrammar> = embedded.iter().collect();
        host.validate(&refs)?;

        let host = Arc::new(host);
        self.effective_cache.insert(name.to_string(), Arc::clone(&host));
        Ok(host)
    }
}
