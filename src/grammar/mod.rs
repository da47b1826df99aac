//! Grammars: authoring, inheritance resolution and registry
//!
//! - [`model`] - one named grammar as authored
//! - [`builder`] / [`dsl`] - two ways to author one
//! - [`resolver`] - composes a grammar with its bases
//! - [`effective`] - the flattened result the engine consumes
//! - [`registry`] - named storage with memoized resolution
//! - [`analysis`] - warnings over an effective grammar

pub mod analysis;
pub mod builder;
pub mod dsl;
pub mod effective;
pub mod model;
pub mod registry;
pub mod resolver;

pub use analysis::{GrammarAnalyzer, GrammarWarning, WarningKind};
pub use builder::GrammarBuilder;
pub use dsl::{load_grammar_text, parse_grammar};
pub use effective::EffectiveGrammar;
pub use model::{
    literal_name, ActionHandler, ActionKind, ActionRef, Associativity, ContextAction,
    ContextDirective, Embedding, ErrorRecoveryStrategy, Grammar, InheritDirective, InheritKind,
    Matcher, Part, PrecedenceEntry, Production, RecoveryKind, RuleMode, SemanticActionBinding,
    Terminal, TokenSplitter,
};
pub use registry::{GrammarLoader, GrammarRegistry, MemoryLoader};
pub use resolver::{flatten, resolve_hierarchy, validate_compatibility, HierarchyGraph};
