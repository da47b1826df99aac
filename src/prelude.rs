//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from gramstep.
//! Importing this module with a wildcard import brings them into scope:
//!
//! ```
//! use gramstep::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Grammars
//! - [`Grammar`] - A grammar as written, before inheritance
//! - [`GrammarBuilder`] - Fluent grammar construction
//! - [`GrammarRegistry`] - Named grammars, resolution and caching
//! - [`EffectiveGrammar`] - A resolved, immutable grammar
//! - [`Part`], [`ContextDirective`] - Production building blocks
//!
//! ## Parsing
//! - [`parse()`] - Parse a source with a registered grammar
//! - [`ParseSession`] - Step-by-step, incremental parsing
//! - [`SessionConfig`] - Path ceilings, first-match mode and friends
//! - [`ParseOutcome`] - One derivation or several
//! - [`ProductionMatch`] - A completed production
//!
//! ## Errors
//! - [`Error`] - Grammar or parse failure
//! - [`GrammarError`] - Grammar topology and definition errors
//! - [`ParseFailure`] - Lexical, syntax and resource failures

// ============================================================================
// Grammars
// ============================================================================

pub use crate::grammar::{
    ContextDirective, EffectiveGrammar, Grammar, GrammarBuilder, GrammarRegistry, MemoryLoader,
    Part,
};

// ============================================================================
// Parsing
// ============================================================================

pub use crate::engine::{
    parse, parse_with_config, ParseOutcome, ParseSession, ProductionMatch, SessionConfig,
    StepOutcome,
};

// ============================================================================
// Errors
// ============================================================================

pub use crate::error::{Error, GrammarError, ParseFailure};
pub use crate::source_location::Span;
