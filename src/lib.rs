//! Gramstep - incremental multi-path lexer/parser engine
//!
//! Gramstep parses text against grammars that are composed by inheritance,
//! may be ambiguous, and switch sub-languages through path-local contexts.
//! It provides:
//! - A grammar model, a fluent builder and a line-oriented grammar file format
//! - Inheritance resolution into immutable effective grammars, with cycle
//!   detection, compatibility checks and generation-based cache invalidation
//! - A step lexer that splits into one path per ambiguous token
//! - A GLR-style step parser that splits, merges and discards paths and
//!   surfaces every distinct derivation
//! - Per-path contexts that gate rules and terminals and enter embedded
//!   grammars
//! - Optional precedence-based disambiguation
//!
//! ## Quick Start
//!
//! ```rust
//! use gramstep::prelude::*;
//!
//! let mut registry = GrammarRegistry::new();
//! registry
//!     .register_text(
//!         "Grammar: Calc\n\
//!          TokenSplitter: whitespace\n\
//!          NUMBER := /[0-9]+/\n\
//!          <expr> ::= NUMBER '+' NUMBER | NUMBER '-' NUMBER",
//!     )
//!     .unwrap();
//!
//! let outcome = parse(&mut registry, "Calc", "3 + 4").unwrap();
//! assert!(!outcome.is_ambiguous());
//! ```
//!
//! ## Inheritance
//!
//! ```rust
//! use gramstep::prelude::*;
//!
//! let mut registry = GrammarRegistry::new();
//! registry.register_text("Grammar: Base\nN := /[0-9]+/\n<value> ::= N").unwrap();
//! registry
//!     .register_text("Grammar: Ext\nExtends Grammar: Base\n<value> |= '-' N")
//!     .unwrap();
//!
//! let effective = registry.effective("Ext").unwrap();
//! assert_eq!(effective.find_rule("value").len(), 2);
//! assert_eq!(effective.hierarchy, vec!["Base", "Ext"]);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Log path splits, merges, dead ends and cache invalidation
//!   using the `log` crate
//! - `parallel` - Scan lexer paths on the rayon thread pool

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]

// Logging macros must come first so every module can use them
mod logging;

pub mod engine;
pub mod error;
pub mod grammar;
pub mod prelude;
pub mod regex_cache;
pub mod source_location;

/// Re-export commonly used types for convenience
pub use engine::{
    parse, parse_with_config, NamedSource, ParseOutcome, ParseSession, ProductionMatch,
    SessionConfig, SourceContainer, StepOutcome,
};
pub use error::{DeadPathReport, Error, GrammarError, ParseFailure};
pub use grammar::{EffectiveGrammar, Grammar, GrammarBuilder, GrammarRegistry};
pub use source_location::{SourcePosition, Span};
