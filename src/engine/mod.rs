//! Step engine: multi-path incremental lexing and parsing
//!
//! The engine consumes one [`GrammarSet`] (an effective grammar plus the
//! grammars it embeds) and advances every live path one increment per
//! [`ParseSession::step`]: one token per lexer path, then one token per
//! parser path.
//!
//! Paths are plain records in growable collections, linked to their parents
//! by id. Splitting, merging and discarding are bookkeeping over those
//! collections, so a session can be suspended, inspected or dropped after
//! any step.
//!
//! # Example
//!
//! ```rust
//! use gramstep::engine::{parse, ParseOutcome};
//! use gramstep::grammar::GrammarRegistry;
//!
//! let mut registry = GrammarRegistry::new();
//! registry
//!     .register_text("Grammar: Calc\nNUMBER := /[0-9]+/\n<expr> ::= NUMBER '+' NUMBER | NUMBER '-' NUMBER")
//!     .unwrap();
//!
//! match parse(&mut registry, "Calc", "3+4").unwrap() {
//!     ParseOutcome::Matched(matches) => {
//!         let expr = matches.last().unwrap();
//!         assert_eq!(expr.name, "expr");
//!         assert_eq!((expr.span.start, expr.span.end), (0, 3));
//!     }
//!     ParseOutcome::Ambiguous(_) => unreachable!(),
//! }
//! ```

pub mod context;
pub mod disambiguation;
pub mod frontier;
pub mod lexer;
pub mod parser;
pub mod session;

pub use context::{ContextStack, GrammarSet};
pub use frontier::{Continuation, Expect, Frame, PendingMatch};
pub use lexer::{tokenize, LexerPath, LexerStatus, LexerStep, StepLexer};
pub use parser::{History, ParserPath, ParserStatus, ProductionMatch, StepParser};
pub use session::{
    parse, parse_with_config, ParseOutcome, ParseSession, SessionConfig, StepOutcome,
};

use crate::source_location::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the synthetic end-of-input terminal
pub const EOF_TERMINAL: &str = "$eof";

/// Lexer path identifier, unique and increasing within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LexerPathId(pub u32);

impl fmt::Display for LexerPathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Parser path identifier, unique and increasing within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParserPathId(pub u32);

impl fmt::Display for ParserPathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Monotonic id source
#[derive(Debug, Clone, Default)]
pub(crate) struct IdCounter(u32);

impl IdCounter {
    pub(crate) fn next(&mut self) -> u32 {
        let id = self.0;
        self.0 += 1;
        id
    }
}

/// A terminal of one grammar slot in a [`GrammarSet`]
///
/// Slot 0 is the host grammar; embedded grammars follow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerminalRef {
    /// Grammar slot
    pub slot: usize,
    /// Terminal name within that grammar
    pub name: String,
}

impl TerminalRef {
    /// Create a terminal reference
    pub fn new(slot: usize, name: impl Into<String>) -> Self {
        Self {
            slot,
            name: name.into(),
        }
    }

    /// The end-of-input terminal
    pub fn eof() -> Self {
        Self::new(0, EOF_TERMINAL)
    }

    /// Whether this is the end-of-input terminal
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.name == EOF_TERMINAL
    }
}

impl fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A lexed token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Token {
    /// Terminal that matched
    pub terminal: TerminalRef,
    /// Matched byte range
    pub span: Span,
    /// Matched text
    pub text: String,
}

impl Token {
    /// End-of-input token at `offset`
    pub fn eof(offset: usize) -> Self {
        Self {
            terminal: TerminalRef::eof(),
            span: Span::empty(offset),
            text: String::new(),
        }
    }

    /// Whether this is the end-of-input token
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.terminal.is_eof()
    }
}

/// Input text, possibly still arriving
#[derive(Debug, Clone, Default)]
pub struct SourceBuffer {
    text: String,
    complete: bool,
}

impl SourceBuffer {
    /// Empty, unfinished buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished buffer holding `text`
    pub fn complete(text: &str) -> Self {
        Self {
            text: text.to_string(),
            complete: true,
        }
    }

    /// Append a chunk; ignored once the buffer is finished
    pub fn push(&mut self, chunk: &str) {
        if !self.complete {
            self.text.push_str(chunk);
        }
    }

    /// Mark that no more input will arrive
    pub fn finish(&mut self) {
        self.complete = true;
    }

    /// Whether no more input will arrive
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Buffered text
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Buffered length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether nothing is buffered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Something that can be parsed: a name for diagnostics plus text
pub trait SourceContainer {
    /// Name used in diagnostics
    fn source_name(&self) -> &str {
        "<input>"
    }

    /// Full source text
    fn source_text(&self) -> &str;
}

impl SourceContainer for str {
    fn source_text(&self) -> &str {
        self
    }
}

impl SourceContainer for String {
    fn source_text(&self) -> &str {
        self
    }
}

impl<T: SourceContainer + ?Sized> SourceContainer for &T {
    fn source_name(&self) -> &str {
        (**self).source_name()
    }

    fn source_text(&self) -> &str {
        (**self).source_text()
    }
}

/// Source text with a name, e.g. a file path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSource {
    /// Name used in diagnostics
    pub name: String,
    /// Source text
    pub text: String,
}

impl NamedSource {
    /// Create a named source
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

impl SourceContainer for NamedSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn source_text(&self) -> &str {
        &self.text
    }
}
