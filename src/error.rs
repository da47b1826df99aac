//! Error taxonomy
//!
//! Two families of errors exist:
//!
//! - [`GrammarError`] - topology and definition problems, detected eagerly
//!   while grammars are registered and resolved, before any input is read.
//! - [`ParseFailure`] - raised only once *every* lexer or parser path is dead.
//!   Individual dead ends are silent.
//!
//! [`Error`] wraps both and is what [`crate::engine::parse`] returns.
//!
//! # Example Output
//!
//! ```text
//! Syntax error at line 1, column 3: found '*', expected one of ['+', '-']
//! 3 * 4
//!   ^
//! ```

use crate::engine::ParserPathId;
use crate::source_location::{get_line_at_offset, SourcePosition};
use std::fmt;

/// Errors raised while building, registering or resolving grammars
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// The base-grammar graph contains a cycle
    CyclicDependency {
        /// Grammar names along the cycle; first and last entries are equal
        cycle: Vec<String>,
    },

    /// Grammars in one hierarchy declare conflicting lexical conventions
    IncompatibleFormat {
        /// Grammar whose declaration conflicts
        grammar: String,
        /// Grammar that declared the convention first
        conflicting_with: String,
        /// What disagrees
        detail: String,
    },

    /// A base grammar is neither registered nor loadable
    MissingBaseGrammar {
        /// The inheriting grammar
        grammar: String,
        /// The base that could not be found
        base: String,
    },

    /// A grammar tried to inherit from itself
    SelfInheritance {
        /// The offending grammar
        grammar: String,
    },

    /// A base grammar is marked non-inheritable
    NotInheritable {
        /// The inheriting grammar
        grammar: String,
        /// The sealed base
        base: String,
    },

    /// A production references a rule nobody defines
    UndefinedRule {
        /// Grammar being resolved
        grammar: String,
        /// Missing rule name
        rule: String,
        /// Rule whose production holds the reference
        referenced_by: String,
    },

    /// A production references a named terminal nobody defines
    UndefinedTerminal {
        /// Grammar being resolved
        grammar: String,
        /// Missing terminal name
        terminal: String,
        /// Rule whose production holds the reference
        referenced_by: String,
    },

    /// A terminal's regex does not compile
    InvalidPattern {
        /// Grammar that defines the terminal
        grammar: String,
        /// Terminal name
        terminal: String,
        /// Compiler message
        reason: String,
    },

    /// No start rule can be determined, or the named one is undefined
    MissingStartRule {
        /// Grammar being resolved
        grammar: String,
    },

    /// Lookup of a grammar that is neither registered nor loadable
    UnknownGrammar {
        /// Requested name
        name: String,
    },

    /// Grammar file text could not be read
    Syntax {
        /// 1-based line of the problem
        line: usize,
        /// What went wrong
        message: String,
    },

    /// JSON grammar could not be decoded
    Json {
        /// serde_json message
        message: String,
    },
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::CyclicDependency { cycle } => {
                write!(f, "Cyclic grammar inheritance: {}", cycle.join(" -> "))
            }
            GrammarError::IncompatibleFormat {
                grammar,
                conflicting_with,
                detail,
            } => write!(
                f,
                "Grammar '{}' is incompatible with '{}': {}",
                grammar, conflicting_with, detail
            ),
            GrammarError::MissingBaseGrammar { grammar, base } => {
                write!(f, "Grammar '{}' extends unknown grammar '{}'", grammar, base)
            }
            GrammarError::SelfInheritance { grammar } => {
                write!(f, "Grammar '{}' cannot inherit from itself", grammar)
            }
            GrammarError::NotInheritable { grammar, base } => write!(
                f,
                "Grammar '{}' cannot extend '{}': base is not inheritable",
                grammar, base
            ),
            GrammarError::UndefinedRule {
                grammar,
                rule,
                referenced_by,
            } => write!(
                f,
                "Grammar '{}': rule <{}> references undefined rule <{}>",
                grammar, referenced_by, rule
            ),
            GrammarError::UndefinedTerminal {
                grammar,
                terminal,
                referenced_by,
            } => write!(
                f,
                "Grammar '{}': rule <{}> references undefined terminal {}",
                grammar, referenced_by, terminal
            ),
            GrammarError::InvalidPattern {
                grammar,
                terminal,
                reason,
            } => write!(
                f,
                "Grammar '{}': terminal {} has an invalid pattern: {}",
                grammar, terminal, reason
            ),
            GrammarError::MissingStartRule { grammar } => {
                write!(f, "Grammar '{}' has no usable start rule", grammar)
            }
            GrammarError::UnknownGrammar { name } => write!(f, "Unknown grammar '{}'", name),
            GrammarError::Syntax { line, message } => {
                write!(f, "Grammar syntax error on line {}: {}", line, message)
            }
            GrammarError::Json { message } => write!(f, "Invalid grammar JSON: {}", message),
        }
    }
}

impl std::error::Error for GrammarError {}

/// Why one parser path died, kept for the final report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadPathReport {
    /// The dead parser path
    pub path: ParserPathId,
    /// Byte offset where the path stopped
    pub position: usize,
    /// Terminal the path could not accept (`None` for lexical dead ends)
    pub found: Option<String>,
    /// Terminals the path's frontier would have accepted
    pub expected: Vec<String>,
}

/// Input-level failure, raised once no live path remains
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// Every lexer path is blocked
    Lexical {
        /// Furthest cursor any blocked path reached
        position: usize,
        /// Terminals attempted there
        attempted: Vec<String>,
    },

    /// No parser path accepts the input
    Syntax {
        /// Position of the longest-matched dead path
        position: usize,
        /// The terminal that killed that path
        found: Option<String>,
        /// Expected-continuation set of that path
        expected: Vec<String>,
        /// Every dead path, ordered by id
        dead_paths: Vec<DeadPathReport>,
    },

    /// The live-path cap discarded the paths that could have succeeded
    AmbiguityExhaustion {
        /// Configured ceiling
        max_paths: usize,
        /// Number of paths dropped over the session
        dropped: usize,
    },

    /// `run` hit its configured step budget
    StepBudgetExceeded {
        /// Steps taken
        steps: usize,
    },
}

impl ParseFailure {
    /// Byte offset the failure points at, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseFailure::Lexical { position, .. } | ParseFailure::Syntax { position, .. } => {
                Some(*position)
            }
            ParseFailure::AmbiguityExhaustion { .. } | ParseFailure::StepBudgetExceeded { .. } => {
                None
            }
        }
    }

    /// Render the failure with line/column and a caret under the source line
    pub fn format_with_source(&self, source: &str) -> String {
        let Some(offset) = self.position() else {
            return format!("{}\n", self);
        };
        let pos = SourcePosition::from_offset(source, offset);

        let mut output = String::new();
        let headline = match self {
            ParseFailure::Lexical { attempted, .. } => {
                format!("Lexical error at {}: no terminal matches (tried {:?})", pos, attempted)
            }
            ParseFailure::Syntax {
                found, expected, ..
            } => format!(
                "Syntax error at {}: found {}, expected one of {:?}",
                pos,
                found.as_deref().unwrap_or("nothing"),
                expected
            ),
            _ => self.to_string(),
        };
        output.push_str(&headline);
        output.push('\n');
        output.push_str(get_line_at_offset(source, offset));
        output.push('\n');
        for _ in 0..pos.column.saturating_sub(1) {
            output.push(' ');
        }
        output.push_str("^\n");
        output
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::Lexical {
                position,
                attempted,
            } => write!(
                f,
                "Lexical error at byte {}: no terminal matches (tried {:?})",
                position, attempted
            ),
            ParseFailure::Syntax {
                position,
                found,
                expected,
                ..
            } => write!(
                f,
                "Syntax error at byte {}: found {}, expected one of {:?}",
                position,
                found.as_deref().unwrap_or("nothing"),
                expected
            ),
            ParseFailure::AmbiguityExhaustion { max_paths, dropped } => write!(
                f,
                "Ambiguity exhausted: {} paths dropped at a ceiling of {}",
                dropped, max_paths
            ),
            ParseFailure::StepBudgetExceeded { steps } => {
                write!(f, "Step budget exceeded after {} steps", steps)
            }
        }
    }
}

impl std::error::Error for ParseFailure {}

/// Any error the engine can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Grammar topology or definition error
    Grammar(GrammarError),
    /// Input could not be parsed
    Parse(ParseFailure),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Grammar(e) => e.fmt(f),
            Error::Parse(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Grammar(e) => Some(e),
            Error::Parse(e) => Some(e),
        }
    }
}

impl From<GrammarError> for Error {
    fn from(e: GrammarError) -> Self {
        Error::Grammar(e)
    }
}

impl From<ParseFailure> for Error {
    fn from(e: ParseFailure) -> Self {
        Error::Parse(e)
    }
}
