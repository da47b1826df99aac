//! Parse session - the cooperative driving loop
//!
//! A [`ParseSession`] owns one [`StepLexer`], one [`StepParser`] and the
//! input buffer. Each [`ParseSession::step`] is one lexer sweep followed by
//! one parser sweep; between steps the caller may feed more input, inject a
//! context on a path, inspect paths, or simply drop the session.
//!
//! # Example
//!
//! ```rust
//! use gramstep::engine::{ParseOutcome, ParseSession, SessionConfig, StepOutcome};
//! use gramstep::grammar::GrammarRegistry;
//!
//! let mut registry = GrammarRegistry::new();
//! registry
//!     .register_text("Grammar: Sum\nTokenSplitter: whitespace\nN := /[0-9]+/\n<sum> ::= N '+' N")
//!     .unwrap();
//!
//! let mut session = ParseSession::from_registry(&mut registry, "Sum", SessionConfig::default()).unwrap();
//! session.feed("12 +");
//! assert_eq!(session.run_available(), StepOutcome::NeedInput);
//! session.feed(" 30");
//! let outcome = session.run().unwrap();
//! assert!(matches!(outcome, ParseOutcome::Matched(_)));
//! ```

use super::context::GrammarSet;
use super::lexer::StepLexer;
use super::parser::{ProductionMatch, StepParser};
use super::{ParserPathId, SourceBuffer, SourceContainer};
use crate::error::{Error, GrammarError, ParseFailure};
use crate::grammar::{ContextDirective, GrammarAnalyzer, GrammarRegistry, GrammarWarning};
use crate::logging::{log_debug, log_warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default live parser-path ceiling
pub const DEFAULT_MAX_PATHS: usize = 64;

/// Default per-path frontier ceiling
pub const DEFAULT_MAX_FRONTIER: usize = 4096;

/// Default step budget for [`ParseSession::run`] (0 = unlimited)
pub const DEFAULT_MAX_STEPS: usize = 0;

/// Configuration options for a parse session
///
/// Every field has a default, so a partial JSON object is a valid
/// configuration.
///
/// # Example
///
/// ```rust
/// use gramstep::engine::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_max_paths(16)
///     .with_first_match(true);
/// assert_eq!(config.max_paths, 16);
///
/// let from_json = SessionConfig::from_json(r#"{"max_steps": 100}"#).unwrap();
/// assert_eq!(from_json.max_steps, 100);
/// assert_eq!(from_json.max_paths, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Live parser-path ceiling; excess paths are dropped
    pub max_paths: usize,

    /// End the parse on the first accepting path
    pub first_match: bool,

    /// Let the lexer attempt the parser's valid terminals first
    pub filter_terminals: bool,

    /// Prune shift/complete conflicts with the precedence table
    pub apply_precedence: bool,

    /// Per-path frontier ceiling
    pub max_frontier: usize,

    /// Step budget for `run` (0 = unlimited)
    pub max_steps: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_paths: DEFAULT_MAX_PATHS,
            first_match: false,
            filter_terminals: true,
            apply_precedence: true,
            max_frontier: DEFAULT_MAX_FRONTIER,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl SessionConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the live parser-path ceiling
    pub fn with_max_paths(mut self, max_paths: usize) -> Self {
        self.max_paths = max_paths.max(1);
        self
    }

    /// Enable or disable first-match mode
    pub fn with_first_match(mut self, first_match: bool) -> Self {
        self.first_match = first_match;
        self
    }

    /// Enable or disable lexer filtering by the parser's valid terminals
    pub fn with_filter_terminals(mut self, filter: bool) -> Self {
        self.filter_terminals = filter;
        self
    }

    /// Enable or disable the precedence filter
    pub fn with_apply_precedence(mut self, apply: bool) -> Self {
        self.apply_precedence = apply;
        self
    }

    /// Set the per-path frontier ceiling
    pub fn with_max_frontier(mut self, max_frontier: usize) -> Self {
        self.max_frontier = max_frontier.max(1);
        self
    }

    /// Set the step budget (0 = unlimited)
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Result of a successful parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Exactly one derivation, matches in completion order
    Matched(Vec<ProductionMatch>),
    /// Several distinct derivations, ordered by the path that found them
    Ambiguous(Vec<Vec<ProductionMatch>>),
}

impl ParseOutcome {
    /// Whether more than one derivation was found
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ParseOutcome::Ambiguous(_))
    }

    /// Every derivation
    pub fn derivations(&self) -> Vec<&[ProductionMatch]> {
        match self {
            ParseOutcome::Matched(matches) => vec![matches.as_slice()],
            ParseOutcome::Ambiguous(all) => all.iter().map(Vec::as_slice).collect(),
        }
    }
}

/// What one [`ParseSession::step`] achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// At least one path moved
    Progress,
    /// Every live path waits for more input
    NeedInput,
    /// No live path remains; see [`ParseSession::outcome`]
    Finished,
}

/// One incremental parse over a [`GrammarSet`]
#[derive(Debug, Clone)]
pub struct ParseSession {
    grammars: Arc<GrammarSet>,
    config: SessionConfig,
    source: SourceBuffer,
    lexer: StepLexer,
    parser: StepParser,
    steps: usize,
}

impl ParseSession {
    /// Start a session with an empty, unfinished input buffer
    pub fn new(grammars: Arc<GrammarSet>, config: SessionConfig) -> Self {
        let mut lexer = StepLexer::new(Arc::clone(&grammars), true);
        let mut parser = StepParser::new(Arc::clone(&grammars), config.clone());
        parser.start(&mut lexer);

        let session = Self {
            grammars,
            config,
            source: SourceBuffer::new(),
            lexer,
            parser,
            steps: 0,
        };
        #[cfg(feature = "logging")]
        for warning in session.warnings() {
            log_warn!("{} '{}': {}", warning.kind, warning.subject, warning.message);
        }
        session
    }

    /// Resolve `name` (and what it embeds) through `registry`, then start
    pub fn from_registry(
        registry: &mut GrammarRegistry,
        name: &str,
        config: SessionConfig,
    ) -> Result<Self, GrammarError> {
        let grammars = GrammarSet::resolve(registry, name)?;
        Ok(Self::new(Arc::new(grammars), config))
    }

    /// Analysis warnings for every grammar in the set
    pub fn warnings(&self) -> Vec<GrammarWarning> {
        let mut warnings = Vec::new();
        for slot in 0..self.grammars.len() {
            let grammar = self.grammars.get(slot);
            // embedded grammars are entered through a host context
            let entered: Vec<&str> = self
                .grammars
                .host()
                .embeds
                .iter()
                .filter(|e| e.grammar == grammar.name)
                .map(|e| e.context.as_str())
                .collect();
            warnings.extend(
                GrammarAnalyzer::new(grammar)
                    .with_external_contexts(entered)
                    .analyze(),
            );
        }
        warnings
    }

    /// Append input
    pub fn feed(&mut self, chunk: &str) {
        self.source.push(chunk);
    }

    /// Declare the end of input
    pub fn finish(&mut self) {
        self.source.finish();
    }

    /// One lexer sweep then one parser sweep
    pub fn step(&mut self) -> StepOutcome {
        if self.parser.is_finished() {
            return StepOutcome::Finished;
        }
        let filter = self.config.filter_terminals;
        let parser = &self.parser;
        let sweep = self.lexer.next_tokens(&self.source, |id| {
            if filter {
                parser.valid_terminals_for_lexer_path(id)
            } else {
                None
            }
        });
        self.parser.consume(&mut self.lexer, &sweep);
        self.steps += 1;

        if self.parser.is_finished() {
            StepOutcome::Finished
        } else if sweep.tokens.is_empty() && sweep.splits.is_empty() && sweep.blocked.is_empty() {
            StepOutcome::NeedInput
        } else {
            StepOutcome::Progress
        }
    }

    /// Step until every path waits for input or the parse finishes
    pub fn run_available(&mut self) -> StepOutcome {
        loop {
            match self.step() {
                StepOutcome::Progress => continue,
                done => return done,
            }
        }
    }

    /// Finish the input and step to completion
    pub fn run(&mut self) -> Result<ParseOutcome, ParseFailure> {
        self.finish();
        loop {
            if let Some(result) = self.parser.outcome() {
                return result;
            }
            if self.config.max_steps > 0 && self.steps >= self.config.max_steps {
                log_warn!("step budget of {} exhausted", self.config.max_steps);
                return Err(ParseFailure::StepBudgetExceeded { steps: self.steps });
            }
            self.step();
        }
    }

    /// Final result, `None` while paths are live
    pub fn outcome(&self) -> Option<Result<ParseOutcome, ParseFailure>> {
        self.parser.outcome()
    }

    /// Apply a context directive to one live path
    pub fn set_context(&mut self, path: ParserPathId, directive: &ContextDirective) -> bool {
        self.parser.set_context(&mut self.lexer, path, directive)
    }

    /// Ids of the live parser paths, ordered
    pub fn live_paths(&self) -> Vec<ParserPathId> {
        self.parser.live_paths()
    }

    /// Contexts active on `path`, outermost first
    pub fn get_active_contexts(&self, path: ParserPathId) -> Vec<String> {
        self.parser.get_active_contexts(path)
    }

    /// Steps taken so far
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Grammars in use
    pub fn grammars(&self) -> &GrammarSet {
        &self.grammars
    }

    /// Configuration in use
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Buffered input
    pub fn source(&self) -> &SourceBuffer {
        &self.source
    }

    /// Lexer state, for inspection
    pub fn lexer(&self) -> &StepLexer {
        &self.lexer
    }

    /// Parser state, for inspection
    pub fn parser(&self) -> &StepParser {
        &self.parser
    }
}

/// Parse `source` with grammar `name` using the default configuration
pub fn parse<S>(registry: &mut GrammarRegistry, name: &str, source: &S) -> Result<ParseOutcome, Error>
where
    S: SourceContainer + ?Sized,
{
    parse_with_config(registry, name, source, SessionConfig::default())
}

/// Parse `source` with grammar `name`
pub fn parse_with_config<S>(
    registry: &mut GrammarRegistry,
    name: &str,
    source: &S,
    config: SessionConfig,
) -> Result<ParseOutcome, Error>
where
    S: SourceContainer + ?Sized,
{
    let mut session = ParseSession::from_registry(registry, name, config)?;
    session.feed(source.source_text());
    session.run().map_err(|failure| {
        log_debug!("{}: {}", source.source_name(), failure);
        Error::Parse(failure)
    })
}
