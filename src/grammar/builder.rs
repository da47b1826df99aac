//! Grammar Builder - fluent construction of grammars in Rust
//!
//! # Example
//!
//! ```rust
//! use gramstep::grammar::builder::*;
//!
//! let grammar = GrammarBuilder::new("Calc")
//!     .regex("NUMBER", "[0-9]+")
//!     .rule("expr", vec![t("NUMBER"), lit("+"), t("NUMBER")])
//!     .rule("expr", vec![t("NUMBER"), lit("-"), t("NUMBER")])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(grammar.find_rule("expr").len(), 2);
//! assert!(grammar.find_terminal("'+'").is_some());
//! ```

use super::model::{
    literal_name, ActionKind, ActionRef, Associativity, ContextDirective, Embedding,
    ErrorRecoveryStrategy, Grammar, Matcher, Part, PrecedenceEntry, Production, RecoveryKind,
    RuleMode, SemanticActionBinding, Terminal, TokenSplitter,
};
use crate::error::GrammarError;

/// Reference a named terminal
pub fn t(name: &str) -> Part {
    Part::Terminal(name.to_string())
}

/// Reference an inline literal terminal; the builder defines it on use
pub fn lit(text: &str) -> Part {
    Part::Terminal(literal_name(text))
}

/// Reference a rule
pub fn nt(name: &str) -> Part {
    Part::NonTerminal(name.to_string())
}

/// `Context(name, on)`
pub fn ctx_on(name: &str) -> Part {
    Part::Context(ContextDirective::on(name))
}

/// `Context(name, off)`
pub fn ctx_off(name: &str) -> Part {
    Part::Context(ContextDirective::off(name))
}

/// Inline literal text behind a quoted terminal name
fn literal_text(name: &str) -> Option<&str> {
    name.strip_prefix('\'')?.strip_suffix('\'')
}

/// Builder for [`Grammar`]
///
/// Errors (such as self-inheritance) are deferred to [`build`](Self::build)
/// so construction can stay chained.
#[derive(Debug)]
pub struct GrammarBuilder {
    grammar: Grammar,
    next_level: u32,
    error: Option<GrammarError>,
}

impl GrammarBuilder {
    /// Start a grammar named `name`
    pub fn new(name: &str) -> Self {
        Self {
            grammar: Grammar::new(name),
            next_level: 1,
            error: None,
        }
    }

    fn record(&mut self, result: Result<bool, GrammarError>) {
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
    }

    /// Set the format tag
    pub fn format(mut self, tag: &str) -> Self {
        self.grammar.format = Some(tag.to_string());
        self
    }

    /// Add an `Extends` base
    pub fn extends(mut self, base: &str) -> Self {
        let result = self.grammar.add_base_grammar(base);
        self.record(result);
        self
    }

    /// Add an `Include` base
    pub fn include(mut self, base: &str) -> Self {
        let result = self.grammar.add_include(base);
        self.record(result);
        self
    }

    /// Mark whether other grammars may inherit from this one
    pub fn inheritable(mut self, inheritable: bool) -> Self {
        self.grammar.inheritable = inheritable;
        self
    }

    /// Set the start rule
    pub fn start(mut self, rule: &str) -> Self {
        self.grammar.start = Some(rule.to_string());
        self
    }

    /// Declare the token splitter
    pub fn splitter(mut self, splitter: TokenSplitter) -> Self {
        self.grammar.token_splitter = Some(splitter);
        self
    }

    /// Embed `grammar` while `context` is active
    pub fn embed(mut self, context: &str, grammar: &str) -> Self {
        self.grammar.embeds.retain(|e| e.context != context);
        self.grammar.embeds.push(Embedding {
            context: context.to_string(),
            grammar: grammar.to_string(),
        });
        self
    }

    /// Define a regex terminal
    pub fn regex(mut self, name: &str, pattern: &str) -> Self {
        self.grammar
            .add_terminal(Terminal::new(name, Matcher::Regex(pattern.to_string())));
        self
    }

    /// Define a named literal terminal
    pub fn literal(mut self, name: &str, text: &str) -> Self {
        self.grammar
            .add_terminal(Terminal::new(name, Matcher::Literal(text.to_string())));
        self
    }

    /// Define a fully specified terminal
    pub fn terminal(mut self, terminal: Terminal) -> Self {
        self.grammar.add_terminal(terminal);
        self
    }

    /// Add one alternative of `name`
    pub fn rule(self, name: &str, parts: Vec<Part>) -> Self {
        self.production(Production::new(name, parts))
    }

    /// Add one alternative of `name`, eligible only while `context` is active
    pub fn rule_in(self, name: &str, context: &str, parts: Vec<Part>) -> Self {
        let mut production = Production::new(name, parts);
        production.context = Some(context.to_string());
        self.production(production)
    }

    /// Add one alternative of `name` with a semantic action
    pub fn rule_with_action(self, name: &str, parts: Vec<Part>, action: &str, args: &[usize]) -> Self {
        let mut production = Production::new(name, parts);
        production.action = Some(ActionRef {
            name: action.to_string(),
            args: args.to_vec(),
        });
        self.production(production)
    }

    /// Append an alternative to the inherited definition of `name`
    pub fn extend_rule(self, name: &str, parts: Vec<Part>) -> Self {
        let mut production = Production::new(name, parts);
        production.mode = RuleMode::Extend;
        self.production(production)
    }

    /// Add a production, defining any inline literal it references
    pub fn production(mut self, production: Production) -> Self {
        for name in production.terminal_refs() {
            if let Some(text) = literal_text(name) {
                if !text.is_empty() && self.grammar.find_terminal(name).is_none() {
                    self.grammar.terminals.push(Terminal::literal(text));
                }
            }
        }
        self.grammar.add_production(production);
        self
    }

    /// Add a precedence level; each call binds tighter than the previous one
    ///
    /// Operators are terminal references, typically built with [`lit`].
    pub fn precedence(mut self, associativity: Associativity, operators: &[Part]) -> Self {
        let level = self.next_level;
        self.next_level += 1;
        for op in operators {
            if let Part::Terminal(name) = op {
                self.grammar.precedence.retain(|p| &p.operator != name);
                self.grammar.precedence.push(PrecedenceEntry {
                    operator: name.clone(),
                    level,
                    associativity,
                });
            }
        }
        self
    }

    /// Bind a semantic action
    pub fn action(mut self, name: &str, kind: ActionKind, payload: &str) -> Self {
        self.grammar.actions.retain(|a| a.name != name);
        self.grammar.actions.push(SemanticActionBinding {
            name: name.to_string(),
            kind,
            payload: payload.to_string(),
        });
        self
    }

    /// Define an error-recovery strategy
    pub fn recovery(mut self, name: &str, kind: RecoveryKind, parameters: &[&str]) -> Self {
        self.grammar.recovery.retain(|r| r.name != name);
        self.grammar.recovery.push(ErrorRecoveryStrategy {
            name: name.to_string(),
            kind,
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    /// Finish construction
    pub fn build(self) -> Result<Grammar, GrammarError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.grammar),
        }
    }
}
