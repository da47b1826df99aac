//! Grammar Model
//!
//! In-memory representation of one named grammar: its productions,
//! terminals, precedence table, semantic-action bindings, error-recovery
//! strategies and inheritance directives. A `Grammar` only describes what it
//! defines *locally*; the [`EffectiveGrammar`](super::EffectiveGrammar)
//! produced by the resolver is what the engine consumes.
//!
//! Grammars serialize to JSON, so they can be stored or shipped between
//! tools without the text surface in [`dsl`](super::dsl).

use crate::error::GrammarError;
use serde::{Deserialize, Serialize};

/// Whether a context directive switches its context on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextAction {
    /// Push the context onto the path's stack
    On,
    /// Pop the most recent activation of the context
    Off,
}

/// `Context(name, on|off)` placed inside a production
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextDirective {
    /// Context name
    pub name: String,
    /// On or off
    pub action: ContextAction,
}

impl ContextDirective {
    /// `Context(name, on)`
    pub fn on(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: ContextAction::On,
        }
    }

    /// `Context(name, off)`
    pub fn off(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: ContextAction::Off,
        }
    }
}

/// One element of a production's part sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Part {
    /// Reference to a terminal by name (literals use their quoted form)
    Terminal(String),
    /// Reference to a rule
    NonTerminal(String),
    /// Context toggle; consumes no input
    Context(ContextDirective),
}

impl Part {
    /// Whether this part consumes input (and therefore gets a `$n` slot)
    #[inline]
    pub fn is_consuming(&self) -> bool {
        !matches!(self, Part::Context(_))
    }
}

/// How a local rule definition combines with an inherited one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuleMode {
    /// `::=` - the local alternatives replace every inherited one
    #[default]
    Replace,
    /// `|=` - the local alternatives are appended to the inherited ones
    Extend,
}

/// `=> { name($1, $3) }` attached to a production
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionRef {
    /// Name of the [`SemanticActionBinding`]
    pub name: String,
    /// 1-based indices of the consuming parts passed as arguments
    pub args: Vec<usize>,
}

/// One alternative of a rule
///
/// Alternatives of the same rule are separate productions sharing a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Production {
    /// Rule name
    pub name: String,
    /// Ordered part sequence (may be empty)
    pub parts: Vec<Part>,
    /// Context that must be active for this alternative to be predicted
    #[serde(default)]
    pub context: Option<String>,
    /// Semantic action invoked on completion
    #[serde(default)]
    pub action: Option<ActionRef>,
    /// Override or extend inherited alternatives
    #[serde(default)]
    pub mode: RuleMode,
}

impl Production {
    /// Create a production with no gate or action
    pub fn new(name: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            name: name.into(),
            parts,
            context: None,
            action: None,
            mode: RuleMode::Replace,
        }
    }

    /// Number of parts that consume input
    pub fn consuming_len(&self) -> usize {
        self.parts.iter().filter(|p| p.is_consuming()).count()
    }

    /// Names of every terminal referenced by this production
    pub fn terminal_refs(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Terminal(t) => Some(t.as_str()),
            _ => None,
        })
    }

    /// Names of every rule referenced by this production
    pub fn rule_refs(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::NonTerminal(n) => Some(n.as_str()),
            _ => None,
        })
    }

    /// First part that is not a context directive
    pub fn first_consuming(&self) -> Option<&Part> {
        self.parts.iter().find(|p| p.is_consuming())
    }
}

/// How a terminal recognizes input
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Matcher {
    /// Exact text
    Literal(String),
    /// Regular expression, matched anchored at the cursor
    Regex(String),
}

/// A lexical token class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Terminal {
    /// Terminal name
    pub name: String,
    /// Literal or regex
    pub matcher: Matcher,
    /// Tie-break priority (higher wins) - only consulted when order matters
    #[serde(default)]
    pub priority: i32,
    /// Whether priority decides ties outright
    #[serde(default)]
    pub order_important: bool,
    /// Context that must be active for the terminal to be attempted
    #[serde(default)]
    pub context: Option<String>,
}

impl Terminal {
    /// Literal terminal named after its quoted text, e.g. `'+'`
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            name: literal_name(&text),
            matcher: Matcher::Literal(text),
            priority: 0,
            order_important: false,
            context: None,
        }
    }

    /// Named terminal
    pub fn new(name: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            name: name.into(),
            matcher,
            priority: 0,
            order_important: false,
            context: None,
        }
    }

    /// Set the priority and mark ordering as important
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self.order_important = true;
        self
    }

    /// Gate the terminal on a context
    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Name an inline literal terminal is registered under
pub fn literal_name(text: &str) -> String {
    format!("'{}'", text)
}

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Associativity {
    /// `a op b op c` = `(a op b) op c`
    Left,
    /// `a op b op c` = `a op (b op c)`
    Right,
    /// `a op b op c` is rejected
    None,
}

/// One row of the precedence table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecedenceEntry {
    /// Terminal name of the operator
    pub operator: String,
    /// Binding strength (higher binds tighter)
    pub level: u32,
    /// Associativity
    pub associativity: Associativity,
}

/// Kinds of semantic action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Named host callback
    Callback,
    /// Text template with `$n` placeholders
    Template,
    /// Script source evaluated by the host
    Script,
    /// Built-in native routine
    Native,
}

/// A semantic action available to productions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemanticActionBinding {
    /// Binding name referenced from `=> { name(...) }`
    pub name: String,
    /// Kind
    pub kind: ActionKind,
    /// Kind-specific payload (callback name, template text, script, routine)
    pub payload: String,
}

/// Receives semantic actions, one method per [`ActionKind`]
///
/// The engine never executes actions itself; translation layers implement
/// this trait and call [`SemanticActionBinding::invoke`] on the bindings of
/// matched productions.
pub trait ActionHandler {
    /// Result of handling one action
    type Output;

    /// Handle a callback binding
    fn callback(&mut self, binding: &SemanticActionBinding, args: &[&str]) -> Self::Output;

    /// Handle a template binding
    fn template(&mut self, binding: &SemanticActionBinding, args: &[&str]) -> Self::Output;

    /// Handle a script binding
    fn script(&mut self, binding: &SemanticActionBinding, args: &[&str]) -> Self::Output;

    /// Handle a native binding
    fn native(&mut self, binding: &SemanticActionBinding, args: &[&str]) -> Self::Output;
}

impl SemanticActionBinding {
    /// Dispatch to the handler method for this binding's kind
    pub fn invoke<H: ActionHandler>(&self, handler: &mut H, args: &[&str]) -> H::Output {
        match self.kind {
            ActionKind::Callback => handler.callback(self, args),
            ActionKind::Template => handler.template(self, args),
            ActionKind::Script => handler.script(self, args),
            ActionKind::Native => handler.native(self, args),
        }
    }
}

/// Kinds of error recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecoveryKind {
    /// Skip input until a synchronization terminal
    Synchronize,
    /// Pretend a missing terminal was present
    Insert,
    /// Drop the offending token
    Delete,
    /// Substitute the offending token
    Replace,
}

/// A named error-recovery strategy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorRecoveryStrategy {
    /// Strategy name
    pub name: String,
    /// Kind
    pub kind: RecoveryKind,
    /// Kind-specific parameters (e.g. synchronization terminals)
    pub parameters: Vec<String>,
}

/// Inter-token text handling
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSplitter {
    /// Tokens are adjacent; nothing is skipped
    None,
    /// Unicode whitespace between tokens is skipped
    Whitespace,
    /// Matches of this regex between tokens are skipped
    Regex(String),
}

/// How a base grammar was named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InheritKind {
    /// `Extends Grammar: <base>`
    Extends,
    /// `Include: <g1>, <g2>`
    Include,
}

/// One inheritance directive
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InheritDirective {
    /// Base grammar name
    pub grammar: String,
    /// Extends or include
    pub kind: InheritKind,
}

/// `Embed: <context> => <grammar>` - while `context` is active on a path,
/// that path predicts rules from `grammar`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Embedding {
    /// Activating context
    pub context: String,
    /// Embedded grammar name
    pub grammar: String,
}

/// One named grammar, as authored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    /// Grammar name
    pub name: String,
    /// Format tag (`bnf`, `ebnf`, ...)
    #[serde(default)]
    pub format: Option<String>,
    /// Base grammars, in declaration order
    #[serde(default)]
    pub inherit: Vec<InheritDirective>,
    /// Whether other grammars may extend this one
    #[serde(default = "default_inheritable")]
    pub inheritable: bool,
    /// Explicit start rule
    #[serde(default)]
    pub start: Option<String>,
    /// Declared token splitter (`None` = not declared here)
    #[serde(default)]
    pub token_splitter: Option<TokenSplitter>,
    /// Productions, in definition order
    #[serde(default)]
    pub productions: Vec<Production>,
    /// Terminals, in definition order
    #[serde(default)]
    pub terminals: Vec<Terminal>,
    /// Precedence table
    #[serde(default)]
    pub precedence: Vec<PrecedenceEntry>,
    /// Semantic-action bindings
    #[serde(default)]
    pub actions: Vec<SemanticActionBinding>,
    /// Error-recovery strategies
    #[serde(default)]
    pub recovery: Vec<ErrorRecoveryStrategy>,
    /// Embedded grammars keyed by context
    #[serde(default)]
    pub embeds: Vec<Embedding>,
}

fn default_inheritable() -> bool {
    true
}

impl Grammar {
    /// Create an empty grammar
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: None,
            inherit: Vec::new(),
            inheritable: true,
            start: None,
            token_splitter: None,
            productions: Vec::new(),
            terminals: Vec::new(),
            precedence: Vec::new(),
            actions: Vec::new(),
            recovery: Vec::new(),
            embeds: Vec::new(),
        }
    }

    /// Add an `Extends` base
    ///
    /// Returns `Ok(false)` if the base was already listed.
    pub fn add_base_grammar(&mut self, base: &str) -> Result<bool, GrammarError> {
        self.add_inherit(base, InheritKind::Extends)
    }

    /// Add an `Include` base
    pub fn add_include(&mut self, base: &str) -> Result<bool, GrammarError> {
        self.add_inherit(base, InheritKind::Include)
    }

    fn add_inherit(&mut self, base: &str, kind: InheritKind) -> Result<bool, GrammarError> {
        if base == self.name {
            return Err(GrammarError::SelfInheritance {
                grammar: self.name.clone(),
            });
        }
        if self.inherit.iter().any(|d| d.grammar == base) {
            return Ok(false);
        }
        self.inherit.push(InheritDirective {
            grammar: base.to_string(),
            kind,
        });
        Ok(true)
    }

    /// Remove a base; returns whether it was listed
    pub fn remove_base_grammar(&mut self, base: &str) -> bool {
        let before = self.inherit.len();
        self.inherit.retain(|d| d.grammar != base);
        self.inherit.len() != before
    }

    /// Base names in override priority order: `Extends` bases first, then
    /// `Include` bases, each in declaration order
    pub fn bases(&self) -> Vec<&str> {
        let extends = self
            .inherit
            .iter()
            .filter(|d| d.kind == InheritKind::Extends);
        let includes = self
            .inherit
            .iter()
            .filter(|d| d.kind == InheritKind::Include);
        extends.chain(includes).map(|d| d.grammar.as_str()).collect()
    }

    /// Append a production
    pub fn add_production(&mut self, production: Production) -> &mut Self {
        self.productions.push(production);
        self
    }

    /// Add or replace a terminal definition
    pub fn add_terminal(&mut self, terminal: Terminal) -> &mut Self {
        if let Some(existing) = self.terminals.iter_mut().find(|t| t.name == terminal.name) {
            *existing = terminal;
        } else {
            self.terminals.push(terminal);
        }
        self
    }

    /// Ensure an implicit literal terminal exists; returns its name
    pub fn define_literal(&mut self, text: &str) -> String {
        let name = literal_name(text);
        if self.find_terminal(&name).is_none() {
            self.terminals.push(Terminal::literal(text));
        }
        name
    }

    /// Local alternatives of `rule`, in definition order
    pub fn find_rule(&self, rule: &str) -> Vec<&Production> {
        self.productions.iter().filter(|p| p.name == rule).collect()
    }

    /// Whether `rule` is defined locally
    pub fn defines_rule(&self, rule: &str) -> bool {
        self.productions.iter().any(|p| p.name == rule)
    }

    /// Local terminal lookup
    pub fn find_terminal(&self, name: &str) -> Option<&Terminal> {
        self.terminals.iter().find(|t| t.name == name)
    }

    /// Local semantic-action lookup
    pub fn find_action(&self, name: &str) -> Option<&SemanticActionBinding> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Local precedence lookup
    pub fn find_precedence(&self, operator: &str) -> Option<&PrecedenceEntry> {
        self.precedence.iter().find(|p| p.operator == operator)
    }

    /// Local recovery-strategy lookup
    pub fn find_recovery(&self, name: &str) -> Option<&ErrorRecoveryStrategy> {
        self.recovery.iter().find(|r| r.name == name)
    }

    /// Rule names in first-definition order
    pub fn rule_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for p in &self.productions {
            if !names.contains(&p.name.as_str()) {
                names.push(&p.name);
            }
        }
        names
    }

    /// Explicit start rule, or the first locally defined rule
    pub fn start_rule(&self) -> Option<&str> {
        self.start
            .as_deref()
            .or_else(|| self.productions.first().map(|p| p.name.as_str()))
    }

    /// Serialize to JSON
    #[inline]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    pub fn from_json(s: &str) -> Result<Self, GrammarError> {
        let grammar: Grammar = serde_json::from_str(s).map_err(|e| GrammarError::Json {
            message: e.to_string(),
        })?;
        if grammar.inherit.iter().any(|d| d.grammar == grammar.name) {
            return Err(GrammarError::SelfInheritance {
                grammar: grammar.name,
            });
        }
        Ok(grammar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_inheritance_rejected() {
        let mut g = Grammar::new("A");
        let err = g.add_base_grammar("A").unwrap_err();
        assert_eq!(
            err,
            GrammarError::SelfInheritance {
                grammar: "A".into()
            }
        );
        assert!(g.inherit.is_empty());
    }

    #[test]
    fn test_base_mutators_only_touch_directives() {
        let mut g = Grammar::new("A");
        g.add_production(Production::new("r", vec![]));
        assert!(g.add_base_grammar("B").unwrap());
        assert!(!g.add_base_grammar("B").unwrap());
        assert!(g.add_include("C").unwrap());
        assert_eq!(g.bases(), vec!["B", "C"]);
        assert!(g.remove_base_grammar("B"));
        assert!(!g.remove_base_grammar("B"));
        assert_eq!(g.bases(), vec!["C"]);
        assert_eq!(g.productions.len(), 1);
    }

    #[test]
    fn test_extends_ordered_before_includes() {
        let mut g = Grammar::new("A");
        g.add_include("I").unwrap();
        g.add_base_grammar("E").unwrap();
        assert_eq!(g.bases(), vec!["E", "I"]);
    }

    #[test]
    fn test_define_literal_is_idempotent() {
        let mut g = Grammar::new("A");
        assert_eq!(g.define_literal("+"), "'+'");
        assert_eq!(g.define_literal("+"), "'+'");
        assert_eq!(g.terminals.len(), 1);
        assert_eq!(
            g.find_terminal("'+'").map(|t| &t.matcher),
            Some(&Matcher::Literal("+".into()))
        );
    }

    #[test]
    fn test_productions_hash_by_mode() {
        let replace = Production::new("e", vec![Part::Terminal("N".into())]);
        let mut extend = replace.clone();
        extend.mode = RuleMode::Extend;

        let mut seen = hashbrown::HashSet::new();
        assert!(seen.insert(replace.clone()));
        assert!(seen.insert(extend));
        assert!(!seen.insert(replace));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut g = Grammar::new("Calc");
        g.add_terminal(Terminal::new("NUMBER", Matcher::Regex("[0-9]+".into())));
        g.add_production(Production::new(
            "expr",
            vec![Part::Terminal("NUMBER".into())],
        ));
        let json = g.to_json().unwrap();
        assert_eq!(Grammar::from_json(&json).unwrap(), g);
    }

    #[test]
    fn test_json_defaults_inheritable() {
        let g = Grammar::from_json(r#"{ "name": "G" }"#).unwrap();
        assert!(g.inheritable);
        assert!(g.productions.is_empty());
    }

    struct KindRecorder(Vec<&'static str>);

    impl ActionHandler for KindRecorder {
        type Output = usize;

        fn callback(&mut self, _: &SemanticActionBinding, args: &[&str]) -> usize {
            self.0.push("callback");
            args.len()
        }

        fn template(&mut self, _: &SemanticActionBinding, args: &[&str]) -> usize {
            self.0.push("template");
            args.len()
        }

        fn script(&mut self, _: &SemanticActionBinding, args: &[&str]) -> usize {
            self.0.push("script");
            args.len()
        }

        fn native(&mut self, _: &SemanticActionBinding, args: &[&str]) -> usize {
            self.0.push("native");
            args.len()
        }
    }

    #[test]
    fn test_action_dispatch_by_kind() {
        let mut handler = KindRecorder(Vec::new());
        for kind in [
            ActionKind::Callback,
            ActionKind::Template,
            ActionKind::Script,
            ActionKind::Native,
        ] {
            let binding = SemanticActionBinding {
                name: "a".into(),
                kind,
                payload: String::new(),
            };
            assert_eq!(binding.invoke(&mut handler, &["1", "2"]), 2);
        }
        assert_eq!(handler.0, vec!["callback", "template", "script", "native"]);
    }
}
