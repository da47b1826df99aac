//! Grammar file surface
//!
//! A line-oriented text format for grammars. `#` or `//` starts a comment and
//! a line beginning with `|` continues the previous rule.
//!
//! # Example
//!
//! ```rust
//! use gramstep::grammar::dsl::parse_grammar;
//!
//! let grammar = parse_grammar(r#"
//! Grammar: Calc
//! TokenSplitter: whitespace
//!
//! NUMBER := /[0-9]+/
//!
//! <expr> ::= NUMBER '+' NUMBER => { add($1, $3) }
//!          | NUMBER '-' NUMBER
//! "#).unwrap();
//!
//! assert_eq!(grammar.name, "Calc");
//! assert_eq!(grammar.find_rule("expr").len(), 2);
//! ```
//!
//! # Directives
//!
//! | Line | Meaning |
//! |------|---------|
//! | `Grammar: <name>` | grammar name (required) |
//! | `Format: <tag>` | format tag |
//! | `TokenSplitter: none \| whitespace \| /re/` | inter-token skipping |
//! | `Extends Grammar: <base>` | extends a base |
//! | `Include: <g1>, <g2>` | includes bases |
//! | `Inheritable: true \| false` | whether others may extend this grammar |
//! | `Start: <rule>` | start rule |
//! | `Embed: <ctx> => <grammar>` | embedded grammar while `ctx` is active |
//! | `NAME (ctx) := /re/ \| 'lit' @priority(n) @ordered` | terminal |
//! | `<rule (ctx)> ::= ... \| ...` | rule (replaces inherited alternatives) |
//! | `<rule> \|= ...` | rule extension (appends to inherited alternatives) |
//! | `Precedence: left \| right \| none ops...` | precedence level; later lines bind tighter |
//! | `Action <name>: <kind> <payload>` | semantic-action binding |
//! | `Recovery <name>: <kind> <params...>` | error-recovery strategy |

use super::model::{
    ActionKind, ActionRef, Associativity, ContextDirective, Embedding, ErrorRecoveryStrategy,
    Grammar, Matcher, Part, PrecedenceEntry, Production, RecoveryKind, RuleMode,
    SemanticActionBinding, Terminal, TokenSplitter,
};
use crate::error::GrammarError;
use memchr::memmem;

/// Parse grammar text, or JSON if the text starts with `{`
pub fn load_grammar_text(text: &str) -> Result<Grammar, GrammarError> {
    if text.trim_start().starts_with('{') {
        Grammar::from_json(text)
    } else {
        parse_grammar(text)
    }
}

/// Parse one grammar from its text form
pub fn parse_grammar(text: &str) -> Result<Grammar, GrammarError> {
    let mut parser = DslParser::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        parser.line(idx + 1, line)?;
    }
    parser.finish()
}

// =============================================================================
// Line dispatch
// =============================================================================

/// Rule head of the most recent `<rule>` line, for `|` continuations
#[derive(Debug, Clone)]
struct RuleHead {
    name: String,
    context: Option<String>,
    mode: RuleMode,
}

#[derive(Debug, Default)]
struct DslParser {
    grammar: Option<Grammar>,
    current_rule: Option<RuleHead>,
    next_level: u32,
}

impl DslParser {
    fn grammar(&mut self, line: usize) -> Result<&mut Grammar, GrammarError> {
        self.grammar.as_mut().ok_or(GrammarError::Syntax {
            line,
            message: "expected 'Grammar: <name>' before any definition".into(),
        })
    }

    fn line(&mut self, no: usize, line: &str) -> Result<(), GrammarError> {
        if let Some(rest) = line.strip_prefix('|') {
            if !rest.starts_with('=') {
                let head = self.current_rule.clone().ok_or(GrammarError::Syntax {
                    line: no,
                    message: "'|' continuation without a preceding rule".into(),
                })?;
                return self.alternatives(no, &head, rest);
            }
        }
        if line.starts_with('<') {
            return self.rule(no, line);
        }
        self.current_rule = None;

        if let Some(value) = line.strip_prefix("Grammar:") {
            if self.grammar.is_some() {
                return Err(syntax(no, "only one 'Grammar:' header is allowed"));
            }
            let name = value.trim();
            if !is_ident(name) {
                return Err(syntax(no, format!("invalid grammar name '{}'", name)));
            }
            self.grammar = Some(Grammar::new(name));
            return Ok(());
        }
        if let Some(value) = line.strip_prefix("Format:") {
            self.grammar(no)?.format = Some(value.trim().to_string());
            return Ok(());
        }
        if let Some(value) = line.strip_prefix("TokenSplitter:") {
            let splitter = parse_splitter(no, value.trim())?;
            self.grammar(no)?.token_splitter = Some(splitter);
            return Ok(());
        }
        if let Some(value) = line.strip_prefix("Extends Grammar:") {
            let grammar = self.grammar(no)?;
            for base in split_names(value) {
                grammar.add_base_grammar(base)?;
            }
            return Ok(());
        }
        if let Some(value) = line.strip_prefix("Include:") {
            let grammar = self.grammar(no)?;
            for base in split_names(value) {
                grammar.add_include(base)?;
            }
            return Ok(());
        }
        if let Some(value) = line.strip_prefix("Inheritable:") {
            let flag = match value.trim() {
                "true" | "yes" => true,
                "false" | "no" => false,
                other => return Err(syntax(no, format!("expected true or false, got '{}'", other))),
            };
            self.grammar(no)?.inheritable = flag;
            return Ok(());
        }
        if let Some(value) = line.strip_prefix("Start:") {
            let rule = value.trim().trim_start_matches('<').trim_end_matches('>');
            self.grammar(no)?.start = Some(rule.to_string());
            return Ok(());
        }
        if let Some(value) = line.strip_prefix("Embed:") {
            return self.embed(no, value);
        }
        if let Some(value) = line.strip_prefix("Precedence:") {
            return self.precedence(no, value);
        }
        if let Some((name, value)) = keyed_directive(line, "Action") {
            return self.action(no, name, value);
        }
        if let Some((name, value)) = keyed_directive(line, "Recovery") {
            return self.recovery(no, name, value);
        }
        if memmem::find(line.as_bytes(), b":=").is_some() {
            return self.terminal(no, line);
        }
        Err(syntax(no, format!("unrecognized line '{}'", line)))
    }

    fn finish(self) -> Result<Grammar, GrammarError> {
        self.grammar.ok_or(GrammarError::Syntax {
            line: 1,
            message: "missing 'Grammar: <name>' header".into(),
        })
    }

    // =========================================================================
    // Rules
    // =========================================================================

    fn rule(&mut self, no: usize, line: &str) -> Result<(), GrammarError> {
        let mut cur = Cursor::new(line, no);
        cur.expect('<')?;
        cur.skip_ws();
        let name = cur.ident().ok_or_else(|| cur.error("expected rule name after '<'"))?;
        cur.skip_ws();
        let context = if cur.eat("(") {
            cur.skip_ws();
            let ctx = cur
                .ident()
                .ok_or_else(|| cur.error("expected context name"))?
                .to_string();
            cur.skip_ws();
            cur.expect(')')?;
            cur.skip_ws();
            Some(ctx)
        } else {
            None
        };
        cur.expect('>')?;
        cur.skip_ws();
        let mode = if cur.eat("::=") {
            RuleMode::Replace
        } else if cur.eat("|=") {
            RuleMode::Extend
        } else {
            return Err(cur.error("expected '::=' or '|=' after rule name"));
        };

        let head = RuleHead {
            name: name.to_string(),
            context,
            mode,
        };
        let rest = cur.rest();
        self.current_rule = Some(head.clone());
        self.alternatives(no, &head, rest)
    }

    fn alternatives(&mut self, no: usize, head: &RuleHead, text: &str) -> Result<(), GrammarError> {
        let mut cur = Cursor::new(text, no);
        loop {
            let (parts, action) = parse_alternative(&mut cur)?;
            let grammar = self.grammar(no)?;
            for part in &parts {
                if let Part::Terminal(name) = part {
                    if let Some(text) = name.strip_prefix('\'').and_then(|n| n.strip_suffix('\'')) {
                        grammar.define_literal(text);
                    }
                }
            }
            grammar.add_production(Production {
                name: head.name.clone(),
                parts,
                context: head.context.clone(),
                action,
                mode: head.mode,
            });
            cur.skip_ws();
            if cur.at_end() {
                return Ok(());
            }
            cur.expect('|')?;
        }
    }

    // =========================================================================
    // Terminals
    // =========================================================================

    fn terminal(&mut self, no: usize, line: &str) -> Result<(), GrammarError> {
        let mut cur = Cursor::new(line, no);
        let name = cur
            .ident()
            .ok_or_else(|| cur.error("expected terminal name"))?
            .to_string();
        cur.skip_ws();
        let context = if cur.eat("(") {
            cur.skip_ws();
            let ctx = cur
                .ident()
                .ok_or_else(|| cur.error("expected context name"))?
                .to_string();
            cur.skip_ws();
            cur.expect(')')?;
            cur.skip_ws();
            Some(ctx)
        } else {
            None
        };
        if !cur.eat(":=") {
            return Err(cur.error("expected ':=' after terminal name"));
        }
        cur.skip_ws();
        let matcher = match cur.peek() {
            Some('/') => Matcher::Regex(cur.slashed()?),
            Some('\'') => {
                let text = cur.quoted()?;
                if text.is_empty() {
                    return Err(cur.error("literal terminals cannot be empty"));
                }
                Matcher::Literal(text)
            }
            _ => return Err(cur.error("expected /regex/ or 'literal'")),
        };

        let mut terminal = Terminal::new(name, matcher);
        terminal.context = context;
        loop {
            cur.skip_ws();
            if cur.at_end() {
                break;
            }
            if cur.eat("@priority(") {
                let value = cur.take_while(|c| c == '-' || c.is_ascii_digit());
                terminal.priority = value
                    .parse()
                    .map_err(|_| cur.error(format!("invalid priority '{}'", value)))?;
                terminal.order_important = true;
                cur.expect(')')?;
            } else if cur.eat("@ordered") {
                terminal.order_important = true;
            } else {
                return Err(cur.error(format!("unexpected '{}' after terminal", cur.rest())));
            }
        }
        self.grammar(no)?.add_terminal(terminal);
        Ok(())
    }

    // =========================================================================
    // Remaining directives
    // =========================================================================

    fn embed(&mut self, no: usize, value: &str) -> Result<(), GrammarError> {
        let idx = memmem::find(value.as_bytes(), b"=>")
            .ok_or_else(|| syntax(no, "expected 'Embed: <context> => <grammar>'"))?;
        let context = value[..idx].trim();
        let grammar_name = value[idx + 2..].trim();
        if !is_ident(context) || !is_ident(grammar_name) {
            return Err(syntax(no, "expected 'Embed: <context> => <grammar>'"));
        }
        let grammar = self.grammar(no)?;
        grammar.embeds.retain(|e| e.context != context);
        grammar.embeds.push(Embedding {
            context: context.to_string(),
            grammar: grammar_name.to_string(),
        });
        Ok(())
    }

    fn precedence(&mut self, no: usize, value: &str) -> Result<(), GrammarError> {
        let mut cur = Cursor::new(value, no);
        cur.skip_ws();
        let associativity = match cur.ident() {
            Some("left") => Associativity::Left,
            Some("right") => Associativity::Right,
            Some("none") | Some("nonassoc") => Associativity::None,
            _ => return Err(cur.error("expected left, right or none")),
        };
        self.next_level += 1;
        let level = self.next_level;
        let grammar = self.grammar(no)?;
        loop {
            cur.skip_ws();
            if cur.at_end() {
                return Ok(());
            }
            let operator = operand(&mut cur)?;
            grammar.precedence.retain(|p| p.operator != operator);
            grammar.precedence.push(PrecedenceEntry {
                operator,
                level,
                associativity,
            });
        }
    }

    fn action(&mut self, no: usize, name: &str, value: &str) -> Result<(), GrammarError> {
        let value = value.trim();
        let (kind, payload) = value.split_once(char::is_whitespace).unwrap_or((value, ""));
        let kind = match kind {
            "callback" => ActionKind::Callback,
            "template" => ActionKind::Template,
            "script" => ActionKind::Script,
            "native" => ActionKind::Native,
            other => return Err(syntax(no, format!("unknown action kind '{}'", other))),
        };
        let grammar = self.grammar(no)?;
        grammar.actions.retain(|a| a.name != name);
        grammar.actions.push(SemanticActionBinding {
            name: name.to_string(),
            kind,
            payload: payload.trim().to_string(),
        });
        Ok(())
    }

    fn recovery(&mut self, no: usize, name: &str, value: &str) -> Result<(), GrammarError> {
        let mut cur = Cursor::new(value, no);
        cur.skip_ws();
        let kind = match cur.ident() {
            Some("synchronize") => RecoveryKind::Synchronize,
            Some("insert") => RecoveryKind::Insert,
            Some("delete") => RecoveryKind::Delete,
            Some("replace") => RecoveryKind::Replace,
            _ => return Err(cur.error("expected synchronize, insert, delete or replace")),
        };
        let mut parameters = Vec::new();
        loop {
            cur.skip_ws();
            if cur.at_end() {
                break;
            }
            parameters.push(operand(&mut cur)?);
        }
        let grammar = self.grammar(no)?;
        grammar.recovery.retain(|r| r.name != name);
        grammar.recovery.push(ErrorRecoveryStrategy {
            name: name.to_string(),
            kind,
            parameters,
        });
        Ok(())
    }
}

// =============================================================================
// Alternatives
// =============================================================================

/// Parse one alternative up to `|` or end of text
fn parse_alternative(cur: &mut Cursor<'_>) -> Result<(Vec<Part>, Option<ActionRef>), GrammarError> {
    let mut parts = Vec::new();
    loop {
        cur.skip_ws();
        match cur.peek() {
            None | Some('|') => return Ok((parts, None)),
            Some('\'') => {
                let text = cur.quoted()?;
                if text.is_empty() {
                    return Err(cur.error("literal terminals cannot be empty"));
                }
                parts.push(Part::Terminal(format!("'{}'", text)));
            }
            Some('<') => {
                cur.expect('<')?;
                cur.skip_ws();
                let name = cur
                    .ident()
                    .ok_or_else(|| cur.error("expected rule name after '<'"))?;
                cur.skip_ws();
                cur.expect('>')?;
                parts.push(Part::NonTerminal(name.to_string()));
            }
            Some('=') if cur.eat("=>") => {
                let action = parse_action(cur)?;
                cur.skip_ws();
                return match cur.peek() {
                    None | Some('|') => Ok((parts, Some(action))),
                    _ => Err(cur.error("action must end its alternative")),
                };
            }
            Some(_) => {
                let word = cur
                    .ident()
                    .ok_or_else(|| cur.error(format!("unexpected '{}'", cur.rest())))?;
                if word == "Context" && cur.eat("(") {
                    parts.push(Part::Context(parse_context(cur)?));
                } else {
                    parts.push(Part::Terminal(word.to_string()));
                }
            }
        }
    }
}

/// `name, on|off)` after `Context(`
fn parse_context(cur: &mut Cursor<'_>) -> Result<ContextDirective, GrammarError> {
    cur.skip_ws();
    let name = cur
        .ident()
        .ok_or_else(|| cur.error("expected context name"))?
        .to_string();
    cur.skip_ws();
    cur.expect(',')?;
    cur.skip_ws();
    let directive = match cur.ident() {
        Some("on") => ContextDirective::on(name),
        Some("off") => ContextDirective::off(name),
        _ => return Err(cur.error("expected 'on' or 'off'")),
    };
    cur.skip_ws();
    cur.expect(')')?;
    Ok(directive)
}

/// `{ name($1, $3) }` after `=>`
fn parse_action(cur: &mut Cursor<'_>) -> Result<ActionRef, GrammarError> {
    cur.skip_ws();
    cur.expect('{')?;
    cur.skip_ws();
    let name = cur
        .ident()
        .ok_or_else(|| cur.error("expected action name"))?
        .to_string();
    cur.skip_ws();
    let mut args = Vec::new();
    if cur.eat("(") {
        loop {
            cur.skip_ws();
            if cur.eat(")") {
                break;
            }
            cur.expect('$')?;
            let digits = cur.take_while(|c| c.is_ascii_digit());
            let index: usize = digits
                .parse()
                .map_err(|_| cur.error("expected $<number> argument"))?;
            if index == 0 {
                return Err(cur.error("action arguments are 1-based"));
            }
            args.push(index);
            cur.skip_ws();
            if !cur.eat(",") {
                cur.skip_ws();
                cur.expect(')')?;
                break;
            }
        }
    }
    cur.skip_ws();
    cur.expect('}')?;
    Ok(ActionRef { name, args })
}

/// A terminal reference in a directive: `'lit'` (quoted form kept) or a name
fn operand(cur: &mut Cursor<'_>) -> Result<String, GrammarError> {
    if cur.peek() == Some('\'') {
        return Ok(format!("'{}'", cur.quoted()?));
    }
    cur.ident()
        .map(str::to_string)
        .ok_or_else(|| cur.error(format!("unexpected '{}'", cur.rest())))
}

// =============================================================================
// Lexical helpers
// =============================================================================

fn syntax(line: usize, message: impl Into<String>) -> GrammarError {
    GrammarError::Syntax {
        line,
        message: message.into(),
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn split_names(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_splitter(line: usize, value: &str) -> Result<TokenSplitter, GrammarError> {
    match value {
        "none" => Ok(TokenSplitter::None),
        "whitespace" => Ok(TokenSplitter::Whitespace),
        _ if value.starts_with('/') => Cursor::new(value, line).slashed().map(TokenSplitter::Regex),
        other => Err(syntax(line, format!("unknown token splitter '{}'", other))),
    }
}

/// `Action name: rest` / `Recovery name: rest`
fn keyed_directive<'a>(line: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let rest = line.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, value) = rest.split_once(':')?;
    if value.starts_with('=') {
        return None;
    }
    let name = name.trim();
    is_ident(name).then_some((name, value))
}

/// Cut a trailing `#` or `//` comment, ignoring quoted literals and regexes
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut delimiter: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match delimiter {
            Some(_) if b == b'\\' => i += 1,
            Some(d) if b == d => delimiter = None,
            Some(_) => {}
            None => match b {
                b'#' => return &line[..i],
                b'/' if bytes.get(i + 1) == Some(&b'/') => return &line[..i],
                b'/' | b'\'' => delimiter = Some(b),
                _ => {}
            },
        }
        i += 1;
    }
    line
}

/// Character cursor over one line
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self { text, pos: 0, line }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), GrammarError> {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn ident(&mut self) -> Option<&'a str> {
        let first = self.peek()?;
        if !(first.is_alphabetic() || first == '_') {
            return None;
        }
        Some(self.take_while(|c| c.is_alphanumeric() || c == '_'))
    }

    /// `'text'` with `\'`, `\\`, `\n`, `\t` escapes
    fn quoted(&mut self) -> Result<String, GrammarError> {
        self.expect('\'')?;
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '\'' => {
                    self.pos += idx + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, other)) => out.push(other),
                    None => break,
                },
                _ => out.push(c),
            }
        }
        Err(self.error("unterminated literal"))
    }

    /// `/pattern/` with `\/` unescaped; other escapes are kept for the regex
    fn slashed(&mut self) -> Result<String, GrammarError> {
        self.expect('/')?;
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '/' => {
                    self.pos += idx + 1;
                    if out.is_empty() {
                        return Err(self.error("empty regex"));
                    }
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, '/')) => out.push('/'),
                    Some((_, other)) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                _ => out.push(c),
            }
        }
        Err(self.error("unterminated regex"))
    }

    fn error(&self, message: impl Into<String>) -> GrammarError {
        GrammarError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }
}
