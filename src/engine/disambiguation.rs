//! Precedence-based disambiguation
//!
//! When a token satisfies several frontier members, each member has made a
//! choice for every operator production around the token: productions it
//! completed just before the token were reduced, and operator frames it is
//! still inside have the token shifted into their right operand. The
//! precedence table checks those choices using the yacc rule:
//!
//! - a production's precedence is that of its last terminal with a table
//!   entry
//! - higher level wins; on equal levels, left associativity reduces, right
//!   associativity shifts and non-associative operators reject both
//!
//! Members whose choices all agree with the table survive. If the table
//! rules out every member without a non-associative rejection, the members
//! are left alone, so grammars without a precedence table keep every member.

use super::context::GrammarSet;
use super::frontier::{Continuation, Frame};
use super::Token;
use crate::grammar::{Associativity, EffectiveGrammar, Part, PrecedenceEntry};

/// Outcome of one shift/reduce comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the member that continues with the lookahead
    Shift,
    /// Keep the member that completed the operator production
    Reduce,
    /// Neither is allowed (non-associative operator chain)
    Reject,
}

/// Compare a completed production's precedence with the lookahead's
pub fn resolve(reduced: &PrecedenceEntry, lookahead: &PrecedenceEntry) -> Resolution {
    if reduced.level > lookahead.level {
        return Resolution::Reduce;
    }
    if reduced.level < lookahead.level {
        return Resolution::Shift;
    }
    match reduced.associativity {
        Associativity::Left => Resolution::Reduce,
        Associativity::Right => Resolution::Shift,
        Associativity::None => Resolution::Reject,
    }
}

/// Precedence of a production: its last terminal with a table entry
pub fn production_precedence<'g>(
    grammar: &'g EffectiveGrammar,
    production: usize,
) -> Option<&'g PrecedenceEntry> {
    last_operator(grammar, &grammar.production(production).parts)
}

fn last_operator<'g>(grammar: &'g EffectiveGrammar, parts: &[Part]) -> Option<&'g PrecedenceEntry> {
    parts.iter().rev().find_map(|part| match part {
        Part::Terminal(name) => grammar.find_precedence(name),
        _ => None,
    })
}

/// Precedence of the operator an open frame has already consumed
fn consumed_precedence<'g>(frame: &Frame, grammars: &'g GrammarSet) -> Option<&'g PrecedenceEntry> {
    let grammar = grammars.get(frame.slot);
    let parts = &grammar.production(frame.production).parts;
    last_operator(grammar, &parts[..frame.dot.min(parts.len())])
}

/// Whether `frame` finishes as soon as the non-terminal at its dot does
fn ends_with_current(frame: &Frame, grammars: &GrammarSet) -> bool {
    let parts = &grammars.get(frame.slot).production(frame.production).parts;
    frame.dot + 1 == parts.len() && matches!(parts.get(frame.dot), Some(Part::NonTerminal(_)))
}

/// Whether `frame` holds a single non-terminal child so far, which could
/// instead have completed the operand of the frame below it
fn grown_from_operand(frame: &Frame, grammars: &GrammarSet) -> bool {
    let parts = &grammars.get(frame.slot).production(frame.production).parts;
    frame.dot == 1 && matches!(parts.first(), Some(Part::NonTerminal(_)))
}

/// How well a member's choices agree with the table, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Verdict {
    Keep,
    Drop,
    Reject,
}

impl Verdict {
    fn check(self, resolution: Resolution, chosen: Resolution) -> Self {
        let verdict = match resolution {
            Resolution::Reject => Verdict::Reject,
            r if r == chosen => Verdict::Keep,
            _ => Verdict::Drop,
        };
        self.max(verdict)
    }
}

fn verdict(member: &Continuation, lookahead: &PrecedenceEntry, grammars: &GrammarSet) -> Verdict {
    let mut verdict = Verdict::Keep;

    // reduced before the lookahead
    for done in &member.completed {
        if let Some(p) = production_precedence(grammars.get(done.slot), done.production) {
            verdict = verdict.check(resolve(p, lookahead), Resolution::Reduce);
        }
    }

    // the lookahead lands in the right operand of every enclosing operator
    // frame that could have been completed here instead
    let Some((top, below)) = member.stack.split_last() else {
        return verdict;
    };
    if !grown_from_operand(top, grammars) {
        return verdict;
    }
    for frame in below.iter().rev() {
        if let Some(p) = consumed_precedence(frame, grammars) {
            verdict = verdict.check(resolve(p, lookahead), Resolution::Shift);
        }
        if !ends_with_current(frame, grammars) {
            break;
        }
    }
    verdict
}

/// Drop the members the precedence table rules out for `token`
///
/// Returns the input unchanged when the token has no precedence, or when
/// the table would rule out every member without a non-associative
/// rejection.
pub fn filter_by_precedence<'c>(
    candidates: Vec<&'c Continuation>,
    token: &Token,
    grammars: &GrammarSet,
) -> Vec<&'c Continuation> {
    if candidates.len() < 2 || token.is_eof() {
        return candidates;
    }
    let Some(lookahead) = grammars
        .get(token.terminal.slot)
        .find_precedence(&token.terminal.name)
    else {
        return candidates;
    };

    let verdicts: Vec<Verdict> = candidates
        .iter()
        .map(|m| verdict(m, lookahead, grammars))
        .collect();
    if verdicts.iter().any(|v| *v == Verdict::Keep) {
        return candidates
            .into_iter()
            .zip(verdicts)
            .filter(|(_, v)| *v == Verdict::Keep)
            .map(|(m, _)| m)
            .collect();
    }
    if verdicts.iter().any(|v| *v == Verdict::Reject) {
        return Vec::new();
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::ContextStack;
    use crate::engine::frontier::{Expect, FrontierBuilder};
    use crate::engine::TerminalRef;
    use crate::grammar::GrammarRegistry;
    use crate::source_location::Span;

    const ARITH: &str = "Grammar: Arith\nN := /[0-9]+/\n<e> ::= <e> '+' <e> | <e> '*' <e> | <e> '^' <e> | <e> '=' <e> | N\nPrecedence: none '='\nPrecedence: left '+'\nPrecedence: left '*'\nPrecedence: right '^'";

    fn grammars() -> GrammarSet {
        let mut registry = GrammarRegistry::new();
        registry.register_text(ARITH).unwrap();
        GrammarSet::resolve(&mut registry, "Arith").unwrap()
    }

    /// Precedence of the last operator production `member` completed
    fn reduced_precedence<'g>(
        member: &Continuation,
        set: &'g GrammarSet,
    ) -> Option<&'g PrecedenceEntry> {
        member
            .completed
            .iter()
            .rev()
            .find_map(|m| production_precedence(set.get(m.slot), m.production))
    }

    fn token(name: &str, start: usize) -> Token {
        Token {
            terminal: TerminalRef::new(0, name),
            span: Span::new(start, start + 1),
            text: String::new(),
        }
    }

    /// Frontier after `N op N`, restricted to members expecting `next`
    fn conflict(set: &GrammarSet, op: &str, next: &str) -> Vec<Continuation> {
        let builder = FrontierBuilder::new(set, 256);
        let mut members = builder.initial(ContextStack::new()).members;
        for tok in [token("N", 0), token(op, 1), token("N", 2)] {
            let member = members
                .iter()
                .find(|m| m.accepts(&tok, set))
                .unwrap()
                .clone();
            members = builder.advance(&member, &tok).members;
        }
        let expected = Expect::Terminal(TerminalRef::new(0, next));
        members.into_iter().filter(|m| m.expects == expected).collect()
    }

    /// Frontier after `names` with the filter applied on every token,
    /// restricted to members expecting `next`
    fn chain(set: &GrammarSet, names: &[&str], next: &str) -> Vec<Continuation> {
        let builder = FrontierBuilder::new(set, 256);
        let mut members = builder.initial(ContextStack::new()).members;
        for (i, name) in names.iter().enumerate() {
            let tok = token(name, i);
            let accepted = members.iter().filter(|m| m.accepts(&tok, set)).collect();
            members = filter_by_precedence(accepted, &tok, set)
                .into_iter()
                .flat_map(|m| builder.advance(m, &tok).members)
                .collect();
            members.sort();
            members.dedup();
        }
        let expected = Expect::Terminal(TerminalRef::new(0, next));
        members.into_iter().filter(|m| m.expects == expected).collect()
    }

    fn kept_reduce(set: &GrammarSet, op: &str, next: &str) -> Vec<bool> {
        let members = conflict(set, op, next);
        assert_eq!(members.len(), 2);
        let kept = filter_by_precedence(members.iter().collect(), &token(next, 3), set);
        kept.iter()
            .map(|m| reduced_precedence(m, set).is_some())
            .collect()
    }

    #[test]
    fn test_higher_lookahead_shifts() {
        let set = grammars();
        assert_eq!(kept_reduce(&set, "'+'", "'*'"), vec![false]);
    }

    #[test]
    fn test_higher_completed_reduces() {
        let set = grammars();
        assert_eq!(kept_reduce(&set, "'*'", "'+'"), vec![true]);
    }

    #[test]
    fn test_associativity() {
        let set = grammars();
        assert_eq!(kept_reduce(&set, "'+'", "'+'"), vec![true]);
        assert_eq!(kept_reduce(&set, "'^'", "'^'"), vec![false]);
        assert!(kept_reduce(&set, "'='", "'='").is_empty());
    }

    #[test]
    fn test_open_operator_frames_are_resolved() {
        let set = grammars();

        // 1+2*3 then '+': only the member that reduced both operators stays
        let members = chain(&set, &["N", "'+'", "N", "'*'", "N"], "'+'");
        assert_eq!(members.len(), 3);
        let most = members.iter().map(|m| m.completed.len()).max();
        let kept = filter_by_precedence(members.iter().collect(), &token("'+'", 5), &set);
        assert_eq!(kept.len(), 1);
        assert_eq!(Some(kept[0].completed.len()), most);

        // 1*2+3 then '*': only the member still inside the '+' frame stays
        let members = chain(&set, &["N", "'*'", "N", "'+'", "N"], "'*'");
        let least = members.iter().map(|m| m.completed.len()).min();
        let kept = filter_by_precedence(members.iter().collect(), &token("'*'", 5), &set);
        assert_eq!(kept.len(), 1);
        assert_eq!(Some(kept[0].completed.len()), least);
    }

    #[test]
    fn test_no_precedence_keeps_everyone() {
        let mut registry = GrammarRegistry::new();
        registry
            .register_text("Grammar: G\nN := /[0-9]+/\n<e> ::= <e> '+' <e> | N")
            .unwrap();
        let set = GrammarSet::resolve(&mut registry, "G").unwrap();
        let members = conflict(&set, "'+'", "'+'");
        let kept = filter_by_precedence(members.iter().collect(), &token("'+'", 3), &set);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_resolve_table() {
        let entry = |level, associativity| PrecedenceEntry {
            operator: String::new(),
            level,
            associativity,
        };
        assert_eq!(
            resolve(&entry(2, Associativity::Left), &entry(1, Associativity::Left)),
            Resolution::Reduce
        );
        assert_eq!(
            resolve(&entry(1, Associativity::Left), &entry(2, Associativity::Left)),
            Resolution::Shift
        );
        assert_eq!(
            resolve(&entry(1, Associativity::None), &entry(1, Associativity::None)),
            Resolution::Reject
        );
    }
}
