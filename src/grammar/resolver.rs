//! Inheritance Resolver
//!
//! Composes a grammar and its transitive bases into one
//! [`EffectiveGrammar`].
//!
//! The base-grammar graph is built as an arena of grammar references with
//! a name-keyed index. Traversal never mutates the grammars themselves.
//!
//! # Conflict resolution
//!
//! Definitions are looked up in *override order*: the grammar itself, then
//! its bases depth-first in declared order (`Extends` before `Include`). The
//! first definition found wins, for rules, terminals, precedence entries,
//! actions, recovery strategies and embeddings alike. A rule whose local
//! alternatives are all `|=` extensions appends them to the inherited
//! definition instead of replacing it.
//!
//! # Example
//!
//! ```rust
//! use gramstep::grammar::builder::*;
//! use gramstep::grammar::resolver::resolve_hierarchy;
//! use hashbrown::HashMap;
//!
//! let mut grammars = HashMap::new();
//! let base = GrammarBuilder::new("Base").rule("r", vec![]).build().unwrap();
//! let child = GrammarBuilder::new("Child").extends("Base").build().unwrap();
//! grammars.insert(base.name.clone(), base);
//! grammars.insert(child.name.clone(), child);
//!
//! let order = resolve_hierarchy("Child", |n| grammars.get(n)).unwrap();
//! let names: Vec<&str> = order.iter().map(|g| g.name.as_str()).collect();
//! assert_eq!(names, vec!["Base", "Child"]);
//! ```

use super::effective::{EffectiveGrammar, FlatTables};
use super::model::{Grammar, Production, RuleMode, TokenSplitter};
use crate::error::GrammarError;
use crate::logging::log_debug;
use hashbrown::{HashMap, HashSet};

/// Traversal mark for cycle detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Base-grammar graph reachable from one root
#[derive(Debug)]
pub struct HierarchyGraph<'a> {
    nodes: Vec<&'a Grammar>,
    index: HashMap<&'a str, usize>,
    /// Base edges per node, in override order
    edges: Vec<Vec<usize>>,
}

impl<'a> HierarchyGraph<'a> {
    /// Collect every grammar reachable from `root`
    ///
    /// Fails if the root or a base is unknown, or if a base is sealed.
    pub fn build<F>(root: &str, lookup: F) -> Result<Self, GrammarError>
    where
        F: Fn(&str) -> Option<&'a Grammar>,
    {
        let root_grammar = lookup(root).ok_or_else(|| GrammarError::UnknownGrammar {
            name: root.to_string(),
        })?;

        let mut graph = Self {
            nodes: vec![root_grammar],
            index: HashMap::new(),
            edges: vec![Vec::new()],
        };
        graph.index.insert(root_grammar.name.as_str(), 0);

        let mut next = 0;
        while next < graph.nodes.len() {
            let grammar = graph.nodes[next];
            let mut edges = Vec::new();
            for base in grammar.bases() {
                let idx = match graph.index.get(base) {
                    Some(&idx) => idx,
                    None => {
                        let base_grammar =
                            lookup(base).ok_or_else(|| GrammarError::MissingBaseGrammar {
                                grammar: grammar.name.clone(),
                                base: base.to_string(),
                            })?;
                        let idx = graph.nodes.len();
                        graph.nodes.push(base_grammar);
                        graph.edges.push(Vec::new());
                        graph.index.insert(base_grammar.name.as_str(), idx);
                        idx
                    }
                };
                if !graph.nodes[idx].inheritable {
                    return Err(GrammarError::NotInheritable {
                        grammar: grammar.name.clone(),
                        base: base.to_string(),
                    });
                }
                edges.push(idx);
            }
            graph.edges[next] = edges;
            next += 1;
        }
        Ok(graph)
    }

    /// Number of grammars in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty (never true for a built graph)
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Grammars in topological order, most-base first, root last
    ///
    /// A node re-encountered while still being visited closes a cycle,
    /// reported with every grammar on it.
    pub fn topological_order(&self) -> Result<Vec<&'a Grammar>, GrammarError> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut trail = Vec::new();
        let mut order = Vec::with_capacity(self.nodes.len());
        self.visit(0, &mut marks, &mut trail, &mut order)?;
        Ok(order.into_iter().map(|idx| self.nodes[idx]).collect())
    }

    fn visit(
        &self,
        node: usize,
        marks: &mut [Mark],
        trail: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), GrammarError> {
        match marks[node] {
            Mark::Visited => return Ok(()),
            Mark::Visiting => {
                let start = trail.iter().position(|&n| n == node).unwrap_or(0);
                let mut cycle: Vec<String> = trail[start..]
                    .iter()
                    .map(|&n| self.nodes[n].name.clone())
                    .collect();
                cycle.push(self.nodes[node].name.clone());
                return Err(GrammarError::CyclicDependency { cycle });
            }
            Mark::Unvisited => {}
        }

        marks[node] = Mark::Visiting;
        trail.push(node);
        for &base in &self.edges[node] {
            self.visit(base, marks, trail, order)?;
        }
        trail.pop();
        marks[node] = Mark::Visited;
        order.push(node);
        Ok(())
    }

    /// Grammars in override order: root, then bases depth-first in
    /// declared order, each grammar once
    ///
    /// Only meaningful on an acyclic graph.
    pub fn override_order(&self) -> Vec<&'a Grammar> {
        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0];
        while let Some(node) = stack.pop() {
            if std::mem::replace(&mut seen[node], true) {
                continue;
            }
            order.push(self.nodes[node]);
            for &base in self.edges[node].iter().rev() {
                if !seen[base] {
                    stack.push(base);
                }
            }
        }
        order
    }
}

/// Topological hierarchy of `root`, most-base first
pub fn resolve_hierarchy<'a, F>(root: &str, lookup: F) -> Result<Vec<&'a Grammar>, GrammarError>
where
    F: Fn(&str) -> Option<&'a Grammar>,
{
    let graph = HierarchyGraph::build(root, lookup)?;
    let order = graph.topological_order()?;
    log_debug!(
        "resolved hierarchy of '{}': {:?}",
        root,
        order.iter().map(|g| g.name.as_str()).collect::<Vec<_>>()
    );
    Ok(order)
}

/// Check that every grammar in a hierarchy agrees on lexical conventions
///
/// Grammars that declare a format tag must all declare the same one
/// (case-insensitively), and grammars that declare a token splitter must
/// all declare the same splitter.
pub fn validate_compatibility(hierarchy: &[&Grammar]) -> Result<(), GrammarError> {
    let mut format: Option<(&str, &str)> = None;
    let mut splitter: Option<(&str, &TokenSplitter)> = None;

    for grammar in hierarchy {
        if let Some(tag) = grammar.format.as_deref() {
            match format {
                Some((owner, first)) if !first.eq_ignore_ascii_case(tag) => {
                    return Err(GrammarError::IncompatibleFormat {
                        grammar: grammar.name.clone(),
                        conflicting_with: owner.to_string(),
                        detail: format!("format '{}' conflicts with '{}'", tag, first),
                    });
                }
                Some(_) => {}
                None => format = Some((&grammar.name, tag)),
            }
        }
        if let Some(declared) = grammar.token_splitter.as_ref() {
            match splitter {
                Some((owner, first)) if first != declared => {
                    return Err(GrammarError::IncompatibleFormat {
                        grammar: grammar.name.clone(),
                        conflicting_with: owner.to_string(),
                        detail: format!(
                            "token splitter {:?} conflicts with {:?}",
                            declared, first
                        ),
                    });
                }
                Some(_) => {}
                None => splitter = Some((&grammar.name, declared)),
            }
        }
    }
    Ok(())
}

/// Resolve `root` into an effective grammar without reference validation
///
/// Topology errors (unknown grammars, sealed bases, cycles, incompatible
/// formats) are reported here.
pub fn flatten<'a, F>(root: &str, lookup: F, generation: u64) -> Result<EffectiveGrammar, GrammarError>
where
    F: Fn(&str) -> Option<&'a Grammar>,
{
    let graph = HierarchyGraph::build(root, lookup)?;
    let hierarchy = graph.topological_order()?;
    validate_compatibility(&hierarchy)?;
    let order = graph.override_order();

    let mut tables = FlatTables {
        name: root.to_string(),
        hierarchy: hierarchy.iter().map(|g| g.name.clone()).collect(),
        ..FlatTables::default()
    };
    tables.format = order.iter().find_map(|g| g.format.clone());
    tables.token_splitter = order.iter().find_map(|g| g.token_splitter.clone());
    tables.start = order.iter().find_map(|g| g.start.clone()).or_else(|| {
        order
            .first()
            .and_then(|g| g.productions.first())
            .map(|p| p.name.clone())
    });

    tables.productions = flatten_rules(&order);
    tables.terminals = first_wins(&order, |g| &g.terminals, |t| t.name.as_str());
    tables.precedence = first_wins(&order, |g| &g.precedence, |p| p.operator.as_str());
    tables.actions = first_wins(&order, |g| &g.actions, |a| a.name.as_str());
    tables.recovery = first_wins(&order, |g| &g.recovery, |r| r.name.as_str());
    tables.embeds = first_wins(&order, |g| &g.embeds, |e| e.context.as_str());

    EffectiveGrammar::from_tables(tables, generation)
}

/// Merge one keyed table across the override order, first definition wins
fn first_wins<'g, T, F, K>(order: &[&'g Grammar], table: F, key: K) -> Vec<T>
where
    T: Clone + 'g,
    F: Fn(&'g Grammar) -> &'g Vec<T>,
    K: Fn(&T) -> &str,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for &grammar in order {
        for item in table(grammar) {
            if seen.insert(key(item)) {
                out.push(item.clone());
            }
        }
    }
    out
}

/// Resolve every rule across the override order
///
/// Rules appear in first-mention order. For each rule the nearest grammar
/// with a replacing (`::=`) definition supplies the base alternatives, and
/// `|=` extensions from nearer grammars are appended after them, deepest
/// first.
fn flatten_rules(order: &[&Grammar]) -> Vec<Production> {
    let mut names: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for grammar in order {
        for p in &grammar.productions {
            if seen.insert(p.name.as_str()) {
                names.push(p.name.as_str());
            }
        }
    }

    let mut out = Vec::new();
    for name in names {
        let mut extensions: Vec<Vec<&Production>> = Vec::new();
        let mut definition: Vec<&Production> = Vec::new();
        for grammar in order {
            let local = grammar.find_rule(name);
            if local.is_empty() {
                continue;
            }
            if local.iter().any(|p| p.mode == RuleMode::Replace) {
                definition = local;
                break;
            }
            extensions.push(local);
        }
        out.extend(definition.into_iter().cloned());
        for ext in extensions.into_iter().rev() {
            out.extend(ext.into_iter().cloned());
        }
    }
    out
}
