/*
    This module holds the shared derivation forest

    Every derivation is stored once, addressed by the symbol it derives and
    the span it covers. Applications refer to their children by key. Spans
    shrink towards the leaves, so only unary chains inside one span can form
    cycles; counting and expansion cut those.
*/

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::grammar::{Grammar, RuleId, Symbol};

// Half-open token range `[start, end)`, never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Option<Span> {
        (end > start).then_some(Span { start, end })
    }

    pub(crate) fn at(start: usize, width: usize) -> Span {
        debug_assert!(width > 0);
        Span {
            start,
            end: start + width,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub symbol: Symbol,
    pub span: Span,
}

impl NodeKey {
    pub fn new(symbol: Symbol, span: Span) -> Self {
        NodeKey { symbol, span }
    }
}

impl Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.symbol, self.span)
    }
}

// One way of deriving a node: a rule plus the nodes its right-hand side
// matched, whose spans partition the parent span left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub rule: RuleId,
    pub children: Vec<NodeKey>,
}

#[derive(Debug, Clone)]
pub struct ForestNode {
    key: NodeKey,
    applications: Vec<Application>,
}

impl ForestNode {
    pub(crate) fn new(key: NodeKey, applications: Vec<Application>) -> Self {
        ForestNode { key, applications }
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn symbol(&self) -> &Symbol {
        &self.key.symbol
    }

    pub fn span(&self) -> Span {
        self.key.span
    }

    // Ordered by rule declaration, then by split position
    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    // Terminal nodes match a single token and have no applications
    pub fn is_leaf(&self) -> bool {
        self.key.symbol.is_terminal()
    }
}

// The result of one enumeration run. Read-only once built.
#[derive(Debug, Clone)]
pub struct Forest<'g> {
    grammar: &'g Grammar,
    tokens: Vec<Arc<str>>,
    nodes: IndexMap<NodeKey, ForestNode>,
}

impl<'g> Forest<'g> {
    pub(crate) fn new(
        grammar: &'g Grammar,
        tokens: Vec<Arc<str>>,
        nodes: IndexMap<NodeKey, ForestNode>,
    ) -> Self {
        Forest {
            grammar,
            tokens,
            nodes,
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn tokens(&self) -> &[Arc<str>] {
        &self.tokens
    }

    pub fn get(&self, key: &NodeKey) -> Option<&ForestNode> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    // Nodes in the order they were derived: by width, then start, then
    // discovery order within a cell
    pub fn nodes(&self) -> impl Iterator<Item = &ForestNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn application_count(&self) -> usize {
        self.nodes.values().map(|node| node.applications.len()).sum()
    }

    // The node deriving the whole input from a nonterminal `start`, if any
    pub fn root(&self, start: &str) -> Option<&ForestNode> {
        let symbol = self.grammar.symbol(start).filter(|symbol| symbol.is_nonterminal())?;
        let span = Span::new(0, self.tokens.len())?;
        self.nodes.get(&NodeKey::new(symbol.clone(), span))
    }

    // Nodes that can derive themselves through a chain of unary applications.
    // Expanding one of these depends on the path that led to it; every other
    // node expands the same way wherever it is reached from.
    pub(crate) fn cyclic_nodes(&self) -> HashSet<&NodeKey> {
        self.nodes
            .keys()
            .filter(|key| self.unary_reaches(key, key))
            .collect()
    }

    fn unary_reaches(&self, from: &NodeKey, target: &NodeKey) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            for application in &node.applications {
                if let [child] = application.children.as_slice() {
                    if child == target {
                        return true;
                    }
                    if seen.insert(child) {
                        stack.push(child);
                    }
                }
            }
        }

        false
    }

    // Number of distinct trees below the root, without building them. A
    // tree never repeats a node on one root-to-leaf path. Saturates instead
    // of overflowing.
    pub fn count_readings(&self, start: &str) -> u128 {
        let Some(root) = self.root(start) else {
            return 0;
        };

        let cyclic = self.cyclic_nodes();
        let mut memo = HashMap::new();
        self.count_below(root.key(), &cyclic, &mut Vec::new(), &mut memo)
    }

    fn count_below<'a>(
        &'a self,
        key: &'a NodeKey,
        cyclic: &HashSet<&'a NodeKey>,
        path: &mut Vec<&'a NodeKey>,
        memo: &mut HashMap<&'a NodeKey, u128>,
    ) -> u128 {
        if let Some(count) = memo.get(key) {
            return *count;
        }

        let on_cycle = cyclic.contains(key);
        if on_cycle && path.contains(&key) {
            return 0;
        }

        let count = match self.nodes.get(key) {
            None => 0,
            Some(node) if node.is_leaf() => 1,
            Some(node) => {
                if on_cycle {
                    path.push(key);
                }
                let count = node
                    .applications
                    .iter()
                    .map(|application| {
                        application
                            .children
                            .iter()
                            .map(|child| self.count_below(child, cyclic, path, memo))
                            .fold(1u128, u128::saturating_mul)
                    })
                    .fold(0u128, u128::saturating_add);
                if on_cycle {
                    path.pop();
                }
                count
            }
        };

        if !on_cycle {
            memo.insert(key, count);
        }
        count
    }
}
