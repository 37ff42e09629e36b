/*
    This module expands a forest into individual parse trees

    Expansions are memoized per forest node, so a sub-derivation shared by
    many parents is expanded once and then copied into each of them.
*/

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::forest::{Forest, NodeKey, Span};
use crate::grammar::{Rule, RuleId, Symbol};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTree<'g> {
    // A terminal and the single token it consumed
    Leaf {
        terminal: Symbol,
        token: Arc<str>,
        position: usize,
    },
    // A nonterminal, the rule that expanded it and what the rule matched
    Node {
        rule: &'g Rule,
        span: Span,
        children: Vec<ParseTree<'g>>,
    },
}

impl<'g> ParseTree<'g> {
    pub fn symbol(&self) -> &Symbol {
        match self {
            ParseTree::Leaf { terminal, .. } => terminal,
            ParseTree::Node { rule, .. } => rule.lhs(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ParseTree::Leaf { position, .. } => Span::at(*position, 1),
            ParseTree::Node { span, .. } => *span,
        }
    }

    pub fn rule(&self) -> Option<&'g Rule> {
        match self {
            ParseTree::Leaf { .. } => None,
            ParseTree::Node { rule, .. } => Some(*rule),
        }
    }

    pub fn children(&self) -> &[ParseTree<'g>] {
        match self {
            ParseTree::Leaf { .. } => &[],
            ParseTree::Node { children, .. } => children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ParseTree::Leaf { .. })
    }

    // Leaves from left to right
    pub fn leaves(&self) -> Vec<&ParseTree<'g>> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a ParseTree<'g>>) {
        match self {
            ParseTree::Leaf { .. } => leaves.push(self),
            ParseTree::Node { children, .. } => {
                for child in children {
                    child.collect_leaves(leaves);
                }
            }
        }
    }

    pub fn tokens(&self) -> Vec<&str> {
        self.leaves()
            .into_iter()
            .filter_map(|leaf| match leaf {
                ParseTree::Leaf { token, .. } => Some(&**token),
                ParseTree::Node { .. } => None,
            })
            .collect()
    }

    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(ParseTree::depth).max().unwrap_or(0)
    }

    pub fn contains_rule(&self, id: RuleId) -> bool {
        match self {
            ParseTree::Leaf { .. } => false,
            ParseTree::Node { rule, children, .. } => {
                rule.id() == id || children.iter().any(|child| child.contains_rule(id))
            }
        }
    }
}

// Labelled bracket notation: [S [NP [PN jojo]] [VP [V_I slept]]]
impl Display for ParseTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseTree::Leaf { terminal, token, .. } => write!(f, "[{} {}]", terminal, token),
            ParseTree::Node { rule, children, .. } => {
                write!(f, "[{}", rule.lhs())?;
                for child in children {
                    write!(f, " {}", child)?;
                }
                write!(f, "]")
            }
        }
    }
}

// Expands every derivation of the whole input from a nonterminal `start`
// into its own tree, in forest order: rule applications in the order the
// forest keeps them, and for each application the cartesian product of its
// children's expansions with the leftmost child varying slowest. A tree
// never repeats a node on one root-to-leaf path.
#[instrument(skip_all, fields(start = start))]
pub fn materialize<'g>(forest: &Forest<'g>, start: &str) -> Vec<ParseTree<'g>> {
    let Some(root) = forest.root(start) else {
        debug!("no derivation for the whole input");
        return Vec::new();
    };

    let mut expansion = Expansion {
        forest,
        cyclic: forest.cyclic_nodes(),
        path: Vec::new(),
        memo: HashMap::new(),
    };
    let trees = expansion.expand(root.key());
    debug!(trees = trees.len(), expanded = expansion.memo.len(), "materialized");

    drop(expansion);
    Rc::try_unwrap(trees).unwrap_or_else(|shared| (*shared).clone())
}

struct Expansion<'f, 'g> {
    forest: &'f Forest<'g>,
    // Nodes on unary cycles are expanded per path and never memoized
    cyclic: HashSet<&'f NodeKey>,
    path: Vec<&'f NodeKey>,
    memo: HashMap<&'f NodeKey, Rc<Vec<ParseTree<'g>>>>,
}

impl<'f, 'g> Expansion<'f, 'g> {
    fn expand(&mut self, key: &'f NodeKey) -> Rc<Vec<ParseTree<'g>>> {
        if let Some(trees) = self.memo.get(key) {
            return trees.clone();
        }

        let on_cycle = self.cyclic.contains(key);
        if on_cycle && self.path.contains(&key) {
            return Rc::new(Vec::new());
        }

        let forest = self.forest;
        let mut trees = Vec::new();
        match forest.get(key) {
            None => {}
            Some(node) if node.is_leaf() => trees.push(ParseTree::Leaf {
                terminal: node.symbol().clone(),
                token: forest.tokens()[node.span().start()].clone(),
                position: node.span().start(),
            }),
            Some(node) => {
                if on_cycle {
                    self.path.push(key);
                }
                for application in node.applications() {
                    let rule = forest.grammar().rule(application.rule);
                    let expansions = application
                        .children
                        .iter()
                        .map(|child| self.expand(child))
                        .collect_vec();

                    for children in expansions
                        .iter()
                        .map(|expansion| expansion.iter())
                        .multi_cartesian_product()
                    {
                        trees.push(ParseTree::Node {
                            rule,
                            span: node.span(),
                            children: children.into_iter().cloned().collect(),
                        });
                    }
                }
                if on_cycle {
                    self.path.pop();
                }
            }
        }

        let trees = Rc::new(trees);
        if !on_cycle {
            self.memo.insert(key, trees.clone());
        }
        trees
    }
}
