/*
    This module evaluates parse trees bottom-up

    Leaves get their value from the interpretation's lexical assignment and
    nodes combine their children's values with the composition for their
    rule. Values are opaque here.
*/

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::error::{CompositionError, EvalError, ModelError};
use crate::forest::Span;
use crate::grammar::{Grammar, Rule, RuleId, Symbol};
use crate::tree::ParseTree;

// Where in the tree a value is being computed.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    pub symbol: &'a Symbol,
    pub span: Span,
}

// Assigns meanings to leaves and combines them at nodes.
//
// `Model` is the table-driven implementation. `crate::denotation::Extensional`
// decides composition by inspecting the values instead of the rule.
pub trait Interpretation {
    type Value;

    fn leaf(&self, site: &Site<'_>, token: &str) -> Result<Self::Value, EvalError>;

    fn compose(
        &self,
        site: &Site<'_>,
        rule: &Rule,
        children: Vec<Self::Value>,
    ) -> Result<Self::Value, EvalError>;
}

pub type ComposeFn<V> =
    Box<dyn Fn(&Site<'_>, Vec<V>) -> Result<V, CompositionError> + Send + Sync>;
pub type LeafFn<V> = Box<dyn Fn(&Site<'_>, &str) -> Result<V, CompositionError> + Send + Sync>;

// Composition functions per rule and values per lexical entry.
//
// Built with `ModelBuilder`, which resolves rule and terminal names
// against a grammar once, so evaluation only does id lookups.
pub struct Model<V> {
    compositions: HashMap<RuleId, ComposeFn<V>>,
    entries: HashMap<Symbol, HashMap<String, LeafFn<V>>>,
    categories: HashMap<Symbol, LeafFn<V>>,
}

impl<V> Model<V> {
    pub fn builder(grammar: &Grammar) -> ModelBuilder<'_, V> {
        ModelBuilder {
            grammar,
            model: Model {
                compositions: HashMap::new(),
                entries: HashMap::new(),
                categories: HashMap::new(),
            },
        }
    }

    pub fn has_composition(&self, rule: RuleId) -> bool {
        self.compositions.contains_key(&rule)
    }
}

impl<V> std::fmt::Debug for Model<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("compositions", &self.compositions.len())
            .field("entries", &self.entries.values().map(HashMap::len).sum::<usize>())
            .field("categories", &self.categories.len())
            .finish()
    }
}

impl<V> Interpretation for Model<V> {
    type Value = V;

    fn leaf(&self, site: &Site<'_>, token: &str) -> Result<V, EvalError> {
        let assign = self
            .entries
            .get(site.symbol)
            .and_then(|words| words.get(token))
            .or_else(|| self.categories.get(site.symbol))
            .ok_or_else(|| EvalError::MissingLexicalEntry {
                token: token.to_string(),
                terminal: site.symbol.name().to_string(),
            })?;

        assign(site, token).map_err(|error| EvalError::CompositionFailure {
            at: format!("{} {}", site.symbol, token),
            reason: error.reason,
        })
    }

    fn compose(&self, site: &Site<'_>, rule: &Rule, children: Vec<V>) -> Result<V, EvalError> {
        let compose = self
            .compositions
            .get(&rule.id())
            .ok_or_else(|| EvalError::MissingRuleComposition {
                rule: rule.to_string(),
            })?;

        compose(site, children).map_err(|error| EvalError::CompositionFailure {
            at: rule.to_string(),
            reason: error.reason,
        })
    }
}

#[derive(Debug)]
pub struct ModelBuilder<'g, V> {
    grammar: &'g Grammar,
    model: Model<V>,
}

impl<'g, V> ModelBuilder<'g, V> {
    // Installs the composition for the rule `lhs -> rhs`.
    pub fn rule<F>(&mut self, lhs: &str, rhs: &[&str], compose: F) -> Result<&mut Self, ModelError>
    where
        F: Fn(&Site<'_>, Vec<V>) -> Result<V, CompositionError> + Send + Sync + 'static,
    {
        let rule = self
            .grammar
            .find_rule(lhs, rhs)
            .ok_or_else(|| ModelError::UnknownRule {
                rule: format!("{} -> {}", lhs, rhs.join(" ")),
            })?;
        self.model.compositions.insert(rule.id(), Box::new(compose));
        Ok(self)
    }

    // Installs one composition for every rule of the grammar that does not
    // have one yet.
    pub fn every_rule<F>(&mut self, compose: F) -> &mut Self
    where
        F: Fn(&Site<'_>, Vec<V>) -> Result<V, CompositionError> + Send + Sync + Clone + 'static,
    {
        for rule in self.grammar.rules() {
            self.model
                .compositions
                .entry(rule.id())
                .or_insert_with(|| Box::new(compose.clone()));
        }
        self
    }

    // Installs the value function for `token` read as `terminal`.
    pub fn lexical<F>(&mut self, token: &str, terminal: &str, assign: F) -> Result<&mut Self, ModelError>
    where
        F: Fn(&Site<'_>) -> Result<V, CompositionError> + Send + Sync + 'static,
    {
        let terminal = self.terminal(terminal)?;
        self.model
            .entries
            .entry(terminal)
            .or_default()
            .insert(token.to_string(), Box::new(move |site: &Site<'_>, _: &str| assign(site)));
        Ok(self)
    }

    pub fn value(&mut self, token: &str, terminal: &str, value: V) -> Result<&mut Self, ModelError>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.lexical(token, terminal, move |_| Ok(value.clone()))
    }

    // Installs a value function for every token of a terminal category.
    // Entries added with `ModelBuilder::lexical` take precedence.
    pub fn words<F>(&mut self, terminal: &str, assign: F) -> Result<&mut Self, ModelError>
    where
        F: Fn(&Site<'_>, &str) -> Result<V, CompositionError> + Send + Sync + 'static,
    {
        let terminal = self.terminal(terminal)?;
        self.model.categories.insert(terminal, Box::new(assign));
        Ok(self)
    }

    pub fn build(self) -> Model<V> {
        self.model
    }

    fn terminal(&self, name: &str) -> Result<Symbol, ModelError> {
        self.grammar
            .symbol(name)
            .filter(|symbol| symbol.is_terminal())
            .cloned()
            .ok_or_else(|| ModelError::UnknownTerminal(name.to_string()))
    }
}

// Reads every token as itself and joins children with a space.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl Interpretation for Echo {
    type Value = String;

    fn leaf(&self, _: &Site<'_>, token: &str) -> Result<String, EvalError> {
        Ok(token.to_string())
    }

    fn compose(&self, _: &Site<'_>, _: &Rule, children: Vec<String>) -> Result<String, EvalError> {
        Ok(children.join(" "))
    }
}

// Evaluates one tree bottom-up. The first failure inside the tree is the
// result of the whole tree.
pub fn evaluate<M>(tree: &ParseTree<'_>, model: &M) -> Result<M::Value, EvalError>
where
    M: Interpretation + ?Sized,
{
    match tree {
        ParseTree::Leaf { terminal, token, position } => {
            let site = Site {
                symbol: terminal,
                span: Span::at(*position, 1),
            };
            model.leaf(&site, token)
        }
        ParseTree::Node { rule, span, children } => {
            let values = children
                .iter()
                .map(|child| evaluate(child, model))
                .collect::<Result<Vec<_>, _>>()?;
            let site = Site {
                symbol: rule.lhs(),
                span: *span,
            };
            model.compose(&site, rule, values)
        }
    }
}

// A tree together with what it means, or why it means nothing.
#[derive(Debug, Clone)]
pub struct Reading<'g, V> {
    pub tree: ParseTree<'g>,
    pub value: Result<V, EvalError>,
}

impl<V> Reading<'_, V> {
    pub fn is_ok(&self) -> bool {
        self.value.is_ok()
    }
}

// Evaluates each tree on its own; one uninterpretable tree does not stop
// the others.
#[instrument(skip_all, fields(trees = trees.len()))]
pub fn evaluate_all<'g, M>(trees: Vec<ParseTree<'g>>, model: &M) -> Vec<Reading<'g, M::Value>>
where
    M: Interpretation + ?Sized,
{
    let readings = trees
        .into_iter()
        .map(|tree| {
            let value = evaluate(&tree, model);
            Reading { tree, value }
        })
        .collect::<Vec<_>>();
    log_outcome(&readings);
    readings
}

// Like `evaluate_all`, spreading the trees over a thread pool. The model's
// functions are called concurrently and must not rely on shared mutable
// state. Readings keep the order of `trees`.
#[instrument(skip_all, fields(trees = trees.len()))]
pub fn evaluate_all_parallel<'g, M>(
    trees: Vec<ParseTree<'g>>,
    model: &M,
) -> Vec<Reading<'g, M::Value>>
where
    M: Interpretation + Sync + ?Sized,
    M::Value: Send,
{
    let readings = trees
        .into_par_iter()
        .map(|tree| {
            let value = evaluate(&tree, model);
            Reading { tree, value }
        })
        .collect::<Vec<_>>();
    log_outcome(&readings);
    readings
}

fn log_outcome<V>(readings: &[Reading<'_, V>]) {
    let failed = readings.iter().filter(|reading| !reading.is_ok()).count();
    debug!(readings = readings.len(), failed, "evaluated");
}
