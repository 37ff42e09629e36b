/*
    This module enumerates every derivation of a sentence into a forest

    Cells are filled bottom-up by span width: lexicon terminals for single
    tokens, then each rule of arity two or more whose right-hand side splits
    across narrower spans, then the unary closure of the cell. Prefix matches
    of long rules are memoized with the split points that produced them.

    Cells of one width only read narrower cells, so a width can be computed
    in parallel and merged in start order.
*/

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, instrument, trace};

use crate::error::EnumerateError;
use crate::forest::{Application, Forest, ForestNode, NodeKey, Span};
use crate::grammar::{Grammar, Rule, RuleId, Symbol};

// Limits checked between span widths.
#[derive(Debug, Clone, Copy, Default)]
pub struct Budget {
    pub max_steps: Option<u64>,
    pub deadline: Option<Instant>,
}

impl Budget {
    pub fn unbounded() -> Self {
        Budget::default()
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    fn exceeded(&self, steps: u64) -> bool {
        self.max_steps.is_some_and(|max| steps > max)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnumerateOptions {
    pub budget: Budget,
    // Compute the cells of one width concurrently
    pub parallel: bool,
}

impl EnumerateOptions {
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

// Builds the forest of every derivation of `tokens` from `start`.
//
// An input without a derivation gives a forest without a root; that is not
// an error.
pub fn enumerate<'g, S: AsRef<str>>(
    grammar: &'g Grammar,
    start: &str,
    tokens: &[S],
) -> Result<Forest<'g>, EnumerateError> {
    enumerate_with(grammar, start, tokens, &EnumerateOptions::default())
}

#[instrument(skip_all, fields(start = start, tokens = tokens.len(), parallel = options.parallel))]
pub fn enumerate_with<'g, S: AsRef<str>>(
    grammar: &'g Grammar,
    start: &str,
    tokens: &[S],
    options: &EnumerateOptions,
) -> Result<Forest<'g>, EnumerateError> {
    let start_symbol = grammar
        .symbol(start)
        .ok_or_else(|| EnumerateError::UnknownStartSymbol(start.to_string()))?;
    if start_symbol.is_terminal() {
        return Err(EnumerateError::StartIsTerminal(start.to_string()));
    }

    let tokens = tokens.iter().map(|t| Arc::from(t.as_ref())).collect_vec();
    let length = tokens.len();
    let mut chart = Chart::new(grammar, tokens);

    for width in 1..=length {
        if options.budget.exceeded(chart.steps) {
            debug!(steps = chart.steps, width, "enumeration budget exceeded");
            return Err(EnumerateError::ResourceExceeded {
                steps: chart.steps,
                width,
            });
        }

        let starts = 0..=length - width;
        let cells = if options.parallel {
            starts
                .into_par_iter()
                .map(|start| chart.fill(Span::at(start, width)))
                .collect::<Vec<_>>()
        } else {
            starts.map(|start| chart.fill(Span::at(start, width))).collect_vec()
        };

        for cell in cells {
            chart.absorb(cell);
        }
    }

    // The widest span is charged too
    if length > 0 && options.budget.exceeded(chart.steps) {
        debug!(steps = chart.steps, width = length, "enumeration budget exceeded");
        return Err(EnumerateError::ResourceExceeded {
            steps: chart.steps,
            width: length,
        });
    }

    debug!(
        nodes = chart.nodes.len(),
        partials = chart.partials.len(),
        steps = chart.steps,
        "enumeration complete"
    );

    Ok(chart.into_forest())
}

// The first `dot` symbols of `rule` derive `span`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Partial {
    rule: RuleId,
    dot: usize,
    span: Span,
}

struct Cell {
    nodes: Vec<ForestNode>,
    partials: Vec<(Partial, Vec<usize>)>,
    steps: u64,
}

struct Chart<'g> {
    grammar: &'g Grammar,
    tokens: Vec<Arc<str>>,
    nodes: IndexMap<NodeKey, ForestNode>,
    // Split points for each partial match: the last matched symbol starts
    // at the split, the shorter prefix ends there
    partials: HashMap<Partial, Vec<usize>>,
    steps: u64,
}

impl<'g> Chart<'g> {
    fn new(grammar: &'g Grammar, tokens: Vec<Arc<str>>) -> Self {
        Chart {
            grammar,
            tokens,
            nodes: IndexMap::new(),
            partials: HashMap::new(),
            steps: 0,
        }
    }

    fn into_forest(self) -> Forest<'g> {
        Forest::new(self.grammar, self.tokens, self.nodes)
    }

    fn absorb(&mut self, cell: Cell) {
        self.steps += cell.steps;
        for node in cell.nodes {
            self.nodes.insert(node.key().clone(), node);
        }
        self.partials.extend(cell.partials);
    }

    fn has(&self, symbol: &Symbol, span: Span) -> bool {
        self.nodes.contains_key(&NodeKey::new(symbol.clone(), span))
    }

    fn fill(&self, span: Span) -> Cell {
        let mut local: IndexMap<Symbol, Vec<Application>> = IndexMap::new();
        let mut steps = 0;

        if span.width() == 1 {
            let token = &self.tokens[span.start()];
            let terminals = self.grammar.lexicon().terminals_for(token);
            if terminals.is_empty() {
                trace!(token = &**token, position = span.start(), "token has no lexicon entry");
            }
            for terminal in terminals {
                local.insert(terminal.clone(), Vec::new());
            }
        }

        for rule in self.grammar.rules() {
            if rule.arity() < 2 || rule.arity() > span.width() {
                continue;
            }
            for children in self.complete(rule, span) {
                steps += 1;
                local
                    .entry(rule.lhs().clone())
                    .or_default()
                    .push(Application {
                        rule: rule.id(),
                        children,
                    });
            }
        }

        steps += self.close_unary(span, &mut local);

        let partials = self.extend_partials(span, &local);
        steps += partials.iter().map(|(_, splits)| splits.len() as u64).sum::<u64>();

        let nodes = local
            .into_iter()
            .map(|(symbol, mut applications)| {
                applications.sort_by(|a, b| {
                    a.rule.cmp(&b.rule).then_with(|| {
                        a.children
                            .iter()
                            .map(|child| child.span)
                            .cmp(b.children.iter().map(|child| child.span))
                    })
                });
                ForestNode::new(NodeKey::new(symbol, span), applications)
            })
            .collect_vec();

        if !nodes.is_empty() {
            trace!(%span, symbols = nodes.len(), "cell filled");
        }

        Cell {
            nodes,
            partials,
            steps,
        }
    }

    // Every way of matching the whole right-hand side of `rule` over `span`,
    // as child keys in left-to-right split order
    fn complete(&self, rule: &Rule, span: Span) -> Vec<Vec<NodeKey>> {
        let arity = rule.arity();
        let last = &rule.rhs()[arity - 1];
        let mut found = Vec::new();

        for split in span.start() + arity - 1..span.end() {
            let tail = Span::at(split, span.end() - split);
            if !self.has(last, tail) {
                continue;
            }
            let prefix = Span::at(span.start(), split - span.start());
            for mut children in self.unfold(rule, arity - 1, prefix) {
                children.push(NodeKey::new(last.clone(), tail));
                found.push(children);
            }
        }

        found
    }

    fn unfold(&self, rule: &Rule, dot: usize, span: Span) -> Vec<Vec<NodeKey>> {
        let Some(splits) = self.partials.get(&Partial {
            rule: rule.id(),
            dot,
            span,
        }) else {
            return Vec::new();
        };

        let symbol = &rule.rhs()[dot - 1];
        let mut sequences = Vec::new();
        for &split in splits {
            let child = NodeKey::new(symbol.clone(), Span::at(split, span.end() - split));
            if dot == 1 {
                sequences.push(vec![child]);
                continue;
            }
            let prefix = Span::at(span.start(), split - span.start());
            for mut children in self.unfold(rule, dot - 1, prefix) {
                children.push(child.clone());
                sequences.push(children);
            }
        }

        sequences
    }

    // Applies unary rules inside the cell until nothing changes. Unary
    // cycles are recorded like any other application; expansion cuts them
    fn close_unary(&self, span: Span, local: &mut IndexMap<Symbol, Vec<Application>>) -> u64 {
        let unary = self.grammar.rules().iter().filter(|rule| rule.is_unary()).collect_vec();
        let mut steps = 0;

        loop {
            let mut changed = false;
            for rule in &unary {
                let child = &rule.rhs()[0];
                if !local.contains_key(child) {
                    continue;
                }

                let application = Application {
                    rule: rule.id(),
                    children: vec![NodeKey::new(child.clone(), span)],
                };
                if local
                    .get(rule.lhs())
                    .is_some_and(|existing| existing.contains(&application))
                {
                    continue;
                }
                local.entry(rule.lhs().clone()).or_default().push(application);
                steps += 1;
                changed = true;
            }

            if !changed {
                return steps;
            }
        }
    }

    fn extend_partials(
        &self,
        span: Span,
        local: &IndexMap<Symbol, Vec<Application>>,
    ) -> Vec<(Partial, Vec<usize>)> {
        let mut partials = Vec::new();

        for rule in self.grammar.rules() {
            // Full matches are applications, not partials
            for dot in 1..rule.arity().min(span.width() + 1) {
                let symbol = &rule.rhs()[dot - 1];
                let splits = if dot == 1 {
                    if local.contains_key(symbol) {
                        vec![span.start()]
                    } else {
                        Vec::new()
                    }
                } else {
                    (span.start() + dot - 1..span.end())
                        .filter(|&split| {
                            self.has(symbol, Span::at(split, span.end() - split))
                                && self.partials.contains_key(&Partial {
                                    rule: rule.id(),
                                    dot: dot - 1,
                                    span: Span::at(span.start(), split - span.start()),
                                })
                        })
                        .collect_vec()
                };

                if !splits.is_empty() {
                    partials.push((
                        Partial {
                            rule: rule.id(),
                            dot,
                            span,
                        },
                        splits,
                    ));
                }
            }
        }

        partials
    }
}
