/*
    This module generates random sentences from a grammar
*/

use std::collections::HashMap;

use itertools::Itertools;
use rand::prelude::*;
use thiserror::Error;

use crate::grammar::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    // The start symbol is not in the grammar
    #[error("no symbol named `{0}`")]
    UndefinedSymbol(String),
    // Some symbol on the way can never finish into words
    #[error("`{0}` does not derive any sentence")]
    Unproductive(String),
}

pub type GenResult = Result<Vec<String>, GenerateError>;

// Random sentence generator.
//
// Rules are picked uniformly until `depth` levels deep, after that only the
// alternatives that finish quickest are used, so recursive grammars still
// produce finite sentences.
#[derive(Debug)]
pub struct Generator<'g> {
    grammar: &'g Grammar,
    depth: usize,
    // Height of the shallowest derivation of each productive symbol
    heights: HashMap<Symbol, usize>,
}

impl<'g> Generator<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Generator {
            grammar,
            depth: 8,
            heights: heights(grammar),
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn generate(&self, start: &str, rng: &mut impl Rng) -> GenResult {
        let symbol = self
            .grammar
            .symbol(start)
            .ok_or_else(|| GenerateError::UndefinedSymbol(start.to_string()))?;

        let mut sentence = Vec::new();
        self.generate_symbol(symbol, 0, rng, &mut sentence)?;
        return Ok(sentence);
    }

    fn generate_symbol(
        &self,
        symbol: &Symbol,
        depth: usize,
        rng: &mut impl Rng,
        sentence: &mut Vec<String>,
    ) -> Result<(), GenerateError> {
        if !self.heights.contains_key(symbol) {
            return Err(GenerateError::Unproductive(symbol.name().to_string()));
        }

        if symbol.is_terminal() {
            let word = self
                .grammar
                .lexicon()
                .words_of(symbol)
                .choose(rng)
                .ok_or_else(|| GenerateError::Unproductive(symbol.name().to_string()))?;
            sentence.push(word.to_string());
            return Ok(());
        }

        let rule = self
            .choose_rule(symbol, depth, rng)
            .ok_or_else(|| GenerateError::Unproductive(symbol.name().to_string()))?;
        for child in rule.rhs() {
            self.generate_symbol(child, depth + 1, rng, sentence)?;
        }

        Ok(())
    }

    fn choose_rule(&self, symbol: &Symbol, depth: usize, rng: &mut impl Rng) -> Option<&'g Rule> {
        let productive = self
            .grammar
            .rules_for(symbol)
            .filter_map(|rule| self.rule_height(rule).map(|height| (rule, height)))
            .collect_vec();

        if depth < self.depth {
            return productive.choose(rng).map(|(rule, _)| *rule);
        }

        let lowest = productive.iter().map(|(_, height)| *height).min()?;
        productive
            .iter()
            .filter(|(_, height)| *height == lowest)
            .collect_vec()
            .choose(rng)
            .map(|(rule, _)| *rule)
    }

    fn rule_height(&self, rule: &Rule) -> Option<usize> {
        rule.rhs()
            .iter()
            .map(|child| self.heights.get(child).copied())
            .fold_options(0, usize::max)
            .map(|height| height + 1)
    }
}

// Generates a sentence from the grammar's own start symbol
pub fn generate(grammar: &Grammar) -> GenResult {
    Generator::new(grammar).generate(grammar.start().name(), &mut thread_rng())
}

// Fixpoint over the rules: a nonterminal is productive once one of its rules
// only uses productive symbols
fn heights(grammar: &Grammar) -> HashMap<Symbol, usize> {
    let mut heights: HashMap<Symbol, usize> = grammar
        .terminals()
        .filter(|terminal| !grammar.lexicon().words_of(terminal).is_empty())
        .map(|terminal| (terminal.clone(), 0))
        .collect();

    loop {
        let mut changed = false;
        for rule in grammar.rules() {
            let Some(height) = rule
                .rhs()
                .iter()
                .map(|child| heights.get(child).copied())
                .fold_options(0, usize::max)
            else {
                continue;
            };

            let height = height + 1;
            let known = heights.entry(rule.lhs().clone()).or_insert(usize::MAX);
            if height < *known {
                *known = height;
                changed = true;
            }
        }

        if !changed {
            return heights;
        }
    }
}
