/*
    denote: exhaustive parsing and compositional interpretation of sentences
    against a user-supplied grammar and model

    tokens + grammar -> enumerate   -> Forest (shared derivations)
                     -> materialize -> ParseTree per reading
                     -> evaluate    -> Reading (value or error per tree)
*/

pub mod chart;
pub mod denotation;
pub mod error;
pub mod error_handling;
pub mod forest;
pub mod generator;
pub mod grammar;
pub mod parser;
pub mod semantics;
pub mod tree;

pub use chart::{enumerate, enumerate_with, Budget, EnumerateOptions};
pub use denotation::{Denotation, Extensional};
pub use error::{CompositionError, EnumerateError, EvalError, GrammarError, ModelError};
pub use forest::{Forest, Span};
pub use grammar::{Grammar, GrammarBuilder, Rule, RuleId, Symbol};
pub use semantics::{evaluate, evaluate_all, Interpretation, Model, Reading, Site};
pub use tree::{materialize, ParseTree};

use tracing::instrument;

// Every reading of a sentence, each with its value or evaluation error.
#[derive(Debug, Clone)]
pub struct Interpretations<'g, V> {
    pub readings: Vec<Reading<'g, V>>,
}

impl<'g, V> Interpretations<'g, V> {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    // No derivation at all, as opposed to derivations that failed to evaluate
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&ParseTree<'g>, &V)> {
        self.readings
            .iter()
            .filter_map(|reading| reading.value.as_ref().ok().map(|value| (&reading.tree, value)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ParseTree<'g>, &EvalError)> {
        self.readings
            .iter()
            .filter_map(|reading| reading.value.as_ref().err().map(|error| (&reading.tree, error)))
    }
}

// Runs the whole pipeline: enumerates the derivations of `tokens` from
// `start`, expands them into trees and evaluates each tree with `model`.
//
// Only enumeration can fail the call. Trees that cannot be interpreted are
// kept as readings carrying their error.
#[instrument(skip_all, fields(start = start, tokens = tokens.len()))]
pub fn interpret<'g, M, S>(
    grammar: &'g Grammar,
    start: &str,
    tokens: &[S],
    model: &M,
    options: &EnumerateOptions,
) -> Result<Interpretations<'g, M::Value>, EnumerateError>
where
    M: Interpretation + Sync + ?Sized,
    M::Value: Send,
    S: AsRef<str>,
{
    let forest = enumerate_with(grammar, start, tokens, options)?;
    let trees = materialize(&forest, start);

    let readings = if options.parallel {
        semantics::evaluate_all_parallel(trees, model)
    } else {
        evaluate_all(trees, model)
    };

    Ok(Interpretations { readings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::Echo;

    #[test]
    fn pipeline_keeps_failed_readings() {
        let grammar = Grammar::builder("S")
            .rule("S", ["N"])
            .rule("S", ["V"])
            .word("run", "N")
            .word("run", "V")
            .build()
            .unwrap();
        let mut builder = Model::<String>::builder(&grammar);
        builder
            .words("N", |_, token| Ok(format!("noun {}", token)))
            .unwrap()
            .words("V", |_, token| Ok(format!("verb {}", token)))
            .unwrap()
            .rule("S", &["N"], |_, mut children| Ok(children.remove(0)))
            .unwrap();
        let model = builder.build();

        let result = interpret(&grammar, "S", &["run"], &model, &EnumerateOptions::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            result.successes().map(|(_, value)| value.as_str()).collect::<Vec<_>>(),
            vec!["noun run"]
        );
        assert_eq!(
            result.failures().map(|(tree, _)| tree.to_string()).collect::<Vec<_>>(),
            vec!["[S [V run]]"]
        );
    }

    #[test]
    fn pipeline_distinguishes_no_parse_from_abort() {
        let grammar = Grammar::builder("S").rule("S", ["V"]).word("ran", "V").build().unwrap();

        let result = interpret(&grammar, "S", &["flew"], &Echo, &EnumerateOptions::default()).unwrap();
        assert!(result.is_empty());

        let options = EnumerateOptions::default()
            .with_budget(Budget::unbounded().with_deadline(std::time::Instant::now()));
        assert!(matches!(
            interpret(&grammar, "S", &["ran"], &Echo, &options),
            Err(EnumerateError::ResourceExceeded { .. })
        ));
    }
}
