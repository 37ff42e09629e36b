/*
    This module holds the errors of grammar construction, enumeration and
    evaluation
*/

use thiserror::Error;

// Problems found while building a `crate::grammar::Grammar`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("rule for `{lhs}` has an empty right-hand side")]
    EmptyRule { lhs: String },

    #[error("rule `{rule}` is declared more than once")]
    DuplicateRule { rule: String },

    #[error("`{name}` heads a rule and is also a lexicon category")]
    KindConflict { name: String },
}

// Fatal conditions for a whole enumeration call.
//
// An input with no parse is not an error: it produces an empty forest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnumerateError {
    #[error("start symbol `{0}` is not part of the grammar")]
    UnknownStartSymbol(String),

    #[error("start symbol `{0}` is a terminal category")]
    StartIsTerminal(String),

    #[error("enumeration gave up after {steps} steps at span width {width}")]
    ResourceExceeded { steps: u64, width: usize },
}

// Raised while resolving a model's tables against a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("grammar has no rule `{rule}`")]
    UnknownRule { rule: String },

    #[error("`{0}` is not a terminal category of the grammar")]
    UnknownTerminal(String),
}

// Why a single reading could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("model has no value for `{token}` as {terminal}")]
    MissingLexicalEntry { token: String, terminal: String },

    #[error("model has no composition for rule `{rule}`")]
    MissingRuleComposition { rule: String },

    #[error("composition failed at `{at}`: {reason}")]
    CompositionFailure { at: String, reason: String },
}

// Signalled by a model function when its inputs do not combine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct CompositionError {
    pub reason: String,
}

impl CompositionError {
    pub fn new(reason: impl Into<String>) -> Self {
        CompositionError {
            reason: reason.into(),
        }
    }
}
