/*
    This module holds a type-driven interpretation

    Words denote entities, truth values or functions, and a node's value does
    not depend on its rule: a single child passes its value up, and of two
    children the one that is a function is applied to the other.
*/

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::sync::Arc;

use tracing::trace;

use crate::error::{CompositionError, EvalError};
use crate::grammar::Rule;
use crate::semantics::{Interpretation, Site};

pub type Function = Arc<dyn Fn(&Denotation) -> Result<Denotation, CompositionError> + Send + Sync>;

#[derive(Clone)]
pub enum Denotation {
    Entity(Arc<str>),
    Truth(bool),
    Function(Function),
}

impl Denotation {
    pub fn entity(name: &str) -> Self {
        Denotation::Entity(Arc::from(name))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Denotation) -> Result<Denotation, CompositionError> + Send + Sync + 'static,
    {
        Denotation::Function(Arc::new(f))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Denotation::Function(_))
    }

    pub fn as_entity(&self) -> Option<&str> {
        match self {
            Denotation::Entity(name) => Some(&**name),
            _ => None,
        }
    }

    pub fn as_truth(&self) -> Option<bool> {
        match self {
            Denotation::Truth(value) => Some(*value),
            _ => None,
        }
    }

    pub fn apply(&self, argument: &Denotation) -> Result<Denotation, CompositionError> {
        match self {
            Denotation::Function(f) => f(argument),
            other => Err(CompositionError::new(format!("{} is not a function", other))),
        }
    }
}

impl Display for Denotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denotation::Entity(name) => write!(f, "{}", name),
            Denotation::Truth(value) => write!(f, "{}", value),
            Denotation::Function(_) => write!(f, "<function>"),
        }
    }
}

impl Debug for Denotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denotation::Entity(name) => f.debug_tuple("Entity").field(name).finish(),
            Denotation::Truth(value) => f.debug_tuple("Truth").field(value).finish(),
            Denotation::Function(_) => f.write_str("Function(..)"),
        }
    }
}

// Functions never compare equal, not even to themselves
impl PartialEq for Denotation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Denotation::Entity(a), Denotation::Entity(b)) => a == b,
            (Denotation::Truth(a), Denotation::Truth(b)) => a == b,
            _ => false,
        }
    }
}

fn expect_entity<'d>(word: &str, value: &'d Denotation) -> Result<&'d str, CompositionError> {
    value
        .as_entity()
        .ok_or_else(|| CompositionError::new(format!("`{}` expects an entity, got {}", word, value)))
}

// A domain of entities and a table from words to what they denote.
//
// Words are looked up by token alone, whatever category they were parsed
// as.
#[derive(Clone, Default)]
pub struct Extensional {
    domain: Vec<Arc<str>>,
    lexicon: HashMap<String, Denotation>,
}

impl Extensional {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(&self) -> &[Arc<str>] {
        &self.domain
    }

    pub fn get(&self, token: &str) -> Option<&Denotation> {
        self.lexicon.get(token)
    }

    // `token` names the entity `name`, which joins the domain
    pub fn entity(&mut self, token: impl Into<String>, name: &str) -> &mut Self {
        if !self.domain.iter().any(|known| &**known == name) {
            self.domain.push(Arc::from(name));
        }
        self.interpret(token, Denotation::entity(name))
    }

    pub fn interpret(&mut self, token: impl Into<String>, denotation: Denotation) -> &mut Self {
        self.lexicon.insert(token.into(), denotation);
        self
    }

    // True of exactly the entities in `members`
    pub fn predicate<I, S>(&mut self, token: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let token = token.into();
        let members = members.into_iter().map(Into::into).collect::<HashSet<String>>();
        let word = token.clone();

        self.interpret(
            token,
            Denotation::function(move |x| {
                let x = expect_entity(&word, x)?;
                Ok(Denotation::Truth(members.contains(x)))
            }),
        )
    }

    // Holds of (subject, object) pairs. The verb takes its object first, so
    // it combines with the object inside the verb phrase.
    pub fn relation<I, A, B>(&mut self, token: impl Into<String>, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let token = token.into();
        let pairs = Arc::new(
            pairs
                .into_iter()
                .map(|(subject, object)| (subject.into(), object.into()))
                .collect::<Vec<(String, String)>>(),
        );
        let word = token.clone();

        self.interpret(
            token,
            Denotation::function(move |object| {
                let object = expect_entity(&word, object)?.to_string();
                let (pairs, word) = (pairs.clone(), word.clone());
                Ok(Denotation::function(move |subject| {
                    let subject = expect_entity(&word, subject)?;
                    Ok(Denotation::Truth(pairs.iter().any(|(s, o)| s == subject && *o == object)))
                }))
            }),
        )
    }
}

impl Interpretation for Extensional {
    type Value = Denotation;

    fn leaf(&self, site: &Site<'_>, token: &str) -> Result<Denotation, EvalError> {
        self.lexicon
            .get(token)
            .cloned()
            .ok_or_else(|| EvalError::MissingLexicalEntry {
                token: token.to_string(),
                terminal: site.symbol.name().to_string(),
            })
    }

    fn compose(
        &self,
        site: &Site<'_>,
        rule: &Rule,
        children: Vec<Denotation>,
    ) -> Result<Denotation, EvalError> {
        let value = match children.as_slice() {
            [only] => Ok(only.clone()),
            [left, right] => match (left.is_function(), right.is_function()) {
                (true, false) => left.apply(right),
                (false, true) => right.apply(left),
                _ => Err(CompositionError::new(format!("cannot combine {} with {}", left, right))),
            },
            _ => Err(CompositionError::new(format!(
                "cannot combine {} values",
                children.len()
            ))),
        };

        let value = value.map_err(|error| EvalError::CompositionFailure {
            at: rule.to_string(),
            reason: error.reason,
        })?;
        trace!(span = %site.span, %value, "composed");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::enumerate;
    use crate::grammar::Grammar;
    use crate::semantics::evaluate;
    use crate::tree::materialize;
    use pretty_assertions::assert_eq;

    fn grammar() -> Grammar {
        Grammar::builder("S")
            .rule("S", ["NP", "VP"])
            .rule("S", ["PN", "PN"])
            .rule("NP", ["PN"])
            .rule("VP", ["V_I"])
            .rule("VP", ["V_T", "NP"])
            .words("PN", ["albert", "betty", "carol"])
            .words("V_I", ["cried", "swam"])
            .words("V_T", ["admired"])
            .build()
            .unwrap()
    }

    fn model() -> Extensional {
        let mut model = Extensional::new();
        model
            .entity("albert", "a")
            .entity("betty", "b")
            .entity("carol", "c")
            .predicate("cried", ["b"])
            .relation("admired", [("a", "b"), ("b", "c")]);
        model
    }

    fn value(grammar: &Grammar, model: &Extensional, sentence: &str) -> Result<Denotation, EvalError> {
        let tokens = sentence.split(' ').collect::<Vec<_>>();
        let forest = enumerate(grammar, "S", &tokens).unwrap();
        let trees = materialize(&forest, "S");
        assert_eq!(trees.len(), 1);
        evaluate(&trees[0], model)
    }

    #[test]
    fn functions_apply_from_either_side() {
        let grammar = grammar();
        let model = model();

        assert_eq!(value(&grammar, &model, "betty cried"), Ok(Denotation::Truth(true)));
        assert_eq!(value(&grammar, &model, "carol cried"), Ok(Denotation::Truth(false)));
        assert_eq!(value(&grammar, &model, "albert admired betty"), Ok(Denotation::Truth(true)));
        assert_eq!(value(&grammar, &model, "betty admired albert"), Ok(Denotation::Truth(false)));
        assert_eq!(value(&grammar, &model, "betty admired carol"), Ok(Denotation::Truth(true)));
    }

    #[test]
    fn entities_form_the_domain_once() {
        let mut model = model();
        model.entity("bettie", "b");

        assert_eq!(model.domain().iter().map(|e| &**e).collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(model.get("bettie"), Some(&Denotation::entity("b")));
        assert_eq!(model.get("dog"), None);
    }

    #[test]
    fn mismatched_values_fail() {
        let grammar = grammar();
        let model = model();

        assert_eq!(
            value(&grammar, &model, "albert betty"),
            Err(EvalError::CompositionFailure {
                at: "S -> PN PN".to_string(),
                reason: "cannot combine a with b".to_string(),
            })
        );
        assert_eq!(
            value(&grammar, &model, "albert swam"),
            Err(EvalError::MissingLexicalEntry {
                token: "swam".to_string(),
                terminal: "V_I".to_string(),
            })
        );

        let cried = model.get("cried").unwrap();
        assert_eq!(
            cried.apply(&Denotation::Truth(true)),
            Err(CompositionError::new("`cried` expects an entity, got true"))
        );
        assert_eq!(
            Denotation::entity("a").apply(&Denotation::entity("b")),
            Err(CompositionError::new("a is not a function"))
        );
        assert_eq!(cried.as_truth(), None);
        assert!(cried.is_function());
    }

    #[test]
    fn functions_never_compare_equal() {
        let model = model();
        let admired = model.get("admired").unwrap();

        assert_ne!(admired, &admired.clone());
        assert_eq!(format!("{:?}", admired), "Function(..)");
        assert_eq!(admired.to_string(), "<function>");
    }
}
