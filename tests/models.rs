use std::sync::Arc;

use denote::{interpret, CompositionError, Denotation, EnumerateOptions, EvalError, Extensional, Grammar, Model};
use pretty_assertions::assert_eq;

type Pred = Arc<dyn Fn(&str) -> bool + Send + Sync>;

// Values of a small extensional model: noun phrases are generalized
// quantifiers, so names and quantified phrases compose the same way
#[derive(Clone)]
enum Meaning {
    Entity(String),
    Pred(Pred),
    Rel(Arc<dyn Fn(&str, &str) -> bool + Send + Sync>),
    Det(Arc<dyn Fn(Pred, Pred) -> bool + Send + Sync>),
    Np(Arc<dyn Fn(Pred) -> bool + Send + Sync>),
    Truth(bool),
}

const DOMAIN: &[&str] = &["albert", "betty", "carol"];
const ADMIRES: &[(&str, &str)] = &[("albert", "betty"), ("betty", "carol"), ("carol", "betty")];

fn mismatch() -> CompositionError {
    CompositionError::new("type mismatch")
}

fn english() -> Grammar {
    Grammar::builder("S")
        .rule("S", ["NP", "VP"])
        .rule("NP", ["PN"])
        .rule("NP", ["Q", "N"])
        .rule("VP", ["V_I"])
        .rule("VP", ["V_T", "NP"])
        .words("PN", DOMAIN.iter().copied())
        .words("Q", ["every", "some"])
        .words("N", ["person"])
        .words("V_I", ["ran"])
        .words("V_T", ["admired"])
        .build()
        .unwrap()
}

fn extensional(grammar: &Grammar) -> Model<Meaning> {
    let mut builder = Model::<Meaning>::builder(grammar);
    builder
        .words("PN", |_, token| Ok(Meaning::Entity(token.to_string())))
        .unwrap()
        .words("N", |_, _| Ok(Meaning::Pred(Arc::new(|x: &str| DOMAIN.iter().any(|d| *d == x)))))
        .unwrap()
        .lexical("every", "Q", |_| {
            Ok(Meaning::Det(Arc::new(|restrictor: Pred, scope: Pred| {
                DOMAIN.iter().copied().filter(|&x| restrictor(x)).all(|x| scope(x))
            })))
        })
        .unwrap()
        .lexical("some", "Q", |_| {
            Ok(Meaning::Det(Arc::new(|restrictor: Pred, scope: Pred| {
                DOMAIN.iter().copied().filter(|&x| restrictor(x)).any(|x| scope(x))
            })))
        })
        .unwrap()
        .value("ran", "V_I", Meaning::Pred(Arc::new(|x: &str| x == "betty")))
        .unwrap()
        .value(
            "admired",
            "V_T",
            Meaning::Rel(Arc::new(|s: &str, o: &str| ADMIRES.iter().any(|&(a, b)| a == s && b == o))),
        )
        .unwrap()
        .rule("NP", &["PN"], |_, children| match children.as_slice() {
            [Meaning::Entity(e)] => {
                let e = e.clone();
                Ok(Meaning::Np(Arc::new(move |p: Pred| p(e.as_str()))))
            }
            _ => Err(mismatch()),
        })
        .unwrap()
        .rule("NP", &["Q", "N"], |_, children| match children.as_slice() {
            [Meaning::Det(d), Meaning::Pred(n)] => {
                let (d, n) = (d.clone(), n.clone());
                Ok(Meaning::Np(Arc::new(move |p: Pred| d(n.clone(), p))))
            }
            _ => Err(mismatch()),
        })
        .unwrap()
        .rule("VP", &["V_I"], |_, children| match children.as_slice() {
            [Meaning::Pred(p)] => Ok(Meaning::Pred(p.clone())),
            _ => Err(mismatch()),
        })
        .unwrap()
        .rule("VP", &["V_T", "NP"], |_, children| match children.as_slice() {
            [Meaning::Rel(r), Meaning::Np(q)] => {
                let (r, q) = (r.clone(), q.clone());
                Ok(Meaning::Pred(Arc::new(move |s: &str| {
                    let r = r.clone();
                    let s = s.to_string();
                    q(Arc::new(move |o: &str| r(s.as_str(), o)))
                })))
            }
            _ => Err(mismatch()),
        })
        .unwrap()
        .rule("S", &["NP", "VP"], |_, children| match children.as_slice() {
            [Meaning::Np(q), Meaning::Pred(p)] => Ok(Meaning::Truth(q(p.clone()))),
            _ => Err(mismatch()),
        })
        .unwrap();
    builder.build()
}

fn truth(grammar: &Grammar, model: &Model<Meaning>, sentence: &str) -> Vec<Result<bool, EvalError>> {
    let tokens = sentence.split_whitespace().collect::<Vec<_>>();
    let result = interpret(grammar, "S", &tokens, model, &EnumerateOptions::default()).unwrap();

    result
        .readings
        .into_iter()
        .map(|reading| match reading.value {
            Ok(Meaning::Truth(t)) => Ok(t),
            Ok(_) => panic!("`{}` is not a sentence meaning", reading.tree),
            Err(e) => Err(e),
        })
        .collect()
}

#[test]
fn names_and_relations() {
    let grammar = english();
    let model = extensional(&grammar);

    assert_eq!(truth(&grammar, &model, "albert admired betty"), vec![Ok(true)]);
    assert_eq!(truth(&grammar, &model, "betty admired albert"), vec![Ok(false)]);
    assert_eq!(truth(&grammar, &model, "betty ran"), vec![Ok(true)]);
    assert_eq!(truth(&grammar, &model, "carol ran"), vec![Ok(false)]);
}

#[test]
fn quantifiers_in_both_positions() {
    let grammar = english();
    let model = extensional(&grammar);

    assert_eq!(truth(&grammar, &model, "every person admired betty"), vec![Ok(false)]);
    assert_eq!(truth(&grammar, &model, "some person admired betty"), vec![Ok(true)]);
    assert_eq!(truth(&grammar, &model, "albert admired some person"), vec![Ok(true)]);
    assert_eq!(truth(&grammar, &model, "albert admired every person"), vec![Ok(false)]);
    assert_eq!(truth(&grammar, &model, "every person admired some person"), vec![Ok(true)]);
    assert_eq!(truth(&grammar, &model, "some person ran"), vec![Ok(true)]);
}

#[test]
fn type_mismatches_fail_only_their_reading() {
    let grammar = english();
    let mut builder = Model::<Meaning>::builder(&grammar);
    builder
        .every_rule(|_, _| Err(mismatch()))
        .words("PN", |_, token| Ok(Meaning::Entity(token.to_string())))
        .unwrap()
        .words("V_I", |_, _| Ok(Meaning::Truth(true)))
        .unwrap();
    let model = builder.build();

    assert_eq!(
        truth(&grammar, &model, "albert ran"),
        vec![Err(EvalError::CompositionFailure {
            at: "NP -> PN".to_string(),
            reason: "type mismatch".to_string(),
        })]
    );
    assert_eq!(
        truth(&grammar, &model, "every person ran"),
        vec![Err(EvalError::MissingLexicalEntry {
            token: "every".to_string(),
            terminal: "Q".to_string(),
        })]
    );
}

// `her` is a name or a determiner, `duck` a noun or a verb, `saw` takes an
// object or a clause
fn duck() -> Grammar {
    Grammar::builder("S")
        .rule("S", ["NP", "VP"])
        .rule("NP", ["PN"])
        .rule("NP", ["Det", "N"])
        .rule("VP", ["V_I"])
        .rule("VP", ["V_T", "NP"])
        .rule("VP", ["V_C", "S"])
        .words("PN", ["albert", "her"])
        .words("Det", ["her"])
        .words("N", ["duck"])
        .words("V_I", ["duck"])
        .words("V_T", ["saw"])
        .words("V_C", ["saw"])
        .build()
        .unwrap()
}

#[test]
fn readings_are_evaluated_independently() {
    let grammar = duck();
    let mut builder = Model::<String>::builder(&grammar);
    for terminal in ["PN", "Det", "N", "V_I", "V_T", "V_C"] {
        builder.words(terminal, |_, token| Ok(token.to_string())).unwrap();
    }
    let join = |_: &denote::Site<'_>, children: Vec<String>| -> Result<String, CompositionError> {
        Ok(format!("({})", children.join(" ")))
    };
    builder
        .rule("S", &["NP", "VP"], join)
        .unwrap()
        .rule("NP", &["PN"], join)
        .unwrap()
        .rule("NP", &["Det", "N"], join)
        .unwrap()
        .rule("VP", &["V_I"], join)
        .unwrap()
        .rule("VP", &["V_T", "NP"], join)
        .unwrap();
    let model = builder.build();

    let tokens = ["albert", "saw", "her", "duck"];
    for options in [EnumerateOptions::default(), EnumerateOptions::default().parallel(true)] {
        let result = interpret(&grammar, "S", &tokens, &model, &options).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(
            result.successes().map(|(_, value)| value.as_str()).collect::<Vec<_>>(),
            vec!["((albert) (saw (her duck)))"]
        );
        assert_eq!(
            result.failures().map(|(_, error)| error.clone()).collect::<Vec<_>>(),
            vec![EvalError::MissingRuleComposition { rule: "VP -> V_C S".to_string() }]
        );
    }
}

#[test]
fn type_driven_model_over_the_demo_grammar() {
    let grammar = denote::parser::parse_file(std::path::Path::new("example_data/semantics.grammar")).unwrap();
    let mut model = Extensional::new();
    model
        .entity("albert", "a")
        .entity("betty", "b")
        .entity("carol", "c")
        .entity("steve", "s")
        .entity("jane", "j")
        .entity("mike", "m")
        .predicate("swam", ["b", "s"])
        .relation("admired", [("j", "m"), ("s", "m"), ("a", "b"), ("b", "c")]);

    let values = |sentence: &str| {
        let tokens = sentence.split_whitespace().collect::<Vec<_>>();
        interpret(&grammar, "S", &tokens, &model, &EnumerateOptions::default())
            .unwrap()
            .readings
            .into_iter()
            .map(|reading| reading.value)
            .collect::<Vec<_>>()
    };

    assert_eq!(values("albert admired betty"), vec![Ok(Denotation::Truth(true))]);
    assert_eq!(values("betty admired albert"), vec![Ok(Denotation::Truth(false))]);
    assert_eq!(values("steve admired mike"), vec![Ok(Denotation::Truth(true))]);
    assert_eq!(values("steve swam"), vec![Ok(Denotation::Truth(true))]);
    assert_eq!(values("albert swam"), vec![Ok(Denotation::Truth(false))]);
    assert_eq!(
        values("albert cried"),
        vec![Err(EvalError::MissingLexicalEntry {
            token: "cried".to_string(),
            terminal: "V_I".to_string(),
        })]
    );
}
