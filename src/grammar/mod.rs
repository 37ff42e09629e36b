/*
    This module is for storing grammars and lexicons
*/

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use itertools::Itertools;

use crate::error::GrammarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    // Matched against input tokens through the lexicon
    Terminal,
    // Expanded by rules
    Nonterminal,
}

// The base unit in a grammar rule.
//
// Symbols are interned by their grammar, so equality, ordering and hashing
// only look at the id. Comparing symbols of two different grammars is
// meaningless.
#[derive(Debug, Clone)]
pub struct Symbol {
    id: u32,
    kind: SymbolKind,
    name: Arc<str>,
}

impl Symbol {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == SymbolKind::Terminal
    }

    pub fn is_nonterminal(&self) -> bool {
        self.kind == SymbolKind::Nonterminal
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// Declaration index of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u32);

impl RuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    id: RuleId,
    lhs: Symbol,
    rhs: Vec<Symbol>,
}

impl Rule {
    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn lhs(&self) -> &Symbol {
        &self.lhs
    }

    pub fn rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    pub fn arity(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_unary(&self) -> bool {
        self.rhs.len() == 1
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.lhs, self.rhs.iter().join(" "))
    }
}

// Surface tokens and the terminal categories they can instantiate.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    by_token: HashMap<String, Vec<Symbol>>,
    by_terminal: HashMap<Symbol, Vec<Arc<str>>>,
}

impl Lexicon {
    // Terminals for a token, in declaration order. Unknown tokens get none.
    pub fn terminals_for(&self, token: &str) -> &[Symbol] {
        self.by_token.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn words_of(&self, terminal: &Symbol) -> &[Arc<str>] {
        self.by_terminal
            .get(terminal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, token: &str) -> bool {
        self.by_token.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    fn insert(&mut self, token: &str, terminal: &Symbol) {
        let terminals = self.by_token.entry(token.to_string()).or_default();
        if terminals.contains(terminal) {
            return;
        }
        terminals.push(terminal.clone());
        self.by_terminal
            .entry(terminal.clone())
            .or_default()
            .push(Arc::from(token));
    }
}

#[derive(Debug, Clone)]
pub struct Grammar {
    start: Symbol,
    symbols: Vec<Symbol>,
    names: HashMap<Arc<str>, Symbol>,
    rules: Vec<Rule>,
    by_lhs: HashMap<Symbol, Vec<RuleId>>,
    lexicon: Lexicon,
}

impl Grammar {
    pub fn builder(start: impl Into<String>) -> GrammarBuilder {
        GrammarBuilder::new(start)
    }

    pub fn start(&self) -> &Symbol {
        &self.start
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.names.get(name)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn terminals(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|symbol| symbol.is_terminal())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    // Alternatives for a nonterminal, in declaration order
    pub fn rules_for<'a>(&'a self, lhs: &Symbol) -> impl Iterator<Item = &'a Rule> + 'a {
        self.by_lhs
            .get(lhs)
            .into_iter()
            .flatten()
            .map(move |id| self.rule(*id))
    }

    pub fn find_rule(&self, lhs: &str, rhs: &[&str]) -> Option<&Rule> {
        let lhs = self.symbol(lhs)?;
        self.rules_for(lhs)
            .find(|rule| rule.rhs.iter().map(Symbol::name).eq(rhs.iter().copied()))
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }
}

// Collects rules and lexicon entries by name and resolves them into a
// `Grammar`.
//
// A name that heads a rule is a nonterminal; a name that only appears as a
// lexicon category is a terminal. Names referenced on a right-hand side but
// defined nowhere become nonterminals without rules, which never derive
// anything.
#[derive(Debug, Clone, Default)]
pub struct GrammarBuilder {
    start: String,
    rules: Vec<(String, Vec<String>)>,
    words: Vec<(String, String)>,
}

impl GrammarBuilder {
    pub fn new(start: impl Into<String>) -> Self {
        GrammarBuilder {
            start: start.into(),
            rules: Vec::new(),
            words: Vec::new(),
        }
    }

    pub fn start(&mut self, start: impl Into<String>) -> &mut Self {
        self.start = start.into();
        self
    }

    pub fn rule<I, S>(&mut self, lhs: impl Into<String>, rhs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .push((lhs.into(), rhs.into_iter().map(Into::into).collect()));
        self
    }

    pub fn word(&mut self, token: impl Into<String>, terminal: impl Into<String>) -> &mut Self {
        self.words.push((token.into(), terminal.into()));
        self
    }

    pub fn words<I, S>(&mut self, terminal: &str, tokens: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for token in tokens {
            self.word(token, terminal);
        }
        self
    }

    // Adds `X -> X conjunction X` for every category
    pub fn coordinate<I, S>(&mut self, categories: I, conjunction: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for category in categories {
            let category = category.into();
            self.rule(
                category.clone(),
                [category.clone(), conjunction.to_string(), category],
            );
        }
        self
    }

    pub fn build(&self) -> Result<Grammar, GrammarError> {
        let heads: HashSet<&str> = self.rules.iter().map(|(lhs, _)| lhs.as_str()).collect();
        let categories: HashSet<&str> = self.words.iter().map(|(_, t)| t.as_str()).collect();

        if let Some(name) = self
            .rules
            .iter()
            .map(|(lhs, _)| lhs.as_str())
            .find(|lhs| categories.contains(lhs))
        {
            return Err(GrammarError::KindConflict {
                name: name.to_string(),
            });
        }

        let mut interner = Interner::default();
        let kind_of = |name: &str| {
            if categories.contains(name) && !heads.contains(name) {
                SymbolKind::Terminal
            } else {
                SymbolKind::Nonterminal
            }
        };

        let start = interner.intern(&self.start, kind_of(&self.start));

        let mut rules: Vec<Rule> = Vec::with_capacity(self.rules.len());
        let mut by_lhs: HashMap<Symbol, Vec<RuleId>> = HashMap::new();
        for (lhs, rhs) in &self.rules {
            if rhs.is_empty() {
                return Err(GrammarError::EmptyRule { lhs: lhs.clone() });
            }

            let lhs = interner.intern(lhs, SymbolKind::Nonterminal);
            let rhs = rhs
                .iter()
                .map(|name| interner.intern(name, kind_of(name)))
                .collect_vec();

            let id = RuleId(rules.len() as u32);
            let rule = Rule { id, lhs, rhs };
            if rules.iter().any(|r| r.lhs == rule.lhs && r.rhs == rule.rhs) {
                return Err(GrammarError::DuplicateRule {
                    rule: rule.to_string(),
                });
            }

            by_lhs.entry(rule.lhs.clone()).or_default().push(id);
            rules.push(rule);
        }

        let mut lexicon = Lexicon::default();
        for (token, terminal) in &self.words {
            let terminal = interner.intern(terminal, SymbolKind::Terminal);
            lexicon.insert(token, &terminal);
        }

        Ok(Grammar {
            start,
            symbols: interner.symbols,
            names: interner.names,
            rules,
            by_lhs,
            lexicon,
        })
    }
}

#[derive(Default)]
struct Interner {
    symbols: Vec<Symbol>,
    names: HashMap<Arc<str>, Symbol>,
}

impl Interner {
    fn intern(&mut self, name: &str, kind: SymbolKind) -> Symbol {
        if let Some(symbol) = self.names.get(name) {
            return symbol.clone();
        }

        let symbol = Symbol {
            id: self.symbols.len() as u32,
            kind,
            name: Arc::from(name),
        };
        self.names.insert(symbol.name.clone(), symbol.clone());
        self.symbols.push(symbol.clone());
        symbol
    }
}
