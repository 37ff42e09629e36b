/*
    This module parses grammar files

    ; comment
    S = NP VP | S XP           rule alternatives
    NP = NP "and" NP           quoted items are literal words
    PN : albert betty "jo ann" lexicon words of a terminal category
*/

mod lexer;
mod verifier;

use std::fmt::Display;
use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::error::GrammarError;
use crate::error_handling::*;
use crate::grammar::{Grammar, GrammarBuilder};
use itertools::Itertools;
use lexer::*;
use tracing::debug;
use verifier::verify_definitions;

#[derive(Debug)]
pub enum CompileErrorType {
    // A line which should contain a rule or lexicon entry has no `=` or `:`
    MissingSeparator,
    // A line has a second `=` or `:`
    UnexpectedSeparator,
    // The user starts a line with something other than a category name
    MissingCategory,
    // There is an unclosed quote
    UnmatchedQuote,
    // Nothing after the separator or between two `|`
    EmptyAlternative,
    // `|` only separates rule alternatives
    UnexpectedOr,
    // An undefined category was used
    UndefinedNonterminal(String),
    // The file has no rules, so there is no start symbol
    NoRules,
    // The rules do not form a valid grammar
    Grammar(GrammarError),
    // Somehow a full rewrite was parsed as a single alternative
    // This is a problem with the loader, not the grammar
    UnsplitRewrite,
    // A blank line got too deep into the parser
    // This is a problem with the loader, not the grammar
    UnexpectedBlankLine,
    // There was an issue with reading a file
    FileError(std::io::Error),
}

impl ErrorType for CompileErrorType {}

impl PartialEq for CompileErrorType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CompileErrorType::FileError(a), CompileErrorType::FileError(b)) => a.kind() == b.kind(),
            (CompileErrorType::UndefinedNonterminal(a), CompileErrorType::UndefinedNonterminal(b)) => a == b,
            (CompileErrorType::Grammar(a), CompileErrorType::Grammar(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Display for CompileErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileErrorType::MissingSeparator => write!(f, "Expected `=` or `:` after the category"),
            CompileErrorType::UnexpectedSeparator => write!(f, "Unexpected `=` or `:` encountered"),
            CompileErrorType::MissingCategory => write!(f, "Tried to define something other than a category"),
            CompileErrorType::UnmatchedQuote => write!(f, "Unmatched quotes"),
            CompileErrorType::EmptyAlternative => write!(f, "Empty alternative"),
            CompileErrorType::UnexpectedOr => write!(f, "`|` is not allowed in a lexicon line"),
            CompileErrorType::UndefinedNonterminal(name) => write!(f, "Could not find definition for `{}`", name),
            CompileErrorType::NoRules => write!(f, "File defines no rules"),
            CompileErrorType::Grammar(e) => write!(f, "Invalid grammar: {}", e),
            CompileErrorType::UnsplitRewrite => write!(f, "Rewrite was not fully split (this is a problem with the loader, not the grammar)"),
            CompileErrorType::UnexpectedBlankLine => write!(f, "Blank line encountered in rule parser (this is a problem with the loader, not the grammar)"),
            CompileErrorType::FileError(e) => write!(f, "File error: {}", e),
        }
    }
}

pub type CompileError = Error<CompileErrorType>;
pub type CompileErrors = Errors<CompileErrorType>;

fn io_error(error: std::io::Error, file: PathBuf) -> CompileError {
    CompileError {
        location: Location::file(file),
        error: CompileErrorType::FileError(error),
    }
}

pub type Result<T> = std::result::Result<T, CompileErrorType>;
pub type LineResult<T> = std::result::Result<T, CompileError>;
pub type FileResult<T> = std::result::Result<T, CompileErrors>;

#[derive(PartialEq, Debug, Clone)]
enum Item {
    Name(String),
    // A quoted word standing for itself
    Literal(String),
}

type Alternative = Vec<Item>;
type Rewrite = Vec<Alternative>;

#[derive(PartialEq, Debug)]
enum Line {
    Rule { symbol: String, rewrite: Rewrite },
    Words { category: String, words: Vec<String> },
}

#[derive(PartialEq, Debug)]
struct Definition {
    line: Line,
    location: Location,
}

fn parse_alternative(tokens: &[Token]) -> Result<Alternative> {
    if tokens.is_empty() {
        return Err(CompileErrorType::EmptyAlternative);
    }

    tokens.iter().map(|t| match t {
        Token::Equals | Token::Colon => Err(CompileErrorType::UnexpectedSeparator),
        Token::Or => Err(CompileErrorType::UnsplitRewrite),
        Token::Name(s) => Ok(Item::Name(s.clone())),
        Token::Quoted(s) => Ok(Item::Literal(s.clone()))
    }).collect()
}

fn parse_rewrite(tokens: &[Token]) -> Result<Rewrite> {
    tokens.split(|t| *t == Token::Or).map(parse_alternative).collect()
}

fn parse_words(tokens: &[Token]) -> Result<Vec<String>> {
    if tokens.is_empty() {
        return Err(CompileErrorType::EmptyAlternative);
    }

    tokens.iter().map(|t| match t {
        Token::Equals | Token::Colon => Err(CompileErrorType::UnexpectedSeparator),
        Token::Or => Err(CompileErrorType::UnexpectedOr),
        Token::Name(s) | Token::Quoted(s) => Ok(s.clone()),
    }).collect()
}

fn parse_line(tokens: &[Token]) -> Result<Line> {
    // Try to get the category the line is for. The match returns a result
    // which is then unwrapped with the ? operator
    let symbol = match tokens.first() {
        Some(Token::Name(s)) => Ok(s.clone()),
        Some(_) => Err(CompileErrorType::MissingCategory),
        None => Err(CompileErrorType::UnexpectedBlankLine)
    }?;

    match tokens.get(1) {
        Some(Token::Equals) => Ok(Line::Rule {
            symbol,
            rewrite: parse_rewrite(&tokens[2..])?,
        }),
        Some(Token::Colon) => Ok(Line::Words {
            category: symbol,
            words: parse_words(&tokens[2..])?,
        }),
        _ => Err(CompileErrorType::MissingSeparator),
    }
}

fn parse_lex_line(line: &str, location: Location) -> LineResult<Definition> {
    lexer::lex_line(line)
        .and_then(|lexed_line| parse_line(&lexed_line))
        .map(|parsed| Definition { line: parsed, location: location.clone() })
        .map_err(|error| CompileError { location, error })
}

fn is_rule_line(line: &String) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with(';')
}

// Returns an iterator over the meaningful lines of a file, with the io errors
// wrapped in CompileError and numbered from 1
fn file_line_nums<'a>(reader: impl BufRead + 'a, path: &'a Path) -> impl Iterator<Item = (usize, LineResult<String>)> + 'a {
    reader
        .lines()
        .map(move |line| line.map_err(|e| io_error(e, path.to_path_buf())))
        .enumerate()
        .filter(|(_, line)| line.as_ref().is_ok_and(is_rule_line) || line.is_err())
        .map(|(num, line)| (num + 1, line))
}

fn grammar_from_definitions(definitions: Vec<Definition>, path: &Path) -> FileResult<Grammar> {
    let file_error = |error| vec![CompileError { location: Location::file(path), error }];

    verify_definitions(&definitions)?;

    let start = definitions
        .iter()
        .find_map(|definition| match &definition.line {
            Line::Rule { symbol, .. } => Some(symbol.clone()),
            Line::Words { .. } => None,
        })
        .ok_or_else(|| file_error(CompileErrorType::NoRules))?;

    let mut builder = GrammarBuilder::new(start);
    for definition in definitions {
        match definition.line {
            Line::Rule { symbol, rewrite } => {
                for alternative in rewrite {
                    let rhs = alternative.into_iter().map(|item| match item {
                        Item::Name(name) => name,
                        Item::Literal(word) => {
                            builder.word(word.clone(), word.clone());
                            word
                        }
                    }).collect_vec();
                    builder.rule(symbol.clone(), rhs);
                }
            }
            Line::Words { category, words } => {
                builder.words(&category, words);
            }
        }
    }

    let grammar = builder
        .build()
        .map_err(|e| file_error(CompileErrorType::Grammar(e)))?;
    debug!(
        file = %path.display(),
        rules = grammar.rules().len(),
        words = grammar.lexicon().len(),
        "grammar loaded"
    );

    return Ok(grammar);
}

fn parse_reader(reader: impl BufRead, path: &Path) -> FileResult<Grammar> {
    let parsed_lines = file_line_nums(reader, path).map(|(num, line_res)| {
        line_res.and_then(|line| parse_lex_line(&line, Location::new(path, num)))
    });

    let (definitions, errors): (Vec<_>, Vec<_>) = parsed_lines.partition_result();
    if !errors.is_empty() {
        return Err(errors);
    }

    return grammar_from_definitions(definitions, path);
}

pub fn parse_file(path: &Path) -> FileResult<Grammar> {
    let file = File::open(path).map_err(|e| vec![io_error(e, path.to_path_buf())])?;
    parse_reader(std::io::BufReader::new(file), path)
}

// Parses grammar text held in memory; `path` is only used in error locations
pub fn parse_source(source: &str, path: &Path) -> FileResult<Grammar> {
    parse_reader(source.as_bytes(), path)
}
