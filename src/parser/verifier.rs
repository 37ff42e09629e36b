use std::collections::HashSet;

use tracing::warn;

use super::CompileErrorType::UndefinedNonterminal;
use super::{Alternative, CompileError, CompileErrors, Definition, FileResult, Item, Line, Location};

// Everything a rule body may refer to: rule heads, lexicon categories and
// quoted literals
fn defined_names(definitions: &[Definition]) -> HashSet<&str> {
    definitions
        .iter()
        .flat_map(|definition| match &definition.line {
            Line::Rule { symbol, rewrite } => {
                let literals = rewrite.iter().flatten().filter_map(|item| match item {
                    Item::Literal(word) => Some(word.as_str()),
                    Item::Name(_) => None,
                });
                std::iter::once(symbol.as_str()).chain(literals).collect::<Vec<_>>()
            }
            Line::Words { category, .. } => vec![category.as_str()],
        })
        .collect()
}

fn get_alternative_undefined_symbols(alternative: &Alternative, location: &Location, defined: &HashSet<&str>) -> CompileErrors {
    // Filter out everything but names, then keep the undefined ones
    alternative.iter()
        .filter_map(|item| match item {
            Item::Name(name) => Some(name),
            Item::Literal(_) => None
        })
        .filter(|name| !defined.contains(name.as_str()))
        .map(|name| CompileError {
            location: location.to_owned(),
            error: UndefinedNonterminal(name.to_owned())
        })
        .collect()
}

fn get_undefined_symbols(definitions: &[Definition], defined: &HashSet<&str>) -> CompileErrors {
    // Get the undefined names in each alternative of each rule, while
    // flattening into all the undefined names in the file
    definitions.iter()
        .filter_map(|definition| match &definition.line {
            Line::Rule { rewrite, .. } => Some((rewrite, &definition.location)),
            Line::Words { .. } => None,
        })
        .flat_map(|(rewrite, location)| {
            rewrite.iter().flat_map(move |alternative| get_alternative_undefined_symbols(alternative, location, defined))
        })
        .collect()
}

// Categories that no rule mentions can only be parsed as a start symbol
fn warn_unused_categories(definitions: &[Definition]) {
    let used: HashSet<&str> = definitions
        .iter()
        .filter_map(|definition| match &definition.line {
            Line::Rule { rewrite, .. } => Some(rewrite),
            Line::Words { .. } => None,
        })
        .flatten()
        .flatten()
        .filter_map(|item| match item {
            Item::Name(name) => Some(name.as_str()),
            Item::Literal(_) => None,
        })
        .collect();

    for definition in definitions {
        if let Line::Words { category, .. } = &definition.line {
            if !used.contains(category.as_str()) {
                warn!(location = %definition.location, category = %category, "lexicon category is never used by a rule");
            }
        }
    }
}

pub(super) fn verify_definitions(definitions: &[Definition]) -> FileResult<()> {
    let defined = defined_names(definitions);
    let errors = get_undefined_symbols(definitions, &defined);

    if !errors.is_empty() {
        return Err(errors);
    }

    warn_unused_categories(definitions);
    Ok(())
}
