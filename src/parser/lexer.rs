use itertools::{Itertools, PeekingNext};

use super::{CompileErrorType, Result};

#[derive(PartialEq, Debug, Clone)]
pub enum Token {
    // `=`, starts the alternatives of a rule
    Equals,
    // `:`, starts the words of a lexicon category
    Colon,
    Or,
    Name(String),
    Quoted(String),
}

fn ends_name(c: char) -> bool {
    c.is_whitespace() || matches!(c, '=' | ':' | '|' | '"')
}

pub fn lex_quoted(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    line.next(); // Consume open quote
    let text = line.peeking_take_while(|&c| c != '"').collect();

    // Check if there is a close quote and consume it if there is
    if line.next() != Some('"') {
        return Err(CompileErrorType::UnmatchedQuote);
    }

    Ok(Token::Quoted(text))
}

pub fn lex_name(line: &mut impl PeekingNext<Item = char>) -> Token {
    Token::Name(line.peeking_take_while(|&c| !ends_name(c)).collect())
}

pub fn lex_line(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();

    let mut line_chars = line.chars().peekable();

    while let Some(&c) = line_chars.peek() {
        match c {
            '=' => {
                line_chars.next();
                tokens.push(Token::Equals);
            }
            ':' => {
                line_chars.next();
                tokens.push(Token::Colon);
            }
            '|' => {
                line_chars.next();
                tokens.push(Token::Or);
            }
            '"' => tokens.push(lex_quoted(&mut line_chars)?),
            c if c.is_whitespace() => {
                line_chars.next();
            }
            _ => tokens.push(lex_name(&mut line_chars)),
        }
    }

    return Ok(tokens);
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    fn name(text: &str) -> Token {
        Token::Name(text.to_string())
    }

    fn quoted(text: &str) -> Token {
        Token::Quoted(text.to_string())
    }

    #[test]
    fn lex_normal_quoted() {
        let lines = vec![
            "\"and\" NP VP",
            "\"new york\"",
            "\"if\"\"then\"\"else\""
        ];
        // (result from the function, rest of the iterator)
        let answers = vec![
            (quoted("and"), " NP VP"),
            (quoted("new york"), ""),
            (quoted("if"), "\"then\"\"else\"")
        ];

        for (line, (answer_token, answer_rest)) in zip(lines, answers) {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_quoted(&mut chars).unwrap(), answer_token);
            assert_eq!(chars.collect::<String>(), answer_rest);
        }
    }

    #[test]
    fn lex_mismatched_quoted() {
        for line in ["\"welcome", "\"albert betty carol"] {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_quoted(&mut chars).unwrap_err(), CompileErrorType::UnmatchedQuote);
        }
    }

    #[test]
    fn lex_normal_name() {
        let lines = vec!["N' Adj", "V_T", "NP:", "S|VP"];
        // (result from the function, rest of the iterator)
        let answers = vec![
            (name("N'"), " Adj"),
            (name("V_T"), ""),
            (name("NP"), ":"),
            (name("S"), "|VP")
        ];

        for (line, (answer_token, answer_rest)) in zip(lines, answers) {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_name(&mut chars), answer_token);
            assert_eq!(chars.collect::<String>(), answer_rest);
        }
    }

    #[test]
    fn lex_normal_line() {
        let lines = vec![
            "NP = Q N' | PN",
            "XP = subord S",
            "PN: albert \"mary ann\"",
            "S=S \"and\" S",
        ];
        let answers = vec![
            vec![name("NP"), Token::Equals, name("Q"), name("N'"), Token::Or, name("PN")],
            vec![name("XP"), Token::Equals, name("subord"), name("S")],
            vec![name("PN"), Token::Colon, name("albert"), quoted("mary ann")],
            vec![name("S"), Token::Equals, name("S"), quoted("and"), name("S")],
        ];

        for (line, answer) in zip(lines, answers) {
            assert_eq!(lex_line(line).unwrap(), answer)
        }
    }
}
