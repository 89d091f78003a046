//! Tokenizer: converts a formula string into an ordered sequence of lexical
//! tokens. Single left-to-right pass, no backtracking, no semantic knowledge.
//!
//! The decimal separator is configurable (culture input); when it is `,` the
//! argument separator becomes `;` so the two cannot collide. Unparseable
//! numeric runs and unrecognized characters fail loudly with
//! [`CalcError::UnexpectedToken`] instead of being silently dropped.

use crate::error::{CalcError, Result};
use crate::types::{TokenKind, Value};

/// A token produced by the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal payload for number tokens.
    pub value: Option<Value>,
    /// Source text for identifiers and operators.
    pub text: Option<String>,
    /// Byte offset of the token start in the formula.
    pub position: usize,
    /// Byte length of the token.
    pub length: usize,
}

/// The tokenizer. Cheap to construct; holds only separator configuration.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    decimal_separator: char,
    argument_separator: char,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new('.')
    }
}

impl Tokenizer {
    /// Create a tokenizer with the given decimal separator. The argument
    /// separator is `,` unless the decimal separator claims it, in which
    /// case `;` separates arguments.
    pub fn new(decimal_separator: char) -> Self {
        let argument_separator = if decimal_separator == ',' { ';' } else { ',' };
        Self {
            decimal_separator,
            argument_separator,
        }
    }

    pub fn argument_separator(&self) -> char {
        self.argument_separator
    }

    /// Tokenize a formula. Fails with [`CalcError::EmptyInput`] when the
    /// formula contains no tokens at all.
    pub fn read(&self, formula: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut chars = formula.char_indices().peekable();

        while let Some(&(start, c)) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }

            if c.is_ascii_digit() || (c == self.decimal_separator && self.peek_digit(formula, start))
            {
                tokens.push(self.read_number(formula, &mut chars, start)?);
                continue;
            }

            if c.is_ascii_alphabetic() || c == '_' {
                tokens.push(read_identifier(formula, &mut chars, start));
                continue;
            }

            let token = match c {
                '(' => simple(TokenKind::LeftBracket, start, c),
                ')' => simple(TokenKind::RightBracket, start, c),
                '+' | '-' | '*' | '/' | '^' => simple(TokenKind::Operator, start, c),
                '<' | '>' | '=' | '!' => {
                    chars.next();
                    let two = matches!(chars.peek(), Some(&(_, '=')));
                    if two {
                        chars.next();
                    }
                    let text = if two {
                        format!("{c}=")
                    } else {
                        c.to_string()
                    };
                    // Lone '=' and '!' are not operators in this grammar.
                    if !two && (c == '=' || c == '!') {
                        return Err(CalcError::UnexpectedToken {
                            position: start,
                            found: text,
                        });
                    }
                    tokens.push(Token {
                        kind: TokenKind::Operator,
                        value: None,
                        length: text.len(),
                        text: Some(text),
                        position: start,
                    });
                    continue;
                }
                c if c == self.argument_separator => {
                    simple(TokenKind::ArgumentSeparator, start, c)
                }
                other => {
                    return Err(CalcError::UnexpectedToken {
                        position: start,
                        found: other.to_string(),
                    });
                }
            };
            chars.next();
            tokens.push(token);
        }

        if tokens.is_empty() {
            return Err(CalcError::EmptyInput);
        }
        Ok(tokens)
    }

    /// Whether the character after `pos` is a digit, for separator-led
    /// literals such as `.5`.
    fn peek_digit(&self, formula: &str, pos: usize) -> bool {
        formula[pos + self.decimal_separator.len_utf8()..]
            .chars()
            .next()
            .is_some_and(|d| d.is_ascii_digit())
    }

    /// Scan a maximal run of digits and decimal separators, then attempt an
    /// integer parse first and fall back to floating point. A run that
    /// parses as neither (for example `1.2.3`) is an error.
    ///
    /// A digit run immediately followed by letters is NOT merged into one
    /// token; `2x` tokenizes as the number `2` and the identifier `x`, which
    /// the parser then rejects as a trailing token.
    fn read_number(
        &self,
        formula: &str,
        chars: &mut core::iter::Peekable<core::str::CharIndices<'_>>,
        start: usize,
    ) -> Result<Token> {
        let mut end = start;
        while let Some(&(pos, c)) = chars.peek() {
            if c.is_ascii_digit() || c == self.decimal_separator {
                end = pos + c.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let run = &formula[start..end];
        if let Ok(v) = run.parse::<i64>() {
            return Ok(Token {
                kind: TokenKind::Integer,
                value: Some(Value::Integer(v)),
                text: Some(run.to_string()),
                position: start,
                length: end - start,
            });
        }

        let normalized: String = run
            .chars()
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect();
        match normalized.parse::<crate::Real>() {
            Ok(v) => Ok(Token {
                kind: TokenKind::FloatingPoint,
                value: Some(Value::Float(v)),
                text: Some(run.to_string()),
                position: start,
                length: end - start,
            }),
            Err(_) => Err(CalcError::UnexpectedToken {
                position: start,
                found: run.to_string(),
            }),
        }
    }
}

fn read_identifier(
    formula: &str,
    chars: &mut core::iter::Peekable<core::str::CharIndices<'_>>,
    start: usize,
) -> Token {
    let mut end = start;
    while let Some(&(pos, c)) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            end = pos + c.len_utf8();
            chars.next();
        } else {
            break;
        }
    }
    Token {
        kind: TokenKind::Identifier,
        value: None,
        text: Some(formula[start..end].to_string()),
        position: start,
        length: end - start,
    }
}

fn simple(kind: TokenKind, position: usize, c: char) -> Token {
    Token {
        kind,
        value: None,
        text: Some(c.to_string()),
        position,
        length: c.len_utf8(),
    }
}
