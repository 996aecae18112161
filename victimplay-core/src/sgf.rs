//! Minimal SGF reader for single-line self-play transcripts.
//!
//! Only the root node's properties are materialised; the move sequence is
//! walked just far enough to prove the game tree is closed.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::CharIndices;

type Cursor<'a> = Peekable<CharIndices<'a>>;

/// Structural failures while reading a transcript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SgfError {
    #[error("transcript does not start with a game tree")]
    MissingGameTree,

    #[error("property {0} has no value")]
    MissingValue(String),

    #[error("unterminated value for property {0}")]
    UnterminatedValue(String),

    #[error("unexpected character {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("game tree is not closed")]
    UnclosedTree,
}

/// Properties of the root node of a game tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SgfRoot {
    properties: BTreeMap<String, Vec<String>>,
}

impl SgfRoot {
    /// Parse a complete game tree and keep its root node.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a closed SGF game tree.
    pub fn parse(text: &str) -> Result<Self, SgfError> {
        let mut cursor = text.char_indices().peekable();
        skip_whitespace(&mut cursor);
        if !matches!(cursor.next(), Some((_, '('))) {
            return Err(SgfError::MissingGameTree);
        }
        skip_whitespace(&mut cursor);
        if !matches!(cursor.next(), Some((_, ';'))) {
            return Err(SgfError::MissingGameTree);
        }

        let mut properties: BTreeMap<String, Vec<String>> = BTreeMap::new();
        loop {
            skip_whitespace(&mut cursor);
            match cursor.peek().copied() {
                None => return Err(SgfError::UnclosedTree),
                Some((_, ';' | '(' | ')')) => break,
                Some((_, c)) if c.is_ascii_alphabetic() => {
                    let ident = read_ident(&mut cursor);
                    let values = read_values(&mut cursor, &ident)?;
                    properties.entry(ident).or_default().extend(values);
                }
                Some((offset, found)) => return Err(SgfError::Unexpected { found, offset }),
            }
        }

        close_tree(&mut cursor)?;
        Ok(Self { properties })
    }

    /// First value of a root property.
    #[must_use]
    pub fn get(&self, ident: &str) -> Option<&str> {
        self.properties
            .get(ident)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, ident: &str) -> bool {
        self.properties.contains_key(ident)
    }
}

fn skip_whitespace(cursor: &mut Cursor<'_>) {
    while cursor.next_if(|(_, c)| c.is_whitespace()).is_some() {}
}

fn read_ident(cursor: &mut Cursor<'_>) -> String {
    let mut ident = String::new();
    while let Some((_, c)) = cursor.next_if(|(_, c)| c.is_ascii_alphabetic()) {
        ident.push(c);
    }
    ident
}

fn read_values(cursor: &mut Cursor<'_>, ident: &str) -> Result<Vec<String>, SgfError> {
    let mut values = Vec::new();
    loop {
        skip_whitespace(cursor);
        if cursor.next_if(|(_, c)| *c == '[').is_none() {
            break;
        }
        values.push(read_value(cursor).ok_or_else(|| SgfError::UnterminatedValue(ident.to_string()))?);
    }
    if values.is_empty() {
        return Err(SgfError::MissingValue(ident.to_string()));
    }
    Ok(values)
}

/// Reads up to the closing `]`, resolving `\` escapes. `None` if unterminated.
fn read_value(cursor: &mut Cursor<'_>) -> Option<String> {
    let mut value = String::new();
    loop {
        match cursor.next()?.1 {
            ']' => return Some(value),
            '\\' => {
                let (_, escaped) = cursor.next()?;
                // escaped line break is a soft break
                if escaped != '\n' {
                    value.push(escaped);
                }
            }
            c => value.push(c),
        }
    }
}

fn close_tree(cursor: &mut Cursor<'_>) -> Result<(), SgfError> {
    let mut depth = 1usize;
    while let Some((_, c)) = cursor.next() {
        match c {
            '[' => {
                read_value(cursor).ok_or(SgfError::UnclosedTree)?;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    skip_whitespace(cursor);
                    return match cursor.next() {
                        None => Ok(()),
                        Some((offset, found)) => Err(SgfError::Unexpected { found, offset }),
                    };
                }
            }
            _ => {}
        }
    }
    Err(SgfError::UnclosedTree)
}
