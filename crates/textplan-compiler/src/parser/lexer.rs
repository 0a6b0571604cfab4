//! Lexer for TextPlan.
//!
//! Produces span-based tokens without storing text; text is sliced from the
//! source only when needed.
//!
//! ## Error handling
//!
//! [`lex`] never fails: consecutive unrecognized characters are coalesced
//! into single `Garbage` tokens and left to the parser to report.
//! [`tokenize`] is the strict entry point that stops at the first one.
//!
//! ## Typed keyword literals
//!
//! `null_i64` and `true_boolean` match the identifier rule as one run. When
//! the part after the first `_` is a builtin type name the run is split
//! back into keyword, `_` and type name, so `null_date` always reads as a
//! literal and a column of that name has to be quoted.

use logos::Logos;
use rowan::{TextRange, TextSize};
use std::ops::Range;
use textplan_core::TypeKind;

use super::cst::SyntaxKind;

/// Zero-copy token: kind + span, text retrieved via [`token_text`] when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub span: TextRange,
}

impl Token {
    #[inline]
    pub fn new(kind: SyntaxKind, span: TextRange) -> Self {
        Self { kind, span }
    }
}

/// Longest source a span can address.
pub const MAX_SOURCE_LEN: usize = u32::MAX as usize;

/// Rejects sources whose offsets do not fit a [`TextSize`].
pub fn check_source_len(len: usize) -> Result<(), usize> {
    if len > MAX_SOURCE_LEN { Err(len) } else { Ok(()) }
}

fn offset(at: usize) -> TextSize {
    TextSize::try_from(at).unwrap_or(TextSize::from(u32::MAX))
}

fn range_to_text_range(range: Range<usize>) -> TextRange {
    TextRange::new(offset(range.start), offset(range.end))
}

/// Tokenizes source into a lossless vector of span-based tokens, trivia
/// included.
///
/// Offsets past [`MAX_SOURCE_LEN`] saturate; callers reject such sources
/// with [`check_source_len`] first.
pub fn lex(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = SyntaxKind::lexer(source);
    let mut error_start: Option<usize> = None;

    loop {
        match lexer.next() {
            Some(Ok(kind)) => {
                if let Some(start) = error_start.take() {
                    let end = lexer.span().start;
                    tokens.push(Token::new(
                        SyntaxKind::Garbage,
                        range_to_text_range(start..end),
                    ));
                }
                let span = lexer.span();
                match split_typed_keyword(kind, &source[span.clone()]) {
                    Some((keyword, head)) => {
                        let underscore = span.start + head;
                        tokens.push(Token::new(keyword, range_to_text_range(span.start..underscore)));
                        tokens.push(Token::new(
                            SyntaxKind::Underscore,
                            range_to_text_range(underscore..underscore + 1),
                        ));
                        tokens.push(Token::new(
                            SyntaxKind::Id,
                            range_to_text_range(underscore + 1..span.end),
                        ));
                    }
                    None => tokens.push(Token::new(kind, range_to_text_range(span))),
                }
            }
            Some(Err(())) => {
                if error_start.is_none() {
                    error_start = Some(lexer.span().start);
                }
            }
            None => {
                if let Some(start) = error_start.take() {
                    tokens.push(Token::new(
                        SyntaxKind::Garbage,
                        range_to_text_range(start..source.len()),
                    ));
                }
                break;
            }
        }
    }

    tracing::debug!(tokens = tokens.len(), bytes = source.len(), "lexed");
    tokens
}

/// Keyword and its byte length when `text` is `null_<type>`,
/// `true_<type>` or `false_<type>`.
fn split_typed_keyword(kind: SyntaxKind, text: &str) -> Option<(SyntaxKind, usize)> {
    if kind != SyntaxKind::Id {
        return None;
    }
    let (head, tail) = text.split_once('_')?;
    let keyword = match head.to_ascii_lowercase().as_str() {
        "null" => SyntaxKind::KwNull,
        "true" => SyntaxKind::KwTrue,
        "false" => SyntaxKind::KwFalse,
        _ => return None,
    };
    TypeKind::is_builtin_name(tail).then_some((keyword, head.len()))
}

/// Unrecognized input with its position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized input {found:?} at {line}:{column}")]
pub struct LexError {
    pub offset: usize,
    /// 1-based.
    pub line: u32,
    /// 1-based, in characters.
    pub column: u32,
    pub found: String,
}

/// Strict tokenization: the non-trivia tokens, or the first unrecognized
/// character run.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let tokens = lex(source);
    if let Some(bad) = tokens.iter().find(|t| t.kind == SyntaxKind::Garbage) {
        let index = LineIndex::new(source);
        let (line, column) = index.line_col(bad.span.start());
        return Err(LexError {
            offset: bad.span.start().into(),
            line,
            column,
            found: token_text(source, bad).to_owned(),
        });
    }
    Ok(tokens.into_iter().filter(|t| !t.kind.is_trivia()).collect())
}

/// Retrieves the text slice for a token. O(1) slice into source.
#[inline]
pub fn token_text<'q>(source: &'q str, token: &Token) -> &'q str {
    &source[std::ops::Range::<usize>::from(token.span)]
}

/// Maps byte offsets to 1-based line and column numbers.
#[derive(Debug, Clone)]
pub struct LineIndex<'s> {
    source: &'s str,
    line_starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    pub fn new(source: &'s str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    pub fn line_col(&self, offset: TextSize) -> (u32, u32) {
        let offset = usize::from(offset).min(self.source.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let column = self.source[self.line_starts[line]..offset].chars().count();
        (line as u32 + 1, column as u32 + 1)
    }
}

/// Decodes a string literal token, quotes included.
///
/// Known escapes are `\"`, `\\`, `\n` and `\t`; any other escaped character
/// is kept verbatim together with its backslash.
pub fn unescape_string(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Inverse of [`unescape_string`], quotes included.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Name text of an identifier or quoted identifier token.
pub fn name_text(text: &str) -> &str {
    text.strip_prefix('`')
        .and_then(|t| t.strip_suffix('`'))
        .unwrap_or(text)
}
