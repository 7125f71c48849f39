/// Byte-level reading: the cursor every tokenizer consumes, character classes,
/// and the leaf tokenizers (one per lexical category).

use std::borrow::Cow;
use std::collections::HashMap;
use once_cell::sync::Lazy;

use crate::error::*;
use crate::token::Token;

mod str;
mod number;
mod name;

pub use self::str::{StringTokenizer, HexStringTokenizer, read_literal_string, read_hex_string};
pub use self::number::NumericTokenizer;
pub use self::name::NameTokenizer;

/// `ByteCursor` walks a byte slice one byte at a time and can jump to any
/// position. Positions are absolute file offsets: the slice starts at `file_offset`.
#[derive(Copy, Clone)]
pub struct ByteCursor<'a> {
    pos: usize,
    buf: &'a [u8],
    file_offset: usize,
}

// find the position where condition(data[pos-1]) == false and condition(data[pos]) == true
#[inline]
fn boundary_rev(data: &[u8], pos: usize, condition: impl Fn(u8) -> bool) -> usize {
    match data[.. pos].iter().rposition(|&b| !condition(b)) {
        Some(start) => start + 1,
        None => 0
    }
}

// find the position where condition(data[pos-1]) == true and condition(data[pos]) == false
#[inline]
fn boundary(data: &[u8], pos: usize, condition: impl Fn(u8) -> bool) -> usize {
    match data[pos ..].iter().position(|&b| !condition(b)) {
        Some(start) => pos + start,
        None => data.len()
    }
}

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, 0 | b' ' | b'\r' | b'\n' | b'\t' | b'\x0c')
}
#[inline]
pub fn is_delimiter(b: u8) -> bool {
    b"()<>[]{}/%".contains(&b)
}
#[inline]
pub fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}
#[inline]
fn is_eol(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor {
            pos: 0,
            buf,
            file_offset: 0
        }
    }
    pub fn with_offset(buf: &'a [u8], file_offset: usize) -> ByteCursor<'a> {
        ByteCursor {
            pos: 0,
            buf,
            file_offset
        }
    }

    /// The byte under the cursor, `None` at the end of input.
    #[inline]
    pub fn current_byte(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Step one byte forward. Returns whether there is a byte under the cursor afterwards.
    #[inline]
    pub fn move_next(&mut self) -> bool {
        if self.pos < self.buf.len() {
            self.pos += 1;
        }
        self.pos < self.buf.len()
    }

    /// The byte after the current one.
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.peek_at(1)
    }
    #[inline]
    pub fn peek_at(&self, n: usize) -> Option<u8> {
        self.buf.get(self.pos + n).copied()
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Absolute position of the current byte.
    #[inline]
    pub fn position(&self) -> usize {
        self.file_offset + self.pos
    }

    /// Jump to an absolute position. Positions outside the slice are clamped.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.pos = position.saturating_sub(self.file_offset).min(self.buf.len());
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Move past whitespace. Returns `false` if that reaches the end of input.
    pub fn skip_whitespace(&mut self) -> bool {
        self.pos = boundary(self.buf, self.pos, is_whitespace);
        !self.is_eof()
    }

    /// Like `skip_whitespace`, but stops at line breaks.
    pub fn skip_blanks(&mut self) -> bool {
        self.pos = boundary(self.buf, self.pos, |b| is_whitespace(b) && !is_eol(b));
        !self.is_eof()
    }

    /// Move past whitespace and `%` comments.
    pub fn skip_whitespace_and_comments(&mut self) -> bool {
        loop {
            if !self.skip_whitespace() {
                return false;
            }
            if self.current_byte() != Some(b'%') {
                return true;
            }
            self.pos = boundary(self.buf, self.pos, |b| !is_eol(b));
        }
    }

    /// Consume a line break (`\n`, `\r\n` or `\r`). Returns whether there was one.
    pub fn skip_eol(&mut self) -> bool {
        match self.current_byte() {
            Some(b'\r') => {
                self.pos += 1;
                if self.current_byte() == Some(b'\n') {
                    self.pos += 1;
                }
                true
            }
            Some(b'\n') => {
                self.pos += 1;
                true
            }
            _ => false
        }
    }

    /// Returns the rest of the current line and moves to the start of the next one.
    pub fn read_line(&mut self) -> Option<&'a [u8]> {
        if self.is_eof() {
            return None;
        }
        let start = self.pos;
        self.pos = boundary(self.buf, self.pos, |b| !is_eol(b));
        let line = &self.buf[start .. self.pos];
        self.skip_eol();
        Some(line)
    }

    /// The run of regular characters under the cursor (a keyword, a number, ...),
    /// without moving.
    pub fn peek_word(&self) -> &'a [u8] {
        let end = boundary(self.buf, self.pos, is_regular);
        &self.buf[self.pos .. end]
    }

    /// If the next word is exactly `keyword`, consume it.
    pub fn eat_keyword(&mut self, keyword: &[u8]) -> bool {
        if self.peek_word() == keyword {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    /// Read and return slice of at most n bytes.
    pub fn read_n(&mut self, n: usize) -> &'a [u8] {
        let start = self.pos;
        self.pos = self.pos.saturating_add(n).min(self.buf.len());
        &self.buf[start .. self.pos]
    }

    /// Returns slice from current position to end.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Moves to the start of the next occurrence of `needle` and returns its absolute position.
    pub fn seek_substr(&mut self, needle: &[u8]) -> Option<usize> {
        let found = self.buf[self.pos ..].windows(needle.len()).position(|w| w == needle)?;
        self.pos += found;
        Some(self.position())
    }

    /// Searches for `needle` backward from the current position and moves to just after it.
    pub fn seek_substr_back(&mut self, needle: &[u8]) -> Result<()> {
        match self.buf[.. self.pos].windows(needle.len()).rposition(|w| w == needle) {
            Some(start) => {
                self.pos = start + needle.len();
                Ok(())
            }
            None => Err(PdfError::NotFound { word: String::from_utf8_lossy(needle).into() })
        }
    }

    /// Move to the end of the data.
    pub fn seek_end(&mut self) {
        self.pos = self.buf.len();
    }

    /// Start of the word that ends right before the current position, skipping whitespace.
    pub fn back_word(&mut self) -> &'a [u8] {
        let end = boundary_rev(self.buf, self.pos, is_whitespace);
        let start = boundary_rev(self.buf, end, is_regular);
        self.pos = start;
        &self.buf[start .. end]
    }

    /// for debugging
    pub fn ctx(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(&self.buf[self.pos.saturating_sub(40) .. self.buf.len().min(self.pos + 40)])
    }
}

/// A tokenizer for one lexical category.
///
/// `first` is the byte under the cursor. On success the cursor is left on
/// the first byte after the token. On `None` the position is unspecified and
/// the caller rewinds.
pub trait Tokenizer {
    fn try_tokenize(&self, first: u8, cursor: &mut ByteCursor) -> Option<Token>;
}

/// `% ...` up to the end of the line. The line break is not part of the comment.
pub struct CommentTokenizer;
impl Tokenizer for CommentTokenizer {
    fn try_tokenize(&self, first: u8, cursor: &mut ByteCursor) -> Option<Token> {
        if first != b'%' {
            return None;
        }
        cursor.move_next();
        let rest = cursor.remaining();
        let len = rest.iter().position(|&b| is_eol(b)).unwrap_or(rest.len());
        let text = cursor.read_n(len);
        Some(Token::Comment(String::from_utf8_lossy(text).as_ref().into()))
    }
}

/// Line breaks as tokens, for PostScript-like data where lines matter.
pub struct EndOfLineTokenizer;
impl Tokenizer for EndOfLineTokenizer {
    fn try_tokenize(&self, first: u8, cursor: &mut ByteCursor) -> Option<Token> {
        if !is_eol(first) {
            return None;
        }
        cursor.skip_eol();
        Some(Token::EndOfLine)
    }
}

static KEYWORDS: Lazy<HashMap<&'static [u8], Token>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(&b"true"[..], Token::Boolean(true));
    map.insert(&b"false"[..], Token::Boolean(false));
    map.insert(&b"null"[..], Token::Null);
    for op in ["R", "obj", "endobj", "stream", "endstream", "xref", "trailer", "startxref", "def", "n", "f"] {
        map.insert(op.as_bytes(), Token::operator(op));
    }
    map
});

/// Everything that is not a number, name, string or composite: `true`,
/// `false`, `null` and operator keywords.
pub struct PlainTokenizer;
impl Tokenizer for PlainTokenizer {
    fn try_tokenize(&self, first: u8, cursor: &mut ByteCursor) -> Option<Token> {
        // PostScript procedure braces are tokens of their own
        if first == b'{' || first == b'}' {
            cursor.move_next();
            return Some(Token::Operator(if first == b'{' { "{" } else { "}" }.into()));
        }
        let word = cursor.peek_word();
        if word.is_empty() {
            return None;
        }
        cursor.advance(word.len());
        if let Some(token) = KEYWORDS.get(word) {
            return Some(token.clone());
        }
        Some(Token::Operator(String::from_utf8_lossy(word).as_ref().into()))
    }
}
