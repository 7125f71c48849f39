//! Basic functionality for parsing a PDF file.

mod lexer;
mod parse_object;
mod parse_xref;

pub use self::lexer::*;
pub use self::parse_object::*;
pub use self::parse_xref::*;

use std::str;
use crate::error::*;
use crate::object::{ObjNr, GenNr, PlainRef};
use crate::token::{Token, Dictionary, Numeric};

/// How forgiving parsing is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Skip dictionary keys that are not names, accept objects whose header
    /// does not match the reference and repair wrong stream lengths.
    pub lenient: bool,
    /// Truncate short cross-reference streams and skip unusable revisions.
    pub allow_xref_error: bool,
    /// Accept objects that are not closed by `endobj`.
    pub allow_missing_endobj: bool,
    /// Deepest allowed nesting of arrays and dictionaries.
    pub max_nesting: usize,
}
impl ParseOptions {
    pub const TOLERANT: ParseOptions = ParseOptions {
        lenient: true,
        allow_xref_error: true,
        allow_missing_endobj: true,
        max_nesting: 256,
    };
    pub const STRICT: ParseOptions = ParseOptions {
        lenient: false,
        allow_xref_error: false,
        allow_missing_endobj: false,
        max_nesting: 256,
    };
    pub const fn tolerant() -> Self {
        Self::TOLERANT
    }
    pub const fn strict() -> Self {
        Self::STRICT
    }
}
impl Default for ParseOptions {
    fn default() -> Self {
        Self::TOLERANT
    }
}

/// What the scanner is currently inside of. Decides which bytes end the scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    TopLevel,
    /// ended by `]`
    Array,
    /// ended by `>>`
    Dictionary,
}

/// Turns bytes into tokens.
///
/// Arrays and dictionaries are scanned by a nested `Scanner` per level and come
/// out as a single composite token. `N G R` is folded into a reference on the way.
pub struct Scanner<'a> {
    cursor: ByteCursor<'a>,
    scope: Scope,
    options: ParseOptions,
    depth: usize,
    end_of_line: bool,
    /// where the current scope was opened
    start: usize,
    token_start: usize,
    current: Option<Token>,
    failed: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(data: &'a [u8], options: ParseOptions) -> Scanner<'a> {
        Scanner::with_cursor(ByteCursor::new(data), options)
    }
    /// Scan at top level, starting wherever `cursor` points.
    pub fn with_cursor(cursor: ByteCursor<'a>, options: ParseOptions) -> Scanner<'a> {
        let start = cursor.position();
        Scanner {
            cursor,
            scope: Scope::TopLevel,
            options,
            depth: 0,
            end_of_line: false,
            start,
            token_start: start,
            current: None,
            failed: false,
        }
    }
    /// Also emit `Token::EndOfLine` for line breaks.
    pub fn with_end_of_line(mut self, enabled: bool) -> Self {
        self.end_of_line = enabled;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }
    /// Absolute position of the cursor.
    pub fn position(&self) -> usize {
        self.cursor.position()
    }
    /// Where the current token started.
    pub fn token_position(&self) -> usize {
        self.token_start
    }
    pub fn seek(&mut self, pos: usize) {
        self.cursor.seek(pos);
        self.current = None;
        self.failed = false;
    }
    pub fn cursor(&self) -> &ByteCursor<'a> {
        &self.cursor
    }
    pub fn cursor_mut(&mut self) -> &mut ByteCursor<'a> {
        &mut self.cursor
    }
    /// The token produced by the last successful `move_next`.
    pub fn current_token(&self) -> Option<&Token> {
        self.current.as_ref()
    }
    pub fn take_token(&mut self) -> Option<Token> {
        self.current.take()
    }

    fn nested(&self, scope: Scope) -> Result<Scanner<'a>> {
        if self.depth >= self.options.max_nesting {
            return Err(PdfError::NestingTooDeep { pos: self.cursor.position(), max: self.options.max_nesting });
        }
        Ok(Scanner {
            cursor: self.cursor,
            scope,
            options: self.options,
            depth: self.depth + 1,
            end_of_line: self.end_of_line,
            start: self.cursor.position(),
            token_start: self.cursor.position(),
            current: None,
            failed: false,
        })
    }

    fn skip_insignificant(&mut self) -> bool {
        if self.end_of_line {
            self.cursor.skip_blanks()
        } else {
            self.cursor.skip_whitespace()
        }
    }

    /// Advance to the next token. `Ok(false)` at the end of the scope:
    /// end of input at top level, `]` in an array, `>>` in a dictionary.
    pub fn move_next(&mut self) -> Result<bool> {
        self.current = None;
        if !self.skip_insignificant() {
            return match self.scope {
                Scope::TopLevel => Ok(false),
                Scope::Array => Err(PdfError::UnterminatedArray { pos: self.start }),
                Scope::Dictionary => Err(PdfError::UnterminatedDictionary { pos: self.start }),
            };
        }
        self.token_start = self.cursor.position();
        let first = try_opt!(self.cursor.current_byte());

        match (first, self.cursor.peek()) {
            (b']', _) if self.scope == Scope::Array => {
                self.cursor.move_next();
                return Ok(false);
            }
            (b'>', Some(b'>')) if self.scope == Scope::Dictionary => {
                self.cursor.advance(2);
                return Ok(false);
            }
            (b'>', Some(b'>')) if self.scope == Scope::Array && self.options.lenient => {
                // leave `>>` to the enclosing dictionary
                warn!("array starting at {} closed by '>>'", self.start);
                return Ok(false);
            }
            _ => {}
        }

        let token = match (first, self.cursor.peek()) {
            (b'[', _) => t!(self.read_array()),
            (b'<', Some(b'<')) => t!(self.read_dictionary()),
            _ => t!(self.read_leaf(first)),
        };
        self.current = Some(token);
        Ok(true)
    }

    fn read_leaf(&mut self, first: u8) -> Result<Token> {
        let backup = self.cursor;
        let token = match first {
            b'(' => StringTokenizer.try_tokenize(first, &mut self.cursor),
            b'<' => HexStringTokenizer.try_tokenize(first, &mut self.cursor),
            b'/' => NameTokenizer.try_tokenize(first, &mut self.cursor),
            b'%' => CommentTokenizer.try_tokenize(first, &mut self.cursor),
            b'\r' | b'\n' if self.end_of_line => EndOfLineTokenizer.try_tokenize(first, &mut self.cursor),
            b'0' ..= b'9' | b'+' | b'-' | b'.' => {
                match NumericTokenizer.try_tokenize(first, &mut self.cursor) {
                    Some(Token::Number(n)) => Some(self.fold_reference(n)),
                    _ => {
                        self.cursor = backup;
                        PlainTokenizer.try_tokenize(first, &mut self.cursor)
                    }
                }
            }
            _ => PlainTokenizer.try_tokenize(first, &mut self.cursor),
        };
        match token {
            Some(token) => Ok(token),
            None => {
                self.cursor = backup;
                Err(PdfError::UnexpectedByte { pos: backup.position(), byte: first })
            }
        }
    }

    // `N G R` -> Reference, everything else leaves the cursor after `N`
    fn fold_reference(&mut self, n: Numeric) -> Token {
        let id = match n.as_i64() {
            Some(id) if id >= 0 => id as ObjNr,
            _ => return Token::Number(n),
        };
        let mut c = self.cursor;
        c.skip_whitespace();
        if let Some(gen) = read_unsigned(&mut c).and_then(|g| GenNr::try_from(g).ok()) {
            c.skip_whitespace();
            if c.eat_keyword(b"R") {
                self.cursor = c;
                return Token::Reference(PlainRef::new(id, gen));
            }
        }
        Token::Number(n)
    }

    fn read_array(&mut self) -> Result<Token> {
        self.cursor.move_next();
        let mut inner = self.nested(Scope::Array)?;
        let mut items = Vec::new();
        while t!(inner.move_next()) {
            match inner.current.take() {
                Some(Token::Comment(_)) | Some(Token::EndOfLine) | None => {}
                Some(token) => items.push(token),
            }
        }
        self.cursor = inner.cursor;
        Ok(Token::Array(items))
    }

    fn read_dictionary(&mut self) -> Result<Token> {
        self.cursor.advance(2);
        let mut inner = self.nested(Scope::Dictionary)?;
        let mut tokens = Vec::new();
        while t!(inner.move_next()) {
            match inner.current.take() {
                Some(Token::Comment(_)) | Some(Token::EndOfLine) | None => {}
                Some(token) => tokens.push((inner.token_start, token)),
            }
        }
        self.cursor = inner.cursor;
        Ok(Token::Dictionary(t!(pair_entries(tokens, &self.options))))
    }

    /// The next token that is not a comment. Running out of input is an error.
    pub fn read_token(&mut self) -> Result<Token> {
        loop {
            if !t!(self.move_next()) {
                return Err(PdfError::EOF);
            }
            match self.current.take() {
                Some(Token::Comment(_)) | None => continue,
                Some(token) => return Ok(token),
            }
        }
    }

    /// Read the next token and require it to be the keyword `op`.
    pub fn expect_operator(&mut self, op: &'static str) -> Result<()> {
        let token = t!(self.read_token());
        if token.is_operator(op) {
            Ok(())
        } else {
            Err(PdfError::UnexpectedLexeme { pos: self.token_start, lexeme: token.to_string(), expected: op })
        }
    }

    /// If the next tokens are `N G obj`, consume them and return `N G`.
    /// Otherwise nothing is consumed.
    pub fn try_read_object_header(&mut self) -> Option<PlainRef> {
        let mut c = self.cursor;
        c.skip_whitespace_and_comments();
        let start = c.position();
        let id = read_unsigned(&mut c)?;
        c.skip_whitespace();
        let gen = GenNr::try_from(read_unsigned(&mut c)?).ok()?;
        c.skip_whitespace();
        if !c.eat_keyword(b"obj") {
            return None;
        }
        self.cursor = c;
        self.token_start = start;
        self.current = None;
        Some(PlainRef::new(id, gen))
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;
    fn next(&mut self) -> Option<Result<Token>> {
        if self.failed {
            return None;
        }
        match self.move_next() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn read_unsigned(c: &mut ByteCursor) -> Option<ObjNr> {
    let word = c.peek_word();
    if word.is_empty() || !word.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let n = str::from_utf8(word).ok()?.parse().ok()?;
    c.advance(word.len());
    Some(n)
}

// keys and values alternate. `def` after a value is PostScript noise.
fn pair_entries(tokens: Vec<(usize, Token)>, options: &ParseOptions) -> Result<Dictionary> {
    let mut dict = Dictionary::new();
    let mut iter = tokens.into_iter().peekable();
    while let Some((pos, key)) = iter.next() {
        let key = match key {
            Token::Name(name) => name,
            other if options.lenient => {
                warn!("skipping dictionary key {} at {}", other, pos);
                continue;
            }
            other => return Err(PdfError::DictionaryKey { pos, found: other.get_debug_name() }),
        };
        match iter.next() {
            Some((_, value)) => {
                dict.insert(key, value);
            }
            None if options.lenient => {
                warn!("dictionary key {} at {} has no value", key, pos);
                break;
            }
            None => bail!("dictionary key {} at {} has no value", key, pos),
        }
        if matches!(iter.peek(), Some((_, t)) if t.is_operator("def")) {
            iter.next();
        }
    }
    Ok(dict)
}

/// Read one token from `data`. Trailing bytes are ignored.
pub fn parse(data: &[u8], options: ParseOptions) -> Result<Token> {
    Scanner::new(data, options).read_token()
}
