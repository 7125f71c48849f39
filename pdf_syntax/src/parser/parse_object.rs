// Indirect objects: `N G obj ... endobj`, including stream bodies.

use crate::error::*;
use crate::object::*;
use crate::parser::{Scanner, ByteCursor, ParseOptions};
use crate::token::{Token, Dictionary, PdfStream};

/// Parses an object starting at the current position of `cursor` and leaves
/// the cursor after `endobj`. `r` is only used to look up an indirect `/Length`.
pub fn parse_indirect_object(cursor: &mut ByteCursor, r: &impl Resolve) -> Result<(PlainRef, Token)> {
    let options = *r.options();
    let mut scanner = Scanner::with_cursor(*cursor, options);
    let number = match scanner.try_read_object_header() {
        Some(number) => number,
        None => {
            let mut c = *cursor;
            c.skip_whitespace();
            return Err(PdfError::UnexpectedLexeme {
                pos: c.position(),
                lexeme: String::from_utf8_lossy(c.peek_word()).into(),
                expected: "N G obj",
            });
        }
    };
    let data = t!(parse_object_body(&mut scanner, number, r));
    *cursor = *scanner.cursor();
    Ok((number, data))
}

fn parse_object_body(scanner: &mut Scanner, number: PlainRef, r: &impl Resolve) -> Result<Token> {
    let options = *scanner.options();

    // `N G obj endobj` is an empty object
    let mut c = *scanner.cursor();
    c.skip_whitespace_and_comments();
    if c.eat_keyword(b"endobj") {
        *scanner.cursor_mut() = c;
        return Ok(Token::Null);
    }

    let token = match t!(scanner.read_token()) {
        Token::Dictionary(dict) => {
            let mut c = *scanner.cursor();
            c.skip_whitespace();
            if c.eat_keyword(b"stream") {
                *scanner.cursor_mut() = c;
                Token::Stream(t!(read_stream_body(scanner.cursor_mut(), dict, r)))
            } else {
                Token::Dictionary(dict)
            }
        }
        token => token,
    };

    let mut c = *scanner.cursor();
    c.skip_whitespace_and_comments();
    if c.eat_keyword(b"endobj") {
        *scanner.cursor_mut() = c;
    } else if options.allow_missing_endobj {
        warn!("object {} at {} is not closed by endobj", number, scanner.token_position());
    } else {
        return Err(PdfError::UnexpectedLexeme {
            pos: c.position(),
            lexeme: String::from_utf8_lossy(c.peek_word()).into(),
            expected: "endobj",
        });
    }
    Ok(token)
}

/// Reads the data of a stream. The cursor is right after the `stream` keyword
/// and ends up after `endstream`.
pub fn read_stream_body(cursor: &mut ByteCursor, dict: Dictionary, r: &impl Resolve) -> Result<PdfStream> {
    let options = *r.options();
    cursor.skip_blanks();
    if !cursor.skip_eol() {
        debug!("no line break after 'stream' at {}", cursor.position());
    }
    let data_start = cursor.position();

    let length = match dict.get("Length") {
        Some(&Token::Reference(reference)) => r.resolve(reference).and_then(|t| t.as_usize()),
        Some(t) => t.as_usize(),
        None => Err(PdfError::MissingEntry { typ: "Stream", field: "Length".into() }),
    };
    let length = match length {
        Ok(n) => Some(n),
        Err(e) if options.lenient => {
            warn!("stream at {}: {}, searching for endstream", data_start, e);
            None
        }
        Err(e) => return Err(e),
    };

    if let Some(length) = length {
        if let Some(data) = read_with_length(cursor, length) {
            return Ok(PdfStream::new(dict, data.to_vec()));
        }
        if !options.lenient {
            cursor.seek(data_start);
            return Err(PdfError::UnexpectedLexeme {
                pos: data_start.saturating_add(length),
                lexeme: format!("stream of length {}", length),
                expected: "endstream",
            });
        }
        warn!("stream at {} has a wrong /Length {}, searching for endstream", data_start, length);
    }

    cursor.seek(data_start);
    let end = match cursor.seek_substr(b"endstream") {
        Some(end) => end,
        None => return Err(PdfError::NotFound { word: "endstream".into() }),
    };
    cursor.seek(data_start);
    let mut data = cursor.read_n(end - data_start);
    // the line break before endstream is not part of the data
    if let Some(rest) = data.strip_suffix(b"\n") {
        data = rest;
    }
    if let Some(rest) = data.strip_suffix(b"\r") {
        data = rest;
    }
    cursor.advance(b"endstream".len());
    Ok(PdfStream::new(dict, data.to_vec()))
}

fn read_with_length<'a>(cursor: &mut ByteCursor<'a>, length: usize) -> Option<&'a [u8]> {
    if cursor.remaining().len() < length {
        return None;
    }
    let mut c = *cursor;
    let data = c.read_n(length);
    c.skip_whitespace();
    if c.eat_keyword(b"endstream") {
        *cursor = c;
        Some(data)
    } else {
        None
    }
}

/// Parse a single direct object from `data`, e.g. a member of an object stream.
pub fn parse_token(data: &[u8], options: ParseOptions) -> Result<Token> {
    Scanner::new(data, options).read_token()
}
