use std::str;
use crate::token::{Token, Name, latin1_to_string};
use super::{ByteCursor, Tokenizer};

/// `/Name`, with `#xx` hex escapes decoded.
pub struct NameTokenizer;

impl Tokenizer for NameTokenizer {
    fn try_tokenize(&self, first: u8, cursor: &mut ByteCursor) -> Option<Token> {
        if first != b'/' {
            return None;
        }
        cursor.move_next();
        let raw = cursor.peek_word();
        cursor.advance(raw.len());

        let bytes = unescape(raw);
        let text = match str::from_utf8(&bytes) {
            Ok(s) => s.into(),
            Err(_) => latin1_to_string(&bytes),
        };
        Some(Token::Name(Name::from(text)))
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0' ..= b'9' => Some(b - b'0'),
        b'A' ..= b'F' => Some(b - b'A' + 0xA),
        b'a' ..= b'f' => Some(b - b'a' + 0xA),
        _ => None
    }
}

// an escape that is not two hex digits stays as written, `#` included
fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            let hi = raw.get(i + 1).copied().and_then(hex_digit);
            let lo = raw.get(i + 2).copied().and_then(hex_digit);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}
