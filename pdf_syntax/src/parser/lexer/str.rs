use crate::token::{Token, PdfString};
use super::{ByteCursor, Tokenizer, is_whitespace};

// reads the byte under the cursor and steps past it
#[inline]
fn next_byte(cursor: &mut ByteCursor) -> Option<u8> {
    let b = cursor.current_byte()?;
    cursor.move_next();
    Some(b)
}

/// Body of a literal string. The cursor starts right after the `(` and ends up
/// after the matching `)`. Returns `None` if the string is never closed.
pub fn read_literal_string(cursor: &mut ByteCursor) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    loop {
        match next_byte(cursor)? {
            b'\\' => read_escape(cursor, &mut out)?,
            b'(' => {
                depth += 1;
                out.push(b'(');
            }
            b')' if depth == 0 => return Some(out),
            b')' => {
                depth -= 1;
                out.push(b')');
            }
            b => out.push(b),
        }
    }
}

fn read_escape(cursor: &mut ByteCursor, out: &mut Vec<u8>) -> Option<()> {
    let c = next_byte(cursor)?;
    match c {
        b'n' => out.push(b'\n'),
        b'r' => out.push(b'\r'),
        b't' => out.push(b'\t'),
        b'b' => out.push(b'\x08'),
        b'f' => out.push(b'\x0c'),
        // line continuation
        b'\n' => {
            if cursor.current_byte() == Some(b'\r') {
                cursor.move_next();
            }
        }
        b'\r' => {
            if cursor.current_byte() == Some(b'\n') {
                cursor.move_next();
            }
        }
        b'0' ..= b'7' => {
            // up to two more octal digits, high-order overflow is ignored
            let mut code = u16::from(c - b'0');
            for _ in 0 .. 2 {
                match cursor.current_byte() {
                    Some(d @ b'0' ..= b'7') => {
                        cursor.move_next();
                        code = code * 8 + u16::from(d - b'0');
                    }
                    _ => break,
                }
            }
            out.push(code as u8);
        }
        // `\(`, `\)`, `\\` and unknown escapes: drop the backslash
        c => out.push(c),
    }
    Some(())
}

#[inline]
fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0' ..= b'9' => Some(c - b'0'),
        b'A' ..= b'F' => Some(c - b'A' + 0xA),
        b'a' ..= b'f' => Some(c - b'a' + 0xA),
        _ => None,
    }
}

/// Body of a hex string, from right after `<` up to and including `>`.
/// Whitespace is ignored and a missing last digit counts as 0.
pub fn read_hex_string(cursor: &mut ByteCursor) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut high = None;
    loop {
        match next_byte(cursor)? {
            b'>' => {
                if let Some(h) = high {
                    out.push(h << 4);
                }
                return Some(out);
            }
            b if is_whitespace(b) => {}
            b => {
                let nibble = hex_nibble(b)?;
                match high.take() {
                    Some(h) => out.push(h << 4 | nibble),
                    None => high = Some(nibble),
                }
            }
        }
    }
}

/// `( ... )`. Declines when the string is never closed.
pub struct StringTokenizer;
impl Tokenizer for StringTokenizer {
    fn try_tokenize(&self, first: u8, cursor: &mut ByteCursor) -> Option<Token> {
        if first != b'(' {
            return None;
        }
        cursor.move_next();
        let data = read_literal_string(cursor)?;
        Some(Token::String(PdfString::new(data.into())))
    }
}

/// `< ... >`. Declines on `<<`, on bytes that are neither hex digits nor
/// whitespace, and when the closing `>` is missing.
pub struct HexStringTokenizer;
impl Tokenizer for HexStringTokenizer {
    fn try_tokenize(&self, first: u8, cursor: &mut ByteCursor) -> Option<Token> {
        if first != b'<' || cursor.peek() == Some(b'<') {
            return None;
        }
        cursor.move_next();
        let data = read_hex_string(cursor)?;
        Some(Token::HexString(PdfString::new(data.into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(data: &[u8]) -> Vec<u8> {
        read_literal_string(&mut ByteCursor::new(data)).unwrap()
    }
    fn hex(data: &[u8]) -> Vec<u8> {
        read_hex_string(&mut ByteCursor::new(data)).unwrap()
    }

    #[test]
    fn escapes() {
        assert_eq!(lex(b"a\\nb\\rc\\td\\(f/)\\\\hei)"), b"a\nb\rc\td(f/");
    }

    #[test]
    fn nesting() {
        assert_eq!(lex(b"a(b)c)"), b"a(b)c");
        assert_eq!(lex(b"a\\)b)"), b"a)b");
    }

    #[test]
    fn unknown_escape_keeps_char() {
        assert_eq!(lex(b"\\q\\/)"), b"q/");
    }

    #[test]
    fn string_split_lines() {
        assert_eq!(lex(b"These \\\ntwo strings \\\nare the same.)"), b"These two strings are the same.");
        assert_eq!(lex(b"These \\\rtwo strings \\\rare the same.)"), b"These two strings are the same.");
        assert_eq!(lex(b"These \\\r\ntwo strings \\\r\nare the same.)"), b"These two strings are the same.");
    }

    #[test]
    fn octal_escape() {
        assert_eq!(
            lex(b"This string contains\\245two octal characters\\307.)"),
            &b"This string contains\xa5two octal characters\xc7."[..]
        );
        assert_eq!(lex(b"\\0053)"), b"\x053");
        assert_eq!(lex(b"\\053)"), b"+");
        assert_eq!(lex(b"\\53)"), b"+");
        assert_eq!(lex(b"\\541)"), b"a");
    }

    #[test]
    fn hex_digits() {
        assert_eq!(hex(b"901FA3>"), b"\x90\x1f\xa3");
        assert_eq!(hex(b"901FA>"), b"\x90\x1f\xa0");
        assert_eq!(hex(b"1 9F\t5\r\n4\x0c62a>"), b"\x19\xf5\x46\x2a");
        assert_eq!(hex(b">"), b"");
    }

    #[test]
    fn tokenizers_move_the_cursor() {
        let mut cursor = ByteCursor::new(b"(x(y)) <41 42> rest");
        let token = StringTokenizer.try_tokenize(b'(', &mut cursor).unwrap();
        assert_eq!(token, Token::String("x(y)".into()));
        assert_eq!(cursor.current_byte(), Some(b' '));
        cursor.skip_whitespace();
        let token = HexStringTokenizer.try_tokenize(b'<', &mut cursor).unwrap();
        assert_eq!(token, Token::HexString("AB".into()));
        assert_eq!(cursor.remaining(), b" rest");
    }

    #[test]
    fn declines() {
        assert!(StringTokenizer.try_tokenize(b'(', &mut ByteCursor::new(b"(never closed")).is_none());
        assert!(HexStringTokenizer.try_tokenize(b'<', &mut ByteCursor::new(b"<4x>")).is_none());
        assert!(HexStringTokenizer.try_tokenize(b'<', &mut ByteCursor::new(b"<<")).is_none());
        assert!(HexStringTokenizer.try_tokenize(b'<', &mut ByteCursor::new(b"<414")).is_none());
    }
}
