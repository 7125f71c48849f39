use crate::token::{Token, Numeric};
use super::{ByteCursor, Tokenizer, is_regular};

/// Integers and reals, with an optional exponent: `12`, `-.5`, `+3.`, `1.53E3`.
///
/// Digits are accumulated into an integer mantissa and the decimal point only
/// changes the scale, so the value is exact. Declines on a second `.` or `e`,
/// on an exponent without digits, and when the number runs into other regular
/// characters (`12abc`), leaving those to the plain tokenizer.
pub struct NumericTokenizer;

const MAX_EXPONENT: i32 = 10_000;

impl Tokenizer for NumericTokenizer {
    fn try_tokenize(&self, first: u8, cursor: &mut ByteCursor) -> Option<Token> {
        if !matches!(first, b'0' ..= b'9' | b'+' | b'-' | b'.') {
            return None;
        }
        let mut negative = false;
        let mut mantissa: i64 = 0;
        let mut fraction_digits: u32 = 0;
        let mut any_digit = false;
        let mut seen_point = false;
        let mut overflow = false;

        if first == b'+' || first == b'-' {
            negative = first == b'-';
            cursor.move_next();
        }

        let mut exponent: Option<i32> = None;
        while let Some(b) = cursor.current_byte() {
            match b {
                b'0' ..= b'9' => {
                    let digit = (b - b'0') as i64;
                    match mantissa.checked_mul(10).and_then(|m| m.checked_add(digit)) {
                        Some(m) => {
                            mantissa = m;
                            if seen_point {
                                fraction_digits += 1;
                            }
                        }
                        // more precision than we can hold, drop the digit
                        None if seen_point => {}
                        None => overflow = true,
                    }
                    any_digit = true;
                }
                b'.' if !seen_point => seen_point = true,
                b'.' => return None,
                b'e' | b'E' => {
                    if !any_digit {
                        return None;
                    }
                    cursor.move_next();
                    exponent = Some(read_exponent(cursor)?);
                    break;
                }
                b if is_regular(b) => return None,
                _ => break,
            }
            cursor.move_next();
        }

        if cursor.current_byte().map_or(false, is_regular) {
            return None;
        }
        if overflow {
            return Some(Token::Number(Numeric::saturated(negative)));
        }
        if negative {
            mantissa = -mantissa;
        }
        Some(Token::Number(Numeric::from_scientific(mantissa, fraction_digits, exponent.unwrap_or(0))))
    }
}

fn read_exponent(cursor: &mut ByteCursor) -> Option<i32> {
    let mut negative = false;
    match cursor.current_byte() {
        Some(b'-') => {
            negative = true;
            cursor.move_next();
        }
        Some(b'+') => {
            cursor.move_next();
        }
        _ => {}
    }
    let mut exponent: i32 = 0;
    let mut any_digit = false;
    while let Some(b @ b'0' ..= b'9') = cursor.current_byte() {
        exponent = (exponent * 10 + (b - b'0') as i32).min(MAX_EXPONENT);
        any_digit = true;
        cursor.move_next();
    }
    if !any_digit {
        return None;
    }
    Some(if negative { -exponent } else { exponent })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(s: &str) -> Option<Numeric> {
        let mut cursor = ByteCursor::new(s.as_bytes());
        let first = cursor.current_byte()?;
        match NumericTokenizer.try_tokenize(first, &mut cursor)? {
            Token::Number(n) => Some(n),
            _ => None,
        }
    }

    #[test]
    fn integers_and_reals() {
        assert_eq!(number("0"), Some(Numeric::from_int(0)));
        assert_eq!(number("-17"), Some(Numeric::from_int(-17)));
        assert_eq!(number("+17"), Some(Numeric::from_int(17)));
        assert_eq!(number("34.5"), Some(Numeric::new(345, 1)));
        assert_eq!(number("-.002"), Some(Numeric::new(-2, 3)));
        assert_eq!(number("4."), Some(Numeric::from_int(4)));
    }

    #[test]
    fn exponent_is_exact() {
        assert_eq!(number("1.53E3"), Some(Numeric::from_int(1530)));
        assert_eq!(number("1.457E2"), Some(Numeric::new(1457, 1)));
        assert_eq!(number("5e-2"), Some(Numeric::new(5, 2)));
        assert_eq!(number("5E+2"), Some(Numeric::from_int(500)));
    }

    #[test]
    fn degenerate() {
        assert_eq!(number("."), Some(Numeric::ZERO));
        assert_eq!(number("-"), Some(Numeric::ZERO));
        assert_eq!(number(".e5"), None);
        assert_eq!(number("1.2.3"), None);
        assert_eq!(number("1e2e3"), None);
        assert_eq!(number("1e"), None);
        assert_eq!(number("12abc"), None);
    }

    #[test]
    fn stops_at_delimiters() {
        let mut cursor = ByteCursor::new(b"12/Name");
        assert_eq!(NumericTokenizer.try_tokenize(b'1', &mut cursor), Some(Token::integer(12)));
        assert_eq!(cursor.current_byte(), Some(b'/'));
    }

    #[test]
    fn overflow() {
        let n = number("99999999999999999999999").unwrap();
        assert!(n.has_integer_overflow());
        assert!(!n.is_negative());
        let n = number("-99999999999999999999999").unwrap();
        assert!(n.has_integer_overflow());
        assert!(n.is_negative());
        // surplus fraction digits are dropped, not an overflow
        let n = number("0.12345678901234567890123").unwrap();
        assert!(!n.has_integer_overflow());
        assert_eq!(n.truncate(), 0);
    }
}
