//! Decryption seam. Key derivation and ciphers live outside this crate; the
//! resolver only needs something that turns encrypted tokens into plain ones.

use std::fmt;
use crate::error::Result;
use crate::object::PlainRef;
use crate::token::{Token, PdfString, PdfStream};

/// Decrypts the strings and stream data of the object `r`.
///
/// Called once per object, right after it was parsed and before it is cached.
pub trait EncryptionHandler {
    fn decrypt(&self, r: PlainRef, token: Token) -> Result<Token>;
}

/// Leaves everything as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEncryption;
impl EncryptionHandler for NoEncryption {
    fn decrypt(&self, _: PlainRef, token: Token) -> Result<Token> {
        Ok(token)
    }
}

/// Applies a byte-level cipher to every string and stream in an object.
pub struct DecryptBytes<F>(pub F);

impl<F> fmt::Debug for DecryptBytes<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("DecryptBytes")
    }
}

impl<F> EncryptionHandler for DecryptBytes<F>
    where F: Fn(PlainRef, &[u8]) -> Result<Vec<u8>>
{
    fn decrypt(&self, r: PlainRef, token: Token) -> Result<Token> {
        map_bytes(token, &|data: &[u8]| (self.0)(r, data))
    }
}

fn map_bytes(token: Token, f: &dyn Fn(&[u8]) -> Result<Vec<u8>>) -> Result<Token> {
    Ok(match token {
        Token::String(s) => Token::String(PdfString::new(f(s.as_bytes())?.into())),
        Token::HexString(s) => Token::HexString(PdfString::new(f(s.as_bytes())?.into())),
        Token::Array(items) => Token::Array(
            items.into_iter().map(|t| map_bytes(t, f)).collect::<Result<_>>()?
        ),
        Token::Dictionary(dict) => Token::Dictionary(
            dict.into_iter().map(|(k, v)| Ok((k, map_bytes(v, f)?))).collect::<Result<_>>()?
        ),
        Token::Stream(stream) => {
            let info = stream.info.into_iter()
                .map(|(k, v)| Ok((k, map_bytes(v, f)?)))
                .collect::<Result<_>>()?;
            Token::Stream(PdfStream::new(info, f(&stream.data)?))
        }
        t => t,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Dictionary;

    #[test]
    fn bytes_are_mapped_everywhere() {
        let xor = DecryptBytes(|r: PlainRef, data: &[u8]| -> Result<Vec<u8>> {
            Ok(data.iter().map(|b| b ^ r.id as u8).collect())
        });
        let mut info = Dictionary::new();
        info.insert("T", PdfString::from(&[b'a' ^ 1][..]));
        info.insert("N", 3);
        let token = Token::Array(vec![
            Token::Stream(PdfStream::new(info, vec![b'x' ^ 1])),
            Token::HexString(PdfString::from(&[b'y' ^ 1][..])),
        ]);
        let plain = xor.decrypt(PlainRef::new(1, 0), token).unwrap();
        let items = plain.as_array().unwrap();
        let stream = items[0].as_stream().unwrap();
        assert_eq!(stream.raw_data(), b"x");
        assert_eq!(stream.info["T"], Token::String("a".into()));
        assert_eq!(stream.info["N"], Token::integer(3));
        assert_eq!(items[1], Token::HexString("y".into()));
    }

    #[test]
    fn identity() {
        let t = Token::String("abc".into());
        assert_eq!(NoEncryption.decrypt(PlainRef::new(1, 0), t.clone()).unwrap(), t);
    }
}
