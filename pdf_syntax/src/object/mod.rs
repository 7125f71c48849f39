//! References, resolved objects and typed conversion out of tokens.

mod stream;

pub use self::stream::*;

use crate::token::*;
use crate::error::*;
use crate::parser::ParseOptions;

use std::fmt;
use datasize::DataSize;

pub type ObjNr = u64;
pub type GenNr = u16;

/// Anything that can turn an indirect reference into the token it points to.
pub trait Resolve {
    fn resolve(&self, r: PlainRef) -> Result<Token>;
    fn options(&self) -> &ParseOptions;
}

/// Resolver for contexts where references cannot be followed.
pub struct NoResolve;
impl Resolve for NoResolve {
    fn resolve(&self, reference: PlainRef) -> Result<Token> {
        Err(PdfError::Reference { reference })
    }
    fn options(&self) -> &ParseOptions {
        &ParseOptions::TOLERANT
    }
}

/// Conversion from a token, dereferencing indirect references on the way.
pub trait FromToken: Sized {
    fn from_token(t: Token, resolve: &impl Resolve) -> Result<Self>;
}

/// `N G R` - object number and generation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, DataSize)]
pub struct PlainRef {
    pub id:     ObjNr,
    pub gen:    GenNr,
}
impl PlainRef {
    pub fn new(id: ObjNr, gen: GenNr) -> PlainRef {
        PlainRef { id, gen }
    }
}
impl fmt::Display for PlainRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}
impl FromToken for PlainRef {
    fn from_token(t: Token, _: &impl Resolve) -> Result<Self> {
        t.as_reference()
    }
}

/// An object materialized from the file: where it was found, what it is
/// called and what it contains. Objects taken out of an object stream carry
/// the position of their container.
#[derive(Clone, Debug, PartialEq, DataSize)]
pub struct ObjectToken {
    pub position: usize,
    pub number: PlainRef,
    pub data: Token,
}

//////////////////////////////////////
// FromToken for tokens & other types
//////////////////////////////////////

impl FromToken for Token {
    fn from_token(t: Token, _: &impl Resolve) -> Result<Self> {
        Ok(t)
    }
}
impl FromToken for Numeric {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.as_numeric()
    }
}
impl FromToken for i64 {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.as_integer()
    }
}
impl FromToken for i32 {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.as_i32()
    }
}
impl FromToken for u32 {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.as_u32()
    }
}
impl FromToken for usize {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.as_usize()
    }
}
impl FromToken for f64 {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.as_number()
    }
}
impl FromToken for f32 {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        Ok(t.resolve(r)?.as_number()? as f32)
    }
}
impl FromToken for bool {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.as_bool()
    }
}
impl FromToken for Name {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.into_name()
    }
}
impl FromToken for PdfString {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.into_string()
    }
}
impl FromToken for Dictionary {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        match t.resolve(r)? {
            Token::Dictionary(dict) => Ok(dict),
            Token::Stream(stream) => Ok(stream.info),
            p => Err(PdfError::UnexpectedPrimitive { expected: "Dictionary", found: p.get_debug_name() }),
        }
    }
}
impl FromToken for PdfStream {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        t.resolve(r)?.into_stream()
    }
}
impl<T: FromToken> FromToken for Option<T> {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        match t.resolve(r)? {
            Token::Null => Ok(None),
            t => T::from_token(t, r).map(Some),
        }
    }
}
/// An array, or a single value standing in for a one-element array.
impl<T: FromToken> FromToken for Vec<T> {
    fn from_token(t: Token, r: &impl Resolve) -> Result<Self> {
        match t.resolve(r)? {
            Token::Array(arr) => arr.into_iter().map(|t| T::from_token(t, r)).collect(),
            Token::Null => Ok(vec![]),
            t => Ok(vec![T::from_token(t, r)?]),
        }
    }
}
