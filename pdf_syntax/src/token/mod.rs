//! The universal parse result: [`Token`] and the composite types it carries.

mod number;

pub use self::number::Numeric;

use crate::error::*;
use crate::object::{PlainRef, Resolve, FromToken};
use crate::filter::{FilterProvider, filter_names};

use std::sync::Arc;
use std::{str, fmt};
use std::ops::{Deref, Index};
use std::borrow::Cow;
use indexmap::IndexMap;
use itertools::Itertools;
use istring::{SmallString, IBytes};
use datasize::DataSize;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Null,
    Boolean (bool),
    Number (Numeric),
    Name (Name),
    /// `( ... )` string, raw bytes after escape processing.
    String (PdfString),
    /// `< ... >` string, decoded from its hex digits.
    HexString (PdfString),
    Array (Vec<Token>),
    Dictionary (Dictionary),
    Stream (PdfStream),
    Reference (PlainRef),
    Comment (SmallString),
    Operator (SmallString),
    EndOfLine,
}
impl DataSize for Token {
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = std::mem::size_of::<Self>();

    fn estimate_heap_size(&self) -> usize {
        match self {
            Token::String(ref s) | Token::HexString(ref s) => s.estimate_heap_size(),
            Token::Stream(ref s) => s.estimate_heap_size(),
            Token::Dictionary(ref d) => d.estimate_heap_size(),
            Token::Array(ref arr) => arr.estimate_heap_size(),
            Token::Name(ref s) => s.estimate_heap_size(),
            Token::Comment(ref s) | Token::Operator(ref s) => s.estimate_heap_size(),
            _ => 0
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Null => write!(f, "null"),
            Token::Boolean(b) => b.fmt(f),
            Token::Number(n) => n.fmt(f),
            Token::Name(ref n) => n.fmt(f),
            Token::String(ref s) => write!(f, "{:?}", s),
            Token::HexString(ref s) => write!(f, "<{:?}>", s),
            Token::Array(ref arr) => write!(f, "[{}]", arr.iter().format(", ")),
            Token::Dictionary(ref d) => d.fmt(f),
            Token::Stream(ref s) => write!(f, "stream({} bytes) {}", s.data.len(), s.info),
            Token::Reference(r) => write!(f, "{} {} R", r.id, r.gen),
            Token::Comment(ref c) => write!(f, "%{}", c),
            Token::Operator(ref op) => f.write_str(op),
            Token::EndOfLine => write!(f, "<EOL>"),
        }
    }
}

macro_rules! unexpected_primitive {
    ($expected:ident, $found:expr) => (
        Err(PdfError::UnexpectedPrimitive {
            expected: stringify!($expected),
            found: $found
        })
    )
}

impl Token {
    pub fn name(name: impl Into<Name>) -> Token {
        Token::Name(name.into())
    }
    pub fn operator(op: &str) -> Token {
        Token::Operator(op.into())
    }
    pub fn integer(n: i64) -> Token {
        Token::Number(Numeric::from_int(n))
    }

    /// For debugging / error messages: get the name of the variant
    pub fn get_debug_name(&self) -> &'static str {
        match *self {
            Token::Null => "Null",
            Token::Boolean (..) => "Boolean",
            Token::Number (..) => "Number",
            Token::Name (..) => "Name",
            Token::String (..) => "String",
            Token::HexString (..) => "HexString",
            Token::Array (..) => "Array",
            Token::Dictionary (..) => "Dictionary",
            Token::Stream (..) => "Stream",
            Token::Reference (..) => "Reference",
            Token::Comment (..) => "Comment",
            Token::Operator (..) => "Operator",
            Token::EndOfLine => "EndOfLine",
        }
    }
    /// resolve the token if it is a reference, otherwise do nothing
    pub fn resolve(self, r: &impl Resolve) -> Result<Token> {
        match self {
            Token::Reference(id) => r.resolve(id),
            _ => Ok(self)
        }
    }
    pub fn is_operator(&self, op: &str) -> bool {
        matches!(self, Token::Operator(ref o) if o.as_str() == op)
    }
    pub fn as_numeric(&self) -> Result<Numeric> {
        match *self {
            Token::Number(n) => Ok(n),
            ref p => unexpected_primitive!(Number, p.get_debug_name())
        }
    }
    pub fn as_integer(&self) -> Result<i64> {
        match *self {
            Token::Number(n) => match n.as_i64() {
                Some(i) => Ok(i),
                None => bail!("{:?} is not an integer", n),
            },
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_i32(&self) -> Result<i32> {
        let n = self.as_integer()?;
        i32::try_from(n).map_err(|_| other!("integer {} out of range", n))
    }
    pub fn as_u32(&self) -> Result<u32> {
        match self.as_integer()? {
            n if n >= 0 && n <= u32::MAX as i64 => Ok(n as u32),
            n => bail!("integer {} is not a valid u32", n),
        }
    }
    pub fn as_usize(&self) -> Result<usize> {
        match self.as_integer()? {
            n if n >= 0 => Ok(n as usize),
            _ => bail!("negative integer"),
        }
    }
    pub fn as_number(&self) -> Result<f64> {
        match *self {
            Token::Number(n) => Ok(n.as_f64()),
            ref p => unexpected_primitive!(Number, p.get_debug_name())
        }
    }
    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Token::Boolean (b) => Ok(b),
            ref p => unexpected_primitive!(Boolean, p.get_debug_name())
        }
    }
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Token::Name(ref name) => Ok(name.as_str()),
            p => unexpected_primitive!(Name, p.get_debug_name())
        }
    }
    /// Literal and hex strings alike.
    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Token::String(ref data) | Token::HexString(ref data) => Ok(data),
            p => unexpected_primitive!(String, p.get_debug_name())
        }
    }
    pub fn as_array(&self) -> Result<&[Token]> {
        match self {
            Token::Array(ref v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name())
        }
    }
    pub fn as_dictionary(&self) -> Result<&Dictionary> {
        match self {
            Token::Dictionary(ref dict) => Ok(dict),
            Token::Stream(ref s) => Ok(&s.info),
            p => unexpected_primitive!(Dictionary, p.get_debug_name())
        }
    }
    pub fn as_stream(&self) -> Result<&PdfStream> {
        match self {
            Token::Stream(ref s) => Ok(s),
            p => unexpected_primitive!(Stream, p.get_debug_name())
        }
    }
    pub fn as_reference(&self) -> Result<PlainRef> {
        match *self {
            Token::Reference(id) => Ok(id),
            ref p => unexpected_primitive!(Reference, p.get_debug_name())
        }
    }
    pub fn into_array(self) -> Result<Vec<Token>> {
        match self {
            Token::Array(v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name())
        }
    }
    pub fn into_dictionary(self) -> Result<Dictionary> {
        match self {
            Token::Dictionary(dict) => Ok(dict),
            p => unexpected_primitive!(Dictionary, p.get_debug_name())
        }
    }
    pub fn into_name(self) -> Result<Name> {
        match self {
            Token::Name(name) => Ok(name),
            p => unexpected_primitive!(Name, p.get_debug_name())
        }
    }
    pub fn into_string(self) -> Result<PdfString> {
        match self {
            Token::String(data) | Token::HexString(data) => Ok(data),
            p => unexpected_primitive!(String, p.get_debug_name())
        }
    }
    pub fn into_stream(self) -> Result<PdfStream> {
        match self {
            Token::Stream (s) => Ok(s),
            p => unexpected_primitive!(Stream, p.get_debug_name())
        }
    }
}

impl From<i64> for Token {
    fn from(x: i64) -> Token {
        Token::integer(x)
    }
}
impl From<i32> for Token {
    fn from(x: i32) -> Token {
        Token::integer(x as i64)
    }
}
impl From<Numeric> for Token {
    fn from(x: Numeric) -> Token {
        Token::Number(x)
    }
}
impl From<bool> for Token {
    fn from(x: bool) -> Token {
        Token::Boolean(x)
    }
}
impl From<Name> for Token {
    fn from(x: Name) -> Token {
        Token::Name(x)
    }
}
impl From<PdfString> for Token {
    fn from(x: PdfString) -> Token {
        Token::String (x)
    }
}
impl From<PdfStream> for Token {
    fn from(x: PdfStream) -> Token {
        Token::Stream (x)
    }
}
impl From<Dictionary> for Token {
    fn from(x: Dictionary) -> Token {
        Token::Dictionary (x)
    }
}
impl From<Vec<Token>> for Token {
    fn from(x: Vec<Token>) -> Token {
        Token::Array (x)
    }
}
impl From<PlainRef> for Token {
    fn from(x: PlainRef) -> Token {
        Token::Reference (x)
    }
}

/// Dictionary token. Keys are unique; their order is kept for display only.
#[derive(Default, Clone, PartialEq)]
pub struct Dictionary {
    dict: IndexMap<Name, Token>
}
impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary { dict: IndexMap::new()}
    }
    pub fn len(&self) -> usize {
        self.dict.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, key: &str) -> Option<&Token> {
        self.dict.get(key)
    }
    pub fn insert(&mut self, key: impl Into<Name>, val: impl Into<Token>) -> Option<Token> {
        self.dict.insert(key.into(), val.into())
    }
    pub fn iter(&self) -> impl Iterator<Item=(&Name, &Token)> {
        self.dict.iter()
    }
    pub fn remove(&mut self, key: &str) -> Option<Token> {
        self.dict.shift_remove(key)
    }
    /// like remove, but takes the name of the calling type and returns `PdfError::MissingEntry` if the entry is not found
    pub fn require(&mut self, typ: &'static str, key: &str) -> Result<Token> {
        self.remove(key).ok_or(
            PdfError::MissingEntry {
                typ,
                field: key.into()
            }
        )
    }

    /// Read `key` as `T`, following an indirect reference if the value is one.
    pub fn get_as<T: FromToken>(&self, key: &str, resolve: &impl Resolve) -> Result<T> {
        match self.dict.get(key) {
            Some(token) => T::from_token(token.clone(), resolve),
            None => Err(PdfError::MissingEntry { typ: "Dictionary", field: key.into() }),
        }
    }
    /// Like `get_as`, but a missing key or a reference to `null` gives `None`.
    pub fn try_get_as<T: FromToken>(&self, key: &str, resolve: &impl Resolve) -> Result<Option<T>> {
        match self.dict.get(key) {
            Some(token) => match token.clone().resolve(resolve)? {
                Token::Null => Ok(None),
                t => T::from_token(t, resolve).map(Some),
            },
            None => Ok(None),
        }
    }
    /// Whether `/Type` is present and equals `typ`.
    pub fn is_type(&self, typ: &str) -> bool {
        matches!(self.get("Type"), Some(Token::Name(ref n)) if n.as_str() == typ)
    }
}
impl DataSize for Dictionary {
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = std::mem::size_of::<Self>();
    fn estimate_heap_size(&self) -> usize {
        self.iter().map(|(k, v)| 16 + k.estimate_heap_size() + v.estimate_heap_size()).sum()
    }
}
impl Deref for Dictionary {
    type Target = IndexMap<Name, Token>;
    fn deref(&self) -> &IndexMap<Name, Token> {
        &self.dict
    }
}
impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{{")?;
        for (k, v) in self {
            writeln!(f, "{:>15}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}
impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.iter().format_with(", ", |(k, v), f| f(&format_args!("{}={}", k, v))))
    }
}
impl<'a> Index<&'a str> for Dictionary {
    type Output = Token;
    fn index(&self, idx: &'a str) -> &Token {
        self.dict.index(idx)
    }
}
impl IntoIterator for Dictionary {
    type Item = (Name, Token);
    type IntoIter = indexmap::map::IntoIter<Name, Token>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.into_iter()
    }
}
impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Token);
    type IntoIter = indexmap::map::Iter<'a, Name, Token>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.iter()
    }
}
impl FromIterator<(Name, Token)> for Dictionary {
    fn from_iter<I: IntoIterator<Item=(Name, Token)>>(iter: I) -> Dictionary {
        Dictionary { dict: iter.into_iter().collect() }
    }
}

/// Stream token: the dictionary plus the still-encoded bytes between
/// `stream` and `endstream`.
#[derive(Clone, Debug, PartialEq)]
pub struct PdfStream {
    pub info: Dictionary,
    pub data: Arc<[u8]>,
}
impl DataSize for PdfStream {
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = std::mem::size_of::<Self>();
    fn estimate_heap_size(&self) -> usize {
        self.info.estimate_heap_size() + self.data.len()
    }
}
impl PdfStream {
    pub fn new(info: Dictionary, data: impl Into<Arc<[u8]>>) -> PdfStream {
        PdfStream { info, data: data.into() }
    }
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
    /// Names of the filters in `/Filter`, in application order.
    pub fn filters(&self) -> Result<Vec<Name>> {
        filter_names(&self.info)
    }
    /// Run the raw bytes through every filter in `/Filter`.
    pub fn decoded(&self, filters: &dyn FilterProvider) -> Result<Cow<'_, [u8]>> {
        let mut data = Cow::Borrowed(&*self.data);
        for index in 0 .. self.filters()?.len() {
            data = Cow::Owned(t!(filters.decode(&data, &self.info, index)));
        }
        Ok(data)
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Ord, PartialOrd, DataSize)]
pub struct Name(pub SmallString);
impl Name {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Deref for Name {
    type Target = str;
    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}
impl From<String> for Name {
    #[inline]
    fn from(s: String) -> Name {
        Name(s.into())
    }
}
impl From<SmallString> for Name {
    #[inline]
    fn from(s: SmallString) -> Name {
        Name(s)
    }
}
impl<'a> From<&'a str> for Name {
    #[inline]
    fn from(s: &'a str) -> Name {
        Name(s.into())
    }
}
impl PartialEq<str> for Name {
    #[inline]
    fn eq(&self, rhs: &str) -> bool {
        self.as_str() == rhs
    }
}
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}
impl std::borrow::Borrow<str> for Name {
    #[inline]
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

/// String token bytes. Text decoding is deferred to `text`/`to_string_lossy`
/// so that decryption can run on the bytes as they appear in the file.
#[derive(Clone, PartialEq, Eq, Hash, DataSize)]
pub struct PdfString {
    pub data: IBytes,
}
impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"")?;
        for &b in self.data.as_slice() {
            match b {
                b'"' => write!(f, "\\\"")?,
                b' ' ..= b'~' => write!(f, "{}", b as char)?,
                o @ 0 ..= 7  => write!(f, "\\{}", o)?,
                x => write!(f, "\\x{:02x}", x)?
            }
        }
        write!(f, "\"")
    }
}
impl AsRef<[u8]> for PdfString {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
impl PdfString {
    pub fn new(data: IBytes) -> PdfString {
        PdfString { data }
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    pub fn into_bytes(self) -> IBytes {
        self.data
    }
    /// Decode as text: a leading `FE FF` selects UTF-16BE, `FF FE` UTF-16LE,
    /// anything else is UTF-8 when valid and Latin-1 otherwise.
    pub fn to_string_lossy(&self) -> String {
        let data = self.as_bytes();
        if let Some(rest) = data.strip_prefix(&[0xfe, 0xff]) {
            utf16_to_string_lossy(rest, u16::from_be_bytes)
        } else if let Some(rest) = data.strip_prefix(&[0xff, 0xfe]) {
            utf16_to_string_lossy(rest, u16::from_le_bytes)
        } else {
            match str::from_utf8(data) {
                Ok(s) => s.into(),
                Err(_) => latin1_to_string(data),
            }
        }
    }
}
impl PdfString {
    /// Like `to_string_lossy`, but malformed UTF-16 is an error.
    pub fn text(&self) -> Result<String> {
        let data = self.as_bytes();
        let (rest, big_endian) = match data {
            [0xfe, 0xff, rest @ ..] => (rest, true),
            [0xff, 0xfe, rest @ ..] => (rest, false),
            _ => return Ok(self.to_string_lossy()),
        };
        if rest.len() % 2 != 0 {
            bail!("UTF-16 string with an odd number of bytes");
        }
        let units = rest.chunks_exact(2).map(|c| if big_endian {
            u16::from_be_bytes([c[0], c[1]])
        } else {
            u16::from_le_bytes([c[0], c[1]])
        });
        char::decode_utf16(units)
            .collect::<Result<String, _>>()
            .map_err(|e| other!("invalid UTF-16 string: {}", e))
    }
}
impl<'a> From<&'a str> for PdfString {
    fn from(value: &'a str) -> Self {
        PdfString { data: value.as_bytes().into() }
    }
}
impl<'a> From<&'a [u8]> for PdfString {
    fn from(value: &'a [u8]) -> Self {
        PdfString { data: value.into() }
    }
}

fn utf16_to_string_lossy(data: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = data.chunks(2).map(|c| match *c {
        [a, b] => unit([a, b]),
        // a dangling byte can never be part of a valid code unit
        _ => 0xFFFD,
    });
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Single byte Western fallback for names and strings that are not UTF-8.
pub fn latin1_to_string(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}
