use crate::object::{ObjNr, GenNr, PlainRef};
use std::io;
use std::error::Error;

#[derive(Debug, Snafu)]
pub enum PdfError {
    // Syntax / parsing
    #[snafu(display("Unexpected end of file"))]
    EOF,

    #[snafu(display("Error parsing from string: {}", source))]
    Parse { source: Box<dyn Error + Send + Sync> },

    #[snafu(display("Invalid UTF-8: {}", source))]
    Utf8 { source: Box<dyn Error + Send + Sync> },

    #[snafu(display("Unexpected byte {:?} at {}", *byte as char, pos))]
    UnexpectedByte { pos: usize, byte: u8 },

    #[snafu(display("Unexpected token '{}' at {} - expected '{}'", lexeme, pos, expected))]
    UnexpectedLexeme { pos: usize, lexeme: String, expected: &'static str },

    #[snafu(display("Array starting at {} is never closed", pos))]
    UnterminatedArray { pos: usize },

    #[snafu(display("Dictionary starting at {} is never closed", pos))]
    UnterminatedDictionary { pos: usize },

    #[snafu(display("Dictionary key at {} must be a name, found {}", pos, found))]
    DictionaryKey { pos: usize, found: &'static str },

    #[snafu(display("Nesting deeper than {} levels at {}", max, pos))]
    NestingTooDeep { pos: usize, max: usize },

    #[snafu(display("'{}' not found.", word))]
    NotFound { word: String },

    #[snafu(display("Cannot follow reference {:?} without a resolver (most likely /Length of Stream).", reference))]
    Reference { reference: PlainRef },

    //////////////////
    // Cross-reference data
    #[snafu(display("Erroneous 'type' field in xref stream - expected 0, 1 or 2, found {}", found))]
    XRefStreamType { found: u64 },

    #[snafu(display("Cross-reference chain loops back to offset {}", offset))]
    XRefLoop { offset: usize },

    #[snafu(display("No usable cross-reference data: {}", source))]
    NoXRef { source: Box<PdfError> },

    //////////////////
    // Encode/decode
    #[snafu(display("Hex decode error. Position {}, bytes {:?}", pos, bytes))]
    HexDecode { pos: usize, bytes: [u8; 2] },

    #[snafu(display("Filter /{} is not supported", name))]
    UnsupportedFilter { name: String },

    #[snafu(display("Filter /{} failed: {}", name, msg))]
    FilterDecode { name: &'static str, msg: String },

    #[snafu(display("Failed to convert '{}' into PredictorType", n))]
    IncorrectPredictorType { n: u8 },

    //////////////////
    // Dictionary
    #[snafu(display("Field /{} is missing in dictionary for type {}.", field, typ))]
    MissingEntry { typ: &'static str, field: String },

    #[snafu(display("Expected primitive {}, found primitive {} instead.", expected, found))]
    UnexpectedPrimitive { expected: &'static str, found: &'static str },

    //////////////////
    // Resolution
    #[snafu(display("Tried to dereference free object nr {}.", obj_nr))]
    FreeObject { obj_nr: ObjNr },

    #[snafu(display("Tried to dereference non-existing object {} {} R.", obj_nr, gen_nr))]
    NullRef { obj_nr: ObjNr, gen_nr: GenNr },

    #[snafu(display("Expected object {:?}, found object {:?} at {}.", expected, found, pos))]
    ObjectMismatch { expected: PlainRef, found: PlainRef, pos: usize },

    #[snafu(display("Object stream index out of bounds ({}/{}).", index, max))]
    ObjStmOutOfBounds { index: usize, max: usize },

    #[snafu(display("Offset {} is outside of the file (length {})", pos, len))]
    OutOfBounds { pos: usize, len: usize },

    #[snafu(display("IO Error"))]
    Io { source: io::Error },

    #[snafu(display("{}", msg))]
    Other { msg: String },

    #[snafu(display("NoneError at {}:{}:{}", file, line, column))]
    NoneError { file: &'static str, line: u32, column: u32 },
}
impl PdfError {
    /// Print the error together with the chain of its sources to the log.
    pub fn trace(&self) {
        trace(self, 0);
    }

    /// True for errors that only say "ran out of input".
    pub fn is_eof(&self) -> bool {
        matches!(self, PdfError::EOF)
    }
}
fn trace(err: &dyn Error, depth: usize) {
    debug!("{}: {}", depth, err);
    if let Some(source) = err.source() {
        trace(source, depth + 1);
    }
}

pub type Result<T, E = PdfError> = std::result::Result<T, E>;

impl From<io::Error> for PdfError {
    fn from(source: io::Error) -> PdfError {
        PdfError::Io { source }
    }
}
impl From<String> for PdfError {
    fn from(msg: String) -> PdfError {
        PdfError::Other { msg }
    }
}

#[macro_export]
macro_rules! try_opt {
    ($e:expr) => (
        match $e {
            Some(v) => v,
            None => return Err($crate::PdfError::NoneError {
                file: file!(),
                line: line!(),
                column: column!()
            })
        }
    )
}

/// Propagate an error like `?`, logging where it passed through.
macro_rules! t {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => {
                trace!("{} @ {}:{}", e, file!(), line!());
                return Err(e.into());
            }
        }
    };
}

macro_rules! err_from {
    ($($st:ty),* => $variant:ident) => (
        $(
            impl From<$st> for PdfError {
                fn from(e: $st) -> PdfError {
                    PdfError::$variant { source: e.into() }
                }
            }
        )*
    )
}
err_from!(std::str::Utf8Error, std::string::FromUtf8Error => Utf8);
err_from!(std::num::ParseIntError, std::num::ParseFloatError => Parse);

macro_rules! err {
    ($e: expr) => ({
        return Err($e);
    })
}
macro_rules! other {
    ($($t:tt)*) => ($crate::PdfError::Other { msg: format!($($t)*) })
}
macro_rules! bail {
    ($($t:tt)*) => {
        err!($crate::PdfError::Other { msg: format!($($t)*) })
    }
}
