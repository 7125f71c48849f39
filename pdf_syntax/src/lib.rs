//! Low-level PDF reading: a byte-oriented tokenizer and the cross-reference
//! machinery that turns `N G R` into parsed, cached objects.
//!
//! The usual entry point is [`file::File`]. Lower layers ([`parser::Scanner`],
//! [`backend::Backend`], [`xref::XRefTable`]) are public for consumers that
//! need to look at raw document structure.

#[macro_use] extern crate snafu;
#[macro_use] extern crate log;

#[macro_use]
pub mod error;
pub mod object;
pub mod token;
pub mod xref;
pub mod parser;
pub mod backend;
pub mod filter;
pub mod crypt;
pub mod file;

pub use crate::error::{PdfError, Result};
pub use crate::object::{PlainRef, ObjectToken, Resolve, NoResolve, FromToken};
pub use crate::token::{Token, Dictionary, Name, PdfString, PdfStream, Numeric};
pub use crate::parser::{ParseOptions, Scanner, Scope};
