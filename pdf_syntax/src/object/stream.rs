use once_cell::unsync::OnceCell;

use crate::error::*;
use crate::filter::FilterProvider;
use crate::object::{ObjNr, Resolve};
use crate::parser::{ParseOptions, Scanner, parse_token};
use crate::token::{Token, PdfStream};

/// A `/Type /ObjStm` container: `/N` objects packed into one compressed stream.
///
/// The payload is decoded on first access.
pub struct ObjectStream {
    /// The object number of this object.
    id: ObjNr,
    /// Number of compressed objects in the stream.
    num_objects: usize,
    /// The byte offset in the decoded stream, of the first compressed object.
    first: usize,
    inner: PdfStream,
    decoded: OnceCell<Decoded>,
}

struct Decoded {
    data: Vec<u8>,
    /// object number and offset (relative to `first`) of each member
    entries: Vec<(ObjNr, usize)>,
}

impl ObjectStream {
    pub fn parse(id: ObjNr, inner: PdfStream, resolve: &impl Resolve) -> Result<ObjectStream> {
        if !inner.info.is_type("ObjStm") {
            if resolve.options().lenient {
                warn!("object stream {} is not of /Type /ObjStm", id);
            } else {
                bail!("object {} is not an object stream", id);
            }
        }
        let num_objects = t!(inner.info.get_as("N", resolve));
        let first = t!(inner.info.get_as("First", resolve));
        if inner.info.get("Extends").is_some() {
            debug!("object stream {} extends another one, which is not followed", id);
        }
        Ok(ObjectStream { id, num_objects, first, inner, decoded: OnceCell::new() })
    }

    pub fn id(&self) -> ObjNr {
        self.id
    }

    /// Returns the number of contained objects
    pub fn n_objects(&self) -> usize {
        self.num_objects
    }

    /// Object numbers of the members, in stream order.
    pub fn object_numbers(&self, filters: &dyn FilterProvider, options: &ParseOptions) -> Result<Vec<ObjNr>> {
        let decoded = t!(self.decoded(filters, options));
        Ok(decoded.entries.iter().map(|&(nr, _)| nr).collect())
    }

    fn decoded(&self, filters: &dyn FilterProvider, options: &ParseOptions) -> Result<&Decoded> {
        self.decoded.get_or_try_init(|| {
            debug!("decoding object stream {}", self.id);
            let data = t!(self.inner.decoded(filters)).into_owned();
            let entries = t!(self.read_header(&data, options));
            Ok(Decoded { data, entries })
        })
    }

    fn read_header(&self, data: &[u8], options: &ParseOptions) -> Result<Vec<(ObjNr, usize)>> {
        if self.first > data.len() {
            bail!("object stream {}: /First {} is behind the end of the data ({})", self.id, self.first, data.len());
        }
        let mut scanner = Scanner::new(&data[.. self.first], *options);
        let mut entries = Vec::with_capacity(self.num_objects.min(data.len()));
        for i in 0 .. self.num_objects {
            let pair = scanner.read_token()
                .and_then(|nr| nr.as_u32())
                .and_then(|nr| Ok((nr as ObjNr, scanner.read_token()?.as_usize()?)));
            match pair {
                Ok(pair) => entries.push(pair),
                Err(e) if options.lenient => {
                    warn!("object stream {} declares {} objects, but only {} are listed: {}", self.id, self.num_objects, i, e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    /// Parse the object number `expected` which the cross-reference data placed at `index`.
    ///
    /// If the member at `index` has a different number, the header is searched for `expected`.
    pub fn get_object(&self, index: usize, expected: ObjNr, filters: &dyn FilterProvider, options: &ParseOptions) -> Result<Token> {
        let decoded = t!(self.decoded(filters, options));
        let entries = &decoded.entries;
        let index = match entries.get(index) {
            Some(&(nr, _)) if nr == expected => index,
            _ => match entries.iter().position(|&(nr, _)| nr == expected) {
                Some(found) => {
                    debug!("object {} is at index {} of object stream {}, not {}", expected, found, self.id, index);
                    found
                }
                None => err!(PdfError::ObjStmOutOfBounds { index, max: entries.len() }),
            }
        };

        let data = &decoded.data;
        let start = self.first.saturating_add(entries[index].1);
        let end = match entries.get(index + 1) {
            Some(&(_, next)) if self.first.saturating_add(next) >= start => self.first.saturating_add(next).min(data.len()),
            _ => data.len(),
        };
        if start > end {
            bail!("object {} starts behind the end of object stream {}", expected, self.id);
        }
        parse_token(&data[start .. end], *options)
    }
}
