use crate::error::*;
use crate::filter::FilterProvider;
use crate::parser::{ByteCursor, ParseOptions, Scanner, read_xref_part};
use crate::xref::XRefChain;
use std::ops::Deref;

use std::ops::{
    RangeFull,
    RangeFrom,
    RangeTo,
    Range,
};

pub trait Backend: Sized {
    fn read<T: IndexRange>(&self, range: T) -> Result<&[u8]>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the offset of the beginning of the file, i.e., where the `%PDF-1.5` header is.
    /// All offsets declared inside the file are relative to it.
    fn locate_start_offset(&self) -> Result<usize> {
        // Implementation note 13 in version 1.7 of the PDF reference says that Acrobat viewers
        // expect the header to be within the first 1KB of the file, so we do the same here.
        const HEADER: &[u8] = b"%PDF-";
        let buf = t!(self.read(..std::cmp::min(1024, self.len())));
        buf
            .windows(HEADER.len())
            .position(|window| window == HEADER)
            .ok_or_else(|| PdfError::NotFound { word: "%PDF-".into() })
    }

    /// Returns the value of startxref
    fn locate_xref_offset(&self) -> Result<usize> {
        // locate the xref offset at the end of the file
        // `\nPOS\n%%EOF` where POS is the position encoded as base 10 integer.
        let mut cursor = ByteCursor::new(t!(self.read(..)));
        cursor.seek_end();
        t!(cursor.seek_substr_back(b"startxref"));
        let mut scanner = Scanner::with_cursor(cursor, ParseOptions::tolerant());
        t!(scanner.read_token()).as_usize()
    }

    /// All revisions of the file, newest first, starting at `startxref`.
    ///
    /// Used internally by File, but could also be useful for applications that want to look at the raw PDF objects.
    fn read_xref_chain(&self, start_offset: usize, options: &ParseOptions, filters: &dyn FilterProvider) -> Result<XRefChain> {
        let xref_offset = t!(self.locate_xref_offset());
        trace!("startxref {}", xref_offset);
        XRefChain::walk(xref_offset, options, |offset| {
            let pos = try_opt!(start_offset.checked_add(offset));
            // positions inside the part stay relative to the header
            let mut cursor = ByteCursor::with_offset(t!(self.read(pos ..)), offset);
            read_xref_part(&mut cursor, options, filters)
        })
    }
}


impl<T> Backend for T where T: Deref<Target=[u8]> {
    fn read<R: IndexRange>(&self, range: R) -> Result<&[u8]> {
        let r = t!(range.to_range(self.len()));
        Ok(&self[r])
    }
    fn len(&self) -> usize {
        (**self).len()
    }
}

/// `IndexRange` is implemented by Rust's built-in range types, produced
/// by range syntax like `..`, `a..`, `..b` or `c..d`.
pub trait IndexRange
{
    /// Start index (inclusive)
    fn start(&self) -> Option<usize>;

    /// End index (exclusive)
    fn end(&self) -> Option<usize>;

    /// `len`: the size of whatever container that is being indexed
    fn to_range(&self, len: usize) -> Result<Range<usize>> {
        match (self.start(), self.end()) {
            (None, None) => Ok(0 .. len),
            (Some(start), None) if start <= len => Ok(start .. len),
            (None, Some(end)) if end <= len => Ok(0 .. end),
            (Some(start), Some(end)) if start <= end && end <= len => Ok(start .. end),
            (start, end) => Err(PdfError::OutOfBounds { pos: end.or(start).unwrap_or(0), len })
        }
    }
}


impl IndexRange for RangeFull {
    #[inline]
    fn start(&self) -> Option<usize> { None }
    #[inline]
    fn end(&self) -> Option<usize> { None }

}

impl IndexRange for RangeFrom<usize> {
    #[inline]
    fn start(&self) -> Option<usize> { Some(self.start) }
    #[inline]
    fn end(&self) -> Option<usize> { None }
}

impl IndexRange for RangeTo<usize> {
    #[inline]
    fn start(&self) -> Option<usize> { None }
    #[inline]
    fn end(&self) -> Option<usize> { Some(self.end) }
}

impl IndexRange for Range<usize> {
    #[inline]
    fn start(&self) -> Option<usize> { Some(self.start) }
    #[inline]
    fn end(&self) -> Option<usize> { Some(self.end) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::StandardFilters;
    use crate::object::PlainRef;
    use crate::xref::XRef;

    #[test]
    fn ranges() {
        let data = vec![1u8, 2, 3, 4];
        assert_eq!(data.read(1 .. 3).unwrap(), &[2, 3]);
        assert_eq!(data.read(..).unwrap().len(), 4);
        assert_eq!(data.read(4 ..).unwrap(), &[] as &[u8]);
        assert!(matches!(data.read(2 .. 7), Err(PdfError::OutOfBounds { pos: 7, len: 4 })));
        assert!(matches!(data.read(5 ..), Err(PdfError::OutOfBounds { pos: 5, len: 4 })));
    }

    #[test]
    fn header_and_startxref() {
        let data: &[u8] = b"garbage\n%PDF-1.4\n...\nstartxref\n  123\n%%EOF\n";
        assert_eq!(data.locate_start_offset().unwrap(), 8);
        assert_eq!(data.locate_xref_offset().unwrap(), 123);

        let data: &[u8] = b"no header here";
        assert!(data.locate_start_offset().is_err());
        assert!(data.locate_xref_offset().is_err());
    }

    #[test]
    fn offsets_are_relative_to_the_header() {
        let body = "%PDF-1.7\nxref\n0 2\n0000000000 65535 f \n0000000042 00000 n \ntrailer\n<< /Size 2 >>\nstartxref\n9\n%%EOF\n";
        let data = format!("JUNK{}", body).into_bytes();
        let start = data.locate_start_offset().unwrap();
        assert_eq!(start, 4);
        let chain = data.read_xref_chain(start, &ParseOptions::strict(), &StandardFilters).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.newest().offset(), 9);
        assert_eq!(chain.newest().get(PlainRef::new(1, 0)), Some(XRef::Raw { pos: 42, gen_nr: 0 }));
    }

    #[test]
    fn startxref_outside_of_file() {
        let data: &[u8] = b"%PDF-1.7\nstartxref\n9999\n%%EOF";
        assert!(matches!(data.read_xref_chain(0, &ParseOptions::tolerant(), &StandardFilters), Err(PdfError::NoXRef { .. })));
    }
}
