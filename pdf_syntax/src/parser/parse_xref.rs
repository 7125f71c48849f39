use std::convert::TryInto;
use std::str;

use crate::error::*;
use crate::filter::FilterProvider;
use crate::object::*;
use crate::parser::{Scanner, ByteCursor, ParseOptions, parse_indirect_object};
use crate::token::Token;
use crate::xref::{XRef, XRefKind, XRefPart, XRefPartBuilder};

/// Cross-reference data can not refer to other objects (except for `/Length`,
/// which is repaired in lenient mode).
struct Unresolved(ParseOptions);
impl Resolve for Unresolved {
    fn resolve(&self, reference: PlainRef) -> Result<Token> {
        Err(PdfError::Reference { reference })
    }
    fn options(&self) -> &ParseOptions {
        &self.0
    }
}

/// Reads the cross-reference part (table + trailer, or stream) at the cursor.
pub fn read_xref_part(cursor: &mut ByteCursor, options: &ParseOptions, filters: &dyn FilterProvider) -> Result<XRefPart> {
    cursor.skip_whitespace();
    let offset = cursor.position();
    if cursor.eat_keyword(b"xref") {
        parse_xref_table_and_trailer(cursor, offset, options)
    } else {
        parse_xref_stream(cursor, offset, options, filters)
    }
}

fn parse_subsection_header(line: &[u8]) -> Option<(ObjNr, u64)> {
    let line = str::from_utf8(line).ok()?;
    let mut words = line.split_ascii_whitespace();
    let first = words.next()?.parse().ok()?;
    let count = words.next()?.parse().ok()?;
    if words.next().is_some() {
        return None;
    }
    Some((first, count))
}

enum Entry {
    InUse { pos: usize, gen_nr: GenNr },
    Free,
}

fn parse_entry(line: &[u8]) -> Option<Entry> {
    let line = str::from_utf8(line).ok()?;
    let mut words = line.split_ascii_whitespace();
    let pos = words.next()?;
    let gen_nr = words.next()?;
    let kind = words.next()?;
    if words.next().is_some() {
        return None;
    }
    match kind {
        "n" => Some(Entry::InUse { pos: pos.parse().ok()?, gen_nr: gen_nr.parse().ok()? }),
        "f" => Some(Entry::Free),
        _ => None,
    }
}

// steps over the entry lines of a subsection that is not used
fn skip_entries(cursor: &mut ByteCursor) {
    loop {
        cursor.skip_whitespace();
        let mut c = *cursor;
        match c.read_line().map(parse_entry) {
            Some(Some(_)) => *cursor = c,
            _ => break,
        }
    }
}

/// Reads xref sections (from table) and trailer. The cursor is after `xref`.
pub fn parse_xref_table_and_trailer(cursor: &mut ByteCursor, offset: usize, options: &ParseOptions) -> Result<XRefPart> {
    let mut builder = XRefPartBuilder::new(offset, XRefKind::Table);

    // Keep reading subsections until we hit `trailer`
    loop {
        cursor.skip_whitespace();
        if cursor.eat_keyword(b"trailer") {
            break;
        }
        let header_pos = cursor.position();
        let line = match cursor.read_line() {
            Some(line) => line,
            None => return Err(PdfError::NotFound { word: "trailer".into() }),
        };
        let (first, count) = match parse_subsection_header(line) {
            // the last object number has to fit
            Some((first, count)) if first.checked_add(count.saturating_sub(1)).is_some() => (first, count),
            _ => {
                warn!("malformed xref subsection header at {}: {:?}", header_pos, String::from_utf8_lossy(line));
                skip_entries(cursor);
                continue;
            }
        };

        for i in 0 .. count {
            cursor.skip_whitespace();
            let mut c = *cursor;
            let entry = c.read_line().and_then(parse_entry);
            let entry = match entry {
                Some(entry) => entry,
                None if options.allow_xref_error => {
                    warn!("xref subsection at {} declares {} entries, but only {} follow", header_pos, count, i);
                    break;
                }
                None => bail!("xref subsection at {} declares {} entries, but only {} follow", header_pos, count, i),
            };
            *cursor = c;
            match entry {
                Entry::InUse { pos, gen_nr } => {
                    builder.add(PlainRef::new(first + i, gen_nr), XRef::Raw { pos, gen_nr });
                }
                Entry::Free => builder.add_free(first + i),
            }
        }
    }

    let mut scanner = Scanner::with_cursor(*cursor, *options);
    let trailer = t!(t!(scanner.read_token()).into_dictionary());
    *cursor = *scanner.cursor();

    Ok(builder.build(trailer))
}

/// Reads an xref stream object. Its dictionary is the trailer of the revision.
pub fn parse_xref_stream(cursor: &mut ByteCursor, offset: usize, options: &ParseOptions, filters: &dyn FilterProvider) -> Result<XRefPart> {
    let resolve = Unresolved(*options);
    let (number, token) = t!(parse_indirect_object(cursor, &resolve));
    let stream = t!(token.into_stream());
    if !stream.info.is_type("XRef") {
        warn!("cross-reference stream {} at {} is not of /Type /XRef", number, offset);
    }
    let data = t!(stream.decoded(filters));

    let width: Vec<usize> = t!(stream.info.get_as("W", &resolve));
    let width: [usize; 3] = match width.as_slice().try_into() {
        Ok(w) => w,
        Err(_) => bail!("xref stream /W has {} entries instead of 3", width.len()),
    };
    let size: u64 = t!(stream.info.get_as::<usize>("Size", &resolve)) as u64;
    let index: Vec<u64> = match t!(stream.info.try_get_as::<Vec<usize>>("Index", &resolve)) {
        Some(index) => index.into_iter().map(|n| n as u64).collect(),
        None => vec![0, size],
    };
    if index.len() % 2 != 0 {
        bail!("xref stream has {} elements which is not an even number", index.len());
    }

    let mut builder = XRefPartBuilder::new(offset, XRefKind::Stream);
    let mut data_left = &*data;
    for pair in index.chunks_exact(2) {
        t!(parse_xref_section_from_stream(pair[0], pair[1] as usize, width, &mut data_left, options, &mut builder));
    }
    Ok(builder.build(stream.info))
}

// Just the part of Parser which reads xref sections from xref stream.
/// Takes `&mut &[u8]` so that it can "consume" data as it reads
fn parse_xref_section_from_stream(first_id: ObjNr, mut num_entries: usize, width: [usize; 3], data: &mut &[u8], options: &ParseOptions, builder: &mut XRefPartBuilder) -> Result<()> {
    let [w0, w1, w2] = width;
    if let Some(&w) = width.iter().find(|&&w| w > std::mem::size_of::<u64>()) {
        bail!("xref stream field width {} is larger than 8 bytes", w);
    }
    let entry_len = w0 + w1 + w2;
    if entry_len == 0 {
        bail!("xref stream entries have zero width");
    }
    if num_entries.saturating_mul(entry_len) > data.len() {
        if options.allow_xref_error {
            warn!("not enough xref data. truncating.");
            num_entries = data.len() / entry_len;
        } else {
            bail!("not enough xref data");
        }
    }
    for i in 0 .. num_entries as u64 {
        // a missing type field means type 1
        let _type = if w0 == 0 {
            1
        } else {
            t!(read_u64_from_stream(w0, data))
        };
        let field1 = t!(read_u64_from_stream(w1, data));
        let field2 = t!(read_u64_from_stream(w2, data));

        let id = match first_id.checked_add(i) {
            Some(id) => id,
            None => bail!("xref stream section starting at {} runs past the largest object number", first_id),
        };
        match _type {
            0 => builder.add_free(id),
            1 => {
                let gen_nr = field2 as GenNr;
                builder.add(PlainRef::new(id, gen_nr), XRef::Raw { pos: field1 as usize, gen_nr });
            }
            2 => {
                builder.add(PlainRef::new(id, 0), XRef::Stream { stream_id: field1 as ObjNr, index: field2 as usize });
            }
            found if options.allow_xref_error => {
                warn!("xref stream entry for object {} has type {}, treating it as free", id, found);
            }
            found => return Err(PdfError::XRefStreamType { found }),
        }
    }
    Ok(())
}

/// Helper to read an integer with a certain amount of bytes `width` from stream.
fn read_u64_from_stream(width: usize, data: &mut &[u8]) -> Result<u64> {
    if width > std::mem::size_of::<u64>() {
        return Err(PdfError::Other { msg: format!("xref stream entry has invalid width {}", width) });
    }
    if width > data.len() {
        return Err(PdfError::Other { msg: format!("xref stream entry has width {} but only {} bytes left to read", width, data.len()) });
    }
    let (bytes, rest) = data.split_at(width);
    *data = rest;
    Ok(bytes.iter().fold(0, |n, &b| n << 8 | u64::from(b)))
}
