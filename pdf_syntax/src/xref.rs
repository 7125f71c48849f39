use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Formatter};

use crate::error::*;
use crate::object::*;
use crate::parser::ParseOptions;
use crate::token::{Token, Dictionary};

///////////////////////////
// Cross-reference table //
///////////////////////////

/// Where an object lives. Positions are as declared in the file, i.e.
/// relative to the `%PDF-` header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum XRef {
    /// In use.
    Raw {
        pos: usize,
        gen_nr: GenNr
    },
    /// In use and compressed inside an Object Stream
    Stream {
        stream_id: ObjNr,
        index: usize,
    },
}

impl XRef {
    pub fn get_gen_nr(&self) -> GenNr {
        match *self {
            XRef::Raw { gen_nr, .. } => gen_nr,
            // compressed objects always have generation 0
            XRef::Stream { .. } => 0,
        }
    }
}

/// Classic `xref` table or cross-reference stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum XRefKind {
    Table,
    Stream,
}

/// One revision's cross-reference data. Built with [`XRefPartBuilder`] and not
/// modified afterwards.
#[derive(Clone)]
pub struct XRefPart {
    offset: usize,
    previous: Option<usize>,
    xref_stm: Option<usize>,
    kind: XRefKind,
    trailer: Dictionary,
    entries: HashMap<PlainRef, XRef>,
    free: HashSet<ObjNr>,
}
impl XRefPart {
    /// Where this part starts in the file.
    pub fn offset(&self) -> usize {
        self.offset
    }
    /// `/Prev` of the trailer.
    pub fn previous(&self) -> Option<usize> {
        self.previous
    }
    /// `/XRefStm` of a hybrid file's trailer.
    pub fn xref_stm(&self) -> Option<usize> {
        self.xref_stm
    }
    pub fn kind(&self) -> XRefKind {
        self.kind
    }
    /// The trailer, or the stream dictionary of a cross-reference stream.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }
    pub fn get(&self, r: PlainRef) -> Option<XRef> {
        self.entries.get(&r).copied()
    }
    /// Whether this revision marks object number `id` as free.
    pub fn is_free(&self, id: ObjNr) -> bool {
        self.free.contains(&id)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item=(PlainRef, XRef)> + '_ {
        self.entries.iter().map(|(&r, &x)| (r, x))
    }
}
impl Debug for XRefPart {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "XRefPart({:?} @ {}, {} entries, prev {:?})", self.kind, self.offset, self.entries.len(), self.previous)
    }
}

/// Collects the entries of one revision. Within a revision the first entry
/// for a reference is kept.
pub struct XRefPartBuilder {
    offset: usize,
    kind: XRefKind,
    entries: HashMap<PlainRef, XRef>,
    free: HashSet<ObjNr>,
}
impl XRefPartBuilder {
    pub fn new(offset: usize, kind: XRefKind) -> XRefPartBuilder {
        XRefPartBuilder {
            offset,
            kind,
            entries: HashMap::new(),
            free: HashSet::new(),
        }
    }
    /// Free entries are not looked up, they only explain why an object is missing.
    pub fn add_free(&mut self, id: ObjNr) {
        self.free.insert(id);
    }
    /// Returns false if `r` was already present.
    pub fn add(&mut self, r: PlainRef, entry: XRef) -> bool {
        match self.entries.entry(r) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(entry);
                true
            }
        }
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn build(self, trailer: Dictionary) -> XRefPart {
        let previous = offset_entry(&trailer, "Prev");
        let xref_stm = offset_entry(&trailer, "XRefStm");
        XRefPart {
            offset: self.offset,
            previous,
            xref_stm,
            kind: self.kind,
            trailer,
            entries: self.entries,
            free: self.free,
        }
    }
}

// a negative offset means "none"
fn offset_entry(trailer: &Dictionary, key: &str) -> Option<usize> {
    match trailer.get(key) {
        Some(Token::Number(n)) => match n.as_i64() {
            Some(pos) if pos >= 0 => Some(pos as usize),
            _ => None,
        },
        Some(other) => {
            warn!("/{} in trailer is {}, ignoring it", key, other);
            None
        }
        None => None,
    }
}

/// All revisions of a file, newest first.
#[derive(Debug)]
pub struct XRefChain {
    parts: Vec<XRefPart>,
}
impl XRefChain {
    /// Walk from the newest revision at `start` along `/Prev`. A hybrid
    /// revision's `/XRefStm` part directly follows its table part.
    ///
    /// The walk stops at the first offset seen twice. A revision that cannot
    /// be loaded ends the walk with a warning if `allow_xref_error` is set, and
    /// is an error otherwise. Failing to load the newest revision is always
    /// an error.
    pub fn walk(start: usize, options: &ParseOptions, mut load: impl FnMut(usize) -> Result<XRefPart>) -> Result<XRefChain> {
        let mut parts: Vec<XRefPart> = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(start);

        while let Some(offset) = next {
            if !seen.insert(offset) {
                if !options.allow_xref_error {
                    return Err(PdfError::XRefLoop { offset });
                }
                warn!("cross-reference chain loops back to {}", offset);
                break;
            }
            let part = match load(offset) {
                Ok(part) => part,
                Err(e) if parts.is_empty() => return Err(PdfError::NoXRef { source: Box::new(e) }),
                Err(e) if options.allow_xref_error => {
                    warn!("skipping cross-reference data at {}: {}", offset, e);
                    break;
                }
                Err(e) => return Err(e),
            };
            debug!("read {:?}", part);
            next = part.previous;
            let xref_stm = part.xref_stm;
            parts.push(part);

            if let Some(stm_offset) = xref_stm {
                if seen.insert(stm_offset) {
                    match load(stm_offset) {
                        Ok(stm_part) => {
                            debug!("read {:?}", stm_part);
                            parts.push(stm_part);
                        }
                        Err(e) if options.allow_xref_error => {
                            warn!("skipping /XRefStm at {}: {}", stm_offset, e);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(XRefChain { parts })
    }

    pub fn parts(&self) -> &[XRefPart] {
        &self.parts
    }
    pub fn newest(&self) -> &XRefPart {
        &self.parts[0]
    }
    pub fn len(&self) -> usize {
        self.parts.len()
    }
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Runtime lookup table of all objects, merged over all revisions.
pub struct XRefTable {
    kind: XRefKind,
    trailer: Dictionary,
    entries: HashMap<PlainRef, XRef>,
    // generation of the newest entry for each object number
    newest_gen: HashMap<ObjNr, GenNr>,
    // numbers some revision marks as free
    free: HashSet<ObjNr>,
}

impl XRefTable {
    /// Newer revisions win: an entry is only taken from an older revision if
    /// no newer one declared the same reference.
    pub fn merge(chain: XRefChain) -> XRefTable {
        let mut parts = chain.parts.into_iter();
        let newest = match parts.next() {
            Some(part) => part,
            None => return XRefTable::empty(),
        };
        let mut table = XRefTable {
            kind: newest.kind,
            trailer: Dictionary::new(),
            entries: HashMap::new(),
            newest_gen: HashMap::new(),
            free: newest.free,
        };
        table.add_part(newest.entries);
        table.trailer = newest.trailer;
        for part in parts {
            table.free.extend(part.free);
            table.add_part(part.entries);
        }
        table
    }

    fn empty() -> XRefTable {
        XRefTable {
            kind: XRefKind::Table,
            trailer: Dictionary::new(),
            entries: HashMap::new(),
            newest_gen: HashMap::new(),
            free: HashSet::new(),
        }
    }

    fn add_part(&mut self, entries: HashMap<PlainRef, XRef>) {
        let mut entries: Vec<_> = entries.into_iter().collect();
        // deterministic order for the `newest_gen` choice within a revision
        entries.sort_by_key(|&(r, _)| (r.id, std::cmp::Reverse(r.gen)));
        for (r, entry) in entries {
            self.entries.entry(r).or_insert(entry);
            self.newest_gen.entry(r.id).or_insert(r.gen);
        }
    }

    pub fn get(&self, r: PlainRef) -> Option<XRef> {
        self.entries.get(&r).copied()
    }
    pub fn contains(&self, r: PlainRef) -> bool {
        self.entries.contains_key(&r)
    }
    /// A free entry exists for `id` in some revision.
    pub fn is_free(&self, id: ObjNr) -> bool {
        self.free.contains(&id)
    }

    /// The newest entry for object number `id`, whatever its generation.
    pub fn find_by_number(&self, id: ObjNr) -> Option<(PlainRef, XRef)> {
        let gen = *self.newest_gen.get(&id)?;
        let r = PlainRef::new(id, gen);
        self.get(r).map(|x| (r, x))
    }

    /// Point `r` at `pos`. Used by recovery when the declared offset is wrong.
    pub fn update_offset(&mut self, r: PlainRef, pos: usize) {
        self.entries.insert(r, XRef::Raw { pos, gen_nr: r.gen });
        self.newest_gen.entry(r.id).or_insert(r.gen);
    }

    pub fn kind(&self) -> XRefKind {
        self.kind
    }
    /// Trailer of the newest revision.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item=(PlainRef, XRef)> + '_ {
        self.entries.iter().map(|(&r, &x)| (r, x))
    }
}

impl Debug for XRefTable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut refs: Vec<_> = self.iter().collect();
        refs.sort_by_key(|&(r, _)| r);
        for (r, entry) in refs {
            match entry {
                XRef::Raw {pos, gen_nr} => {
                    writeln!(f, "{:4}: {:010} {:05} n", r.id, pos, gen_nr)?
                },
                XRef::Stream {stream_id, index} => {
                    writeln!(f, "{:4}: in stream {}, index {}", r.id, stream_id, index)?
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(offset: usize, prev: Option<usize>, entries: &[(ObjNr, usize)]) -> XRefPart {
        let mut builder = XRefPartBuilder::new(offset, XRefKind::Table);
        for &(id, pos) in entries {
            builder.add(PlainRef::new(id, 0), XRef::Raw { pos, gen_nr: 0 });
        }
        let mut trailer = Dictionary::new();
        trailer.insert("Size", 10);
        if let Some(prev) = prev {
            trailer.insert("Prev", prev as i64);
        }
        builder.build(trailer)
    }

    fn chain(parts: Vec<XRefPart>, start: usize, options: &ParseOptions) -> Result<XRefChain> {
        let parts: HashMap<usize, XRefPart> = parts.into_iter().map(|p| (p.offset(), p)).collect();
        XRefChain::walk(start, options, |offset| {
            parts.get(&offset).cloned().ok_or(PdfError::NotFound { word: format!("xref at {}", offset) })
        })
    }

    #[test]
    fn builder_keeps_first() {
        let mut builder = XRefPartBuilder::new(0, XRefKind::Table);
        assert!(builder.add(PlainRef::new(1, 0), XRef::Raw { pos: 10, gen_nr: 0 }));
        assert!(!builder.add(PlainRef::new(1, 0), XRef::Raw { pos: 20, gen_nr: 0 }));
        let part = builder.build(Dictionary::new());
        assert_eq!(part.get(PlainRef::new(1, 0)), Some(XRef::Raw { pos: 10, gen_nr: 0 }));
    }

    #[test]
    fn newest_revision_wins() {
        let a = part(1000, Some(500), &[(5, 100)]);
        let b = part(500, None, &[(5, 50), (6, 60)]);
        let chain = chain(vec![a, b], 1000, &ParseOptions::strict()).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.newest().offset(), 1000);

        let table = XRefTable::merge(chain);
        assert_eq!(table.get(PlainRef::new(5, 0)), Some(XRef::Raw { pos: 100, gen_nr: 0 }));
        assert_eq!(table.get(PlainRef::new(6, 0)), Some(XRef::Raw { pos: 60, gen_nr: 0 }));
        assert_eq!(table.trailer().get("Prev"), Some(&Token::integer(500)));
    }

    #[test]
    fn loops_terminate() {
        let a = part(1000, Some(500), &[(1, 10)]);
        let b = part(500, Some(1000), &[(2, 20)]);
        let looped = chain(vec![a.clone(), b.clone()], 1000, &ParseOptions::tolerant()).unwrap();
        assert_eq!(looped.len(), 2);
        assert!(matches!(chain(vec![a, b], 1000, &ParseOptions::strict()), Err(PdfError::XRefLoop { offset: 1000 })));
    }

    #[test]
    fn free_numbers_are_merged() {
        let mut newer = XRefPartBuilder::new(1000, XRefKind::Table);
        newer.add_free(0);
        let mut trailer = Dictionary::new();
        trailer.insert("Prev", 500);
        let newer = newer.build(trailer);
        let mut older = XRefPartBuilder::new(500, XRefKind::Table);
        older.add_free(3);
        older.add(PlainRef::new(1, 0), XRef::Raw { pos: 10, gen_nr: 0 });
        let older = older.build(Dictionary::new());

        assert!(newer.is_free(0));
        let table = XRefTable::merge(chain(vec![newer, older], 1000, &ParseOptions::strict()).unwrap());
        assert!(table.is_free(0));
        assert!(table.is_free(3));
        assert!(!table.is_free(1));
    }

    #[test]
    fn broken_revisions() {
        let a = part(1000, Some(500), &[(1, 10)]);
        let tolerant = chain(vec![a.clone()], 1000, &ParseOptions::tolerant()).unwrap();
        assert_eq!(tolerant.len(), 1);

        assert!(matches!(chain(vec![a], 1000, &ParseOptions::strict()), Err(PdfError::NotFound { .. })));
        assert!(matches!(chain(vec![], 1000, &ParseOptions::tolerant()), Err(PdfError::NoXRef { .. })));
    }

    #[test]
    fn hybrid_stream_follows_its_table() {
        let mut table = XRefPartBuilder::new(1000, XRefKind::Table);
        table.add(PlainRef::new(1, 0), XRef::Raw { pos: 10, gen_nr: 0 });
        let mut trailer = Dictionary::new();
        trailer.insert("Prev", 100);
        trailer.insert("XRefStm", 800);
        let table = table.build(trailer);

        let mut stm = XRefPartBuilder::new(800, XRefKind::Stream);
        stm.add(PlainRef::new(1, 0), XRef::Raw { pos: 99, gen_nr: 0 });
        stm.add(PlainRef::new(2, 0), XRef::Stream { stream_id: 7, index: 0 });
        let stm = stm.build(Dictionary::new());

        let old = part(100, None, &[(2, 30), (3, 40)]);

        let chain = chain(vec![table, stm, old], 1000, &ParseOptions::strict()).unwrap();
        let offsets: Vec<usize> = chain.parts().iter().map(|p| p.offset()).collect();
        assert_eq!(offsets, [1000, 800, 100]);

        let merged = XRefTable::merge(chain);
        assert_eq!(merged.kind(), XRefKind::Table);
        assert_eq!(merged.get(PlainRef::new(1, 0)), Some(XRef::Raw { pos: 10, gen_nr: 0 }));
        assert_eq!(merged.get(PlainRef::new(2, 0)), Some(XRef::Stream { stream_id: 7, index: 0 }));
        assert_eq!(merged.get(PlainRef::new(3, 0)), Some(XRef::Raw { pos: 40, gen_nr: 0 }));
    }

    #[test]
    fn lookup_by_number() {
        let mut newer = XRefPartBuilder::new(1000, XRefKind::Table);
        newer.add(PlainRef::new(4, 2), XRef::Raw { pos: 200, gen_nr: 2 });
        let mut trailer = Dictionary::new();
        trailer.insert("Prev", 500);
        let newer = newer.build(trailer);
        let older = part(500, None, &[(4, 100)]);

        let mut table = XRefTable::merge(chain(vec![newer, older], 1000, &ParseOptions::strict()).unwrap());
        assert_eq!(table.find_by_number(4), Some((PlainRef::new(4, 2), XRef::Raw { pos: 200, gen_nr: 2 })));
        assert_eq!(table.find_by_number(5), None);

        table.update_offset(PlainRef::new(4, 2), 222);
        assert_eq!(table.get(PlainRef::new(4, 2)), Some(XRef::Raw { pos: 222, gen_nr: 2 }));
        assert_eq!(table.get(PlainRef::new(4, 0)), Some(XRef::Raw { pos: 100, gen_nr: 0 }));
    }
}
