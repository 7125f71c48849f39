//! This is kind of the entry-point: a document session that resolves references to objects.
use std::fs;
use std::collections::HashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::path::Path;

use datasize::DataSize;

use crate::error::*;
use crate::object::*;
use crate::token::{Token, Dictionary};
use crate::backend::Backend;
use crate::parser::{ByteCursor, ParseOptions, parse_indirect_object};
use crate::xref::{XRef, XRefTable};
use crate::filter::{FilterProvider, StandardFilters};
use crate::crypt::{EncryptionHandler, NoEncryption};

/// Object lookup and cache for one document.
///
/// Every reference is parsed from the backend at most once; afterwards the
/// same `Rc` is handed out.
pub struct Storage<B: Backend> {
    backend: B,
    // where `%PDF-` is. Offsets in the xref table are relative to it.
    start_offset: usize,
    refs: XRefTable,

    cache: RefCell<HashMap<PlainRef, Rc<ObjectToken>>>,
    obj_streams: RefCell<HashMap<ObjNr, Rc<ObjectStream>>>,
    // references currently being resolved
    pending: RefCell<Vec<PlainRef>>,

    options: ParseOptions,
    filters: Box<dyn FilterProvider>,
    crypt: Option<Box<dyn EncryptionHandler>>,
    // the /Encrypt dictionary itself is stored in plain text
    encrypt_ref: Option<PlainRef>,
}

impl<B: Backend> Storage<B> {
    pub fn new(backend: B, start_offset: usize, refs: XRefTable, options: ParseOptions, filters: Box<dyn FilterProvider>) -> Storage<B> {
        Storage {
            backend,
            start_offset,
            refs,
            cache: RefCell::new(HashMap::new()),
            obj_streams: RefCell::new(HashMap::new()),
            pending: RefCell::new(Vec::new()),
            options,
            filters,
            crypt: None,
            encrypt_ref: None,
        }
    }

    /// Decrypt every object read directly from the file from now on.
    pub fn set_encryption(&mut self, crypt: Box<dyn EncryptionHandler>) {
        self.encrypt_ref = match self.refs.trailer().get("Encrypt") {
            Some(&Token::Reference(r)) => Some(r),
            _ => None,
        };
        self.crypt = Some(crypt);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
    pub fn start_offset(&self) -> usize {
        self.start_offset
    }
    pub fn xref_table(&self) -> &XRefTable {
        &self.refs
    }
    pub fn filters(&self) -> &dyn FilterProvider {
        &*self.filters
    }

    /// Where the cross-reference data says `r` is.
    pub fn try_get_offset(&self, r: PlainRef) -> Option<XRef> {
        self.refs.get(r)
    }

    pub fn try_get_cached(&self, r: PlainRef) -> Option<Rc<ObjectToken>> {
        self.cache.borrow().get(&r).cloned()
    }

    /// Remember `obj` under its number. Caching the same number twice with
    /// different content is a bug in the caller.
    pub fn cache(&self, obj: Rc<ObjectToken>) {
        let mut cache = self.cache.borrow_mut();
        if let Some(old) = cache.get(&obj.number) {
            debug_assert_eq!(old.data, obj.data, "conflicting objects cached for {}", obj.number);
            return;
        }
        cache.insert(obj.number, obj);
    }

    /// Point `r` at another position, e.g. after the declared offset turned
    /// out to be wrong. An already cached object for `r` is dropped.
    pub fn update_offset(&mut self, r: PlainRef, pos: usize) {
        self.refs.update_offset(r, pos);
        self.cache.get_mut().remove(&r);
    }

    /// Approximate heap size of all cached objects.
    pub fn cache_size(&self) -> usize {
        self.cache.borrow().values().map(|obj| obj.estimate_heap_size()).sum()
    }
    pub fn num_cached(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn resolve_object(&self, r: PlainRef) -> Result<Rc<ObjectToken>> {
        if let Some(obj) = self.try_get_cached(r) {
            return Ok(obj);
        }
        if self.pending.borrow().contains(&r) {
            bail!("object {} refers to itself while being read", r);
        }

        self.pending.borrow_mut().push(r);
        let result = self.load(r);
        self.pending.borrow_mut().retain(|&p| p != r);

        let obj = Rc::new(t!(result));
        self.cache(obj.clone());
        Ok(obj)
    }

    fn lookup(&self, r: PlainRef) -> Result<XRef> {
        if let Some(entry) = self.refs.get(r) {
            return Ok(entry);
        }
        if self.options.lenient {
            if let Some((found, entry)) = self.refs.find_by_number(r.id) {
                warn!("no entry for {}, using generation {} instead", r, found.gen);
                return Ok(entry);
            }
        }
        if self.refs.is_free(r.id) {
            return Err(PdfError::FreeObject { obj_nr: r.id });
        }
        Err(PdfError::NullRef { obj_nr: r.id, gen_nr: r.gen })
    }

    fn load(&self, r: PlainRef) -> Result<ObjectToken> {
        match t!(self.lookup(r)) {
            XRef::Raw { pos, .. } => {
                debug!("reading {} at {}", r, pos);
                let start = try_opt!(self.start_offset.checked_add(pos));
                let mut cursor = ByteCursor::with_offset(t!(self.backend.read(start ..)), pos);
                let (found, data) = t!(parse_indirect_object(&mut cursor, self));
                if found != r {
                    if self.options.lenient {
                        warn!("expected object {} at {}, found {}", r, pos, found);
                    } else {
                        err!(PdfError::ObjectMismatch { expected: r, found, pos });
                    }
                }
                let data = t!(self.decrypt(r, data));
                Ok(ObjectToken { position: pos, number: r, data })
            }
            XRef::Stream { stream_id, index } => {
                debug!("reading {} from object stream {}", r, stream_id);
                let container = t!(self.resolve_object(PlainRef::new(stream_id, 0)));
                let obj_stream = t!(self.object_stream(&container));
                let data = t!(obj_stream.get_object(index, r.id, self.filters(), &self.options));
                Ok(ObjectToken { position: container.position, number: r, data })
            }
        }
    }

    fn object_stream(&self, container: &ObjectToken) -> Result<Rc<ObjectStream>> {
        let id = container.number.id;
        if let Some(s) = self.obj_streams.borrow().get(&id) {
            return Ok(s.clone());
        }
        let stream = t!(container.data.as_stream()).clone();
        let obj_stream = Rc::new(t!(ObjectStream::parse(id, stream, self)));
        self.obj_streams.borrow_mut().insert(id, obj_stream.clone());
        Ok(obj_stream)
    }

    fn decrypt(&self, r: PlainRef, data: Token) -> Result<Token> {
        let crypt = match self.crypt {
            Some(ref crypt) => crypt,
            None => return Ok(data),
        };
        if Some(r) == self.encrypt_ref {
            return Ok(data);
        }
        // cross-reference streams are never encrypted
        if let Token::Stream(ref stream) = data {
            if stream.info.is_type("XRef") {
                return Ok(data);
            }
        }
        crypt.decrypt(r, data)
    }
}

impl<B: Backend> Resolve for Storage<B> {
    fn resolve(&self, r: PlainRef) -> Result<Token> {
        Ok(t!(self.resolve_object(r)).data.clone())
    }
    fn options(&self) -> &ParseOptions {
        &self.options
    }
}

/// An open document: the merged cross-reference data of all revisions plus
/// the object cache.
pub struct File<B: Backend> {
    storage: Storage<B>,
    revisions: usize,
}
impl<B: Backend> Resolve for File<B> {
    fn resolve(&self, r: PlainRef) -> Result<Token> {
        self.storage.resolve(r)
    }
    fn options(&self) -> &ParseOptions {
        self.storage.options()
    }
}
impl File<Vec<u8>> {
    /// Opens the file at `path` and uses Vec<u8> as backend.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_data(t!(fs::read(path)))
    }
}
#[cfg(feature = "mmap")]
impl File<memmap2::Mmap> {
    /// Opens the file at `path` and maps it into memory.
    ///
    /// # Safety
    /// The file must not be modified while it is mapped.
    pub unsafe fn open_mmap(path: impl AsRef<Path>) -> Result<Self> {
        let file = t!(fs::File::open(path));
        let mmap = t!(memmap2::Mmap::map(&file));
        Self::from_data(mmap)
    }
}
impl<B: Backend> File<B> {
    /// Open with tolerant parsing and the standard filters.
    pub fn from_data(backend: B) -> Result<Self> {
        Self::with_options(backend, ParseOptions::default(), Box::new(StandardFilters), None)
    }

    /// Open `backend`. If the trailer declares `/Encrypt`, objects read
    /// directly from the file are passed through `crypt`.
    pub fn with_options(backend: B, options: ParseOptions, filters: Box<dyn FilterProvider>, crypt: Option<Box<dyn EncryptionHandler>>) -> Result<Self> {
        let start_offset = match backend.locate_start_offset() {
            Ok(offset) => offset,
            Err(e) if options.lenient => {
                warn!("{}, assuming the file starts at 0", e);
                0
            }
            Err(e) => return Err(e),
        };
        let chain = t!(backend.read_xref_chain(start_offset, &options, &*filters));
        let revisions = chain.len();
        let refs = XRefTable::merge(chain);
        info!("{} objects in {} revision(s)", refs.len(), revisions);

        let encrypted = refs.trailer().get("Encrypt").is_some();
        let mut storage = Storage::new(backend, start_offset, refs, options, filters);
        match crypt {
            Some(crypt) if encrypted => storage.set_encryption(crypt),
            Some(_) => debug!("document is not encrypted, ignoring the encryption handler"),
            None if encrypted => storage.set_encryption(Box::new(NoEncryption)),
            None => {}
        }

        Ok(File { storage, revisions })
    }

    /// Trailer dictionary of the newest revision.
    pub fn trailer(&self) -> &Dictionary {
        self.storage.refs.trailer()
    }

    pub fn resolve_object(&self, r: PlainRef) -> Result<Rc<ObjectToken>> {
        self.storage.resolve_object(r)
    }

    /// Resolve `r` and convert it to `T`, following further references as needed.
    pub fn get<T: FromToken>(&self, r: PlainRef) -> Result<T> {
        T::from_token(t!(self.storage.resolve(r)), self)
    }

    /// The document catalog, `/Root` in the trailer.
    pub fn get_root(&self) -> Result<Dictionary> {
        self.trailer().get_as("Root", self)
    }

    /// Number of revisions (cross-reference sections) the file was assembled from.
    pub fn revisions(&self) -> usize {
        self.revisions
    }

    pub fn storage(&self) -> &Storage<B> {
        &self.storage
    }
    pub fn storage_mut(&mut self) -> &mut Storage<B> {
        &mut self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(objects: &[(u64, &str)]) -> Vec<u8> {
        let mut out = b"%PDF-1.7\n".to_vec();
        let mut offsets = vec![];
        for &(id, body) in objects {
            offsets.push((id, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
        }
        let xref = out.len();
        out.extend_from_slice(b"xref\n");
        for (id, pos) in offsets {
            out.extend_from_slice(format!("{} 1\n{:010} 00000 n \n", id, pos).as_bytes());
        }
        out.extend_from_slice(format!("trailer\n<< /Size 10 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref).as_bytes());
        out
    }

    #[test]
    fn root_and_typed_access() {
        let data = file(&[
            (1, "<< /Type /Catalog /Count 2 0 R /Kids [3 0 R] >>"),
            (2, "7"),
            (3, "(kid)"),
        ]);
        let file = File::from_data(data).unwrap();
        let root = file.get_root().unwrap();
        assert!(root.is_type("Catalog"));
        let count: i64 = root.get_as("Count", &file).unwrap();
        assert_eq!(count, 7);
        let kids: Vec<crate::token::PdfString> = root.get_as("Kids", &file).unwrap();
        assert_eq!(kids[0].as_bytes(), b"kid");
        assert_eq!(file.get::<i32>(PlainRef::new(2, 0)).unwrap(), 7);
    }

    #[test]
    fn cached_once() {
        let data = file(&[(1, "<< >>"), (2, "[1 2 3]")]);
        let file = File::from_data(data).unwrap();
        let a = file.resolve_object(PlainRef::new(2, 0)).unwrap();
        let b = file.resolve_object(PlainRef::new(2, 0)).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(file.storage().num_cached(), 1);
        assert!(file.storage().cache_size() > 0);
    }

    #[test]
    fn missing_object() {
        let data = file(&[(1, "<< >>")]);
        let file = File::from_data(data).unwrap();
        assert!(matches!(file.resolve_object(PlainRef::new(5, 0)), Err(PdfError::NullRef { obj_nr: 5, gen_nr: 0 })));
    }

    #[test]
    fn mismatching_header() {
        let mut data = file(&[(1, "<< >>"), (2, "true")]);
        // rename object 2 in the body without touching the xref table
        let pos = data.windows(7).position(|w| w == b"2 0 obj").unwrap();
        data[pos] = b'4';

        let lenient = File::from_data(data.clone()).unwrap();
        assert_eq!(lenient.get::<bool>(PlainRef::new(2, 0)).unwrap(), true);

        let strict = File::with_options(data, ParseOptions::strict(), Box::new(StandardFilters), None).unwrap();
        assert!(matches!(strict.resolve_object(PlainRef::new(2, 0)), Err(PdfError::ObjectMismatch { .. })));
    }

    #[test]
    fn self_referencing_length() {
        let data = file(&[(1, "<< >>"), (2, "<< /Length 2 0 R >>\nstream\nabc\nendstream")]);
        let strict = File::with_options(data.clone(), ParseOptions::strict(), Box::new(StandardFilters), None).unwrap();
        assert!(strict.resolve_object(PlainRef::new(2, 0)).is_err());

        let lenient = File::from_data(data).unwrap();
        let obj = lenient.resolve_object(PlainRef::new(2, 0)).unwrap();
        assert_eq!(obj.data.as_stream().unwrap().raw_data(), b"abc");
    }

    #[test]
    fn update_offset() {
        let data = file(&[(1, "<< >>"), (2, "10"), (3, "20")]);
        let pos_of_3 = data.windows(7).position(|w| w == b"3 0 obj").unwrap();
        let mut file = File::from_data(data).unwrap();
        assert_eq!(file.get::<i64>(PlainRef::new(2, 0)).unwrap(), 10);
        // object 2 is now read from where object 3 is, which the lenient mode accepts
        file.storage_mut().update_offset(PlainRef::new(2, 0), pos_of_3);
        assert_eq!(file.get::<i64>(PlainRef::new(2, 0)).unwrap(), 20);
    }
}
