mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::PdfBuilder;
use deflate::deflate_bytes_zlib;
use pdf_syntax::backend::{Backend, IndexRange};
use pdf_syntax::crypt::DecryptBytes;
use pdf_syntax::file::File;
use pdf_syntax::filter::StandardFilters;
use pdf_syntax::{Dictionary, ParseOptions, PdfStream, PdfString, PlainRef, Result, Token};

/// Counts how often the file contents are looked at.
struct Counting {
    data: Vec<u8>,
    reads: Cell<usize>,
}
impl Backend for Counting {
    fn read<T: IndexRange>(&self, range: T) -> Result<&[u8]> {
        self.reads.set(self.reads.get() + 1);
        let r = range.to_range(self.data.len())?;
        Ok(&self.data[r])
    }
    fn len(&self) -> usize {
        self.data.len()
    }
}

fn document() -> Vec<u8> {
    let mut b = PdfBuilder::new();
    let p1 = b.object(1, "<< /Type /Catalog /Pages 2 0 R /Title 5 0 R >>");
    let p2 = b.object(2, "<< /Type /Pages /Kids 3 0 R /Count 1 >>");
    let p3 = b.object(3, "[4 0 R]");
    let p4 = b.object(4, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 6 0 R >>");
    let p5 = b.object(5, "(A \\(small\\) document)");
    let content = deflate_bytes_zlib(b"BT /F1 12 Tf (Hi) Tj ET");
    let p6 = b.pos();
    b.raw(b"6 0 obj\n<< /Length 7 0 R /Filter [/FlateDecode] >>\nstream\n");
    b.raw(&content);
    b.raw(b"\nendstream\nendobj\n");
    let p7 = b.object(7, &content.len().to_string());
    let x = b.xref_table(
        &[(1, 0, p1), (2, 0, p2), (3, 0, p3), (4, 0, p4), (5, 0, p5), (6, 0, p6), (7, 0, p7)],
        "/Size 8 /Root 1 0 R",
    );
    b.finish(x)
}

#[test]
fn parsed_at_most_once() {
    let file = File::from_data(Counting { data: document(), reads: Cell::new(0) }).unwrap();
    let reads = || file.storage().backend().reads.get();

    let before = reads();
    let a = file.resolve_object(PlainRef::new(5, 0)).unwrap();
    assert_eq!(reads(), before + 1);
    let b = file.resolve_object(PlainRef::new(5, 0)).unwrap();
    assert_eq!(reads(), before + 1);
    assert!(Rc::ptr_eq(&a, &b));

    // the stream's /Length is resolved on the way, and cached as well
    let before = reads();
    file.resolve_object(PlainRef::new(6, 0)).unwrap();
    assert_eq!(reads(), before + 2);
    assert!(file.storage().try_get_cached(PlainRef::new(7, 0)).is_some());
    file.resolve_object(PlainRef::new(7, 0)).unwrap();
    assert_eq!(reads(), before + 2);
}

#[test]
fn typed_access_through_references() {
    let file = File::from_data(document()).unwrap();
    let root = file.get_root().unwrap();
    let pages: Dictionary = root.get_as("Pages", &file).unwrap();
    assert!(pages.is_type("Pages"));
    assert_eq!(pages.get_as::<u32>("Count", &file).unwrap(), 1);

    // /Kids is a reference to an array of references
    let kids: Vec<Dictionary> = pages.get_as("Kids", &file).unwrap();
    assert_eq!(kids.len(), 1);
    let media_box: Vec<f32> = kids[0].get_as("MediaBox", &file).unwrap();
    assert_eq!(media_box, [0., 0., 612., 792.]);
    assert_eq!(kids[0]["Parent"], Token::Reference(PlainRef::new(2, 0)));
    assert_eq!(kids[0].try_get_as::<i64>("Rotate", &file).unwrap(), None);

    let title: PdfString = root.get_as("Title", &file).unwrap();
    assert_eq!(title.to_string_lossy(), "A (small) document");

    let contents: PdfStream = kids[0].get_as("Contents", &file).unwrap();
    let data = contents.decoded(&StandardFilters).unwrap();
    assert_eq!(&*data, b"BT /F1 12 Tf (Hi) Tj ET");
}

#[test]
fn type_mismatch() {
    let file = File::from_data(document()).unwrap();
    let root = file.get_root().unwrap();
    assert!(root.get_as::<i64>("Pages", &file).is_err());
    assert!(file.get::<Dictionary>(PlainRef::new(5, 0)).is_err());
}

fn encrypted_document(with_encrypt: bool) -> Vec<u8> {
    let mut b = PdfBuilder::new();
    let p1 = b.object(1, "<< /Type /Catalog /Title (HELLO) >>");
    let p7 = b.object(7, "<< /Filter /Standard /O (ABC) >>");
    let trailer = if with_encrypt {
        "/Size 8 /Root 1 0 R /Encrypt 7 0 R"
    } else {
        "/Size 8 /Root 1 0 R"
    };
    let x = b.xref_table(&[(1, 0, p1), (7, 0, p7)], trailer);
    b.finish(x)
}

fn open_with_xor(data: Vec<u8>) -> File<Vec<u8>> {
    let xor = DecryptBytes(|_: PlainRef, data: &[u8]| -> Result<Vec<u8>> {
        Ok(data.iter().map(|b| b ^ 0x20).collect())
    });
    File::with_options(data, ParseOptions::tolerant(), Box::new(StandardFilters), Some(Box::new(xor))).unwrap()
}

#[test]
fn strings_are_decrypted_before_caching() {
    let file = open_with_xor(encrypted_document(true));
    let root = file.get_root().unwrap();
    assert_eq!(root.get_as::<PdfString>("Title", &file).unwrap().as_bytes(), b"hello");

    // the encryption dictionary itself is plain text
    let encrypt: Dictionary = file.trailer().get_as("Encrypt", &file).unwrap();
    assert_eq!(encrypt.get_as::<PdfString>("O", &file).unwrap().as_bytes(), b"ABC");

    let cached = file.storage().try_get_cached(PlainRef::new(1, 0)).unwrap();
    assert_eq!(cached.data.as_dictionary().unwrap()["Title"], Token::String("hello".into()));
}

#[test]
fn handler_is_unused_without_encrypt() {
    let file = open_with_xor(encrypted_document(false));
    let root = file.get_root().unwrap();
    assert_eq!(root.get_as::<PdfString>("Title", &file).unwrap().as_bytes(), b"HELLO");
}

#[test]
fn missing_endobj() {
    let mut b = PdfBuilder::new();
    let p1 = b.pos();
    b.raw(b"1 0 obj\n<< /Type /Catalog >>\n");
    let p2 = b.object(2, "(after)");
    let x = b.xref_table(&[(1, 0, p1), (2, 0, p2)], "/Size 3 /Root 1 0 R");
    let data = b.finish(x);

    let file = File::from_data(data.clone()).unwrap();
    assert!(file.get_root().unwrap().is_type("Catalog"));

    let strict = File::with_options(data, ParseOptions::strict(), Box::new(StandardFilters), None).unwrap();
    assert!(strict.get_root().is_err());
    assert!(strict.get::<PdfString>(PlainRef::new(2, 0)).is_ok());
}
