//! Writes small PDF files byte by byte, keeping track of object offsets.
#![allow(dead_code)]

pub struct PdfBuilder {
    out: Vec<u8>,
}

impl PdfBuilder {
    pub fn new() -> PdfBuilder {
        PdfBuilder { out: b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec() }
    }

    pub fn pos(&self) -> usize {
        self.out.len()
    }

    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.out.extend_from_slice(data);
        self
    }

    /// `id 0 obj body endobj`, returns the offset of the object.
    pub fn object(&mut self, id: u64, body: &str) -> usize {
        self.object_gen(id, 0, body)
    }

    pub fn object_gen(&mut self, id: u64, gen: u16, body: &str) -> usize {
        let pos = self.pos();
        self.raw(format!("{} {} obj\n{}\nendobj\n", id, gen, body).as_bytes());
        pos
    }

    /// A stream object. `/Length` is appended to `dict`.
    pub fn stream(&mut self, id: u64, dict: &str, data: &[u8]) -> usize {
        let pos = self.pos();
        self.raw(format!("{} 0 obj\n<< {} /Length {} >>\nstream\n", id, dict, data.len()).as_bytes());
        self.raw(data);
        self.raw(b"\nendstream\nendobj\n");
        pos
    }

    /// A classic table with one subsection per entry `(id, gen, offset)`.
    pub fn xref_table(&mut self, entries: &[(u64, u16, usize)], trailer: &str) -> usize {
        let pos = self.pos();
        self.raw(b"xref\n0 1\n0000000000 65535 f \n");
        for &(id, gen, offset) in entries {
            self.raw(format!("{} 1\n{:010} {:05} n \n", id, offset, gen).as_bytes());
        }
        self.raw(format!("trailer\n<< {} >>\n", trailer).as_bytes());
        pos
    }

    pub fn finish(mut self, startxref: usize) -> Vec<u8> {
        self.raw(format!("startxref\n{}\n%%EOF\n", startxref).as_bytes());
        self.out
    }
}

/// Rows of a cross-reference stream with `/W [1 4 2]`.
pub fn xref_rows(rows: &[(u8, u32, u16)]) -> Vec<u8> {
    let mut data = Vec::with_capacity(rows.len() * 7);
    for &(typ, field1, field2) in rows {
        data.push(typ);
        data.extend_from_slice(&field1.to_be_bytes());
        data.extend_from_slice(&field2.to_be_bytes());
    }
    data
}
