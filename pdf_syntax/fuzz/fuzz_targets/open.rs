#![no_main]
use libfuzzer_sys::fuzz_target;
use pdf_syntax::file::File;

fn harness(data: &[u8]) {
    if let Ok(file) = File::from_data(data) {
        let refs: Vec<_> = file.storage().xref_table().iter().map(|(r, _)| r).collect();
        for r in refs {
            let _ = file.resolve_object(r);
        }
        let _ = file.get_root();
    }
}

fuzz_target!(|data: &[u8]| {
    harness(data);
});
