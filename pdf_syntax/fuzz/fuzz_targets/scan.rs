#![no_main]
use libfuzzer_sys::fuzz_target;
use pdf_syntax::{ParseOptions, Scanner};

fn harness(data: &[u8]) {
    for options in [ParseOptions::strict(), ParseOptions::tolerant()] {
        for token in Scanner::new(data, options) {
            if token.is_err() {
                break;
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    harness(data);
});
