//! Stream filters, consumed through [`FilterProvider`].

use std::io::Read;
use itertools::Itertools;

use crate::error::*;
use crate::token::{Token, Dictionary, Name};
use crate::parser::is_whitespace;

/// Decodes stream data. `filter_index` selects the entry of `/Filter` (and the
/// matching `/DecodeParms`) to apply; callers apply the filters in order.
pub trait FilterProvider {
    fn decode(&self, data: &[u8], dict: &Dictionary, filter_index: usize) -> Result<Vec<u8>>;
}

/// Names in `/Filter`, which is either a name or an array of names.
pub fn filter_names(dict: &Dictionary) -> Result<Vec<Name>> {
    match dict.get("Filter") {
        None | Some(Token::Null) => Ok(vec![]),
        Some(Token::Name(ref n)) => Ok(vec![n.clone()]),
        Some(Token::Array(ref arr)) => arr.iter().map(|t| Ok(Name::from(t.as_name()?))).collect(),
        Some(p) => Err(PdfError::UnexpectedPrimitive { expected: "Name or Array", found: p.get_debug_name() }),
    }
}

/// `/DecodeParms` for the filter at `index`: a dictionary for a single filter,
/// an array (with `null` holes) for several.
pub fn decode_params(dict: &Dictionary, index: usize) -> Option<&Dictionary> {
    match dict.get("DecodeParms") {
        Some(Token::Dictionary(ref d)) if index == 0 => Some(d),
        Some(Token::Array(ref arr)) => match arr.get(index) {
            Some(Token::Dictionary(ref d)) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

/// FlateDecode, LZWDecode and ASCIIHexDecode.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFilters;

impl FilterProvider for StandardFilters {
    fn decode(&self, data: &[u8], dict: &Dictionary, filter_index: usize) -> Result<Vec<u8>> {
        let names = t!(filter_names(dict));
        let name = match names.get(filter_index) {
            Some(name) => name,
            None => bail!("stream has no filter #{}", filter_index),
        };
        let params = LZWFlateParams::from_dict(decode_params(dict, filter_index));
        match name.as_str() {
            "FlateDecode" | "Fl" => {
                let inflated = t!(flate_decode(data));
                apply_predictor("FlateDecode", inflated, &params)
            }
            "LZWDecode" | "LZW" => {
                let decoded = t!(lzw_decode(data, &params));
                apply_predictor("LZWDecode", decoded, &params)
            }
            "ASCIIHexDecode" | "AHx" => decode_hex(data),
            other => Err(PdfError::UnsupportedFilter { name: other.into() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LZWFlateParams {
    pub predictor: i64,
    pub n_components: i64,
    pub bits_per_component: i64,
    pub columns: i64,
    pub early_change: i64,
}
impl Default for LZWFlateParams {
    fn default() -> LZWFlateParams {
        LZWFlateParams {
            predictor: 1,
            n_components: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: 1
        }
    }
}
impl LZWFlateParams {
    pub fn from_dict(dict: Option<&Dictionary>) -> LZWFlateParams {
        let mut params = LZWFlateParams::default();
        if let Some(dict) = dict {
            let int = |key: &str, default: i64| {
                dict.get(key).and_then(|t| t.as_integer().ok()).unwrap_or(default)
            };
            params.predictor = int("Predictor", params.predictor);
            params.n_components = int("Colors", params.n_components);
            params.bits_per_component = int("BitsPerComponent", params.bits_per_component);
            params.columns = int("Columns", params.columns);
            params.early_change = int("EarlyChange", params.early_change);
        }
        params
    }
}

#[inline]
fn decode_nibble(c: u8) -> Option<u8> {
    match c {
        n @ b'0' ..= b'9' => Some(n - b'0'),
        a @ b'a' ..= b'f' => Some(a - b'a' + 0xa),
        a @ b'A' ..= b'F' => Some(a - b'A' + 0xA),
        _ => None
    }
}

/// ASCIIHexDecode: whitespace is skipped, `>` ends the data, an odd digit count
/// gets a trailing 0.
pub fn decode_hex(data: &[u8]) -> Result<Vec<u8>> {
    let end = data.iter().position(|&b| b == b'>').unwrap_or(data.len());
    let digits = data[.. end].iter().copied().filter(|&b| !is_whitespace(b)).collect_vec();
    let mut out = Vec::with_capacity(digits.len() / 2 + 1);
    for (i, pair) in digits.chunks(2).enumerate() {
        let high = pair[0];
        let low = pair.get(1).copied().unwrap_or(b'0');
        match (decode_nibble(high), decode_nibble(low)) {
            (Some(h), Some(l)) => out.push(h << 4 | l),
            _ => return Err(PdfError::HexDecode { pos: i * 2, bytes: [high, low] }),
        }
    }
    Ok(out)
}

fn flate_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match libflate::zlib::Decoder::new(data) {
        Ok(mut decoder) => {
            if let Err(e) = decoder.read_to_end(&mut out) {
                // usually a missing or broken checksum after complete data
                if out.is_empty() {
                    return Err(PdfError::FilterDecode { name: "FlateDecode", msg: e.to_string() });
                }
                warn!("FlateDecode: {} after {} bytes, keeping partial data", e, out.len());
            }
        }
        Err(_) => {
            info!("invalid zlib header. trying without");
            let mut decoder = libflate::deflate::Decoder::new(data);
            if let Err(e) = decoder.read_to_end(&mut out) {
                if out.is_empty() {
                    return Err(PdfError::FilterDecode { name: "FlateDecode", msg: e.to_string() });
                }
                warn!("FlateDecode: {} after {} bytes, keeping partial data", e, out.len());
            }
        }
    }
    Ok(out)
}

fn lzw_decode(data: &[u8], params: &LZWFlateParams) -> Result<Vec<u8>> {
    use weezl::{BitOrder, decode::Decoder};

    // EarlyChange = 1 widens codes one entry early, which is what TIFF does
    let mut decoder = if params.early_change != 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut out = Vec::new();
    let result = decoder.into_vec(&mut out).decode(data);
    if let Err(e) = result.status {
        if out.is_empty() {
            return Err(PdfError::FilterDecode { name: "LZWDecode", msg: e.to_string() });
        }
        warn!("LZWDecode: {} after {} bytes, keeping partial data", e, out.len());
    }
    Ok(out)
}

fn apply_predictor(name: &'static str, data: Vec<u8>, params: &LZWFlateParams) -> Result<Vec<u8>> {
    match params.predictor {
        p if p <= 1 => Ok(data),
        2 => Err(PdfError::UnsupportedFilter { name: "TIFF predictor 2".into() }),
        p if p >= 10 => png_unfilter(name, &data, params),
        p => bail!("invalid predictor {}", p),
    }
}

// every row starts with its own PNG filter type byte, /Predictor only says "PNG"
fn png_unfilter(name: &'static str, inp: &[u8], params: &LZWFlateParams) -> Result<Vec<u8>> {
    let too_large = || PdfError::FilterDecode {
        name,
        msg: format!("predictor rows of {} columns, {} components, {} bits are too large",
            params.columns, params.n_components, params.bits_per_component),
    };
    let factor = |n: i64| usize::try_from(n.max(1)).map_err(|_| too_large());
    let bits_per_pixel = factor(params.n_components)?
        .checked_mul(factor(params.bits_per_component)?)
        .ok_or_else(too_large)?;
    let bpp = (bits_per_pixel + 7) / 8;
    let row_bits = bits_per_pixel.checked_mul(factor(params.columns)?).ok_or_else(too_large)?;
    let row_len = row_bits / 8 + usize::from(row_bits % 8 != 0);
    if row_len >= inp.len() {
        // not even one full row
        if !inp.is_empty() {
            warn!("predictor data is shorter than one row of {} bytes, dropping {} bytes", row_len, inp.len());
        }
        return Ok(Vec::new());
    }

    let rows = inp.len() / (row_len + 1);
    if inp.len() % (row_len + 1) != 0 {
        warn!("predictor data is not a whole number of rows, dropping {} bytes", inp.len() % (row_len + 1));
    }
    let mut out = vec![0; rows * row_len];
    let null_row = vec![0; row_len];

    for (i, row_in) in inp.chunks_exact(row_len + 1).enumerate() {
        let predictor = PredictorType::from_u8(row_in[0])?;
        let (prev, curr) = out.split_at_mut(i * row_len);
        let prev_row = if i == 0 { &null_row[..] } else { &prev[(i - 1) * row_len ..] };
        unfilter(predictor, bpp, prev_row, &row_in[1..], &mut curr[.. row_len]);
    }
    Ok(out)
}

/*
 * Predictor - copied and adapted from PNG crate..
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PredictorType {
    NoFilter = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4
}

impl PredictorType {
    pub fn from_u8(n: u8) -> Result<PredictorType> {
        match n {
            0 => Ok(PredictorType::NoFilter),
            1 => Ok(PredictorType::Sub),
            2 => Ok(PredictorType::Up),
            3 => Ok(PredictorType::Avg),
            4 => Ok(PredictorType::Paeth),
            n => Err(PdfError::IncorrectPredictorType {n})
        }
    }
}

fn filter_paeth(a: u8, b: u8, c: u8) -> u8 {
    let ia = a as i16;
    let ib = b as i16;
    let ic = c as i16;

    let p = ia + ib - ic;

    let pa = (p - ia).abs();
    let pb = (p - ib).abs();
    let pc = (p - ic).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// `prev`, `inp` and `out` are one row each.
pub fn unfilter(filter: PredictorType, bpp: usize, prev: &[u8], inp: &[u8], out: &mut [u8]) {
    use self::PredictorType::*;
    let len = inp.len();
    let bpp = bpp.min(len);

    match filter {
        NoFilter => out[..len].copy_from_slice(inp),
        Sub => {
            out[..bpp].copy_from_slice(&inp[..bpp]);
            for i in bpp..len {
                out[i] = inp[i].wrapping_add(out[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                out[i] = inp[i].wrapping_add(prev[i]);
            }
        }
        Avg => {
            for i in 0..bpp {
                out[i] = inp[i].wrapping_add(prev[i] / 2);
            }
            for i in bpp..len {
                out[i] = inp[i].wrapping_add(
                    ((out[i - bpp] as i16 + prev[i] as i16) / 2) as u8
                );
            }
        }
        Paeth => {
            for i in 0..bpp {
                out[i] = inp[i].wrapping_add(filter_paeth(0, prev[i], 0));
            }
            for i in bpp..len {
                out[i] = inp[i].wrapping_add(
                    filter_paeth(out[i - bpp], prev[i], prev[i - bpp])
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    fn dict(filter: &str) -> Dictionary {
        let mut d = Dictionary::new();
        d.insert("Filter", Token::name(filter));
        d
    }

    #[test]
    fn hex() {
        let d = dict("ASCIIHexDecode");
        assert_eq!(StandardFilters.decode(b"48 65 6c6C 6f>", &d, 0).unwrap(), b"Hello");
        assert_eq!(StandardFilters.decode(b"7>", &d, 0).unwrap(), b"\x70");
        assert!(StandardFilters.decode(b"4x", &d, 0).is_err());
    }

    #[test]
    fn flate() {
        let compressed = deflate::deflate_bytes_zlib(b"hello hello hello");
        assert_eq!(StandardFilters.decode(&compressed, &dict("FlateDecode"), 0).unwrap(), b"hello hello hello");

        let raw = deflate::deflate_bytes(b"no header");
        assert_eq!(StandardFilters.decode(&raw, &dict("Fl"), 0).unwrap(), b"no header");
    }

    #[test]
    fn png_up_predictor() {
        // two rows of 3 bytes, the second one "Up"-filtered
        let data = [0, 1, 2, 3, 2, 1, 1, 1];
        let mut params = Dictionary::new();
        params.insert("Predictor", 12);
        params.insert("Columns", 3);
        let mut d = dict("FlateDecode");
        d.insert("DecodeParms", params);
        let compressed = deflate::deflate_bytes_zlib(&data);
        assert_eq!(StandardFilters.decode(&compressed, &d, 0).unwrap(), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn oversized_predictor_rows() {
        let compressed = deflate::deflate_bytes_zlib(&[0, 1, 2, 3]);
        let mut params = Dictionary::new();
        params.insert("Predictor", 12);
        params.insert("Columns", i64::MAX);
        params.insert("Colors", 4);
        let mut d = dict("FlateDecode");
        d.insert("DecodeParms", params);
        let err = StandardFilters.decode(&compressed, &d, 0).unwrap_err();
        assert!(matches!(err, PdfError::FilterDecode { name: "FlateDecode", .. }));

        // representable, but longer than the data
        let mut params = Dictionary::new();
        params.insert("Predictor", 12);
        params.insert("Columns", 1i64 << 40);
        d.insert("DecodeParms", params);
        assert_eq!(StandardFilters.decode(&compressed, &d, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn sub_keeps_first_pixel() {
        let mut out = [0; 4];
        unfilter(PredictorType::Sub, 2, &[0; 4], &[5, 6, 1, 1], &mut out);
        assert_eq!(out, [5, 6, 6, 7]);
    }

    #[test]
    fn lzw() {
        // "-----A---B" from the PDF reference, EarlyChange = 1
        let data = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        assert_eq!(StandardFilters.decode(&data, &dict("LZWDecode"), 0).unwrap(), b"-----A---B");
    }

    #[test]
    fn unsupported() {
        let err = StandardFilters.decode(b"", &dict("DCTDecode"), 0).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedFilter { ref name } if name == "DCTDecode"));
    }

    #[test]
    fn filter_chain() {
        let mut d = Dictionary::new();
        d.insert("Filter", vec![Token::name("AHx"), Token::name("FlateDecode")]);
        d.insert("DecodeParms", vec![Token::Null, Token::Null]);
        assert_eq!(filter_names(&d).unwrap().len(), 2);
        assert!(decode_params(&d, 1).is_none());
    }
}
