use std::cmp::Ordering;
use std::fmt;
use datasize::DataSize;

/// 10^0 ..= 10^18, every power of ten that fits into an `i64`.
const POW10: [i64; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];
const MAX_SCALE: u32 = 18;

/// An exact decimal number as written in the file: `mantissa / 10^scale`.
///
/// Values are kept normalized (no trailing zeros in the fraction), so two
/// numbers compare equal exactly when they denote the same value:
/// `1.53E3`, `1530` and `1530.00` are all the same `Numeric`.
#[derive(Copy, Clone, DataSize)]
pub struct Numeric {
    mantissa: i64,
    scale: u32,
    overflow: bool,
}

impl Numeric {
    pub const ZERO: Numeric = Numeric { mantissa: 0, scale: 0, overflow: false };

    pub fn from_int(n: i64) -> Numeric {
        Numeric { mantissa: n, scale: 0, overflow: false }
    }

    /// `mantissa / 10^scale`. Scales beyond what an `i64` can hold lose their least
    /// significant digits.
    pub fn new(mut mantissa: i64, mut scale: u32) -> Numeric {
        while scale > MAX_SCALE {
            mantissa /= 10;
            scale -= 1;
        }
        Numeric { mantissa, scale, overflow: false }.normalized()
    }

    /// `mantissa * 10^(exponent - fraction_digits)`, computed on integers so that
    /// `153`, 2 fraction digits and exponent 3 give exactly 1530.
    pub fn from_scientific(mantissa: i64, fraction_digits: u32, exponent: i32) -> Numeric {
        if mantissa == 0 {
            return Numeric::ZERO;
        }
        let shift = exponent as i64 - fraction_digits as i64;
        if shift > 2 * MAX_SCALE as i64 {
            return Numeric::saturated(mantissa < 0);
        }
        if shift < -(2 * MAX_SCALE as i64 + 2) {
            return Numeric::ZERO;
        }
        if shift >= 0 {
            let mut value = Some(mantissa);
            let mut left = shift;
            while left > 0 {
                let step = left.min(MAX_SCALE as i64);
                value = value.and_then(|v| v.checked_mul(POW10[step as usize]));
                left -= step;
            }
            match value {
                Some(v) => Numeric::from_int(v),
                None => Numeric::saturated(mantissa < 0),
            }
        } else {
            let mut scale = (-shift) as u64;
            let mut mantissa = mantissa;
            while scale > MAX_SCALE as u64 {
                mantissa /= 10;
                scale -= 1;
            }
            Numeric::new(mantissa, scale as u32)
        }
    }

    /// Marks a literal whose integer part does not fit; the value is clamped.
    pub fn saturated(negative: bool) -> Numeric {
        let mantissa = if negative { i64::MIN } else { i64::MAX };
        Numeric { mantissa, scale: 0, overflow: true }
    }

    fn normalized(mut self) -> Numeric {
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
        self
    }

    pub fn mantissa(&self) -> i64 {
        self.mantissa
    }
    pub fn scale(&self) -> u32 {
        self.scale
    }
    /// Set when the literal had more integer digits than an `i64` holds.
    pub fn has_integer_overflow(&self) -> bool {
        self.overflow
    }
    pub fn is_integer(&self) -> bool {
        self.scale == 0
    }
    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// The value if it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        if self.scale == 0 && !self.overflow {
            Some(self.mantissa)
        } else {
            None
        }
    }
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|n| i32::try_from(n).ok())
    }
    /// Rounds towards zero.
    pub fn truncate(&self) -> i64 {
        self.mantissa / POW10[self.scale as usize]
    }
    pub fn as_f64(&self) -> f64 {
        self.mantissa as f64 / POW10[self.scale as usize] as f64
    }
    pub fn as_f32(&self) -> f32 {
        self.as_f64() as f32
    }

    fn cmp_value(&self, other: &Numeric) -> Ordering {
        if self.scale == other.scale {
            return self.mantissa.cmp(&other.mantissa);
        }
        let scale = self.scale.max(other.scale);
        let a = self.mantissa as i128 * POW10[(scale - self.scale) as usize] as i128;
        let b = other.mantissa as i128 * POW10[(scale - other.scale) as usize] as i128;
        a.cmp(&b)
    }
}

impl PartialEq for Numeric {
    fn eq(&self, other: &Numeric) -> bool {
        self.mantissa == other.mantissa && self.scale == other.scale
    }
}
impl Eq for Numeric {}
impl PartialOrd for Numeric {
    fn partial_cmp(&self, other: &Numeric) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Numeric {
    fn cmp(&self, other: &Numeric) -> Ordering {
        self.cmp_value(other)
    }
}
impl std::hash::Hash for Numeric {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.mantissa.hash(state);
        self.scale.hash(state);
    }
}

impl From<i64> for Numeric {
    fn from(n: i64) -> Numeric {
        Numeric::from_int(n)
    }
}
impl From<i32> for Numeric {
    fn from(n: i32) -> Numeric {
        Numeric::from_int(n as i64)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let pow = POW10[self.scale as usize] as u64;
        let abs = self.mantissa.unsigned_abs();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        write!(f, "{}{}.{:0width$}", sign, abs / pow, abs % pow, width = self.scale as usize)
    }
}
impl fmt::Debug for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)?;
        if self.overflow {
            write!(f, " (overflow)")?;
        }
        Ok(())
    }
}
