//! Module for parsing and comparing JSON numbers
//!
//! JSON does not restrict the size or precision of numbers, and JSON Schema compares
//! them by mathematical value (`1.0` equals `1`). [`JsonNumber`] therefore never uses
//! floating point arithmetic; it keeps a machine integer where possible and otherwise
//! an arbitrary precision integer or decimal.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use duplicate::duplicate_item;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Signed, ToPrimitive, Zero};
use thiserror::Error;

/// Largest exponent for which integral numbers such as `1e20` are expanded to a big integer;
/// larger ones stay in decimal form to avoid allocating huge numbers
const MAX_EXPANDED_EXPONENT: i64 = 1000;
/// Exponent values are clamped to this magnitude; numbers beyond it cannot be distinguished
const MAX_EXPONENT: i64 = i64::MAX / 4;

/// Error for a string which is not a valid JSON number
#[derive(Error, PartialEq, Eq, Clone, Debug)]
#[error("malformed JSON number '{0}'")]
pub struct MalformedNumberError(pub String);

/// Decimal number `mantissa * 10^exponent`
///
/// The mantissa never has trailing zeros, so each numeric value has exactly one representation.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Decimal {
    mantissa: BigInt,
    exponent: i64,
}

impl Decimal {
    /// Digits of the number, without trailing zeros
    pub fn mantissa(&self) -> &BigInt {
        &self.mantissa
    }

    /// Power of ten the [mantissa](Self::mantissa) is multiplied with
    pub fn exponent(&self) -> i64 {
        self.exponent
    }
}

/// A JSON number value
///
/// Exactly one representation is used for every numeric value:
/// - [`Int`](JsonNumber::Int) for integral values which fit into an `i64`
/// - [`BigInt`](JsonNumber::BigInt) for larger integral values
/// - [`Decimal`](JsonNumber::Decimal) for values with a fractional part, and for integral
///   values with very large exponents such as `1e5000`
///
/// Equality, hashing and ordering are by numeric value, so `1.10` equals `1.1` and `4.0`
/// is the integer `4`.
///
/// # Examples
/// ```
/// # use struson_schema::JsonNumber;
/// let a: JsonNumber = "4.0".parse()?;
/// let b: JsonNumber = "4".parse()?;
/// assert_eq!(a, b);
/// assert!(a.is_integer());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub enum JsonNumber {
    /// Integral value fitting into an `i64`
    Int(i64),
    /// Integral value not fitting into an `i64`
    BigInt(BigInt),
    /// Decimal value
    Decimal(Decimal),
}

struct NumberParts<'a> {
    negative: bool,
    integer: &'a str,
    fraction: &'a str,
    exponent: i64,
}

/// Splits a JSON number into its parts, returns `None` if the number is malformed
fn split_json_number(number: &str) -> Option<NumberParts<'_>> {
    #[derive(PartialEq, Clone, Copy)]
    enum State {
        Start,
        Minus,
        IntZero,
        IntNonZero,
        DecimalPoint,
        DecimalDigit,
        ExpE,
        ExpSign,
        ExpDigit,
    }

    let bytes = number.as_bytes();
    let mut state = State::Start;
    let mut int_start = 0;
    let mut int_end = 0;
    let mut fraction_start = 0;
    let mut fraction_end = 0;
    let mut exponent_start = 0;

    for (index, &byte) in bytes.iter().enumerate() {
        state = match (state, byte) {
            (State::Start, b'-') => State::Minus,
            (State::ExpE, b'-' | b'+') => State::ExpSign,
            (State::Start | State::Minus, b'0') => {
                int_start = index;
                State::IntZero
            }
            (State::Start | State::Minus, b'1'..=b'9') => {
                int_start = index;
                State::IntNonZero
            }
            (State::IntNonZero, b'0'..=b'9') => State::IntNonZero,
            (State::IntZero | State::IntNonZero, b'.') => {
                int_end = index;
                State::DecimalPoint
            }
            (State::DecimalPoint, b'0'..=b'9') => {
                fraction_start = index;
                State::DecimalDigit
            }
            (State::DecimalDigit, b'0'..=b'9') => State::DecimalDigit,
            (State::IntZero | State::IntNonZero, b'e' | b'E') => {
                int_end = index;
                State::ExpE
            }
            (State::DecimalDigit, b'e' | b'E') => {
                fraction_end = index;
                State::ExpE
            }
            (State::ExpE | State::ExpSign, b'0'..=b'9') => {
                exponent_start = index;
                State::ExpDigit
            }
            (State::ExpDigit, b'0'..=b'9') => State::ExpDigit,
            _ => return None,
        };
    }

    match state {
        State::IntZero | State::IntNonZero => int_end = bytes.len(),
        State::DecimalDigit => fraction_end = bytes.len(),
        State::ExpDigit => {}
        _ => return None,
    }

    let exponent = if state == State::ExpDigit {
        let digits = number[exponent_start..].trim_start_matches('0');
        let negative = bytes[exponent_start - 1] == b'-';
        // Clamp instead of failing; such numbers are valid JSON
        let magnitude = if digits.len() > 18 {
            MAX_EXPONENT
        } else {
            digits.parse::<i64>().unwrap_or(0).min(MAX_EXPONENT)
        };
        if negative {
            -magnitude
        } else {
            magnitude
        }
    } else {
        0
    };

    Some(NumberParts {
        negative: bytes[0] == b'-',
        integer: &number[int_start..int_end],
        fraction: &number[fraction_start..fraction_end],
        exponent,
    })
}

fn strip_trailing_zeros(mantissa: BigInt, exponent: i64) -> (BigInt, i64) {
    if mantissa.is_zero() {
        return (mantissa, 0);
    }
    // 10^k = 2^k * 5^k, so the binary trailing zeros bound the decimal ones
    let mut low = 0_u32;
    let mut high = u32::try_from(mantissa.trailing_zeros().unwrap_or(0)).unwrap_or(u32::MAX);
    let ten = BigInt::from(10);
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if (&mantissa % ten.pow(mid)).is_zero() {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    if low == 0 {
        return (mantissa, exponent);
    }
    (mantissa / ten.pow(low), exponent.saturating_add(i64::from(low)))
}

fn decimal_digit_count(value: &BigInt) -> i64 {
    if value.is_zero() {
        return 0;
    }
    let magnitude = value.magnitude();
    let ten = BigUint::from(10_u32);
    // Estimate from the bit length, then correct the rounding error
    let mut digits = ((magnitude.bits() - 1) as f64 * std::f64::consts::LOG10_2) as u32 + 1;
    while digits > 1 && *magnitude < ten.pow(digits - 1) {
        digits -= 1;
    }
    while *magnitude >= ten.pow(digits) {
        digits += 1;
    }
    i64::from(digits)
}

impl JsonNumber {
    /// Creates the number `mantissa * 10^exponent`, choosing the representation as described
    /// in the [type documentation](JsonNumber)
    pub fn from_parts(mantissa: BigInt, exponent: i64) -> Self {
        let (mantissa, exponent) = strip_trailing_zeros(mantissa, exponent);
        if exponent < 0 || exponent > MAX_EXPANDED_EXPONENT {
            return JsonNumber::Decimal(Decimal { mantissa, exponent });
        }
        JsonNumber::from_big_int(mantissa * BigInt::from(10).pow(exponent as u32))
    }

    /// Creates an integral number, using [`Int`](JsonNumber::Int) if the value fits
    pub fn from_big_int(value: BigInt) -> Self {
        match value.to_i64() {
            Some(i) => JsonNumber::Int(i),
            None => JsonNumber::BigInt(value),
        }
    }

    /// Whether the number has no fractional part
    pub fn is_integer(&self) -> bool {
        match self {
            JsonNumber::Int(_) | JsonNumber::BigInt(_) => true,
            JsonNumber::Decimal(d) => d.exponent >= 0,
        }
    }

    /// Gets the value as `i64`, if it is integral and in range
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JsonNumber::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Gets the value as `u64`, if it is integral, non-negative and in range
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            JsonNumber::Int(i) => u64::try_from(*i).ok(),
            JsonNumber::BigInt(b) => b.to_u64(),
            JsonNumber::Decimal(_) => None,
        }
    }

    /// Gets the closest `f64` value; precision might be lost
    pub fn to_f64(&self) -> f64 {
        match self {
            JsonNumber::Int(i) => *i as f64,
            JsonNumber::BigInt(b) => b.to_f64().unwrap_or(f64::NAN),
            JsonNumber::Decimal(d) => format!("{}e{}", d.mantissa, d.exponent)
                .parse()
                .unwrap_or(f64::NAN),
        }
    }

    /// Whether the value is negative
    pub fn is_negative(&self) -> bool {
        match self {
            JsonNumber::Int(i) => *i < 0,
            JsonNumber::BigInt(b) => b.is_negative(),
            JsonNumber::Decimal(d) => d.mantissa.is_negative(),
        }
    }

    /// Mantissa without trailing zeros and exponent, the same for all numerically equal values
    fn canonical(&self) -> (BigInt, i64) {
        match self {
            JsonNumber::Int(i) => strip_trailing_zeros(BigInt::from(*i), 0),
            JsonNumber::BigInt(b) => strip_trailing_zeros(b.clone(), 0),
            JsonNumber::Decimal(d) => (d.mantissa.clone(), d.exponent),
        }
    }

    /// Writes a representation of the value which is equal for all numerically equal numbers
    pub(crate) fn canonical_string(&self) -> String {
        let (mantissa, exponent) = self.canonical();
        format!("{mantissa}e{exponent}")
    }

    /// Whether dividing this number by `divisor` results in an integer
    ///
    /// Returns `false` if `divisor` is zero.
    pub fn is_multiple_of(&self, divisor: &JsonNumber) -> bool {
        if let (JsonNumber::Int(value), JsonNumber::Int(divisor)) = (self, divisor) {
            if *divisor == 0 {
                return false;
            }
            // Only `i64::MIN % -1` overflows, which is a multiple
            return value.checked_rem(*divisor).map_or(true, |r| r == 0);
        }

        let (value_mantissa, value_exponent) = self.canonical();
        let (divisor_mantissa, divisor_exponent) = divisor.canonical();
        if divisor_mantissa.is_zero() {
            return false;
        }
        if value_mantissa.is_zero() {
            return true;
        }

        let exponent_diff = i128::from(value_exponent) - i128::from(divisor_exponent);
        if exponent_diff < 0 {
            // Mantissa has no trailing zeros, so it cannot be divisible by a multiple of 10^-diff
            return false;
        }
        let divisor_magnitude = divisor_mantissa.magnitude();
        let scale = BigUint::from(10_u32).modpow(
            &BigUint::from(exponent_diff as u128),
            divisor_magnitude,
        );
        let remainder = (value_mantissa.magnitude() % divisor_magnitude) * scale % divisor_magnitude;
        remainder.is_zero()
    }

    fn compare_canonical(a: (BigInt, i64), b: (BigInt, i64)) -> Ordering {
        let (a_mantissa, a_exponent) = a;
        let (b_mantissa, b_exponent) = b;

        fn sign_rank(sign: Sign) -> i8 {
            match sign {
                Sign::Minus => -1,
                Sign::NoSign => 0,
                Sign::Plus => 1,
            }
        }
        let a_sign = sign_rank(a_mantissa.sign());
        let sign_ordering = a_sign.cmp(&sign_rank(b_mantissa.sign()));
        if sign_ordering != Ordering::Equal || a_sign == 0 {
            return sign_ordering;
        }

        // Position of the most significant digit decides unless it is equal
        let a_adjusted = decimal_digit_count(&a_mantissa) + a_exponent;
        let b_adjusted = decimal_digit_count(&b_mantissa) + b_exponent;
        let magnitude_ordering = if a_adjusted != b_adjusted {
            a_adjusted.cmp(&b_adjusted)
        } else {
            // Exponent difference is bounded by the digit counts here
            let ten = BigUint::from(10_u32);
            let a_magnitude = a_mantissa.magnitude();
            let b_magnitude = b_mantissa.magnitude();
            if a_exponent >= b_exponent {
                (a_magnitude * ten.pow((a_exponent - b_exponent) as u32)).cmp(b_magnitude)
            } else {
                a_magnitude.cmp(&(b_magnitude * ten.pow((b_exponent - a_exponent) as u32)))
            }
        };

        if a_sign < 0 {
            magnitude_ordering.reverse()
        } else {
            magnitude_ordering
        }
    }
}

impl FromStr for JsonNumber {
    type Err = MalformedNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Fast path for small integers
        if s.len() <= 18 && !s.contains(['.', 'e', 'E']) {
            if let Ok(i) = s.parse::<i64>() {
                // Still reject forms which are not valid JSON, such as `+1` or `01`
                if split_json_number(s).is_some() {
                    return Ok(JsonNumber::Int(i));
                }
            }
        }

        let parts = split_json_number(s).ok_or_else(|| MalformedNumberError(s.to_owned()))?;
        let mut digits = String::with_capacity(parts.integer.len() + parts.fraction.len());
        digits.push_str(parts.integer);
        digits.push_str(parts.fraction);
        let digits = digits.trim_start_matches('0');
        if digits.is_empty() {
            return Ok(JsonNumber::Int(0));
        }
        let significant = digits.trim_end_matches('0');
        let trailing_zeros = (digits.len() - significant.len()) as i64;
        let digits = significant;

        let mut mantissa = BigInt::parse_bytes(digits.as_bytes(), 10)
            .ok_or_else(|| MalformedNumberError(s.to_owned()))?;
        if parts.negative {
            mantissa = -mantissa;
        }
        let exponent = parts
            .exponent
            .saturating_sub(parts.fraction.len() as i64)
            .saturating_add(trailing_zeros)
            .clamp(-MAX_EXPONENT, MAX_EXPONENT);
        Ok(JsonNumber::from_parts(mantissa, exponent))
    }
}

impl PartialEq for JsonNumber {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsonNumber::Int(a), JsonNumber::Int(b)) => a == b,
            _ => self.canonical() == other.canonical(),
        }
    }
}

impl Eq for JsonNumber {}

impl Hash for JsonNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl PartialOrd for JsonNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JsonNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (JsonNumber::Int(a), JsonNumber::Int(b)) => a.cmp(b),
            _ => JsonNumber::compare_canonical(self.canonical(), other.canonical()),
        }
    }
}

impl Display for JsonNumber {
    /// Writes the number as valid JSON number string
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonNumber::Int(i) => write!(f, "{i}"),
            JsonNumber::BigInt(b) => write!(f, "{b}"),
            JsonNumber::Decimal(d) => {
                let fraction_digits = -d.exponent;
                if d.exponent > 0 || fraction_digits > 40 {
                    return write!(f, "{}e{}", d.mantissa, d.exponent);
                }

                let fraction_digits = fraction_digits as usize;
                let digits = d.mantissa.magnitude().to_str_radix(10);
                if d.mantissa.is_negative() {
                    write!(f, "-")?;
                }
                if digits.len() > fraction_digits {
                    let (integer, fraction) = digits.split_at(digits.len() - fraction_digits);
                    write!(f, "{integer}.{fraction}")
                } else {
                    let zeros = "0".repeat(fraction_digits - digits.len());
                    write!(f, "0.{zeros}{digits}")
                }
            }
        }
    }
}

#[duplicate_item(type_template; [u8]; [i8]; [u16]; [i16]; [u32]; [i32]; [i64])]
impl From<type_template> for JsonNumber {
    fn from(value: type_template) -> Self {
        JsonNumber::Int(i64::from(value))
    }
}

#[duplicate_item(type_template; [u64]; [i128]; [u128]; [usize]; [isize])]
impl From<type_template> for JsonNumber {
    fn from(value: type_template) -> Self {
        JsonNumber::from_big_int(BigInt::from(value))
    }
}

impl From<BigInt> for JsonNumber {
    fn from(value: BigInt) -> Self {
        JsonNumber::from_big_int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn n(s: &str) -> JsonNumber {
        match s.parse() {
            Ok(n) => n,
            Err(e) => panic!("Failed parsing {s}: {e}"),
        }
    }

    #[test]
    fn parse_representation() -> TestResult {
        assert!(matches!(n("0"), JsonNumber::Int(0)));
        assert!(matches!(n("-0"), JsonNumber::Int(0)));
        assert!(matches!(n("-0.0e5"), JsonNumber::Int(0)));
        assert!(matches!(n("123"), JsonNumber::Int(123)));
        assert!(matches!(n("4.0"), JsonNumber::Int(4)));
        assert!(matches!(n("1.5e1"), JsonNumber::Int(15)));
        assert!(matches!(n("1e2"), JsonNumber::Int(100)));
        assert!(matches!(n("12345678901234567890"), JsonNumber::BigInt(_)));
        assert!(matches!(n("1e5000"), JsonNumber::Decimal(_)));

        match n("1.10") {
            JsonNumber::Decimal(d) => {
                assert_eq!(&BigInt::from(11), d.mantissa());
                assert_eq!(-1, d.exponent());
            }
            other => panic!("Unexpected number: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn parse_malformed() {
        for s in [
            "", "-", "+1", "01", "1.", ".5", "1e", "1e+", "1.e3", "0x10", "1a", " 1", "--1",
        ] {
            assert_eq!(
                Err(MalformedNumberError(s.to_owned())),
                s.parse::<JsonNumber>(),
                "for {s:?}"
            );
        }
    }

    #[test]
    fn equality() {
        assert_eq!(n("1.10"), n("1.1"));
        assert_eq!(n("1"), n("1.0"));
        assert_eq!(n("100"), n("1e2"));
        assert_eq!(n("0.5"), n("5e-1"));
        assert_ne!(n("0.5"), n("5e-2"));
        assert_eq!(n("1e1001"), JsonNumber::from(BigInt::from(10).pow(1001)));
        assert_ne!(n("-1"), n("1"));
    }

    #[test]
    fn ordering() {
        assert!(n("1") < n("2"));
        assert!(n("-2") < n("-1"));
        assert!(n("1.5") < n("2"));
        assert!(n("1.5") > n("1.49999999999999999999999999"));
        assert!(n("-1.5") < n("-1.49999999999999999999999999"));
        assert!(n("1e-5000") > n("0"));
        assert!(n("1e-5000") < n("1e-4999"));
        assert!(n("-1e5000") < n("-1"));
        assert!(n("98249283749234923498293171823948729348710298301928331") > n("9.8e52"));
        assert_eq!(Ordering::Equal, n("3.0").cmp(&n("3")));
    }

    #[test]
    fn multiple_of() {
        assert!(n("10").is_multiple_of(&n("2")));
        assert!(!n("7").is_multiple_of(&n("2")));
        assert!(n("0.0075").is_multiple_of(&n("0.0001")));
        assert!(!n("0.00751").is_multiple_of(&n("0.0001")));
        assert!(n("4.5").is_multiple_of(&n("1.5")));
        assert!(!n("35").is_multiple_of(&n("1.5")));
        assert!(!n("0.25").is_multiple_of(&n("0.5")));
        assert!(n("0").is_multiple_of(&n("0.3")));
        assert!(!n("1").is_multiple_of(&n("0")));
        assert!(n("1e308").is_multiple_of(&n("1")));
        assert!(!n("1e308").is_multiple_of(&n("0.123456789")));
        assert!(n("-9223372036854775808").is_multiple_of(&n("-1")));
    }

    #[test]
    fn display() {
        assert_eq!("12", n("12").to_string());
        assert_eq!("1.1", n("1.10").to_string());
        assert_eq!("-0.005", n("-5e-3").to_string());
        assert_eq!("1e5000", n("1E+5000").to_string());
        assert_eq!("12345678901234567890", n("12345678901234567890").to_string());

        // Displayed value must parse back to an equal number
        for s in ["0.1", "-123.456", "1e-100", "7e1500", "3"] {
            assert_eq!(n(s), n(&n(s).to_string()));
        }
    }

    #[test]
    fn long_literals() {
        let zeros = "0".repeat(200_000);
        assert_eq!(n("1e200000"), n(&format!("1{zeros}")));
        assert_eq!(n("1e200000"), n(&format!("1{zeros}.{zeros}")));
        assert_eq!(n("1.5e-200001"), n(&format!("0.{zeros}15{zeros}")));

        let digits = "7".repeat(50_000);
        let long = n(&format!("{digits}{zeros}"));
        assert!(long > n("7.7e249999"));
        assert!(long < n("7.8e249999"));
        assert_eq!(
            JsonNumber::from_parts(BigInt::from(77_000), 3),
            n("7.7e7")
        );
    }

    #[test]
    fn integer_check() {
        assert!(n("4.0").is_integer());
        assert!(!n("4.1").is_integer());
        assert!(n("1e5000").is_integer());
        assert!(!n("1e-5000").is_integer());
        assert_eq!(Some(4), n("4.0").as_i64());
        assert_eq!(None, n("-1").as_u64());
    }
}
