//! Value formatting
//!
//! Fixed-capacity string rendering for the counter, the temperature and
//! the query response body. The display and the endpoint share these so
//! both show exactly the same text.

use core::fmt::Write;

use heapless::String;

/// Longest counter string (`u32::MAX`)
pub const COUNT_LEN: usize = 10;

/// Longest temperature string (sign, integer part, point, digit)
pub const TEMPERATURE_LEN: usize = 14;

/// Longest query body
pub const QUERY_LEN: usize = 48;

/// Representation error absorbed before truncating, in `f32` epsilons
///
/// `19.4f32` is stored just under 19.4; this lifts it back to 194 tenths
/// without rounding up readings that are genuinely below a tenth.
const TRUNCATE_EPSILONS: f64 = 4.0;

/// Format the counter as a plain integer
pub fn format_count(count: u32) -> String<COUNT_LEN> {
    let mut out = String::new();
    let _ = write!(out, "{}", count);
    out
}

/// Temperature in whole tenths of a degree, truncated toward zero
///
/// Only float representation error is forgiven: `19.99995` is `199`.
pub fn temperature_tenths(celsius: f32) -> i32 {
    let scaled = f64::from(celsius) * 10.0;
    // Scaling moves away from zero for either sign
    let nudged = scaled * (1.0 + f64::from(f32::EPSILON) * TRUNCATE_EPSILONS);
    // `as` truncates toward zero and saturates (NaN becomes 0)
    nudged as i32
}

fn write_tenths<W: Write>(out: &mut W, tenths: i32) -> core::fmt::Result {
    if tenths < 0 {
        out.write_char('-')?;
    }
    let magnitude = tenths.unsigned_abs();
    write!(out, "{}.{}", magnitude / 10, magnitude % 10)
}

/// Format a temperature with one decimal digit
///
/// `23.7` becomes `"23.7"`; `-0.5` becomes `"-0.5"`.
pub fn format_temperature(celsius: f32) -> String<TEMPERATURE_LEN> {
    let mut out = String::new();
    let _ = write_tenths(&mut out, temperature_tenths(celsius));
    out
}

/// Format the query response body
///
/// `time=<count>&temperature=<int>.<digit>`
pub fn format_query(count: u32, celsius: f32) -> String<QUERY_LEN> {
    let mut out = String::new();
    let _ = write!(out, "time={}&temperature=", count);
    let _ = write_tenths(&mut out, temperature_tenths(celsius));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(42).as_str(), "42");
        assert_eq!(format_count(0).as_str(), "0");
        assert_eq!(format_count(u32::MAX).as_str(), "4294967295");
    }

    #[test]
    fn test_format_temperature() {
        assert_eq!(format_temperature(23.7).as_str(), "23.7");
        assert_eq!(format_temperature(19.4).as_str(), "19.4");
        assert_eq!(format_temperature(0.0).as_str(), "0.0");
        assert_eq!(format_temperature(25.0625).as_str(), "25.0");
    }

    #[test]
    fn test_format_temperature_truncates() {
        // 12-bit TMP100 steps are 1/16 degree; the second decimal is dropped
        assert_eq!(format_temperature(21.9375).as_str(), "21.9");
        assert_eq!(format_temperature(-3.96).as_str(), "-3.9");
    }

    #[test]
    fn test_format_temperature_never_rounds_up() {
        assert_eq!(format_temperature(19.99995).as_str(), "19.9");
        assert_eq!(format_temperature(-19.99995).as_str(), "-19.9");
        assert_eq!(format_temperature(0.0999).as_str(), "0.0");
        assert_eq!(format_temperature(127.9375).as_str(), "127.9");
    }

    #[test]
    fn test_format_negative_below_one() {
        assert_eq!(format_temperature(-0.5).as_str(), "-0.5");
        assert_eq!(format_temperature(-55.0).as_str(), "-55.0");
    }

    #[test]
    fn test_format_query() {
        assert_eq!(format_query(12, 19.4).as_str(), "time=12&temperature=19.4");
        assert_eq!(format_query(0, 0.0).as_str(), "time=0&temperature=0.0");
    }

    #[test]
    fn test_non_finite_temperature_fits() {
        assert_eq!(format_temperature(f32::NAN).as_str(), "0.0");
        assert_eq!(format_temperature(f32::INFINITY).as_str(), "214748364.7");
        assert_eq!(format_temperature(f32::NEG_INFINITY).as_str(), "-214748364.8");
    }

    proptest! {
        #[test]
        fn prop_temperature_matches_tenths(tenths in -550i32..=1500) {
            let celsius = tenths as f32 / 10.0;
            let text = format_temperature(celsius);

            let sign = if tenths < 0 { "-" } else { "" };
            let expected = std::format!("{}{}.{}", sign, tenths.abs() / 10, tenths.abs() % 10);
            prop_assert_eq!(text.as_str(), expected.as_str());
        }
    }
}
