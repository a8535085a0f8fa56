//! Byte-level rendering primitives
//!
//! Small, allocation-free helpers that append fixed-width integers, calendar
//! timestamps and severity tokens to a [`LogBuffer`].

use super::entry::DecomposedTime;
use super::pool::LogBuffer;
use super::severity::Severity;

/// Rendered for raw severity values outside the known range.
pub const UNKNOWN_SEVERITY: &str = "<unknown>";

const POW10: [u32; 7] = [1, 10, 100, 1_000, 10_000, 100_000, 1_000_000];

/// Append `n` zero-padded to exactly `WIDTH` digits (1..=6).
///
/// `n` must fit in `WIDTH` digits. Debug builds panic otherwise; release
/// builds silently keep only the low `WIDTH` digits.
#[inline]
pub fn append_pad_int<const WIDTH: usize>(dest: &mut LogBuffer, n: u32) {
    debug_assert!((1..=6).contains(&WIDTH), "pad width must be 1..=6");
    debug_assert!(n < POW10[WIDTH], "{} does not fit in {} digits", n, WIDTH);

    let mut digits = [b'0'; WIDTH];
    let mut rest = n;
    for slot in digits.iter_mut().rev() {
        *slot = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    dest.extend_from_slice(&digits);
}

/// Decimal digits of `n`, written into the tail of `scratch`.
pub fn u32_digits(n: u32, scratch: &mut [u8; 10]) -> &[u8] {
    let mut pos = scratch.len();
    let mut rest = n;
    loop {
        pos -= 1;
        scratch[pos] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    &scratch[pos..]
}

/// Append the year zero-padded to four digits.
///
/// Years past 9999 are written in full; years before 0 get a leading `-`.
pub fn append_year(dest: &mut LogBuffer, year: i32) {
    if year < 0 {
        dest.push(b'-');
    }
    let abs = year.unsigned_abs();
    if abs <= 9999 {
        append_pad_int::<4>(dest, abs);
    } else {
        let mut scratch = [0u8; 10];
        dest.extend_from_slice(u32_digits(abs, &mut scratch));
    }
}

/// Append `YYYY-MM-DD HH:MM:SS`.
pub fn append_calendar(dest: &mut LogBuffer, time: &DecomposedTime) {
    append_year(dest, time.year);
    dest.push(b'-');
    append_pad_int::<2>(dest, time.month);
    dest.push(b'-');
    append_pad_int::<2>(dest, time.day);
    dest.push(b' ');
    append_pad_int::<2>(dest, time.hour);
    dest.push(b':');
    append_pad_int::<2>(dest, time.minute);
    dest.push(b':');
    append_pad_int::<2>(dest, time.second);
}

/// Append `.ssssss` plus a trailing `Z` for UTC timestamps.
pub fn append_subsecond(dest: &mut LogBuffer, time: &DecomposedTime) {
    dest.push(b'.');
    append_pad_int::<6>(dest, time.microseconds);
    if !time.is_local {
        dest.push(b'Z');
    }
}

/// Append `YYYY-MM-DD HH:MM:SS.ssssss[Z]`.
pub fn append_timestamp(dest: &mut LogBuffer, time: &DecomposedTime) {
    append_calendar(dest, time);
    append_subsecond(dest, time);
}

/// Severity name, or `<unknown>` for out-of-range raw values.
pub fn severity_token(raw: u8) -> &'static str {
    Severity::from_u8(raw).map_or(UNKNOWN_SEVERITY, |severity| severity.to_str())
}

/// Append a severity token right-aligned in five columns.
pub fn append_severity(dest: &mut LogBuffer, severity: Severity) {
    append_severity_raw(dest, severity.as_u8());
}

/// Like [`append_severity`] but for a raw discriminant.
pub fn append_severity_raw(dest: &mut LogBuffer, raw: u8) {
    let token = severity_token(raw);
    for _ in token.len()..5 {
        dest.push(b' ');
    }
    dest.extend_from_slice(token.as_bytes());
}

#[inline]
fn is_separator(byte: u8) -> bool {
    byte == b'/' || (cfg!(windows) && byte == b'\\')
}

/// Keep at most the last two path segments of `path`.
///
/// Scans backwards counting separators; at the second one the remainder
/// after it is returned. Paths with fewer than two separators come back
/// unchanged.
pub fn trunc_file(path: &[u8]) -> &[u8] {
    trunc_segments(path, 2)
}

/// Keep at most the last `segments` path segments of `path`.
pub fn trunc_segments(path: &[u8], segments: usize) -> &[u8] {
    if segments == 0 {
        return &path[path.len()..];
    }
    let mut seen = 0;
    for (idx, &byte) in path.iter().enumerate().rev() {
        if is_separator(byte) {
            seen += 1;
            if seen == segments {
                return &path[idx + 1..];
            }
        }
    }
    path
}
