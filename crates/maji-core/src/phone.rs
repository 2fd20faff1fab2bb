//! Phone number normalization for M-Pesa.
//!
//! M-Pesa expects MSISDNs in international form without a leading `+`
//! (`2547XXXXXXXX`). Customers type numbers in whatever form their handset shows, so
//! normalization is best-effort: it never fails, and unknown shapes are passed through as
//! digits for the provider to accept or reject.

/// Default country calling code (Kenya).
pub const DEFAULT_COUNTRY_CODE: &str = "254";

/// Number of digits in a subscriber number once the trunk `0` is dropped.
pub const SUBSCRIBER_DIGITS: usize = 9;

/// Leading digits of mobile subscriber numbers (`7xx` Safaricom/Airtel, `1xx` newer ranges).
const MOBILE_PREFIXES: [char; 2] = ['7', '1'];

/// Normalize a phone number to `<country_code><subscriber>` form.
///
/// - non-digits are stripped (`+254 712-345-678` → `254712345678`)
/// - a number already carrying the country code with at least
///   `country_code.len() + 9` digits is returned unchanged
/// - a leading trunk `0` is replaced with the country code
/// - a bare 9-digit mobile number gets the country code prepended
/// - anything else is returned as its digits
#[must_use]
pub fn normalize_msisdn(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.starts_with(country_code) && digits.len() >= country_code.len() + SUBSCRIBER_DIGITS
    {
        return digits;
    }

    if let Some(rest) = digits.strip_prefix('0') {
        return format!("{country_code}{rest}");
    }

    if digits.len() == SUBSCRIBER_DIGITS && digits.starts_with(MOBILE_PREFIXES) {
        return format!("{country_code}{digits}");
    }

    digits
}
