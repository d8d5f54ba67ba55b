//! Phone normalization shared by the send path and the reply lookup path.
//!
//! Both paths must go through [`canonical`] so a number recorded at send time
//! matches the same number arriving in a webhook with different formatting.

/// Shortest national number (area code + subscriber) we expect after a
/// country code. Shorter digit strings are never treated as already prefixed.
const MIN_NATIONAL_DIGITS: usize = 10;

/// Strip everything but ASCII digits.
///
/// `"+55 (31) 99999-9999"` and `"5531999999999"` normalize to the same string.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Digits-only number with country code, as sent to the messaging gateway.
///
/// `country_code` comes from the appointment row; when missing or blank the
/// configured `default_country_code` is used. Returns an empty string when the
/// input has no digits.
pub fn canonical(raw: &str, country_code: Option<&str>, default_country_code: &str) -> String {
    let digits = normalize(raw);
    if digits.is_empty() {
        return digits;
    }

    let cc = country_code
        .map(normalize)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| normalize(default_country_code));
    if cc.is_empty() {
        return digits;
    }

    if digits.starts_with(&cc) && digits.len() >= cc.len() + MIN_NATIONAL_DIGITS {
        digits
    } else {
        format!("{cc}{digits}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_formatting() {
        assert_eq!(normalize("+55 (31) 99999-9999"), "5531999999999");
        assert_eq!(normalize("+55 (31) 99999-9999"), normalize("5531999999999"));
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("n/a"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["+55 (31) 99999-9999", "abc", "", "0800 123 4567", "٣١٢"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn test_canonical_prefixes_default_country_code() {
        assert_eq!(canonical("(31) 99999-9999", None, "55"), "5531999999999");
        assert_eq!(canonical("(31) 3238-8100", Some(""), "55"), "553132388100");
    }

    #[test]
    fn test_canonical_keeps_existing_country_code() {
        assert_eq!(canonical("+55 31 99999-9999", None, "55"), "5531999999999");
        assert_eq!(canonical("5531999999999", Some("55"), "55"), "5531999999999");
    }

    #[test]
    fn test_canonical_area_code_equal_to_country_code() {
        // DDD 55 (Rio Grande do Sul) without country code must still be prefixed.
        assert_eq!(canonical("55 99999-9999", None, "55"), "5555999999999");
    }

    #[test]
    fn test_canonical_uses_row_country_code() {
        assert_eq!(canonical("(11) 2345-6789", Some("+351"), "55"), "3511123456789");
    }

    #[test]
    fn test_canonical_empty_phone() {
        assert_eq!(canonical("", Some("55"), "55"), "");
        assert_eq!(canonical("--", None, "55"), "");
    }

    #[test]
    fn test_canonical_is_stable_across_paths() {
        let sent = canonical("(31) 99999-9999", Some("55"), "55");
        let received = canonical("+55 31 99999 9999", None, "55");
        assert_eq!(sent, received);
        assert_eq!(canonical(&sent, None, "55"), sent);
    }
}
