//! Onion-address validation and artifact naming

use crate::{CaptureError, OnionFormat};
use regex::Regex;
use url::Url;

/// Syntactic check for onion addresses, compiled once from the configured
/// [`OnionFormat`]
///
/// An address matches only if, after an optional scheme and an optional
/// `www.` prefix, its label satisfies the format and is followed by `.onion`
/// and either the end of the string or a path separator.
#[derive(Debug, Clone)]
pub struct OnionValidator {
    pattern: Regex,
}

impl OnionValidator {
    pub fn new(format: OnionFormat) -> Self {
        let pattern = format!(
            r"^(http://|https://)?(www\.)?{}\.onion(/|$)",
            format.label_pattern()
        );
        Self {
            pattern: Regex::new(&pattern).expect("onion pattern is a valid regex"),
        }
    }

    pub fn is_valid(&self, address: &str) -> bool {
        self.pattern.is_match(address)
    }
}

/// Prefix `http://` when the address carries no scheme.
pub fn ensure_http_scheme(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

/// Artifact file stem for an address: its host name.
///
/// Two addresses with the same host map to the same artifact, which is what
/// makes re-runs and duplicate links idempotent.
pub fn artifact_stem(address: &str) -> Result<String, CaptureError> {
    let parsed =
        Url::parse(address).map_err(|e| CaptureError::BadAddress(format!("{address}: {e}")))?;
    parsed
        .host_str()
        .map(str::to_owned)
        .ok_or_else(|| CaptureError::BadAddress(format!("{address}: no host")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_onion(label_len: usize) -> String {
        format!("{}d.onion", "a".repeat(label_len))
    }

    #[test]
    fn accepts_legacy_addresses() {
        let validator = OnionValidator::new(OnionFormat::Legacy);

        let bare = legacy_onion(54);
        assert!(validator.is_valid(&bare));
        assert!(validator.is_valid(&format!("http://{bare}")));
        assert!(validator.is_valid(&format!("https://www.{bare}")));
        assert!(validator.is_valid(&format!("http://{bare}/some/path")));
        // longer labels still match under the legacy rule
        assert!(validator.is_valid(&legacy_onion(70)));
    }

    #[test]
    fn rejects_malformed_addresses() {
        let validator = OnionValidator::new(OnionFormat::Legacy);

        // too short
        assert!(!validator.is_valid(&legacy_onion(40)));
        // wrong terminator
        assert!(!validator.is_valid(&format!("{}x.onion", "a".repeat(54))));
        // uppercase is outside the base32 alphabet used on the wire
        assert!(!validator.is_valid(&format!("{}D.onion", "A".repeat(54))));
        // digits 0/1/8/9 are not base32
        assert!(!validator.is_valid(&format!("{}1d.onion", "a".repeat(53))));
        // wrong suffix
        assert!(!validator.is_valid(&format!("{}d.com", "a".repeat(54))));
        // trailing junk that is not a path separator
        assert!(!validator.is_valid(&format!("{}extra", legacy_onion(54))));
        assert!(!validator.is_valid("http://example.com"));
        assert!(!validator.is_valid(""));
    }

    #[test]
    fn v3_format_is_exact_length() {
        let validator = OnionValidator::new(OnionFormat::V3);

        // 55 base32 chars + 'd' = the 56-char v3 label
        assert!(validator.is_valid(&legacy_onion(55)));
        assert!(!validator.is_valid(&legacy_onion(54)));
        assert!(!validator.is_valid(&legacy_onion(56)));
    }

    #[test]
    fn scheme_normalization() {
        assert_eq!(ensure_http_scheme("example.onion"), "http://example.onion");
        assert_eq!(
            ensure_http_scheme("http://example.onion"),
            "http://example.onion"
        );
        assert_eq!(
            ensure_http_scheme("https://example.onion"),
            "https://example.onion"
        );
    }

    #[test]
    fn artifact_stem_is_the_host() {
        assert_eq!(
            artifact_stem("http://example.onion/deep/path?q=1").unwrap(),
            "example.onion"
        );
        assert!(artifact_stem("not a url").is_err());
    }

    #[test]
    fn same_host_same_stem() {
        let a = artifact_stem("http://example.onion/").unwrap();
        let b = artifact_stem("http://example.onion/other").unwrap();
        assert_eq!(a, b);
    }
}
