//! Credential scrubbing for log lines and error messages.
//!
//! Request failures from the HTTP client can echo back headers and URLs.
//! Everything that reaches a log line or a user-facing error passes through
//! here first so signatures and private key material are never written out.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Patterns for credentials that may show up in transport errors
    static ref CREDENTIAL_PATTERNS: Vec<(Regex, &'static str)> = vec![
        // HTTP Signature authorization header, signature value only
        (Regex::new(r#"(?i)(signature\s*=\s*")([A-Za-z0-9+/=]+)(")"#).unwrap(),
         "${1}<REDACTED_SIGNATURE>${3}"),

        // PEM-encoded private key blocks
        (Regex::new(r"(?s)-----BEGIN ([A-Z ]*)PRIVATE KEY-----.*?-----END ([A-Z ]*)PRIVATE KEY-----").unwrap(),
         "<REDACTED_PRIVATE_KEY>"),

        // Private key paths passed as settings
        (Regex::new(r"(?i)(private[_-]?key|ssh[_-]?key|key[_-]?file|key[_-]?path)\s*[:=]\s*([^\s]+\.pem|[^\s]+\.key|[^\s]+id_(rsa|ecdsa|ed25519)[^\s]*)").unwrap(),
         "$1=<REDACTED_KEY_PATH>"),
    ];

    static ref SENSITIVE_PATH_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\.ssh[/\\]").unwrap(),
        Regex::new(r"(?i)id_rsa").unwrap(),
        Regex::new(r"(?i)id_ecdsa").unwrap(),
        Regex::new(r"(?i)id_ed25519").unwrap(),
        Regex::new(r"(?i)\.pem$").unwrap(),
        Regex::new(r"(?i)\.key$").unwrap(),
    ];
}

/// Replace credentials in `input` with placeholders.
///
/// ```
/// use log_archive_uploader::security::credential_scrubber::scrub_credentials;
///
/// let header = r#"Signature keyId="/alice/keys/SHA256:abc",signature="c2lnbmF0dXJl""#;
/// assert_eq!(
///     scrub_credentials(header),
///     r#"Signature keyId="/alice/keys/SHA256:abc",signature="<REDACTED_SIGNATURE>""#
/// );
/// ```
pub fn scrub_credentials(input: &str) -> String {
    let mut result = input.to_string();

    for (pattern, replacement) in CREDENTIAL_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }

    result
}

pub fn is_sensitive_path(path: &str) -> bool {
    SENSITIVE_PATH_PATTERNS.iter().any(|pattern| pattern.is_match(path))
}

/// Hide the file name of a key or credential path, keeping its directory
/// for debugging.
pub fn scrub_path(path: &str) -> String {
    if !is_sensitive_path(path) {
        return path.to_string();
    }

    if let Some(pos) = path.rfind(|c| c == '/' || c == '\\') {
        format!("{}/[REDACTED_SENSITIVE_FILE]", &path[..pos])
    } else {
        "[REDACTED_SENSITIVE_FILE]".to_string()
    }
}
