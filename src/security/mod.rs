//! Keeps signing material out of logs and error messages.

pub mod credential_scrubber;

pub use credential_scrubber::{is_sensitive_path, scrub_credentials, scrub_path};
