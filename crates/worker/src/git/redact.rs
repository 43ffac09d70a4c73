// Credential scrubbing for git command lines and captured output.
//
// Clone URLs carry the job's access token as URL userinfo. Anything that
// ends up in an error message or a log line goes through here first.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

const REDACTED_USERINFO: &str = "***";

fn userinfo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\b([a-z][a-z0-9+.\-]*://)[^/@\s'"]+@"#)
            .expect("userinfo redaction pattern should compile")
    })
}

/// Replace the userinfo part of every URL in `text` with `***`.
pub fn redact_credentials(text: &str) -> Cow<'_, str> {
    userinfo_pattern().replace_all(text, format!("${{1}}{REDACTED_USERINFO}@").as_str())
}
