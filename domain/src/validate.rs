//! Input validation and link policy helpers. Pure and deterministic.

use std::collections::HashSet;

use url::Url;

use crate::{CoreError, ShortenerConfig};

/// Every character of `candidate` must appear in `allowed`. The empty string
/// passes; callers decide whether an empty alias means "generate one".
pub fn is_valid_alias_charset(candidate: &str, allowed: &str) -> bool {
    candidate.chars().all(|c| allowed.contains(c))
}

/// Check a user-supplied alias against the configured alphabet and the
/// reserved latest alias.
pub fn validate_custom_short(candidate: &str, config: &ShortenerConfig) -> Result<(), CoreError> {
    if config.is_latest(candidate) {
        return Err(CoreError::InvalidShort(format!(
            "Short URL cannot be the same as a special URL ({})",
            candidate
        )));
    }
    if let Some(bad) = candidate
        .chars()
        .find(|c| !config.allowed_chars.contains(*c))
    {
        return Err(CoreError::InvalidShort(format!(
            "Character {} not allowed in short URL",
            bad
        )));
    }
    Ok(())
}

/// A long URL is valid when it parses with a non-empty scheme and host.
/// No reachability check and no scheme allow-list.
pub fn is_valid_long_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Host of a URL: the text after the last `//` up to the next `/`.
pub fn extract_host(long: &str) -> &str {
    let rest = long.rsplit("//").next().unwrap_or(long);
    rest.split('/').next().unwrap_or(rest)
}

/// Whether `long` points at a blocklisted host or, with self-links
/// disabled, at the service itself.
pub fn is_blocked_host(
    long: &str,
    blocklist: &HashSet<String>,
    selflinks_allowed: bool,
    base_host: &str,
) -> bool {
    let host = extract_host(long);
    if blocklist.contains(host) {
        return true;
    }
    !selflinks_allowed && host.eq_ignore_ascii_case(base_host)
}

/// Fragment used for delete-by-long: drops everything up to the last `//`.
pub fn long_match_fragment(long: &str) -> &str {
    match long.rsplit_once("//") {
        Some((_, rest)) => rest,
        None => long,
    }
}
