//! Various small helper functions

use std::collections::BTreeSet;
use std::num::ParseIntError;
use std::time::Duration;

/// Parses a Duration from a string containing seconds.
/// Useful for command line parsing
pub fn parse_seconds(src: &str) -> Result<Duration, ParseIntError> {
    let seconds = src.parse::<u64>()?;
    Ok(Duration::from_secs(seconds))
}

/// Trims every entry and drops those that end up blank
pub fn normalize_refs<I, S>(refs: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    refs.into_iter()
        .map(|r| r.as_ref().trim().to_owned())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Returns `None` if the string is blank or the trimmed string otherwise
pub fn non_blank(input: &str) -> Option<&str> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Joins a base URL and a path suffix without duplicating the separator
pub fn join_url(base: &str, suffix: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        suffix.trim_start_matches('/')
    )
}
