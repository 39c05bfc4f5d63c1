//! Option-string formatting for PostgreSQL tools.
//!
//! `pg_ctl` forwards server and `initdb` options as a single `-o` argument.
//! Tokens are joined with one space and are not quoted or escaped, so callers
//! must only pass tokens that need no quoting.

/// Joins option tokens into a single flag-value string.
///
/// # Examples
///
/// ```
/// use pgvenv::options::format_options;
///
/// assert_eq!(format_options(["-A", "trust"]), "-A trust");
/// ```
pub fn format_options<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut formatted = String::new();
    for token in tokens {
        if !formatted.is_empty() {
            formatted.push(' ');
        }
        formatted.push_str(token.as_ref());
    }
    formatted
}
