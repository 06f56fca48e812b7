//! SQL text escaping and boundary decoding helpers.
//!
//! Values are embedded as single-quoted literals with embedded quotes
//! doubled; identifiers are double-quoted with embedded double quotes
//! doubled. The two are never interchanged.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DbError, Result};

/// Text spellings the backend uses for boolean true.
pub const TRUTHY: [&str; 7] = ["TRUE", "t", "true", "y", "yes", "on", "1"];

/// Double every single-quote character.
#[must_use]
pub fn escape(text: &str) -> String {
    text.replace('\'', "''")
}

/// Quote a value as a SQL string literal.
#[must_use]
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", escape(text))
}

/// Quote a SQL identifier (table, column or type name).
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Decode a backend boolean from its text form.
///
/// Only the spellings in [`TRUTHY`] count as true; everything else,
/// including `"True"` and `" yes"`, is false.
#[must_use]
pub fn is_true(text: &str) -> bool {
    TRUTHY.contains(&text)
}

/// Replace each `?` in `template`, in order, with the quoted argument.
///
/// The number of placeholders must equal the number of arguments.
/// Arguments are quoted as literals, so a `?` inside an argument is never
/// treated as a placeholder. The template itself is not parsed: a `?`
/// inside a literal written into the template is a placeholder too.
pub fn expand_placeholders<S: AsRef<str>>(template: &str, args: &[S]) -> Result<String> {
    let placeholders = template.matches('?').count();
    if placeholders != args.len() {
        return Err(DbError::PlaceholderMismatch {
            placeholders,
            arguments: args.len(),
        });
    }

    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut args = args.iter();
    for ch in template.chars() {
        if ch == '?' {
            if let Some(arg) = args.next() {
                out.push_str(&quote_literal(arg.as_ref()));
                continue;
            }
        }
        out.push(ch);
    }
    Ok(out)
}

/// Validate a physical table or type name supplied at runtime.
///
/// Accepts the unquoted-identifier subset of PostgreSQL names: a letter or
/// underscore followed by up to 62 letters, digits, `_` or `$`.
pub fn validate_identifier(name: &str) -> Result<()> {
    #[allow(clippy::expect_used)]
    static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,62}$").expect("identifier pattern is valid")
    });

    if name.is_empty() {
        return Err(DbError::InvalidIdentifier("identifier cannot be empty".into()));
    }

    if !IDENTIFIER_RE.is_match(name) {
        return Err(DbError::InvalidIdentifier(format!(
            "invalid identifier '{name}': must start with letter/underscore, \
             contain only alphanumerics/_/$, and be 1-63 characters"
        )));
    }

    Ok(())
}
