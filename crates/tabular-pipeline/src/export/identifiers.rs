//! Destination name validation and identifier quoting.

use crate::error::{PipelineError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 128;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Invalid regex: identifier")
});

/// Check a table or collection name: letters, digits and underscores,
/// starting with a letter or underscore, at most 128 characters.
///
/// ```rust
/// use tabular_pipeline::export::validate_destination_name;
///
/// assert!(validate_destination_name("sales_2024").is_ok());
/// assert!(validate_destination_name("sales; DROP TABLE users--").is_err());
/// ```
pub fn validate_destination_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PipelineError::Config(
            "table name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(PipelineError::Config(format!(
            "table name too long (max {MAX_IDENTIFIER_LEN} characters)"
        )));
    }
    if !IDENTIFIER_REGEX.is_match(name) {
        return Err(PipelineError::Config(format!(
            "invalid table name '{name}': use letters, digits and underscores, starting with a letter or underscore"
        )));
    }
    Ok(())
}

/// Quote an identifier with `quote`, doubling any embedded quote character.
///
/// Column names come from CSV headers and may hold spaces or punctuation,
/// so they are quoted rather than validated.
pub fn quote_identifier(name: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    format!("{quote}{}{quote}", name.replace(quote, &doubled))
}
