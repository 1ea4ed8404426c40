//! Input validation for notes and tags.
//!
//! Every check runs before a transaction opens, so a rejected request never
//! leaves partial state behind.

use crate::defaults::{
    MAX_BODY_BYTES, MAX_TAG_DESCRIPTION_CHARS, MAX_TAG_ICON_CHARS, MAX_TAG_NAME_CHARS,
    MAX_TITLE_CHARS,
};
use crate::error::{Error, Result};

/// Validate a note body: non-blank and within the size limit.
pub fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::Validation("note body must not be empty".to_string()));
    }
    if body.len() > MAX_BODY_BYTES {
        return Err(Error::Validation(format!(
            "note body must be {} bytes or less",
            MAX_BODY_BYTES
        )));
    }
    Ok(())
}

/// Validate an optional note title and normalize blank titles to `None`.
pub fn validate_title(title: Option<&str>) -> Result<Option<String>> {
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(Error::Validation(format!(
            "note title must be {} characters or less",
            MAX_TITLE_CHARS
        )));
    }
    Ok(Some(title.to_string()))
}

/// Validate a tag name and return its trimmed form.
///
/// Rules:
/// - 1 to 64 characters after trimming
/// - no control characters
pub fn validate_tag_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("tag name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_TAG_NAME_CHARS {
        return Err(Error::Validation(format!(
            "tag name must be {} characters or less",
            MAX_TAG_NAME_CHARS
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::Validation(
            "tag name cannot contain control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Case-insensitive uniqueness key for a tag name.
///
/// Uses full Unicode lowercasing so "ÄRGER" and "ärger" collide, which
/// SQLite's ASCII-only NOCASE collation would miss.
pub fn normalize_tag_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Validate a `#RGB` or `#RRGGBB` color and return it lowercased.
pub fn validate_color(color: &str) -> Result<String> {
    let color = color.trim();
    let valid = color
        .strip_prefix('#')
        .map(|hex| (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false);
    if !valid {
        return Err(Error::Validation(format!(
            "malformed color '{}': expected #RGB or #RRGGBB",
            color
        )));
    }
    Ok(color.to_ascii_lowercase())
}

/// Validate an optional tag icon, normalizing blanks to `None`.
pub fn validate_icon(icon: Option<&str>) -> Result<Option<String>> {
    let Some(icon) = icon.map(str::trim).filter(|i| !i.is_empty()) else {
        return Ok(None);
    };
    if icon.chars().count() > MAX_TAG_ICON_CHARS {
        return Err(Error::Validation(format!(
            "tag icon must be {} characters or less",
            MAX_TAG_ICON_CHARS
        )));
    }
    Ok(Some(icon.to_string()))
}

/// Validate an optional tag description, normalizing blanks to `None`.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > MAX_TAG_DESCRIPTION_CHARS {
        return Err(Error::Validation(format!(
            "tag description must be {} characters or less",
            MAX_TAG_DESCRIPTION_CHARS
        )));
    }
    Ok(Some(description.to_string()))
}
