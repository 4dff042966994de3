//! Upstream column name to CRM custom field API name
//!
//! 1. Characters outside `[A-Za-z0-9_]` become spaces.
//! 2. Tokens are joined with `_` while the identifier stays within
//!    [`PREFERRED_LENGTH`]. The first token that does not fit switches to
//!    abbreviation mode for the rest of the name: each later token contributes
//!    its upper-cased initial (or its leading digits when it starts with a digit).
//! 3. An abbreviation that would push the identifier past [`MAX_BASE_LENGTH`]
//!    ends the reduction.
//! 4. `__c` is appended.
//!
//! `Provider Changed Ownership in Last 12 Months` becomes
//! `Provider_Changed_O_I_L_12_M__c`.

use nhsync_common::types::CUSTOM_FIELD_SUFFIX;
use nhsync_common::{Result, SyncError};

pub const PREFERRED_LENGTH: usize = 25;
pub const MAX_BASE_LENGTH: usize = 40;

/// Columns whose API name is fixed rather than derived.
pub const DESIGNATED_NAMES: &[(&str, &str)] = &[
    ("CMS Certification Number (CCN)", "CCN__c"),
    ("County/Parish", "County__c"),
];

/// Designated name when there is one, the normalized name otherwise.
pub fn api_name_for(column: &str) -> Result<String> {
    match designated_name(column) {
        Some(name) => Ok(name.to_string()),
        None => normalize(column),
    }
}

pub fn designated_name(column: &str) -> Option<&'static str> {
    let column = column.trim();
    DESIGNATED_NAMES
        .iter()
        .find(|(source, _)| *source == column)
        .map(|(_, api_name)| *api_name)
}

/// Derive a legal custom field API name from a free-form column name.
pub fn normalize(column: &str) -> Result<String> {
    Ok(format!("{}{}", base_identifier(column)?, CUSTOM_FIELD_SUFFIX))
}

/// The API name without its suffix.
pub fn base_identifier(column: &str) -> Result<String> {
    let filtered: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();

    let mut tokens = filtered.split_whitespace().map(clean_token).filter(|t| !t.is_empty());

    let Some(first) = tokens.next() else {
        return Err(SyncError::InvalidIdentifier(column.to_string()));
    };

    let mut base: String = first.chars().take(MAX_BASE_LENGTH).collect();
    while base.ends_with('_') {
        base.pop();
    }
    let mut abbreviating = false;

    for token in tokens {
        if !abbreviating {
            if base.len() + 1 + token.len() <= PREFERRED_LENGTH {
                base.push('_');
                base.push_str(&token);
                continue;
            }
            abbreviating = true;
        }

        let abbreviation = abbreviate(&token);
        if base.len() + 1 + abbreviation.len() > MAX_BASE_LENGTH {
            break;
        }
        base.push('_');
        base.push_str(&abbreviation);
    }

    Ok(base)
}

/// Collapse underscore runs and trim underscores at either end.
fn clean_token(token: &str) -> String {
    let mut cleaned = String::with_capacity(token.len());
    for c in token.chars() {
        if c == '_' && (cleaned.is_empty() || cleaned.ends_with('_')) {
            continue;
        }
        cleaned.push(c);
    }
    while cleaned.ends_with('_') {
        cleaned.pop();
    }
    cleaned
}

fn abbreviate(token: &str) -> String {
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        token.chars().take_while(char::is_ascii_digit).collect()
    } else {
        token
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase().to_string())
            .unwrap_or_default()
    }
}
