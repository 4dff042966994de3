//! Property tests for API name derivation

use nhsync_common::SyncError;
use nhsync_ingest::normalize::{base_identifier, normalize, MAX_BASE_LENGTH};
use proptest::prelude::*;

fn is_legal_api_name(name: &str) -> bool {
    let Some(base) = name.strip_suffix("__c") else {
        return false;
    };
    !base.is_empty()
        && base.len() <= MAX_BASE_LENGTH
        && base.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !base.contains("__")
        && !base.starts_with('_')
        && !base.ends_with('_')
}

proptest! {
    #[test]
    fn prop_normalized_names_are_legal(column in "\\PC{0,120}") {
        match normalize(&column) {
            Ok(name) => prop_assert!(is_legal_api_name(&name), "illegal name {name:?} from {column:?}"),
            Err(SyncError::InvalidIdentifier(_)) => {
                prop_assert!(!column.chars().any(|c| c.is_ascii_alphanumeric()));
            },
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn prop_word_columns_are_legal(column in "[A-Za-z0-9_ /()-]{1,200}") {
        if let Ok(name) = normalize(&column) {
            prop_assert!(is_legal_api_name(&name));
        }
    }

    #[test]
    fn prop_normalize_is_deterministic(column in "[A-Za-z0-9 ]{1,80}") {
        prop_assert_eq!(normalize(&column).ok(), normalize(&column).ok());
    }

    #[test]
    fn prop_short_names_keep_all_words(words in prop::collection::vec("[A-Za-z]{1,5}", 1..4)) {
        let column = words.join(" ");
        let base = base_identifier(&column).unwrap();
        prop_assert_eq!(base, words.join("_"));
    }
}
