use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};

/// A reusable named condition, shared by every trade that references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: i64,
    pub key: String,
    pub label: String,
}

/// A condition as it arrives from a form, before it is resolved to an item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRef {
    pub key: String,
    pub label: String,
}

impl ConditionRef {
    pub fn from_label(label: &str) -> Result<Self> {
        let label = label.trim();
        let key = condition_key(label);
        if key.is_empty() {
            return Err(JournalError::validation(format!(
                "checklist label {:?} has no usable characters",
                label
            )));
        }
        Ok(Self {
            key,
            label: label.to_string(),
        })
    }
}

/// Slug used as the unique key of a checklist item.
///
/// ASCII letters and digits are lowercased; every other run of characters
/// becomes a single `_`, with none at either end.
pub fn condition_key(label: &str) -> String {
    let mut key = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    key
}

/// Labels of the conditions offered on a fresh journal. Keys come from
/// [`condition_key`] like any other label.
pub const DEFAULT_CONDITIONS: &[&str] = &[
    "Asia range liquidity sweep",
    "BOS/CHOCH",
    "FVG retracement",
    "Volume spike",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_normalization() {
        assert_eq!(condition_key("BOS/CHOCH"), "bos_choch");
        assert_eq!(condition_key("  FVG retracement "), "fvg_retracement");
        assert_eq!(condition_key("Volume -- spike!!"), "volume_spike");
        assert_eq!(condition_key("__x__"), "x");
        assert_eq!(condition_key("1h OB"), "1h_ob");
    }

    #[test]
    fn labels_differing_in_case_and_punctuation_share_a_key() {
        assert_eq!(condition_key("BOS / CHoCH"), condition_key("bos-choch"));
    }

    #[test]
    fn blank_label_is_rejected() {
        assert!(matches!(
            ConditionRef::from_label(" / "),
            Err(JournalError::Validation(_))
        ));
    }

    #[test]
    fn label_is_trimmed_but_kept_readable() {
        let c = ConditionRef::from_label("  Asia range liquidity sweep ").unwrap();
        assert_eq!(c.key, "asia_range_liquidity_sweep");
        assert_eq!(c.label, "Asia range liquidity sweep");
    }

    #[test]
    fn default_labels_have_distinct_keys() {
        let mut keys: Vec<String> = DEFAULT_CONDITIONS
            .iter()
            .map(|l| ConditionRef::from_label(l).unwrap().key)
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), DEFAULT_CONDITIONS.len());
    }
}
