use crate::ids::RootName;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_OPERATION_LOG_LIMIT: usize = 1000;

/// Document settings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DocumentConfig {
    /// Maximum number of batches kept on the undo stack. `0` keeps every batch.
    pub history_limit: usize,
    /// Maximum number of applied operations kept for `operations_since`, remote
    /// transformation and undo. Undo entries that need trimmed operations are dropped.
    /// `0` keeps every operation.
    pub operation_log_limit: usize,
    /// Root created by `Document::new` and used by dev utilities when no root is given.
    pub default_root: RootName,
    /// Merge adjacent text changes of the same kind in diffs.
    pub coalesce_text_changes: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            operation_log_limit: DEFAULT_OPERATION_LOG_LIMIT,
            default_root: RootName::main(),
            coalesce_text_changes: true,
        }
    }
}

impl DocumentConfig {
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_operation_log_limit(mut self, limit: usize) -> Self {
        self.operation_log_limit = limit;
        self
    }

    pub fn with_default_root(mut self, root: impl Into<RootName>) -> Self {
        self.default_root = root.into();
        self
    }

    pub fn with_coalesce_text_changes(mut self, coalesce: bool) -> Self {
        self.coalesce_text_changes = coalesce;
        self
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: DocumentConfig = serde_json::from_str(r#"{"history_limit": 5}"#).unwrap();
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.operation_log_limit, DEFAULT_OPERATION_LOG_LIMIT);
        assert_eq!(config.default_root, RootName::main());
        assert!(config.coalesce_text_changes);
    }
}
