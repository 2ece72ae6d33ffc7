//! JSON rendering for question tables.

use crate::error::{Error, Result};
use crate::model::QuestionTable;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a question table to JSON.
///
/// Rows keep the table's column names; absent answers and figures are `null`.
pub fn to_json(table: &QuestionTable, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(table),
        JsonFormat::Compact => serde_json::to_string(table),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Letter, QuestionBlock, QuestionRecord};

    fn table() -> QuestionTable {
        let mut record = QuestionRecord::from_block(QuestionBlock {
            number: 1,
            stem: "What is H₂O?".to_string(),
            options: [
                "Water".to_string(),
                "Ice".to_string(),
                "Steam".to_string(),
                "Gas".to_string(),
            ],
        });
        record.answer = Some(Letter::A);
        QuestionTable::new(vec![record], 2)
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&table(), JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"Question\": \"What is H₂O?\""));
        assert!(json.contains("\"answer\": \"A\""));
        assert!(json.contains("\"Figure\": null"));
        assert!(json.contains("\"missing\""));
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&table(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
        let parsed: QuestionTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, table());
    }
}
