//! Feedback CSV ingestion and corpus building.
//!
//! The only structurally required column is `feedback` (exact name); every
//! other column rides along for the upload preview. One analysis run builds
//! one corpus, uses it, and drops it.

use crate::error::{LensError, Result};

/// The column that must be present in every uploaded CSV
pub const FEEDBACK_COLUMN: &str = "feedback";

/// A validated upload: column names, preview rows, and the feedback column values
#[derive(Debug, Clone, serde::Serialize)]
pub struct FeedbackBatch {
    pub columns: Vec<String>,
    /// First few rows, for the upload preview
    pub preview: Vec<Vec<String>>,
    /// Feedback column values in row order
    pub feedback: Vec<String>,
    pub record_count: usize,
}

/// Parse an uploaded CSV and validate the required `feedback` column.
///
/// Short rows are tolerated (missing trailing fields read as empty); a
/// missing `feedback` header is a validation error, not a crash.
pub fn parse_feedback_csv(data: &str, preview_rows: usize) -> Result<FeedbackBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data.as_bytes());

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let feedback_idx = columns
        .iter()
        .position(|c| c == FEEDBACK_COLUMN)
        .ok_or_else(|| {
            LensError::validation(format!("CSV must have a '{}' column", FEEDBACK_COLUMN))
        })?;

    let mut feedback = Vec::new();
    let mut preview = Vec::new();
    for record in reader.records() {
        let record = record?;
        if preview.len() < preview_rows {
            preview.push(record.iter().map(|f| f.to_string()).collect());
        }
        feedback.push(record.get(feedback_idx).unwrap_or("").to_string());
    }

    Ok(FeedbackBatch {
        columns,
        preview,
        record_count: feedback.len(),
        feedback,
    })
}

/// Join feedback rows into the single corpus blob sent to the model.
/// Rows are joined with a single space, preserving row order.
pub fn build_corpus(rows: &[String]) -> String {
    rows.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
customer,feedback
alice,App is slow to load
bob,\"Please add dark mode, it helps at night\"
carol,Support never answered my ticket
";

    #[test]
    fn parses_rows_and_preserves_order() {
        let batch = parse_feedback_csv(SAMPLE, 5).unwrap();
        assert_eq!(batch.record_count, 3);
        assert_eq!(batch.feedback[0], "App is slow to load");
        assert_eq!(
            batch.feedback[1],
            "Please add dark mode, it helps at night"
        );
        assert_eq!(batch.feedback[2], "Support never answered my ticket");
    }

    #[test]
    fn missing_feedback_column_is_a_validation_error() {
        let err = parse_feedback_csv("name,comment\na,b\n", 5).unwrap_err();
        match err {
            LensError::Validation { message } => {
                assert!(message.contains("feedback"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn preview_is_capped() {
        let batch = parse_feedback_csv(SAMPLE, 2).unwrap();
        assert_eq!(batch.preview.len(), 2);
        assert_eq!(batch.record_count, 3);
        assert_eq!(batch.preview[0], vec!["alice", "App is slow to load"]);
    }

    #[test]
    fn short_rows_read_feedback_as_empty() {
        let batch = parse_feedback_csv("feedback,extra\nonly feedback\n", 5).unwrap();
        assert_eq!(batch.feedback, vec!["only feedback"]);
    }

    #[test]
    fn headers_only_yields_zero_records() {
        let batch = parse_feedback_csv("customer,feedback\n", 5).unwrap();
        assert_eq!(batch.record_count, 0);
        assert!(batch.preview.is_empty());
    }

    #[test]
    fn corpus_joins_with_single_spaces_in_order() {
        let rows = vec![
            "first".to_string(),
            "second".to_string(),
            "third".to_string(),
        ];
        let corpus = build_corpus(&rows);
        assert_eq!(corpus, "first second third");
        // Length is at least the sum of the parts, and order survives.
        let total: usize = rows.iter().map(|r| r.len()).sum();
        assert!(corpus.len() >= total);
        assert!(corpus.find("first").unwrap() < corpus.find("second").unwrap());
    }

    #[test]
    fn empty_row_list_builds_empty_corpus() {
        assert_eq!(build_corpus(&[]), "");
    }
}
