use std::fmt::Display;

use crate::config::*;
use crate::session::Identity;

/// Column names of the exported rows, in order.
pub const EXPORT_HEADER: [&str; 8] = [
    "Timestamp",
    "Respondent",
    "Date",
    "Organization",
    "Block",
    "Item",
    "Answer",
    "Score",
];

/// A cell of an exported row. Numbers stay numbers so that spreadsheets can compute on them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ExportCell {
    Text(String),
    Number(u8),
}

impl ExportCell {
    fn text(s: &str) -> ExportCell {
        ExportCell::Text(s.to_string())
    }

    fn not_applicable() -> ExportCell {
        ExportCell::text(NOT_APPLICABLE)
    }
}

impl Display for ExportCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportCell::Text(s) => write!(f, "{}", s),
            ExportCell::Number(x) => write!(f, "{}", x),
        }
    }
}

pub type ExportRow = Vec<ExportCell>;

/// Builds one row per catalog item, unanswered items included.
///
/// Arguments:
/// * `items` the scored items, as produced by `score_responses`
/// * `identity` the respondent, date and organization of the submission
/// * `timestamp` the submission time (ISO-8601, second precision)
pub fn export_rows(items: &[ScoredResponse], identity: &Identity, timestamp: &str) -> Vec<ExportRow> {
    items
        .iter()
        .map(|sr| {
            let answer = match sr.raw_answer {
                Some(Answer::Scale(x)) => ExportCell::Number(x),
                Some(Answer::NotApplicable) | None => ExportCell::not_applicable(),
            };
            let score = match sr.score {
                Some(x) => ExportCell::Number(x),
                None => ExportCell::not_applicable(),
            };
            vec![
                ExportCell::text(timestamp),
                ExportCell::text(&identity.respondent),
                ExportCell::text(&identity.date),
                ExportCell::text(&identity.organization),
                ExportCell::text(&sr.block),
                ExportCell::text(&sr.text),
                answer,
                score,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{score_responses, Catalog};

    #[test]
    fn one_row_per_item() {
        let catalog = Catalog::builtin();
        let mut r = Response::new();
        r.set("RE01", Answer::Scale(4));
        r.set("RE02", Answer::NotApplicable);
        r.set("EX01", Answer::Scale(2));
        let summary = score_responses(&catalog, &r);
        let identity = Identity {
            respondent: "Jo".to_string(),
            date: "19/10/2026".to_string(),
            organization: "Acme".to_string(),
        };
        let rows = export_rows(&summary.items, &identity, "2026-10-19T10:00:00");
        assert_eq!(rows.len(), catalog.len());
        assert!(rows.iter().all(|r| r.len() == EXPORT_HEADER.len()));

        let first: Vec<String> = rows[0].iter().map(|c| c.to_string()).collect();
        assert_eq!(
            first,
            vec![
                "2026-10-19T10:00:00",
                "Jo",
                "19/10/2026",
                "Acme",
                "Rewards and Benefits",
                "The rewards and benefits policy is fair and clear.",
                "4",
                "4"
            ]
        );
        assert_eq!(rows[1][6], ExportCell::Text("N/A".to_string()));
        assert_eq!(rows[1][7], ExportCell::Text("N/A".to_string()));
        // Unanswered
        assert_eq!(rows[2][6], ExportCell::Text("N/A".to_string()));
        // EX01 is reversed: the raw answer is kept, the score is flipped.
        assert_eq!(rows[8][6], ExportCell::Number(2));
        assert_eq!(rows[8][7], ExportCell::Number(4));
    }
}
