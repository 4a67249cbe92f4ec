use log::debug;

use crate::catalog::Catalog;
use crate::config::*;

/// Where a response stands with respect to submission.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct GateStatus {
    /// Answers on the scale (not "N/A").
    pub valid: usize,
    /// Answers of any kind, "N/A" included.
    pub answered: usize,
    pub total: usize,
    pub open: bool,
}

impl GateStatus {
    /// The progress message shown next to the submit action.
    pub fn progress(&self) -> String {
        format!("{}/{} valid", self.valid, self.total)
    }
}

/// Submission requires at least half of the catalog answered on the scale.
pub fn half_answered(valid: usize, total: usize) -> bool {
    2 * valid >= total
}

/// Evaluates the gate for a response. Only ids of the catalog are counted.
pub fn gate_status(catalog: &Catalog, response: &Response, mode: GateMode) -> GateStatus {
    let mut valid = 0;
    let mut answered = 0;
    for item in catalog.items() {
        match response.get(&item.id) {
            Some(Answer::Scale(_)) => {
                valid += 1;
                answered += 1;
            }
            Some(Answer::NotApplicable) => answered += 1,
            None => {}
        }
    }
    let total = catalog.len();
    let open = answered > 0
        && match mode {
            GateMode::Open => true,
            GateMode::HalfOfCatalog => half_answered(valid, total),
        };
    debug!(
        "gate_status: valid: {} answered: {} total: {} mode: {:?} open: {}",
        valid, answered, total, mode, open
    );
    GateStatus {
        valid,
        answered,
        total,
        open,
    }
}

/// Refuses empty responses, and responses below the threshold when the gate is enabled.
pub fn check_submission(
    catalog: &Catalog,
    response: &Response,
    mode: GateMode,
) -> Result<GateStatus, SurveyError> {
    let status = gate_status(catalog, response, mode);
    if status.answered == 0 {
        return Err(SurveyError::EmptySubmission);
    }
    if !status.open {
        return Err(SurveyError::NotEnoughAnswers(status.valid, status.total));
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_valid(catalog: &Catalog, n: usize) -> Response {
        let mut r = Response::new();
        for item in catalog.items().iter().take(n) {
            r.set(&item.id, Answer::Scale(3));
        }
        r
    }

    #[test]
    fn threshold_on_ten_items() {
        let catalog = Catalog::builtin();
        let four = with_valid(&catalog, 4);
        assert_eq!(
            check_submission(&catalog, &four, GateMode::HalfOfCatalog),
            Err(SurveyError::NotEnoughAnswers(4, 10))
        );
        assert_eq!(
            gate_status(&catalog, &four, GateMode::HalfOfCatalog).progress(),
            "4/10 valid"
        );
        let five = with_valid(&catalog, 5);
        let status = check_submission(&catalog, &five, GateMode::HalfOfCatalog).unwrap();
        assert!(status.open);
        assert_eq!(status.progress(), "5/10 valid");
    }

    #[test]
    fn odd_catalog_size_rounds_up() {
        assert!(!half_answered(2, 5));
        assert!(half_answered(3, 5));
        assert!(half_answered(0, 0));
    }

    #[test]
    fn not_applicable_is_not_valid() {
        let catalog = Catalog::builtin();
        let mut r = with_valid(&catalog, 4);
        for item in catalog.items().iter().skip(4) {
            r.set(&item.id, Answer::NotApplicable);
        }
        let s = gate_status(&catalog, &r, GateMode::HalfOfCatalog);
        assert_eq!((s.valid, s.answered, s.open), (4, 10, false));
        // Without the gate, any non-empty response goes through.
        assert!(check_submission(&catalog, &r, GateMode::Open).is_ok());
    }

    #[test]
    fn empty_response_is_always_refused() {
        let catalog = Catalog::builtin();
        let r = Response::new();
        assert_eq!(
            check_submission(&catalog, &r, GateMode::Open),
            Err(SurveyError::EmptySubmission)
        );
        assert_eq!(
            check_submission(&catalog, &r, GateMode::HalfOfCatalog),
            Err(SurveyError::EmptySubmission)
        );
    }

    #[test]
    fn ids_outside_of_the_catalog_are_ignored() {
        let catalog = Catalog::builtin();
        let mut r = Response::new();
        r.set("NOPE", Answer::Scale(4));
        assert_eq!(
            check_submission(&catalog, &r, GateMode::Open),
            Err(SurveyError::EmptySubmission)
        );
    }
}
