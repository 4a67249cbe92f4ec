pub use crate::catalog::Catalog;
pub use crate::config::*;

/// A builder for collecting the answers of one respondent.
///
/// Only the ids of the catalog are accepted.
///
/// ```
/// use likert_survey::builder::ResponseBuilder;
/// use likert_survey::Catalog;
/// # use likert_survey::SurveyError;
///
/// let catalog = Catalog::builtin();
/// let mut builder = ResponseBuilder::new(&catalog);
///
/// builder.add_answer_str("RE01", "4")?;
/// builder.add_answer_str("EX01", "N/A")?;
///
/// let response = builder.build();
/// assert_eq!(response.valid_count(), 1);
/// # Ok::<(), SurveyError>(())
/// ```
pub struct ResponseBuilder<'a> {
    pub(crate) _catalog: &'a Catalog,
    pub(crate) _response: Response,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(catalog: &'a Catalog) -> ResponseBuilder<'a> {
        ResponseBuilder {
            _catalog: catalog,
            _response: Response::new(),
        }
    }

    /// Starts from answers collected previously, for instance in a session.
    pub fn from_response(catalog: &'a Catalog, response: &Response) -> ResponseBuilder<'a> {
        ResponseBuilder {
            _catalog: catalog,
            _response: response.clone(),
        }
    }

    /// Records the answer for an item, replacing any previous one.
    pub fn add_answer(&mut self, item_id: &str, answer: Answer) -> Result<(), SurveyError> {
        if !self._catalog.contains(item_id) {
            return Err(SurveyError::UnknownItem(item_id.to_string()));
        }
        self._response.set(item_id, answer);
        Ok(())
    }

    /// Parses and records an answer given in its textual form ("N/A", "1" to "5").
    pub fn add_answer_str(&mut self, item_id: &str, answer: &str) -> Result<(), SurveyError> {
        let a = Answer::parse(answer)?;
        self.add_answer(item_id, a)
    }

    pub fn response(&self) -> &Response {
        &self._response
    }

    pub fn build(self) -> Response {
        self._response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_items() {
        let catalog = Catalog::builtin();
        let mut b = ResponseBuilder::new(&catalog);
        assert_eq!(
            b.add_answer("ZZ99", Answer::Scale(3)),
            Err(SurveyError::UnknownItem("ZZ99".to_string()))
        );
        assert!(b.response().is_empty());
    }

    #[test]
    fn later_answers_replace_earlier_ones() {
        let catalog = Catalog::builtin();
        let mut b = ResponseBuilder::new(&catalog);
        b.add_answer_str("RE01", "2").unwrap();
        b.add_answer_str("RE01", "n/a").unwrap();
        let r = b.build();
        assert_eq!(r.get("RE01"), Some(Answer::NotApplicable));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn invalid_answer_is_not_recorded() {
        let catalog = Catalog::builtin();
        let mut b = ResponseBuilder::new(&catalog);
        assert!(b.add_answer_str("RE01", "7").is_err());
        assert_eq!(b.response().get("RE01"), None);
    }
}
