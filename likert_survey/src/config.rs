// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

/// Lowest point of the agreement scale.
pub const SCALE_MIN: u8 = 1;
/// Highest point of the agreement scale.
pub const SCALE_MAX: u8 = 5;

/// The label used for "not applicable", both when reading answers and when exporting them.
pub const NOT_APPLICABLE: &str = "N/A";

/// One statement of the questionnaire.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Item {
    /// The dimension this item belongs to.
    pub block: String,
    /// Short code, unique within a catalog.
    pub id: String,
    /// The prompt shown to the respondent.
    pub text: String,
    /// Reverse-scored items are counted as (min + max) - answer.
    pub reversed: bool,
}

impl Item {
    pub fn new(block: &str, id: &str, text: &str, reversed: bool) -> Item {
        Item {
            block: block.to_string(),
            id: id.to_string(),
            text: text.to_string(),
            reversed,
        }
    }
}

/// A single answer on the form.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Answer {
    /// The respondent considers the statement does not apply.
    NotApplicable,
    /// A point on the scale, guaranteed to be within [SCALE_MIN, SCALE_MAX].
    Scale(u8),
}

impl Answer {
    /// Builds an answer from a scale value, rejecting anything outside of the scale.
    pub fn scale(value: u8) -> Result<Answer, SurveyError> {
        if (SCALE_MIN..=SCALE_MAX).contains(&value) {
            Ok(Answer::Scale(value))
        } else {
            Err(SurveyError::InvalidAnswer(value.to_string()))
        }
    }

    /// Parses the textual form of an answer: "N/A" (any case) or a digit of the scale.
    pub fn parse(s: &str) -> Result<Answer, SurveyError> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(NOT_APPLICABLE) {
            return Ok(Answer::NotApplicable);
        }
        match trimmed.parse::<u8>() {
            Ok(x) => Answer::scale(x).map_err(|_| SurveyError::InvalidAnswer(s.to_string())),
            Err(_) => Err(SurveyError::InvalidAnswer(s.to_string())),
        }
    }

    pub fn value(&self) -> Option<u8> {
        match self {
            Answer::NotApplicable => None,
            Answer::Scale(x) => Some(*x),
        }
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::NotApplicable => write!(f, "{}", NOT_APPLICABLE),
            Answer::Scale(x) => write!(f, "{}", x),
        }
    }
}

/// The answers collected for one submission, keyed by item id.
///
/// Ids are not checked here. Use `ResponseBuilder` to only accept the ids of a catalog.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Response {
    pub(crate) answers: HashMap<String, Answer>,
}

impl Response {
    pub fn new() -> Response {
        Response::default()
    }

    pub fn get(&self, item_id: &str) -> Option<Answer> {
        self.answers.get(item_id).cloned()
    }

    /// Records an answer, replacing any previous one. Returns the previous answer.
    pub fn set(&mut self, item_id: &str, answer: Answer) -> Option<Answer> {
        self.answers.insert(item_id.to_string(), answer)
    }

    pub fn clear(&mut self, item_id: &str) -> Option<Answer> {
        self.answers.remove(item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// The number of answers that are on the scale (not "N/A").
    pub fn valid_count(&self) -> usize {
        self.answers
            .values()
            .filter(|a| matches!(a, Answer::Scale(_)))
            .count()
    }
}

// ******** Output data structures *********

/// An item together with the answer given and its direction-corrected score.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScoredResponse {
    pub block: String,
    pub item_id: String,
    pub text: String,
    /// None when the item was left unanswered.
    pub raw_answer: Option<Answer>,
    /// None for unanswered and "N/A" items.
    pub score: Option<u8>,
}

/// Mean score of one block, rounded to 2 decimals.
#[derive(PartialEq, Debug, Clone)]
pub struct BlockSummary {
    pub block: String,
    pub mean: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScoreSummary {
    /// Mean over all the scorable answers, 0 when there are none.
    pub overall_mean: f64,
    /// Blocks with at least one scorable answer, lowest mean first.
    pub blocks: Vec<BlockSummary>,
    pub items: Vec<ScoredResponse>,
}

/// Errors raised when building catalogs and responses, or when submitting them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SurveyError {
    EmptyCatalog,
    DuplicateItem(String),
    UnknownItem(String),
    InvalidAnswer(String),
    /// The submission gate is closed: (valid answers, catalog size).
    NotEnoughAnswers(usize, usize),
    EmptySubmission,
    UnknownSession(String),
}

impl Error for SurveyError {}

impl Display for SurveyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurveyError::EmptyCatalog => write!(f, "the item catalog is empty"),
            SurveyError::DuplicateItem(id) => write!(f, "item id {} appears more than once", id),
            SurveyError::UnknownItem(id) => write!(f, "unknown item id {}", id),
            SurveyError::InvalidAnswer(s) => write!(
                f,
                "invalid answer {:?}: expected {} or a value from {} to {}",
                s, NOT_APPLICABLE, SCALE_MIN, SCALE_MAX
            ),
            SurveyError::NotEnoughAnswers(valid, total) => write!(
                f,
                "not enough answers to submit: {}/{} valid",
                valid, total
            ),
            SurveyError::EmptySubmission => write!(f, "no responses were filled in"),
            SurveyError::UnknownSession(id) => write!(f, "unknown or expired session {}", id),
        }
    }
}

// ********* Configuration **********

/// Whether the submission gate applies.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum GateMode {
    /// Only an empty response is refused.
    Open,
    /// At least half of the catalog must have a valid answer.
    HalfOfCatalog,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyRules {
    pub gate: GateMode,
    /// Organization used when a request carries no link parameters at all.
    pub default_organization: String,
    /// Idle time after which a session is torn down.
    pub session_ttl_secs: u64,
}

impl SurveyRules {
    pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

    pub fn new(default_organization: &str) -> SurveyRules {
        SurveyRules {
            gate: GateMode::HalfOfCatalog,
            default_organization: default_organization.to_string(),
            session_ttl_secs: SurveyRules::DEFAULT_SESSION_TTL_SECS,
        }
    }
}
