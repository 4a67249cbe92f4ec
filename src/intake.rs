use log::{debug, info, warn};

use likert_survey::export::export_rows;
use likert_survey::gate::{check_submission, gate_status, GateStatus};
use likert_survey::link::{sign_link, validate_link, LinkStatus};
use likert_survey::session::{Identity, Session, SessionStore};
use likert_survey::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::intake::config_reader::*;
use crate::intake::store::{RowStore, StoreError};

pub mod config_reader;
mod form;
mod io_responses;
mod links;
pub mod store;

#[derive(Debug, Snafu)]
pub enum IntakeError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid catalog {path}: {source}"))]
    InvalidCatalog { source: SurveyError, path: String },
    #[snafu(display("No link secret configured: set linkSecret or the variable {env}"))]
    MissingSecret { env: String },
    #[snafu(display("Invalid store configuration: {message}"))]
    StoreSettings { message: String },
    #[snafu(display("The store {store} cannot be reached"))]
    StoreUnavailable { source: StoreError, store: String },

    #[snafu(display("Could not read the link {link:?}"))]
    ParsingLink {
        source: serde_urlencoded::de::Error,
        link: String,
    },
    #[snafu(display("Could not encode the link"))]
    EncodingLink { source: serde_urlencoded::ser::Error },
    #[snafu(display("The link is incomplete"))]
    LinkMissingParams {},
    #[snafu(display("The link signature is not valid"))]
    LinkInvalidSignature {},
    #[snafu(display("The link has expired"))]
    LinkExpired {},

    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet {name:?}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("The worksheet is empty"))]
    EmptyExcel {},
    #[snafu(display("Line {lineno}: unexpected cell {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Line {lineno}: could not be parsed"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Line {lineno}: expected an item id and an answer"))]
    CsvLineTooShort { lineno: usize },
    #[snafu(display("Line {lineno}: {source}"))]
    InvalidAnswerLine { source: SurveyError, lineno: usize },
    #[snafu(display("Item {item_id}: {source}"))]
    InvalidAnswerItem {
        source: SurveyError,
        item_id: String,
    },
    #[snafu(display("Unknown input type {input_type:?}: expected csv, xlsx or json"))]
    UnknownInputType { input_type: String },

    #[snafu(display("Submission refused: {source}"))]
    SubmissionRefused { source: SurveyError },
    #[snafu(display("Could not append the rows to {store}"))]
    AppendFailed { source: StoreError, store: String },

    #[snafu(display("Error reading the terminal"))]
    Terminal { source: std::io::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

/// How an error affects the rest of the program.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorKind {
    /// The program cannot run with this configuration.
    Configuration,
    /// The form is not available for this link.
    LinkValidation,
    /// The answers were kept but not stored.
    Submission,
    /// Bad input files or terminal.
    Input,
}

impl IntakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntakeError::OpeningFile { .. }
            | IntakeError::ParsingJson { .. }
            | IntakeError::InvalidCatalog { .. }
            | IntakeError::MissingSecret { .. }
            | IntakeError::StoreSettings { .. }
            | IntakeError::StoreUnavailable { .. } => ErrorKind::Configuration,
            IntakeError::ParsingLink { .. }
            | IntakeError::LinkMissingParams {}
            | IntakeError::LinkInvalidSignature {}
            | IntakeError::LinkExpired {} => ErrorKind::LinkValidation,
            IntakeError::SubmissionRefused { .. } | IntakeError::AppendFailed { .. } => {
                ErrorKind::Submission
            }
            _ => ErrorKind::Input,
        }
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn submission_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn today() -> String {
    chrono::Local::now().format("%d/%m/%Y").to_string()
}

fn link_result(status: LinkStatus) -> IntakeResult<String> {
    match status {
        LinkStatus::Valid(org) => Ok(org),
        LinkStatus::Expired => LinkExpiredSnafu {}.fail(),
        LinkStatus::InvalidSignature => LinkInvalidSignatureSnafu {}.fail(),
        LinkStatus::MissingParams => LinkMissingParamsSnafu {}.fail(),
    }
}

/// Resolves the organization of a request. No link at all means open access.
fn resolve_organization(
    config: &IntakeConfig,
    link: Option<&str>,
    now: u64,
) -> IntakeResult<String> {
    let rules = config.rules();
    let params = match link {
        Some(l) => links::parse_link(l)?,
        None => return Ok(rules.default_organization),
    };
    // Incomplete links are rejected without looking at the secret.
    let secret = if links::has_all_params(&params) {
        config.link_secret()?
    } else {
        Vec::new()
    };
    link_result(validate_link(
        &params,
        &secret,
        &rules.default_organization,
        now,
    ))
}

fn build_summary_js(
    identity: &Identity,
    summary: &ScoreSummary,
    gate: &GateStatus,
    observations: &Option<String>,
) -> JSValue {
    let blocks: Vec<JSValue> = summary
        .blocks
        .iter()
        .map(|b| json!({"block": b.block, "mean": b.mean}))
        .collect();
    let items: Vec<JSValue> = summary
        .items
        .iter()
        .map(|sr| {
            json!({
                "block": sr.block,
                "item": sr.item_id,
                "answer": sr.raw_answer.map(|a| a.to_string()).unwrap_or_else(|| NOT_APPLICABLE.to_string()),
                "score": sr.score,
            })
        })
        .collect();
    json!({
        "respondent": identity.respondent,
        "organization": identity.organization,
        "date": identity.date,
        "overallMean": (summary.overall_mean * 100.0).round() / 100.0,
        "validCount": gate.valid,
        "itemCount": gate.total,
        "blocks": blocks,
        "items": items,
        "observations": observations,
    })
}

fn write_output(out: &str, contents: &str) -> IntakeResult<()> {
    if out == "stdout" {
        println!("{}", contents);
        Ok(())
    } else {
        info!("Writing summary to {:?}", out);
        fs::write(out, contents).context(WritingOutputSnafu { path: out })
    }
}

fn check_reference(reference_path: &str, computed: &str) -> IntakeResult<()> {
    let contents =
        fs::read_to_string(reference_path).context(OpeningFileSnafu {
            path: reference_path,
        })?;
    let reference: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {
        path: reference_path,
    })?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {
        path: reference_path,
    })?;
    if pretty_reference != computed {
        warn!("Found differences with the reference summary");
        print_diff(pretty_reference.as_str(), computed, "\n");
        whatever!("Difference detected between calculated summary and reference summary")
    }
    Ok(())
}

/// Checks the answers of a session, scores them and appends the rows to the store.
///
/// On failure the session is left untouched, so that the submission can be retried.
pub fn submit_session(
    catalog: &Catalog,
    rules: &SurveyRules,
    session: &mut Session,
    store: &dyn RowStore,
    timestamp: &str,
) -> IntakeResult<ScoreSummary> {
    let status =
        check_submission(catalog, &session.responses, rules.gate).context(SubmissionRefusedSnafu)?;
    info!(
        "submit_session: session {} {}",
        session.id,
        status.progress()
    );
    let summary = score_responses(catalog, &session.responses);
    let rows = export_rows(&summary.items, &session.identity, timestamp);
    let count = store.append_rows(&rows).context(AppendFailedSnafu {
        store: store.describe(),
    })?;
    info!("submit_session: appended {} rows to {}", count, store.describe());
    session.submitted = true;
    Ok(summary)
}

fn open_store(config: &IntakeConfig) -> IntakeResult<Box<dyn RowStore>> {
    let settings = match &config.store {
        Some(s) => s,
        None => whatever!("No store configured: add a \"store\" section to the configuration"),
    };
    let store = store::make_store(settings, config)?;
    // Unreachable stores stop everything before the respondent starts typing.
    store.probe().context(StoreUnavailableSnafu {
        store: store.describe(),
    })?;
    Ok(store)
}

fn load_config(config_path: Option<&str>) -> IntakeResult<IntakeConfig> {
    match config_path {
        Some(p) => read_config(p),
        None => Ok(IntakeConfig::default()),
    }
}

fn link_expiry(now: u64, valid_for_hours: u64) -> IntakeResult<u64> {
    match valid_for_hours
        .checked_mul(3600)
        .and_then(|secs| now.checked_add(secs))
    {
        Some(expiry) => Ok(expiry),
        None => whatever!("A validity of {} hours is too long", valid_for_hours),
    }
}

pub fn run_sign(
    config_path: Option<&str>,
    organization: &str,
    valid_for_hours: u64,
    base_url: Option<&str>,
) -> IntakeResult<()> {
    let config = load_config(config_path)?;
    let secret = config.link_secret()?;
    let expiry = link_expiry(unix_now(), valid_for_hours)?;
    let grant = match sign_link(organization, expiry, &secret) {
        Some(g) => g,
        None => whatever!("Could not sign the link"),
    };
    info!(
        "Signed link for {:?}, expires at {}",
        grant.organization, grant.expiry
    );
    let query = links::to_query(&grant)?;
    match base_url {
        Some(base) => println!("{}", links::link_url(base, &query)),
        None => println!("{}", query),
    }
    Ok(())
}

pub fn run_verify(config_path: Option<&str>, link: &str) -> IntakeResult<()> {
    let config = load_config(config_path)?;
    let organization = resolve_organization(&config, Some(link), unix_now())?;
    println!("valid: {}", organization);
    Ok(())
}

pub struct ScoreOptions<'a> {
    pub input: &'a str,
    pub input_type: Option<&'a str>,
    pub worksheet: Option<&'a str>,
    pub link: Option<&'a str>,
    pub respondent: Option<&'a str>,
    pub date: Option<&'a str>,
    pub out: Option<&'a str>,
    pub reference: Option<&'a str>,
    pub submit: bool,
}

pub fn run_score(config_path: Option<&str>, opts: &ScoreOptions) -> IntakeResult<()> {
    let config = load_config(config_path)?;
    let rules = config.rules();
    let catalog = read_catalog(&config)?;
    let organization = resolve_organization(&config, opts.link, unix_now())?;

    let responses = io_responses::read_responses(
        opts.input,
        opts.input_type,
        opts.worksheet,
        &catalog,
    )?;
    let identity = Identity {
        respondent: opts.respondent.unwrap_or_default().to_string(),
        date: opts.date.map(|d| d.to_string()).unwrap_or_else(today),
        organization,
    };

    let summary = score_responses(&catalog, &responses);
    let gate = gate_status(&catalog, &responses, rules.gate);
    let summary_js = build_summary_js(&identity, &summary, &gate, &None);
    let pretty_summary = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {
        path: "<summary>",
    })?;

    match opts.out {
        Some(out) => write_output(out, &pretty_summary)?,
        None => form::render_results(&mut std::io::stdout(), &summary, &gate)
            .context(TerminalSnafu)?,
    }

    if let Some(reference) = opts.reference {
        check_reference(reference, &pretty_summary)?;
    }

    if opts.submit {
        let store = open_store(&config)?;
        let mut sessions = SessionStore::new(rules.session_ttl_secs);
        let session = sessions.open(None, &identity.organization, unix_now());
        session.identity = identity;
        session.responses = responses;
        submit_session(&catalog, &rules, session, store.as_ref(), &submission_timestamp())?;
        println!("Submitted {} rows to {}", catalog.len(), store.describe());
    }
    Ok(())
}

pub struct FillOptions<'a> {
    pub link: Option<&'a str>,
    pub respondent: Option<&'a str>,
    pub date: Option<&'a str>,
}

pub fn run_fill(config_path: Option<&str>, opts: &FillOptions) -> IntakeResult<()> {
    let config = load_config(config_path)?;
    let catalog = read_catalog(&config)?;
    let store = open_store(&config)?;
    let organization = resolve_organization(&config, opts.link, unix_now())?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    let ctx = form::FormContext {
        title: config.form_title(),
        catalog: &catalog,
        rules: config.rules(),
        store: store.as_ref(),
        now: unix_now,
        timestamp: submission_timestamp,
    };
    let start = form::FormStart {
        organization,
        respondent: opts.respondent.map(|r| r.to_string()),
        date: opts.date.map(|d| d.to_string()).unwrap_or_else(today),
    };
    form::run_form(&ctx, start, &mut input, &mut output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::store::{MemoryStore, StoreResult};
    use likert_survey::export::ExportRow;
    use likert_survey::link::LinkGrant;

    struct FailingStore {}

    impl RowStore for FailingStore {
        fn describe(&self) -> String {
            "failing".to_string()
        }
        fn probe(&self) -> StoreResult<()> {
            Ok(())
        }
        fn append_rows(&self, _rows: &[ExportRow]) -> StoreResult<usize> {
            Err(StoreError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    fn session_with(answers: &[(&str, u8)]) -> Session {
        let mut sessions = SessionStore::new(60);
        let session = sessions.open(None, "Acme", 0);
        session.identity.respondent = "Jo".to_string();
        session.identity.date = "19/10/2026".to_string();
        for (id, x) in answers {
            session.responses.set(id, Answer::Scale(*x));
        }
        session.clone()
    }

    #[test]
    fn submit_appends_all_rows() {
        let catalog = Catalog::builtin();
        let rules = SurveyRules::new("Open");
        let store = MemoryStore::default();
        let mut session = session_with(&[
            ("RE01", 4),
            ("RE02", 4),
            ("SE01", 2),
            ("SE02", 2),
            ("EX01", 1),
        ]);
        let summary =
            submit_session(&catalog, &rules, &mut session, &store, "2026-10-19T10:00:00").unwrap();
        assert!(session.submitted);
        assert_eq!(summary.blocks[0].block, "Health and Safety");
        let rows = store.rows();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0][3].to_string(), "Acme");
    }

    #[test]
    fn gate_blocks_submission() {
        let catalog = Catalog::builtin();
        let rules = SurveyRules::new("Open");
        let store = MemoryStore::default();
        let mut session = session_with(&[("RE01", 4), ("RE02", 4), ("SE01", 2), ("SE02", 2)]);
        let res = submit_session(&catalog, &rules, &mut session, &store, "t");
        assert!(matches!(
            res,
            Err(IntakeError::SubmissionRefused {
                source: SurveyError::NotEnoughAnswers(4, 10)
            })
        ));
        assert!(store.rows().is_empty());
        assert!(!session.submitted);
    }

    #[test]
    fn failed_append_keeps_the_answers() {
        let catalog = Catalog::builtin();
        let rules = SurveyRules::new("Open");
        let mut session = session_with(&[
            ("RE01", 4),
            ("RE02", 4),
            ("SE01", 2),
            ("SE02", 2),
            ("EX01", 1),
        ]);
        let before = session.clone();
        let err = submit_session(&catalog, &rules, &mut session, &FailingStore {}, "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Submission);
        assert_eq!(session, before);
    }

    #[test]
    fn organization_from_links() {
        let config = IntakeConfig {
            default_organization: Some("Open Institute".to_string()),
            link_secret: Some("k".to_string()),
            ..IntakeConfig::default()
        };
        let now = 1_700_000_000;
        assert_eq!(
            resolve_organization(&config, None, now).unwrap(),
            "Open Institute"
        );
        assert_eq!(
            resolve_organization(&config, Some("https://forms.example.org/"), now).unwrap(),
            "Open Institute"
        );
        let grant: LinkGrant = sign_link("Acme & Sons", now + 60, b"k").unwrap();
        let link = links::link_url("https://forms.example.org/", &links::to_query(&grant).unwrap());
        assert_eq!(
            resolve_organization(&config, Some(&link), now).unwrap(),
            "Acme & Sons"
        );
        let err = resolve_organization(&config, Some(&link), now + 61).unwrap_err();
        assert!(matches!(err, IntakeError::LinkExpired {}));
        assert_eq!(err.kind(), ErrorKind::LinkValidation);
        let err = resolve_organization(&config, Some("org=Acme"), now).unwrap_err();
        assert!(matches!(err, IntakeError::LinkMissingParams {}));
    }

    #[test]
    fn incomplete_link_without_secret() {
        let config = IntakeConfig {
            link_secret_env: Some("INTAKE_TEST_SECRET_THAT_IS_NOT_SET".to_string()),
            ..IntakeConfig::default()
        };
        let err = resolve_organization(&config, Some("org=Acme"), 1_700_000_000).unwrap_err();
        assert!(matches!(err, IntakeError::LinkMissingParams {}));
        assert_eq!(err.kind(), ErrorKind::LinkValidation);
        let err = resolve_organization(&config, Some("org=Acme&exp=1&sig=ff"), 0).unwrap_err();
        assert!(matches!(err, IntakeError::MissingSecret { .. }));
    }

    #[test]
    fn expiry_of_signed_links() {
        assert_eq!(link_expiry(1_700_000_000, 72).unwrap(), 1_700_259_200);
        assert!(link_expiry(1_700_000_000, u64::MAX / 1000).is_err());
        assert!(link_expiry(u64::MAX - 10, 1).is_err());
    }

    #[test]
    fn summary_json() {
        let catalog = Catalog::builtin();
        let mut r = Response::new();
        r.set("RE01", Answer::Scale(4));
        r.set("EX02", Answer::Scale(2));
        let summary = score_responses(&catalog, &r);
        let gate = gate_status(&catalog, &r, GateMode::HalfOfCatalog);
        let identity = Identity {
            respondent: "Jo".to_string(),
            date: "19/10/2026".to_string(),
            organization: "Acme".to_string(),
        };
        let js = build_summary_js(&identity, &summary, &gate, &Some("ok".to_string()));
        assert_eq!(js["overallMean"], json!(4.0));
        assert_eq!(js["validCount"], json!(2));
        assert_eq!(js["itemCount"], json!(10));
        assert_eq!(js["blocks"].as_array().unwrap().len(), 2);
        assert_eq!(js["items"][1]["answer"], json!("N/A"));
        assert_eq!(js["items"][1]["score"], JSValue::Null);
        assert_eq!(js["items"][9]["score"], json!(4));
        assert_eq!(js["observations"], json!("ok"));
    }
}
