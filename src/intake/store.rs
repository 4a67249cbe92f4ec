// Destinations of the exported rows.

use crate::intake::*;

use likert_survey::export::{ExportCell, ExportRow, EXPORT_HEADER};
use serde::Deserialize;
#[cfg(test)]
use std::cell::RefCell;
use std::fs::OpenOptions;

pub const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Snafu)]
pub enum StoreError {
    #[snafu(display("Error accessing {path}"))]
    FileAccess {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing CSV rows"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Request failed"))]
    Http { source: reqwest::Error },
    #[snafu(display("Unexpected HTTP status {status}: {body}"))]
    Status { status: u16, body: String },
    #[snafu(display("The spreadsheet has no worksheet {name:?}"))]
    NoSuchWorksheet { name: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An append-only table of rows.
pub trait RowStore {
    /// A short description for messages: the file or the spreadsheet and worksheet.
    fn describe(&self) -> String;

    /// Checks that the store is reachable and usable, without writing anything.
    fn probe(&self) -> StoreResult<()>;

    /// Appends all the rows in one operation. Returns the number of rows written.
    fn append_rows(&self, rows: &[ExportRow]) -> StoreResult<usize>;
}

pub fn make_store(settings: &StoreSettings, config: &IntakeConfig) -> IntakeResult<Box<dyn RowStore>> {
    match settings.provider.as_str() {
        "csv" => {
            let lpath = match &settings.file_path {
                Some(p) => p,
                None => {
                    return StoreSettingsSnafu {
                        message: "the csv store needs a filePath",
                    }
                    .fail()
                }
            };
            Ok(Box::new(CsvFileStore::new(config.resolve(lpath))))
        }
        "sheets" => {
            let spreadsheet_id = match &settings.spreadsheet_id {
                Some(id) => id.clone(),
                None => {
                    return StoreSettingsSnafu {
                        message: "the sheets store needs a spreadsheetId",
                    }
                    .fail()
                }
            };
            let worksheet = match &settings.worksheet {
                Some(w) => w.clone(),
                None => {
                    return StoreSettingsSnafu {
                        message: "the sheets store needs a worksheet",
                    }
                    .fail()
                }
            };
            let token = match (&settings.access_token, &settings.access_token_env) {
                (Some(t), _) if !t.is_empty() => t.clone(),
                (_, Some(env)) => match std::env::var(env) {
                    Ok(t) if !t.is_empty() => t,
                    _ => {
                        return StoreSettingsSnafu {
                            message: format!("the variable {} holds no access token", env),
                        }
                        .fail()
                    }
                },
                _ => {
                    return StoreSettingsSnafu {
                        message: "the sheets store needs an accessToken or an accessTokenEnv",
                    }
                    .fail()
                }
            };
            let base_url = settings
                .api_base_url
                .clone()
                .unwrap_or_else(|| SHEETS_API_BASE_URL.to_string());
            Ok(Box::new(SheetsStore::new(
                &base_url,
                &spreadsheet_id,
                &worksheet,
                &token,
            )))
        }
        x => StoreSettingsSnafu {
            message: format!("unknown store provider {:?}: expected csv or sheets", x),
        }
        .fail(),
    }
}

/// Appends to a local CSV file, writing the header when the file is new.
pub struct CsvFileStore {
    path: PathBuf,
}

impl CsvFileStore {
    pub fn new(path: PathBuf) -> CsvFileStore {
        CsvFileStore { path }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }
}

impl RowStore for CsvFileStore {
    fn describe(&self) -> String {
        format!("csv:{}", self.path_str())
    }

    fn probe(&self) -> StoreResult<()> {
        // Opening in append mode checks the permissions without touching the contents.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context(FileAccessSnafu {
                path: self.path_str(),
            })?;
        Ok(())
    }

    fn append_rows(&self, rows: &[ExportRow]) -> StoreResult<usize> {
        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        // The whole batch is encoded first and written with a single call.
        let mut wtr = csv::Writer::from_writer(Vec::new());
        if is_new {
            wtr.write_record(EXPORT_HEADER).context(CsvWriteSnafu {})?;
        }
        for row in rows {
            wtr.write_record(row.iter().map(|c| c.to_string()))
                .context(CsvWriteSnafu {})?;
        }
        let buf = wtr
            .into_inner()
            .map_err(|e| e.into_error())
            .context(FileAccessSnafu {
                path: self.path_str(),
            })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context(FileAccessSnafu {
                path: self.path_str(),
            })?;
        file.write_all(&buf).context(FileAccessSnafu {
            path: self.path_str(),
        })?;
        debug!("CsvFileStore: appended {} rows to {:?}", rows.len(), self.path);
        Ok(rows.len())
    }
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

/// Appends to a worksheet of a Google spreadsheet through the Sheets API (v4).
pub struct SheetsStore {
    client: reqwest::blocking::Client,
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
    token: String,
}

impl SheetsStore {
    pub fn new(base_url: &str, spreadsheet_id: &str, worksheet: &str, token: &str) -> SheetsStore {
        SheetsStore {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
            token: token.to_string(),
        }
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    fn append_url(&self) -> String {
        let range = format!("'{}'!A1", self.worksheet.replace('\'', "''"));
        format!(
            "{}/values/{}:append",
            self.spreadsheet_url(),
            urlencoding::encode(&range)
        )
    }

    fn check_status(resp: reqwest::blocking::Response) -> StoreResult<reqwest::blocking::Response> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().unwrap_or_default();
            StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail()
        }
    }
}

fn cell_to_json(cell: &ExportCell) -> JSValue {
    match cell {
        ExportCell::Text(s) => json!(s),
        ExportCell::Number(x) => json!(x),
    }
}

pub fn rows_to_json(rows: &[ExportRow]) -> JSValue {
    let values: Vec<Vec<JSValue>> = rows
        .iter()
        .map(|row| row.iter().map(cell_to_json).collect())
        .collect();
    json!({ "values": values })
}

impl RowStore for SheetsStore {
    fn describe(&self) -> String {
        format!("sheets:{}/{}", self.spreadsheet_id, self.worksheet)
    }

    fn probe(&self) -> StoreResult<()> {
        let resp = self
            .client
            .get(self.spreadsheet_url())
            .bearer_auth(&self.token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .context(HttpSnafu {})?;
        let meta: SpreadsheetMeta = SheetsStore::check_status(resp)?
            .json()
            .context(HttpSnafu {})?;
        let titles: Vec<&str> = meta
            .sheets
            .iter()
            .map(|s| s.properties.title.as_str())
            .collect();
        debug!("SheetsStore::probe: worksheets {:?}", titles);
        if !titles.contains(&self.worksheet.as_str()) {
            return NoSuchWorksheetSnafu {
                name: self.worksheet.clone(),
            }
            .fail();
        }
        Ok(())
    }

    fn append_rows(&self, rows: &[ExportRow]) -> StoreResult<usize> {
        let resp = self
            .client
            .post(self.append_url())
            .bearer_auth(&self.token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&rows_to_json(rows))
            .send()
            .context(HttpSnafu {})?;
        SheetsStore::check_status(resp)?;
        info!("SheetsStore: appended {} rows to {}", rows.len(), self.describe());
        Ok(rows.len())
    }
}

/// Keeps the rows in memory. Used when testing the submission flow.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    rows: RefCell<Vec<ExportRow>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn rows(&self) -> Vec<ExportRow> {
        self.rows.borrow().clone()
    }
}

#[cfg(test)]
impl RowStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn probe(&self) -> StoreResult<()> {
        Ok(())
    }

    fn append_rows(&self, rows: &[ExportRow]) -> StoreResult<usize> {
        self.rows.borrow_mut().extend(rows.iter().cloned());
        Ok(rows.len())
    }
}
