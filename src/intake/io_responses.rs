// Primitives for reading files of answers.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use likert_survey::builder::ResponseBuilder;

use crate::intake::*;

/// Reads the answers of one respondent.
///
/// The input type is taken from the file extension when not given.
pub fn read_responses(
    path: &str,
    input_type: Option<&str>,
    worksheet: Option<&str>,
    catalog: &Catalog,
) -> IntakeResult<Response> {
    let itype = match input_type {
        Some(t) => t.to_lowercase(),
        None => Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase(),
    };
    info!("Attempting to read {} answers file {:?}", itype, path);
    let response = match itype.as_str() {
        "csv" => read_csv_responses(path, catalog),
        "xlsx" => read_excel_responses(path, worksheet, catalog),
        "json" => read_json_responses(path, catalog),
        x => UnknownInputTypeSnafu { input_type: x }.fail(),
    }?;
    info!(
        "read_responses: {} answers, {} valid",
        response.len(),
        response.valid_count()
    );
    Ok(response)
}

// Blank answers leave the item unanswered.
fn add_line(
    builder: &mut ResponseBuilder,
    item_id: &str,
    answer: &str,
    lineno: usize,
) -> IntakeResult<()> {
    if answer.trim().is_empty() {
        debug!("add_line: line {}: {} left unanswered", lineno, item_id);
        return Ok(());
    }
    builder
        .add_answer_str(item_id.trim(), answer)
        .context(InvalidAnswerLineSnafu { lineno })
}

pub fn read_csv_responses(path: &str, catalog: &Catalog) -> IntakeResult<Response> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut builder = ResponseBuilder::new(catalog);
    for (idx, line_r) in rdr.into_records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        debug!("read_csv_responses: {:?} {:?}", lineno, line);
        let item_id = line.get(0).context(CsvLineTooShortSnafu { lineno })?;
        if item_id.trim().is_empty() {
            continue;
        }
        let answer = line.get(1).unwrap_or_default();
        add_line(&mut builder, item_id, answer, lineno)?;
    }
    Ok(builder.build())
}

fn get_range(path: &str, worksheet: Option<&str>) -> IntakeResult<Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let range_o = match worksheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    };
    match range_o {
        Some(r) => r.context(OpeningExcelSnafu { path }),
        None => MissingWorksheetSnafu {
            path,
            name: worksheet.unwrap_or("<first>"),
        }
        .fail(),
    }
}

fn cell_to_string(cell: &DataType, lineno: usize) -> IntakeResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 => Ok(format!("{}", *f as i64)),
        DataType::Empty => Ok("".to_string()),
        _ => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}

pub fn read_excel_responses(
    path: &str,
    worksheet: Option<&str>,
    catalog: &Catalog,
) -> IntakeResult<Response> {
    let wrange = get_range(path, worksheet)?;
    let header = wrange.rows().next().context(EmptyExcelSnafu {})?;
    debug!("read_excel_responses: header: {:?}", header);

    let mut builder = ResponseBuilder::new(catalog);
    // Skipping the header row.
    for (idx, row) in wrange.rows().enumerate().skip(1) {
        let lineno = idx + 1;
        let item_id = match row.get(0) {
            Some(c) => cell_to_string(c, lineno)?,
            None => continue,
        };
        if item_id.trim().is_empty() {
            continue;
        }
        let answer = match row.get(1) {
            Some(c) => cell_to_string(c, lineno)?,
            None => "".to_string(),
        };
        add_line(&mut builder, &item_id, &answer, lineno)?;
    }
    Ok(builder.build())
}

fn json_number(n: &serde_json::Number) -> String {
    match (n.as_i64(), n.as_f64()) {
        (Some(i), _) => i.to_string(),
        (None, Some(f)) if f.fract() == 0.0 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// Answers as a JSON object: `{"RE01": 4, "EX01": "N/A"}`. `null` leaves the item unanswered.
///
/// Errors name the item, as the order of the keys is not kept.
pub fn read_json_responses(path: &str, catalog: &Catalog) -> IntakeResult<Response> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    let obj = match js.as_object() {
        Some(o) => o,
        None => whatever!("{}: expected an object of item ids to answers", path),
    };
    let mut builder = ResponseBuilder::new(catalog);
    for (item_id, value) in obj.iter() {
        let answer = match value {
            JSValue::Null => continue,
            JSValue::String(s) => s.clone(),
            JSValue::Number(n) => json_number(n),
            x => x.to_string(),
        };
        if answer.trim().is_empty() {
            continue;
        }
        builder
            .add_answer_str(item_id.trim(), &answer)
            .context(InvalidAnswerItemSnafu { item_id })?;
    }
    Ok(builder.build())
}
