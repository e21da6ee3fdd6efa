//! XML export parsing and typed normalization.
//!
//! The export is a flat list of `row` elements whose children are the
//! query's columns. [`parse_rows`] keeps them as found; [`normalize`]
//! turns them into [`TimesheetRecord`]s and fails on the first value that
//! does not coerce, so no row is ever dropped silently.

use chrono::NaiveDate;
use roxmltree::{Document, ParsingOptions};

use crate::error::{GhrsError, Result};
use crate::model::{columns, ExportRow, TimesheetRecord};

/// Format of the `DUR` column.
pub const WORK_DATE_FORMAT: &str = "%Y-%m-%d";

const ROW_TAG: &str = "row";

/// Parse every `row` element of the export, in document order.
///
/// Each row collects all of its descendant elements except nested `row`s,
/// keyed by local tag name, with the element's leading text as value.
pub fn parse_rows(xml: &str) -> Result<Vec<ExportRow>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = Document::parse_with_options(xml, options)?;

    let rows: Vec<ExportRow> = document
        .descendants()
        .filter(|n| n.is_element() && n.has_tag_name(ROW_TAG))
        .map(|row| {
            let mut out = ExportRow::new();
            for cell in row
                .descendants()
                .filter(|n| n.is_element() && !n.has_tag_name(ROW_TAG))
            {
                out.push(cell.tag_name().name(), cell.text().map(str::to_string));
            }
            out
        })
        .collect();

    tracing::debug!(rows = rows.len(), "export parsed");
    Ok(rows)
}

/// Coerce raw rows into typed records. Zero rows give an empty result.
pub fn normalize(rows: &[ExportRow]) -> Result<Vec<TimesheetRecord>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| normalize_row(index, row))
        .collect()
}

/// Parse and normalize an export in one step.
pub fn parse(xml: &str) -> Result<Vec<TimesheetRecord>> {
    let rows = parse_rows(xml)?;
    normalize(&rows)
}

/// Coerce one row. `index` is only used in error reports.
pub fn normalize_row(index: usize, row: &ExportRow) -> Result<TimesheetRecord> {
    let raw_date = required(index, row, columns::WORK_DATE)?;
    let work_date = NaiveDate::parse_from_str(raw_date.trim(), WORK_DATE_FORMAT).map_err(|_| {
        GhrsError::MalformedDate {
            row: index,
            value: raw_date.to_string(),
        }
    })?;

    let raw_hours = required(index, row, columns::HOURS)?;
    let hours = raw_hours
        .trim()
        .parse::<f64>()
        .map_err(|_| GhrsError::MalformedNumber {
            row: index,
            value: raw_hours.to_string(),
        })?;

    Ok(TimesheetRecord {
        employee_id: required(index, row, columns::EMPLOYEE_ID)?.to_string(),
        record_number: required(index, row, columns::RECORD_NUMBER)?.to_string(),
        first_name: required(index, row, columns::FIRST_NAME)?.to_string(),
        last_name: required(index, row, columns::LAST_NAME)?.to_string(),
        hours,
        work_date,
        account_code: required(index, row, columns::ACCOUNT_CODE)?.to_string(),
        company_code: required(index, row, columns::COMPANY_CODE)?.to_string(),
        user_field_2: optional(row, columns::USER_FIELD_2),
        user_field_3: optional(row, columns::USER_FIELD_3),
        user_field_5: optional(row, columns::USER_FIELD_5),
    })
}

/// Column that must exist; an empty element reads as "".
fn required<'a>(index: usize, row: &'a ExportRow, column: &'static str) -> Result<&'a str> {
    row.get(column)
        .map(Option::unwrap_or_default)
        .ok_or(GhrsError::MissingColumn { row: index, column })
}

fn optional(row: &ExportRow, column: &str) -> String {
    row.get(column).flatten().unwrap_or_default().to_string()
}
