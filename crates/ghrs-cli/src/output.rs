use std::io::{self, Write};

use clap::ValueEnum;
use ghrs_core::model::{columns, TimesheetRecord, WeeklySummary};
use ghrs_core::summary::total_hours;
use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned table on stdout
    Table,
    /// Pretty-printed JSON array
    Json,
    /// Comma-separated values with a header row
    Csv,
}

const RECORD_HEADER: [&str; 11] = [
    columns::EMPLOYEE_ID,
    columns::RECORD_NUMBER,
    columns::FIRST_NAME,
    columns::LAST_NAME,
    columns::HOURS,
    columns::WORK_DATE,
    columns::ACCOUNT_CODE,
    columns::COMPANY_CODE,
    columns::USER_FIELD_2,
    columns::USER_FIELD_3,
    columns::USER_FIELD_5,
];

const SUMMARY_HEADER: [&str; 10] = [
    columns::EMPLOYEE_ID,
    columns::RECORD_NUMBER,
    columns::FIRST_NAME,
    columns::LAST_NAME,
    columns::ACCOUNT_CODE,
    columns::USER_FIELD_2,
    columns::USER_FIELD_3,
    columns::USER_FIELD_5,
    columns::WORK_DATE,
    columns::HOURS,
];

fn record_cells(r: &TimesheetRecord) -> Vec<String> {
    vec![
        r.employee_id.clone(),
        r.record_number.clone(),
        r.first_name.clone(),
        r.last_name.clone(),
        r.hours.to_string(),
        r.work_date.to_string(),
        r.account_code.clone(),
        r.company_code.clone(),
        r.user_field_2.clone(),
        r.user_field_3.clone(),
        r.user_field_5.clone(),
    ]
}

fn summary_cells(s: &WeeklySummary) -> Vec<String> {
    vec![
        s.key.employee_id.clone(),
        s.key.record_number.clone(),
        s.key.first_name.clone(),
        s.key.last_name.clone(),
        s.key.account_code.clone(),
        s.key.user_field_2.clone(),
        s.key.user_field_3.clone(),
        s.key.user_field_5.clone(),
        s.week_start.to_string(),
        s.hours.to_string(),
    ]
}

pub fn write_records<W: Write>(
    w: &mut W,
    records: &[TimesheetRecord],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(w, records),
        OutputFormat::Csv => {
            let rows: Vec<Vec<String>> = records.iter().map(record_cells).collect();
            write_csv(w, &RECORD_HEADER, &rows)
        }
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = records
                .iter()
                .map(|r| {
                    vec![
                        r.work_date.to_string(),
                        r.employee_id.clone(),
                        r.display_name(),
                        r.account_code.clone(),
                        r.company_code.clone(),
                        r.user_field_2.clone(),
                        format!("{:.2}", r.hours),
                    ]
                })
                .collect();
            write_table(
                w,
                &["DATE", "EMPLID", "NAME", "ACCT_CD", "COMPANY", "JOB", "HOURS"],
                &rows,
            )?;
            writeln!(
                w,
                "{} records, {:.2} hours",
                records.len(),
                total_hours(records)
            )
        }
    }
}

pub fn write_summaries<W: Write>(
    w: &mut W,
    summaries: &[WeeklySummary],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(w, summaries),
        OutputFormat::Csv => {
            let rows: Vec<Vec<String>> = summaries.iter().map(summary_cells).collect();
            write_csv(w, &SUMMARY_HEADER, &rows)
        }
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = summaries
                .iter()
                .map(|s| {
                    vec![
                        s.week_start.to_string(),
                        s.key.employee_id.clone(),
                        format!("{} {}", s.key.first_name, s.key.last_name)
                            .trim()
                            .to_string(),
                        s.key.account_code.clone(),
                        s.key.user_field_2.clone(),
                        format!("{:.2}", s.hours),
                    ]
                })
                .collect();
            write_table(
                w,
                &["WEEK", "EMPLID", "NAME", "ACCT_CD", "JOB", "HOURS"],
                &rows,
            )?;
            writeln!(
                w,
                "{} weekly rows, {:.2} hours",
                summaries.len(),
                total_hours(summaries)
            )
        }
    }
}

fn write_json<W: Write, T: serde::Serialize>(w: &mut W, items: &[T]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, items)?;
    writeln!(w)
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_csv_row<W: Write, S: AsRef<str>>(w: &mut W, row: &[S]) -> io::Result<()> {
    let line: Vec<String> = row
        .iter()
        .map(|cell| {
            let cell = cell.as_ref();
            if needs_quotes(cell) {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.to_string()
            }
        })
        .collect();
    writeln!(w, "{}", line.join(","))
}

fn write_csv<W: Write>(w: &mut W, header: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    write_csv_row(w, header)?;
    for row in rows {
        write_csv_row(w, row)?;
    }
    Ok(())
}

fn write_table<W: Write>(w: &mut W, header: &[&str], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_line: Vec<String> = header
        .iter()
        .zip(&widths)
        .map(|(h, width)| format!("{h:<width$}"))
        .collect();
    writeln!(w, "{}", header_line.join("  ").bold())?;

    // Hours column is last and right-aligned.
    let last = widths.len().saturating_sub(1);
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                if i == last {
                    format!("{cell:>width$}")
                } else {
                    format!("{cell:<width$}")
                }
            })
            .collect();
        writeln!(w, "{}", line.join("  "))?;
    }
    Ok(())
}
