//! XLSX workbooks for bulk exchange.
//!
//! Sheets are read into the same text records the CSV codec yields, so both
//! formats share one import path. Export writes every cell as text to keep
//! references, codes and dates exactly as the CSV export spells them.

use crate::errors::ServiceError;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::NaiveTime;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::io::Cursor;

use super::export::{CONFIRMED_AT_FORMAT, DATE_FORMATS};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Shipments";

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        // whole numbers typed into a sheet come back as floats
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => String::from(if *b { "1" } else { "0" }),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(at) if at.time() == NaiveTime::MIN => at.format(DATE_FORMATS[0]).to_string(),
            Some(at) => at.format(CONFIRMED_AT_FORMAT).to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::Error(e) => e.to_string(),
    }
}

/// Reads the first worksheet of an XLSX workbook. Blank rows are skipped.
pub fn read_records(bytes: &[u8]) -> Result<Vec<Vec<String>>, ServiceError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| ServiceError::BadRequest(format!("not a readable XLSX workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ServiceError::BadRequest("the workbook has no worksheets".into()))?
        .map_err(|e| ServiceError::BadRequest(format!("unreadable worksheet: {e}")))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|record| record.iter().any(|cell| !cell.trim().is_empty()))
        .collect())
}

fn build_workbook<S: AsRef<str>>(header: &[&str], rows: &[Vec<S>]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in header.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &bold)?;
    }
    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        for (col, value) in row.iter().enumerate() {
            let value = value.as_ref();
            if !value.is_empty() {
                worksheet.write_string(line, col as u16, value)?;
            }
        }
    }
    worksheet.set_freeze_panes(1, 0)?;

    workbook.save_to_buffer()
}

/// Writes `header` and `rows` as a single-sheet workbook.
pub fn write_workbook<S: AsRef<str>>(
    header: &[&str],
    rows: &[Vec<S>],
) -> Result<Vec<u8>, ServiceError> {
    build_workbook(header, rows)
        .map_err(|e| ServiceError::InternalError(format!("failed to build workbook: {e}")))
}
