// TermSleuth - platform/tabular.rs
//
// Spreadsheet reading and writing.
//
// Reading returns the first worksheet as an absolute grid of display strings:
// leading empty rows and columns are preserved so that row 0 is always the
// sheet's first row and column 0 is always column A, whatever the used range
// of the sheet happens to be.
//
// Workbooks (xlsx/xlsm/xls/ods) are read with calamine and written as xlsx
// with rust_xlsxwriter. CSV is read and written with the csv crate.

use crate::util::constants;
use crate::util::error::{ReportError, TemplateError};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

/// On-disk tabular format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    /// Excel/OpenDocument workbook. Written as xlsx.
    Workbook,
    Csv,
}

impl TabularFormat {
    /// Pick the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Workbook),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Extension used when writing this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Workbook => "xlsx",
            Self::Csv => "csv",
        }
    }

    /// `file_name` with its extension replaced by this format's, unless it
    /// already carries it (compared case-insensitively).
    pub fn file_name(&self, file_name: &str) -> String {
        let ext = self.extension();
        if file_name.to_lowercase().ends_with(&format!(".{ext}")) {
            return file_name.to_string();
        }
        let stem = file_name.rsplit_once('.').map_or(file_name, |(s, _)| s);
        format!("{stem}.{ext}")
    }
}

/// Spreadsheet reader/writer used for templates and reports.
pub trait TabularIo: Send + Sync {
    /// Parse the first sheet of `bytes` into rows of cell strings.
    fn parse_tabular(
        &self,
        bytes: &[u8],
        format: TabularFormat,
    ) -> Result<Vec<Vec<String>>, TemplateError>;

    /// Serialise `rows` into a single-sheet file named `sheet_name`.
    fn write_tabular(
        &self,
        rows: &[Vec<String>],
        sheet_name: &str,
        format: TabularFormat,
    ) -> Result<Vec<u8>, ReportError>;
}

/// Standard `TabularIo` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpreadsheetIo;

impl TabularIo for SpreadsheetIo {
    fn parse_tabular(
        &self,
        bytes: &[u8],
        format: TabularFormat,
    ) -> Result<Vec<Vec<String>>, TemplateError> {
        match format {
            TabularFormat::Workbook => read_workbook(bytes),
            TabularFormat::Csv => read_csv(bytes),
        }
    }

    fn write_tabular(
        &self,
        rows: &[Vec<String>],
        sheet_name: &str,
        format: TabularFormat,
    ) -> Result<Vec<u8>, ReportError> {
        match format {
            TabularFormat::Workbook => write_xlsx(rows, sheet_name),
            TabularFormat::Csv => write_csv(rows),
        }
    }
}

// =============================================================================
// Reading
// =============================================================================

fn read_workbook(bytes: &[u8]) -> Result<Vec<Vec<String>>, TemplateError> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|source| TemplateError::Workbook { source })?;

    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(TemplateError::NoSheets)?;

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|source| TemplateError::Workbook { source })?;

    let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_offset as usize];
    for row in range.rows() {
        let mut cells = vec![String::new(); col_offset as usize];
        cells.extend(row.iter().map(cell_text));
        rows.push(cells);
    }

    tracing::debug!(
        sheet = %first_sheet,
        rows = rows.len(),
        row_offset,
        col_offset,
        "Workbook sheet read"
    );
    Ok(rows)
}

/// Display string for a cell, matching what a spreadsheet shows for
/// whole numbers (`42`, not `42.0`).
fn cell_text(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        other => other.to_string(),
    }
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, TemplateError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| TemplateError::Csv { source })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

// =============================================================================
// Writing
// =============================================================================

fn write_xlsx(rows: &[Vec<String>], sheet_name: &str) -> Result<Vec<u8>, ReportError> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(sheet_name)
            .map_err(|source| ReportError::Xlsx { source })?;

        for (r, row) in rows.iter().enumerate() {
            // Out-of-range indices saturate and are rejected by the writer.
            let row_idx = u32::try_from(r).unwrap_or(u32::MAX);
            for (c, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let col_idx = u16::try_from(c).unwrap_or(u16::MAX);
                sheet
                    .write_string(row_idx, col_idx, fit_cell(cell).as_ref())
                    .map_err(|source| ReportError::Xlsx { source })?;
            }
        }
    }
    workbook
        .save_to_buffer()
        .map_err(|source| ReportError::Xlsx { source })
}

/// Cut `cell` down to what an xlsx cell holds. The kept prefix is followed by
/// `… (+N more characters)`.
fn fit_cell(cell: &str) -> Cow<'_, str> {
    let total = cell.chars().count();
    if total <= constants::XLSX_MAX_CELL_CHARS {
        return Cow::Borrowed(cell);
    }
    // Room for the marker, whatever the width of N.
    let keep = constants::XLSX_MAX_CELL_CHARS - 64;
    let cut = cell.char_indices().nth(keep).map_or(cell.len(), |(i, _)| i);
    tracing::warn!(chars = total, kept = keep, "Cell exceeds the xlsx limit, truncating");
    Cow::Owned(format!("{}… (+{} more characters)", &cell[..cut], total - keep))
}

fn write_csv(rows: &[Vec<String>]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer
            .write_record(row)
            .map_err(|source| ReportError::Csv { source })?;
    }
    writer.flush().map_err(|source| ReportError::Io { source })?;
    writer.into_inner().map_err(|e| ReportError::Io {
        source: e.into_error(),
    })
}
