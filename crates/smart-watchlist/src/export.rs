//! CSV and XLSX export of scan results.

use dashboard_core::{DashboardError, ScanRow};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const DEFAULT_EXPORT_FILE: &str = "scan_live.csv";
pub const DEFAULT_XLSX_EXPORT_FILE: &str = "scan_live.xlsx";
const SHEET_NAME: &str = "scan";

/// Spreadsheet apps need the BOM to detect UTF-8 (Korean company names).
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const HEADERS: [&str; 20] = [
    "ticker",
    "name",
    "market",
    "price",
    "change_pct",
    "sma20",
    "sma50",
    "sma200",
    "rsi14",
    "deviation",
    "trend_ok",
    "valuation",
    "entry",
    "stop_loss",
    "take_profit",
    "market_cap",
    "per",
    "next_earnings",
    "earnings_alert",
    "status",
];

/// One exported value. Numbers stay numeric in the workbook.
enum Cell {
    Text(String),
    Number { value: Option<f64>, decimals: usize },
    Flag(bool),
}

impl Cell {
    fn num(value: Option<f64>) -> Self {
        Cell::Number { value, decimals: 4 }
    }

    fn to_csv(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number { value, decimals } => value
                .map(|v| format!("{:.*}", decimals, v))
                .unwrap_or_default(),
            Cell::Flag(b) => b.to_string(),
        }
    }
}

fn cells(row: &ScanRow) -> [Cell; 20] {
    [
        Cell::Text(row.ticker.clone()),
        Cell::Text(row.name.clone()),
        Cell::Text(row.market.to_string()),
        Cell::num(row.price),
        Cell::num(row.change_pct),
        Cell::num(row.sma20),
        Cell::num(row.sma50),
        Cell::num(row.sma200),
        Cell::num(row.rsi14),
        Cell::num(row.deviation),
        Cell::Flag(row.trend_ok),
        Cell::Text(row.valuation.to_string()),
        Cell::num(row.entry),
        Cell::num(row.stop_loss),
        Cell::num(row.take_profit),
        Cell::Number { value: row.market_cap, decimals: 0 },
        Cell::num(row.per),
        Cell::Text(row.next_earnings.map(|d| d.to_string()).unwrap_or_default()),
        Cell::Flag(row.earnings_alert),
        Cell::Text(row.status.label()),
    ]
}

fn csv_err(e: csv::Error) -> DashboardError {
    DashboardError::Storage(format!("CSV write failed: {}", e))
}

fn xlsx_err(e: XlsxError) -> DashboardError {
    DashboardError::Storage(format!("XLSX write failed: {}", e))
}

fn ensure_parent(path: &Path) -> Result<(), DashboardError> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Write `rows` as CSV (BOM, header row, one line per row) to `writer`.
pub fn write_scan_csv<W: Write>(mut writer: W, rows: &[ScanRow]) -> Result<(), DashboardError> {
    writer.write_all(UTF8_BOM)?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADERS).map_err(csv_err)?;

    for row in rows {
        csv_writer
            .write_record(cells(row).iter().map(Cell::to_csv))
            .map_err(csv_err)?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn export_scan_csv(path: &Path, rows: &[ScanRow]) -> Result<(), DashboardError> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    write_scan_csv(BufWriter::new(file), rows)?;
    tracing::info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// One-sheet workbook with the same columns as the CSV. Empty values are
/// left as blank cells.
fn scan_workbook(rows: &[ScanRow]) -> Result<Workbook, DashboardError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(xlsx_err)?;

    for (col, header) in (0u16..).zip(HEADERS) {
        sheet
            .write_string_with_format(0, col, header, &bold)
            .map_err(xlsx_err)?;
    }

    for (r, row) in (1u32..).zip(rows) {
        for (col, cell) in (0u16..).zip(cells(row)) {
            match cell {
                Cell::Text(text) if text.is_empty() => {}
                Cell::Text(text) => {
                    sheet.write_string(r, col, text).map_err(xlsx_err)?;
                }
                Cell::Number { value: Some(v), .. } if v.is_finite() => {
                    sheet.write_number(r, col, v).map_err(xlsx_err)?;
                }
                Cell::Number { .. } => {}
                Cell::Flag(b) => {
                    sheet.write_boolean(r, col, b).map_err(xlsx_err)?;
                }
            }
        }
    }
    sheet.set_freeze_panes(1, 1).map_err(xlsx_err)?;
    Ok(workbook)
}

/// Serialized XLSX bytes for `rows`.
pub fn write_scan_xlsx(rows: &[ScanRow]) -> Result<Vec<u8>, DashboardError> {
    scan_workbook(rows)?.save_to_buffer().map_err(xlsx_err)
}

pub fn export_scan_xlsx(path: &Path, rows: &[ScanRow]) -> Result<(), DashboardError> {
    ensure_parent(path)?;
    let bytes = write_scan_xlsx(rows)?;
    std::fs::write(path, bytes)?;
    tracing::info!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}
