use chrono::Local;
use serde::Serialize;
use std::path::Path;

use crate::error::StoreError;
use crate::students::StudentRecord;

pub const HEADERS: [&str; 8] = [
    "Roll No", "Name", "Email", "Gender", "Contact", "D.O.B", "Address", "Username",
];

pub const REPORT_TITLE: &str = "Student Records";
pub const REPORT_TITLE_CONT: &str = "Student Records (cont.)";

// A4 portrait, in points.
pub const PAGE_WIDTH: f64 = 595.28;
pub const PAGE_HEIGHT: f64 = 841.89;
const TOP_MARGIN: f64 = 50.0;
const TITLE_GAP: f64 = 24.0;
const HEADER_GAP: f64 = 16.0;
const ROW_HEIGHT: f64 = 14.0;
const BOTTOM_MARGIN: f64 = 40.0;
const COLUMN_X: [f64; 8] = [20.0, 80.0, 150.0, 270.0, 320.0, 380.0, 440.0, 515.0];
pub const CELL_MAX_CHARS: usize = 35;

fn ensure_rows(records: &[StudentRecord]) -> Result<(), StoreError> {
    if records.is_empty() {
        return Err(StoreError::Validation("no data to export".into()));
    }
    Ok(())
}

/// Writes the records as CSV with the fixed header row. Returns the row count.
pub fn write_csv(path: &Path, records: &[StudentRecord]) -> Result<usize, StoreError> {
    ensure_rows(records)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(HEADERS)?;
    for r in records {
        wtr.write_record(r.export_fields())?;
    }
    wtr.flush()?;
    Ok(records.len())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportColumn {
    pub title: &'static str,
    pub x: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub y: f64,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub page_number: usize,
    pub title: &'static str,
    pub title_y: f64,
    pub header_y: f64,
    pub rows: Vec<ReportRow>,
}

/// Positioned page layout for the front end's PDF renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub title: &'static str,
    pub page_width: f64,
    pub page_height: f64,
    pub columns: Vec<ReportColumn>,
    pub row_count: usize,
    pub generated_at: String,
    pub pages: Vec<ReportPage>,
}

fn truncate_cell(s: &str) -> String {
    s.chars().take(CELL_MAX_CHARS).collect()
}

fn new_page(page_number: usize) -> (ReportPage, f64) {
    let title_y = PAGE_HEIGHT - TOP_MARGIN;
    let header_y = title_y - TITLE_GAP;
    let page = ReportPage {
        page_number,
        title: if page_number == 1 {
            REPORT_TITLE
        } else {
            REPORT_TITLE_CONT
        },
        title_y,
        header_y,
        rows: Vec::new(),
    };
    (page, header_y - HEADER_GAP)
}

pub fn report_model(records: &[StudentRecord]) -> Result<ReportModel, StoreError> {
    ensure_rows(records)?;

    let mut pages: Vec<ReportPage> = Vec::new();
    let (mut page, mut y) = new_page(1);
    for r in records {
        if y < BOTTOM_MARGIN {
            let next = page.page_number + 1;
            pages.push(page);
            (page, y) = new_page(next);
        }
        page.rows.push(ReportRow {
            y,
            cells: r.export_fields().iter().map(|s| truncate_cell(s)).collect(),
        });
        y -= ROW_HEIGHT;
    }
    pages.push(page);

    Ok(ReportModel {
        title: REPORT_TITLE,
        page_width: PAGE_WIDTH,
        page_height: PAGE_HEIGHT,
        columns: HEADERS
            .into_iter()
            .zip(COLUMN_X)
            .map(|(title, x)| ReportColumn { title, x })
            .collect(),
        row_count: records.len(),
        generated_at: Local::now().to_rfc3339(),
        pages,
    })
}
