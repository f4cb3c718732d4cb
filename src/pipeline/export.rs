// src/pipeline/export.rs

//! Export of accumulated records to JSON and CSV.
//!
//! Both artifacts carry identical data. The CSV uses `;` as delimiter and
//! a UTF-8 BOM so Spanish-locale spreadsheet software opens it correctly.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{AppError, Result};
use crate::models::{Company, FilterSelection};

/// Column order of the CSV artifact.
pub const CSV_COLUMNS: [&str; 20] = [
    "legal_name",
    "tax_id",
    "legal_form",
    "sector",
    "activity",
    "cnae",
    "status",
    "founded",
    "corporate_purpose",
    "address",
    "phone",
    "email",
    "website",
    "sales",
    "employees",
    "shareholdings",
    "international_ops",
    "sector_group",
    "publicly_listed",
    "source_url",
];

/// Paths of the artifacts written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// Deterministic output file stem from the filter selection and run date.
pub fn export_stem(filters: &FilterSelection, run_date: DateTime<Local>) -> String {
    let timestamp = run_date.format("%Y%m%d_%H%M%S");
    let fragments = filters.slug_fragments();
    if fragments.is_empty() {
        format!("empresas_{timestamp}")
    } else {
        format!("{}_{timestamp}", fragments.join("_"))
    }
}

/// Write `<stem>.json` and `<stem>.csv` under `out_dir`.
///
/// Running twice with the same records and stem produces byte-identical
/// files. Failures leave the caller's in-memory records untouched.
pub fn export_all(companies: &[Company], out_dir: &Path, stem: &str) -> Result<ExportPaths> {
    fs::create_dir_all(out_dir).map_err(|e| AppError::export(out_dir.display(), e))?;

    let json_path = out_dir.join(format!("{stem}.json"));
    let csv_path = out_dir.join(format!("{stem}.csv"));

    let json_bytes =
        serde_json::to_vec_pretty(companies).map_err(|e| AppError::export(json_path.display(), e))?;
    fs::write(&json_path, json_bytes).map_err(|e| AppError::export(json_path.display(), e))?;

    let csv_bytes = render_csv(companies).map_err(|e| AppError::export(csv_path.display(), e))?;
    fs::write(&csv_path, csv_bytes).map_err(|e| AppError::export(csv_path.display(), e))?;

    Ok(ExportPaths {
        json: json_path,
        csv: csv_path,
    })
}

fn render_csv(companies: &[Company]) -> std::result::Result<Vec<u8>, String> {
    // UTF-8 BOM for spreadsheet compatibility
    let mut out = vec![0xEF, 0xBB, 0xBF];

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(Vec::new());

    writer.write_record(CSV_COLUMNS).map_err(|e| e.to_string())?;
    for company in companies {
        writer
            .write_record(csv_row(company))
            .map_err(|e| e.to_string())?;
    }

    let body = writer.into_inner().map_err(|e| e.to_string())?;
    out.extend_from_slice(&body);
    Ok(out)
}

fn csv_row(c: &Company) -> [&str; 20] {
    [
        &c.legal_name,
        &c.tax_id,
        &c.legal_form,
        &c.sector,
        &c.activity,
        &c.cnae,
        &c.status,
        &c.founded,
        &c.corporate_purpose,
        &c.address,
        &c.phone,
        &c.email,
        &c.website,
        &c.sales,
        &c.employees,
        &c.shareholdings,
        &c.international_ops,
        &c.sector_group,
        &c.publicly_listed,
        &c.source_url,
    ]
}
