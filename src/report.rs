//! Batch summary rows and the documents built from them.

use crate::{
    dna_sequence::DNAsequence,
    error::{DomesticationError, Result},
    part_domesticator::PartDomesticator,
};
use bio::io::fasta;
use csv::WriterBuilder;
use serde::Serialize;
use sha1::{Digest, Sha1};

/// One domesticated record, as listed in the summary.
#[derive(Clone, Debug, Serialize)]
pub struct BatchInfoRow {
    #[serde(rename = "Record")]
    pub record: String,
    #[serde(rename = "Order ID")]
    pub order_id: String,
    #[serde(rename = "Domesticator")]
    pub domesticator: String,
    /// Fingerprint and new ID, or `Failed: <message>`
    #[serde(rename = "Domesticated Record")]
    pub status: String,
    #[serde(rename = "Added bp")]
    pub added_bp: i64,
    #[serde(rename = "Edited bp")]
    pub edited_bp: usize,
    #[serde(rename = "Barcode")]
    pub barcode: Option<String>,
    #[serde(rename = "Before")]
    pub before_fingerprint: String,
    #[serde(rename = "After")]
    pub after_fingerprint: String,
    #[serde(skip)]
    pub success: bool,
    #[serde(skip)]
    pub final_sequence: String,
}

/// Short visual identity of a sequence, shown next to record names.
pub trait SequenceFingerprinter {
    fn fingerprint(&self, record: &DNAsequence) -> String;
}

/// First eight hex digits of the SHA-1 of the upper-case sequence.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha1Fingerprinter;

impl SequenceFingerprinter for Sha1Fingerprinter {
    fn fingerprint(&self, record: &DNAsequence) -> String {
        let mut hasher = Sha1::new();
        hasher.update(record.sequence().to_ascii_uppercase());
        hasher.finalize()[..4]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Renders the human-readable batch report.
pub trait ReportRenderer {
    fn file_name(&self) -> &str;
    fn render(&self, rows: &[BatchInfoRow], domesticators: &[&PartDomesticator]) -> Result<Vec<u8>>;
}

/// Markdown report: a summary table, then the details of each domesticator.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownReport;

impl ReportRenderer for MarkdownReport {
    fn file_name(&self) -> &str {
        "Report.md"
    }

    fn render(&self, rows: &[BatchInfoRow], domesticators: &[&PartDomesticator]) -> Result<Vec<u8>> {
        let failures = rows.iter().filter(|r| !r.success).count();
        let mut lines = vec![
            "# Domestication report".to_string(),
            String::new(),
            format!(
                "Generated by gentle-domestication {}. {} record(s), {failures} failure(s).",
                env!("CARGO_PKG_VERSION"),
                rows.len()
            ),
            String::new(),
            "| Record | Order ID | Domesticator | Domesticated Record | Added bp | Edited bp | Barcode |"
                .to_string(),
            "|---|---|---|---|---:|---:|---|".to_string(),
        ];
        for row in rows {
            let status = if row.success {
                row.status.clone()
            } else {
                format!("**{}**", row.status)
            };
            let edited = match row.edited_bp {
                0 => "0".to_string(),
                n => format!("*{n}*"),
            };
            lines.push(format!(
                "| {} {} | {} | {} | {} | {} | {} | {} |",
                row.before_fingerprint,
                row.record,
                row.order_id,
                row.domesticator,
                escape_cell(&status),
                row.added_bp,
                edited,
                row.barcode.as_deref().unwrap_or("")
            ));
        }
        lines.push(String::new());
        lines.push("## Domesticators".to_string());
        for domesticator in domesticators {
            lines.push(String::new());
            lines.push(format!("### {}", domesticator.name));
            lines.push(String::new());
            for (label, value) in domesticator.details_list() {
                lines.push(format!("- {label}: {value}"));
            }
        }
        lines.push(String::new());
        Ok(lines.join("\n").into_bytes())
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn summary_csv(rows: &[BatchInfoRow]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(vec![]);
    for row in rows {
        writer.serialize(row)?;
    }
    into_bytes(writer)
}

/// `record,order_id` pairs in input order.
pub fn order_ids_csv(pairs: &[(String, String)]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(vec![]);
    writer.write_record(["record", "order_id"])?;
    for (record, order_id) in pairs {
        writer.write_record([record, order_id])?;
    }
    into_bytes(writer)
}

pub fn sequences_to_order_csv(rows: &[BatchInfoRow]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(vec![]);
    writer.write_record(["order_id", "sequence"])?;
    for row in rows {
        writer.write_record([&row.order_id, &row.final_sequence])?;
    }
    into_bytes(writer)
}

pub fn sequences_to_order_fasta(rows: &[BatchInfoRow]) -> Result<Vec<u8>> {
    let mut data = vec![];
    {
        let mut writer = fasta::Writer::new(&mut data);
        for row in rows {
            writer.write(&row.order_id, None, row.final_sequence.as_bytes())?;
        }
        writer.flush()?;
    }
    Ok(data)
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| DomesticationError::from(e.into_error()))
}
