//! Domesticates many records in one go and writes the results as a tree of
//! files ready for ordering.

use crate::{
    barcodes::{BarcodeOrder, BarcodesCollection, apply_barcode, assign_barcodes},
    dna_sequence::DNAsequence,
    error::{DomesticationError, Result},
    order_ids::{DEFAULT_ORDER_ID_MAX_LENGTH, DEFAULT_REPLACEMENTS, sanitize_and_uniquify},
    output::{BatchOutput, OutputTarget, OutputTree},
    part_domesticator::{DomesticationContext, DomesticationInput, DomesticationOptions, PartDomesticator},
    report::{
        BatchInfoRow, MarkdownReport, ReportRenderer, SequenceFingerprinter, Sha1Fingerprinter,
        order_ids_csv, sequences_to_order_csv, sequences_to_order_fasta, summary_csv,
    },
    standard::DomesticationStandard,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    Silent,
    #[default]
    Bar,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Allow changes outside of coding regions
    pub allow_edits: bool,
    pub domesticated_suffix: String,
    pub include_optimization_reports: bool,
    pub include_original_records: bool,
    pub barcodes: Option<BarcodesCollection>,
    pub barcode_order: BarcodeOrder,
    pub barcode_spacer: String,
    pub progress: ProgressMode,
    pub order_id_max_length: usize,
    pub record_id_max_length: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            allow_edits: false,
            domesticated_suffix: String::new(),
            include_optimization_reports: true,
            include_original_records: true,
            barcodes: None,
            barcode_order: BarcodeOrder::SameAsRecords,
            barcode_spacer: "AA".to_string(),
            progress: ProgressMode::Bar,
            order_id_max_length: DEFAULT_ORDER_ID_MAX_LENGTH,
            record_id_max_length: 20,
        }
    }
}

impl BatchOptions {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}

/// The domesticator used for every record, or a standard choosing one per
/// record.
#[derive(Clone, Copy, Debug)]
pub enum DomesticatorSelector<'a> {
    Single(&'a PartDomesticator),
    Standard(&'a DomesticationStandard),
}

impl<'a> DomesticatorSelector<'a> {
    pub fn domesticator_for(&self, record: &DNAsequence) -> Result<&'a PartDomesticator> {
        match *self {
            Self::Single(domesticator) => Ok(domesticator),
            Self::Standard(standard) => standard.domesticator_for(record),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BatchOutcome {
    pub failures: usize,
    /// Sorted by order ID
    pub rows: Vec<BatchInfoRow>,
    pub output: BatchOutput,
}

/// Same as `batch_domestication_with`, using the Markdown report and SHA-1
/// fingerprints.
pub fn batch_domestication(
    records: &[DNAsequence],
    selector: DomesticatorSelector,
    context: &DomesticationContext,
    target: &OutputTarget,
    options: &BatchOptions,
) -> Result<BatchOutcome> {
    batch_domestication_with(
        records,
        selector,
        context,
        target,
        options,
        &MarkdownReport,
        &Sha1Fingerprinter,
    )
}

/// Records that cannot be domesticated are counted and reported. A record
/// no domesticator applies to aborts the batch before anything is written;
/// a later structural or I/O error closes the output with the records
/// finished so far, then is returned.
pub fn batch_domestication_with(
    records: &[DNAsequence],
    selector: DomesticatorSelector,
    context: &DomesticationContext,
    target: &OutputTarget,
    options: &BatchOptions,
    renderer: &dyn ReportRenderer,
    fingerprinter: &dyn SequenceFingerprinter,
) -> Result<BatchOutcome> {
    info!("Domesticating {} record(s)", records.len());
    // a record without a domesticator aborts before anything is written
    let selected = records
        .iter()
        .map(|record| selector.domesticator_for(record))
        .collect::<Result<Vec<_>>>()?;
    let new_ids: Vec<String> = records
        .iter()
        .map(|r| format!("{}{}", r.id(), options.domesticated_suffix))
        .collect();
    let new_stems = unique_file_stems(&new_ids);
    let original_ids: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
    let original_stems = unique_file_stems(&original_ids);

    let mut tree = OutputTree::open(target)?;
    let progress = match options.progress {
        ProgressMode::Bar => {
            let bar = ProgressBar::new(records.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        ProgressMode::Silent => ProgressBar::hidden(),
    };

    let lengths: Vec<usize> = records.iter().map(|r| r.len()).collect();
    let barcodes = options
        .barcodes
        .as_ref()
        .map(|b| assign_barcodes(b, &lengths, options.barcode_order))
        .unwrap_or_default();

    let mut rows = Vec::with_capacity(records.len());
    let mut domesticators: Vec<&PartDomesticator> = vec![];
    let mut failures = 0;
    let mut fatal = None;
    for (i, (record, domesticator)) in records.iter().zip(selected).enumerate() {
        progress.set_message(record.id().to_string());
        if !domesticators.iter().any(|d| d.name == domesticator.name) {
            domesticators.push(domesticator);
        }
        let names = FileNames {
            new_id: &new_ids[i],
            new_stem: &new_stems[i],
            original_stem: &original_stems[i],
        };
        match domesticate_record(
            &mut tree,
            record,
            domesticator,
            context,
            options,
            barcodes.get(i),
            &names,
            fingerprinter,
        ) {
            Ok(row) => {
                if !row.success {
                    failures += 1;
                }
                rows.push(row);
            }
            Err(e) => {
                warn!(
                    "{}: {e}; closing the batch after {} record(s)",
                    record.id(),
                    rows.len()
                );
                fatal = Some(e);
                break;
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let ids: Vec<&str> = rows.iter().map(|r| r.record.as_str()).collect();
    let order_ids = sanitize_and_uniquify(&ids, options.order_id_max_length, DEFAULT_REPLACEMENTS);
    for (row, (_, order_id)) in rows.iter_mut().zip(order_ids.iter()) {
        row.order_id = order_id.clone();
    }
    rows.sort_by(|a, b| a.order_id.cmp(&b.order_id));

    tree.write_file("order_ids.csv", &order_ids_csv(&order_ids)?)?;
    tree.write_file("summary.csv", &summary_csv(&rows)?)?;
    tree.write_file("sequences_to_order.fa", &sequences_to_order_fasta(&rows)?)?;
    tree.write_file("sequences_to_order.csv", &sequences_to_order_csv(&rows)?)?;
    domesticators.sort_by(|a, b| a.name.cmp(&b.name));
    tree.write_file(renderer.file_name(), &renderer.render(&rows, &domesticators)?)?;

    let output = tree.close()?;
    if let Some(e) = fatal {
        return Err(e);
    }
    info!("Domesticated {} record(s), {failures} failure(s)", rows.len());
    Ok(BatchOutcome {
        failures,
        rows,
        output,
    })
}

struct FileNames<'a> {
    new_id: &'a str,
    new_stem: &'a str,
    original_stem: &'a str,
}

/// Domesticates one record and writes its files. Failed domestications are
/// rows; only structural and I/O errors come back as `Err`.
#[allow(clippy::too_many_arguments)]
fn domesticate_record(
    tree: &mut OutputTree,
    record: &DNAsequence,
    domesticator: &PartDomesticator,
    context: &DomesticationContext,
    options: &BatchOptions,
    barcode: Option<&(String, String)>,
    names: &FileNames,
    fingerprinter: &dyn SequenceFingerprinter,
) -> Result<BatchInfoRow> {
    let original_id = record.id().to_string();
    debug!("{original_id}: domesticating with {domesticator}");
    let domestication_options = DomesticationOptions {
        edit: options.allow_edits,
        with_report: options.include_optimization_reports,
        ..Default::default()
    };
    let result = domesticator.domesticate(
        context,
        DomesticationInput::Record(record.clone()),
        &domestication_options,
    )?;
    if !result.success {
        warn!("{original_id}: {}", result.summary());
    }

    let edited_bp = result.number_of_edits();
    let added_bp = result.record_after.len() as i64 - record.len() as i64;
    let mut final_record = match barcode {
        Some((name, sequence)) => {
            apply_barcode(&result.record_after, name, sequence, &options.barcode_spacer)
        }
        None => result.record_after.clone(),
    };
    final_record.set_id(&truncate(names.new_id, options.record_id_max_length));
    tree.write_file(
        &format!("domesticated/{}.gb", names.new_stem),
        &final_record.to_genbank_bytes()?,
    )?;
    if options.include_original_records {
        let mut original_record = record.clone();
        original_record.set_id(&truncate(&original_id, options.record_id_max_length));
        tree.write_file(
            &format!("original/{}.gb", names.original_stem),
            &original_record.to_genbank_bytes()?,
        )?;
    }
    if options.include_optimization_reports && !result.success {
        if let Some(report) = &result.report_data {
            tree.write_file(&format!("error_reports/{}.txt", names.new_stem), report)?;
        }
    }

    let after_fingerprint = fingerprinter.fingerprint(&final_record);
    let status = match result.success {
        true => format!("{after_fingerprint} {}", names.new_id),
        false => format!(
            "Failed: {}",
            result.message.as_deref().unwrap_or("unknown error")
        ),
    };
    Ok(BatchInfoRow {
        record: original_id,
        order_id: String::new(),
        domesticator: domesticator.name.clone(),
        status,
        added_bp,
        edited_bp,
        barcode: barcode.map(|(name, _)| name.clone()),
        before_fingerprint: fingerprinter.fingerprint(record),
        after_fingerprint,
        success: result.success,
        final_sequence: final_record.get_forward_string(),
    })
}

/// Loads records from FASTA/GenBank files and runs the batch on them.
pub fn batch_domestication_from_files(
    paths: &[&Path],
    selector: DomesticatorSelector,
    context: &DomesticationContext,
    target: &OutputTarget,
    options: &BatchOptions,
) -> Result<BatchOutcome> {
    let records = DNAsequence::load_many(paths)?;
    if records.is_empty() {
        return Err(DomesticationError::invalid_input("No records to domesticate"));
    }
    batch_domestication(&records, selector, context, target, options)
}

fn truncate(id: &str, max_length: usize) -> String {
    id.chars().take(max_length).collect()
}

/// IDs become file names; path separators would escape the folder.
fn file_stem(id: &str) -> String {
    id.replace(['/', '\\'], "_")
}

/// One file stem per ID. Repeated stems get `_2`, `_3`, ...
fn unique_file_stems(ids: &[String]) -> Vec<String> {
    let mut used = HashSet::new();
    ids.iter()
        .map(|id| {
            let base = file_stem(id);
            let mut stem = base.clone();
            let mut i = 1;
            while used.contains(&stem) {
                i += 1;
                stem = format!("{base}_{i}");
            }
            used.insert(stem.clone());
            stem
        })
        .collect()
}
