//! Named barcodes, prepended to domesticated parts so they can be told apart
//! after pooling.

use crate::{
    dna_sequence::DNAsequence,
    error::{DomesticationError, Result},
};
use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};

/// Ordered barcodes with unique names and unique sequences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct BarcodesCollection {
    barcodes: Vec<(String, String)>,
}

impl BarcodesCollection {
    pub fn new(barcodes: Vec<(String, String)>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut sequences = HashSet::new();
        let mut ret = vec![];
        for (name, sequence) in barcodes {
            let sequence = sequence.trim().to_ascii_uppercase();
            if !names.insert(name.clone()) {
                return Err(DomesticationError::invalid_input(format!(
                    "Duplicate barcode name '{name}'"
                )));
            }
            if !sequences.insert(sequence.clone()) {
                return Err(DomesticationError::invalid_input(format!(
                    "Barcode '{name}' repeats sequence {sequence}"
                )));
            }
            ret.push((name, sequence));
        }
        Ok(Self { barcodes: ret })
    }

    pub fn from_fasta_file(path: &Path) -> Result<Self> {
        let records = DNAsequence::from_fasta_file(path)?;
        Self::new(
            records
                .into_iter()
                .map(|r| (r.id().to_string(), r.get_forward_string()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.barcodes.iter().map(|(n, s)| (n.as_str(), s.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.barcodes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.as_str())
    }

    pub fn to_fasta(&self) -> Result<String> {
        let mut data = vec![];
        {
            let mut writer = fasta::Writer::new(&mut data);
            for (name, sequence) in self.iter() {
                writer.write(name, None, sequence.as_bytes())?;
            }
            writer.flush()?;
        }
        String::from_utf8(data).map_err(|e| DomesticationError::invalid_input(e.to_string()))
    }

    pub fn to_records(&self) -> Vec<DNAsequence> {
        self.iter()
            .map(|(name, sequence)| {
                let mut record = DNAsequence::new(name, sequence.as_bytes());
                record.annotate_full(name);
                record
            })
            .collect()
    }
}

impl TryFrom<Vec<(String, String)>> for BarcodesCollection {
    type Error = DomesticationError;

    fn try_from(barcodes: Vec<(String, String)>) -> Result<Self> {
        Self::new(barcodes)
    }
}

impl From<BarcodesCollection> for Vec<(String, String)> {
    fn from(collection: BarcodesCollection) -> Self {
        collection.barcodes
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeOrder {
    #[default]
    SameAsRecords,
    /// Barcodes go to records from shortest to longest
    BySize,
}

/// One `(name, sequence)` per record: the collection repeated cyclically,
/// either in record order or paired with records sorted by length.
pub fn assign_barcodes(
    collection: &BarcodesCollection,
    record_lengths: &[usize],
    order: BarcodeOrder,
) -> Vec<(String, String)> {
    if collection.is_empty() {
        return vec![];
    }
    let cyclic: Vec<&(String, String)> = collection
        .barcodes
        .iter()
        .cycle()
        .take(record_lengths.len())
        .collect();
    match order {
        BarcodeOrder::SameAsRecords => cyclic.into_iter().cloned().collect(),
        BarcodeOrder::BySize => {
            let mut by_size: Vec<usize> = (0..record_lengths.len()).collect();
            by_size.sort_by_key(|i| record_lengths[*i]);
            let mut ret = vec![(String::new(), String::new()); record_lengths.len()];
            for (rank, record_index) in by_size.into_iter().enumerate() {
                ret[record_index] = cyclic[rank].clone();
            }
            ret
        }
    }
}

/// Prepends `barcode + spacer`, the barcode carried as its own feature.
pub fn apply_barcode(record: &DNAsequence, name: &str, sequence: &str, spacer: &str) -> DNAsequence {
    let mut full = format!("{sequence}{spacer}").to_ascii_uppercase().into_bytes();
    let mut ret = record.clone();
    ret.shift_features(full.len() as i64);
    full.extend_from_slice(record.sequence());
    ret.set_sequence(full);
    ret.annotate(
        0..sequence.len(),
        false,
        "misc_feature",
        &[("label", name), ("barcode", name)],
    );
    ret.features_mut().rotate_right(1);
    ret
}
