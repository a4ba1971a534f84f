//! Assembly standards: named sets of part domesticators, one per slot.

use crate::{
    dna_sequence::DNAsequence,
    enzymes::Enzymes,
    error::{DomesticationError, Result},
    part_domesticator::{GoldenGateConfig, PartDomesticator},
};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::{collections::BTreeMap, fmt, fs::File, io::Read, path::Path, sync::Arc};

const REQUIRED_COLUMNS: &[&str] = &[
    "slot_name",
    "left_overhang",
    "right_overhang",
    "left_addition",
    "right_addition",
    "enzyme",
    "extra_avoided_sites",
    "description",
];

const BUILTIN_STANDARDS: &[(&str, &str)] = &[(
    "moclo_level0",
    include_str!("../assets/standards/moclo_level0.csv"),
)];

/// Picks the slot a record belongs to.
pub trait SlotResolver: Send + Sync {
    fn slot_for(&self, record: &DNAsequence) -> Option<String>;
}

/// `position_partname` convention: the slot is the ID up to the first
/// separator.
#[derive(Clone, Debug)]
pub struct PrefixSlotResolver {
    pub separator: char,
}

impl Default for PrefixSlotResolver {
    fn default() -> Self {
        Self { separator: '_' }
    }
}

impl SlotResolver for PrefixSlotResolver {
    fn slot_for(&self, record: &DNAsequence) -> Option<String> {
        record
            .id()
            .split(self.separator)
            .next()
            .filter(|slot| !slot.is_empty())
            .map(|slot| slot.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct StandardRow {
    slot_name: String,
    left_overhang: String,
    right_overhang: String,
    left_addition: String,
    right_addition: String,
    enzyme: String,
    extra_avoided_sites: String,
    description: String,
    #[serde(default)]
    is_cds: Option<String>,
}

#[derive(Clone)]
pub struct DomesticationStandard {
    name: String,
    slots: Vec<(String, PartDomesticator)>,
    resolver: Arc<dyn SlotResolver>,
}

impl DomesticationStandard {
    /// Golden Gate slots must all use the same assembly enzyme.
    pub fn new(name: &str, slots: Vec<(String, PartDomesticator)>) -> Result<Self> {
        let mut enzymes = slots
            .iter()
            .filter_map(|(_, d)| d.golden_gate.as_ref().map(|gg| gg.enzyme.as_str()));
        if let Some(first) = enzymes.next() {
            if let Some(other) = enzymes.find(|e| *e != first) {
                return Err(DomesticationError::invalid_input(format!(
                    "Standard '{name}' mixes assembly enzymes {first} and {other}"
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            slots,
            resolver: Arc::new(PrefixSlotResolver::default()),
        })
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SlotResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Reads one slot per CSV row. Domesticator names are `name_prefix`
    /// followed by the slot name.
    pub fn from_csv_reader<R: Read>(
        name: &str,
        reader: R,
        name_prefix: &str,
        enzymes: &Enzymes,
    ) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == *column) {
                return Err(DomesticationError::invalid_input(format!(
                    "Standard '{name}' has no '{column}' column"
                )));
            }
        }
        let mut slots = vec![];
        for row in rdr.deserialize::<StandardRow>() {
            let row = row?;
            let config = GoldenGateConfig {
                name: format!("{name_prefix}{}", row.slot_name),
                description: Some(row.description).filter(|d| !d.is_empty()),
                enzyme: row.enzyme,
                left_overhang: row.left_overhang,
                right_overhang: row.right_overhang,
                left_addition: row.left_addition,
                right_addition: row.right_addition,
                extra_avoided_sites: row
                    .extra_avoided_sites
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                cds_by_default: row.is_cds.as_deref().map(str::trim) == Some("yes"),
            };
            slots.push((row.slot_name, PartDomesticator::golden_gate(&config, enzymes)?));
        }
        Self::new(name, slots)
    }

    /// Only CSV spreadsheets are read; the standard takes the file stem as
    /// its name.
    pub fn from_csv_file(path: &Path, name_prefix: &str, enzymes: &Enzymes) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if extension != "csv" {
            return Err(DomesticationError::unsupported(format!(
                "Cannot read standard spreadsheet {} (only .csv is supported)",
                path.display()
            )));
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_csv_reader(&name, File::open(path)?, name_prefix, enzymes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_names(&self) -> Vec<&str> {
        self.slots.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn slot(&self, slot_name: &str) -> Option<&PartDomesticator> {
        self.slots
            .iter()
            .find(|(name, _)| name == slot_name)
            .map(|(_, d)| d)
    }

    pub fn domesticators(&self) -> impl Iterator<Item = &PartDomesticator> {
        self.slots.iter().map(|(_, d)| d)
    }

    /// A record whose slot cannot be resolved is a configuration error.
    pub fn domesticator_for(&self, record: &DNAsequence) -> Result<&PartDomesticator> {
        let slot = self.resolver.slot_for(record).ok_or_else(|| {
            DomesticationError::not_found(format!(
                "No slot can be derived from record ID '{}'",
                record.id()
            ))
        })?;
        self.slot(&slot).ok_or_else(|| {
            DomesticationError::not_found(format!(
                "Record '{}' asks for slot '{slot}', which standard '{}' does not have (slots: {})",
                record.id(),
                self.name,
                self.slot_names().join(", ")
            ))
        })
    }

    /// Overhangs in assembly order: the first slot's left overhang, then
    /// for each slot its right overhang and its left overhang, skipping
    /// those already listed.
    pub fn list_overhangs(&self) -> Vec<String> {
        let first = self.domesticators().next().and_then(|d| d.left_overhang());
        let mut ret: Vec<String> = first.into_iter().map(|o| o.to_string()).collect();
        for domesticator in self.domesticators() {
            for overhang in [domesticator.right_overhang(), domesticator.left_overhang()]
                .into_iter()
                .flatten()
            {
                if !ret.iter().any(|o| o == overhang) {
                    ret.push(overhang.to_string());
                }
            }
        }
        ret
    }
}

impl fmt::Debug for DomesticationStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomesticationStandard")
            .field("name", &self.name)
            .field("slots", &self.slot_names())
            .finish()
    }
}

/// Standards available by name. Built explicitly, passed where needed.
#[derive(Clone, Debug, Default)]
pub struct StandardsRegistry {
    standards: BTreeMap<String, DomesticationStandard>,
}

impl StandardsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standards bundled with the crate.
    pub fn builtin(enzymes: &Enzymes) -> Result<Self> {
        let mut ret = Self::new();
        for (name, csv_text) in BUILTIN_STANDARDS {
            let prefix = format!("{name}_");
            ret.insert(DomesticationStandard::from_csv_reader(
                name,
                csv_text.as_bytes(),
                &prefix,
                enzymes,
            )?);
        }
        Ok(ret)
    }

    pub fn insert(&mut self, standard: DomesticationStandard) {
        self.standards.insert(standard.name().to_string(), standard);
    }

    pub fn get(&self, name: &str) -> Option<&DomesticationStandard> {
        self.standards.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&DomesticationStandard> {
        self.get(name)
            .ok_or_else(|| DomesticationError::not_found(format!("Unknown standard '{name}'")))
    }

    pub fn names(&self) -> Vec<&str> {
        self.standards.keys().map(|k| k.as_str()).collect()
    }
}
