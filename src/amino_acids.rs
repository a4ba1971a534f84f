//! Standard genetic code and per-species codon preferences.

use crate::error::{DomesticationError, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BUILTIN_CODON_CATALOG: &str = include_str!("../assets/codon_catalog.csv");

// NCBI translation table 1, codons enumerated in TCAG order.
const STANDARD_TABLE: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";
const BASE_ORDER: &[u8; 4] = b"TCAG";

fn base_index(base: u8) -> Option<usize> {
    BASE_ORDER.iter().position(|b| *b == base.to_ascii_uppercase())
}

/// Amino acid for one codon, `X` if the codon holds anything but ACGT.
pub fn translate_codon(codon: &[u8]) -> u8 {
    if codon.len() != 3 {
        return b'X';
    }
    match (
        base_index(codon[0]),
        base_index(codon[1]),
        base_index(codon[2]),
    ) {
        (Some(a), Some(b), Some(c)) => STANDARD_TABLE[a * 16 + b * 4 + c],
        _ => b'X',
    }
}

/// Translates complete codons; a trailing partial codon is ignored.
pub fn translate(sequence: &[u8]) -> Vec<u8> {
    sequence.chunks_exact(3).map(translate_codon).collect()
}

/// All codons of the amino acid, in table order.
pub fn codons_for(amino_acid: u8) -> Vec<[u8; 3]> {
    let amino_acid = amino_acid.to_ascii_uppercase();
    STANDARD_TABLE
        .iter()
        .enumerate()
        .filter(|(_, aa)| **aa == amino_acid)
        .map(|(i, _)| [BASE_ORDER[i / 16], BASE_ORDER[(i / 4) % 4], BASE_ORDER[i % 4]])
        .collect()
}

/// Codons coding for the same amino acid, without the codon itself.
pub fn synonymous_codons(codon: &[u8]) -> Vec<[u8; 3]> {
    let aa = translate_codon(codon);
    if aa == b'X' {
        return vec![];
    }
    codons_for(aa)
        .into_iter()
        .filter(|c| !c.eq_ignore_ascii_case(codon))
        .collect()
}

/// Preferred codon per amino acid for one species.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodonPreferences {
    pub species: String,
    pub codons: HashMap<char, String>,
}

impl CodonPreferences {
    pub fn preferred(&self, amino_acid: u8) -> Option<&[u8]> {
        self.codons
            .get(&(amino_acid.to_ascii_uppercase() as char))
            .map(|c| c.as_bytes())
    }
}

/// Turns a protein into DNA. Without preferences the first codon of the
/// standard table is used for every residue.
pub fn back_translate(protein: &str, preferences: Option<&CodonPreferences>) -> Result<Vec<u8>> {
    let mut ret = Vec::with_capacity(protein.len() * 3);
    for residue in protein.bytes().filter(|c| !c.is_ascii_whitespace()) {
        let codon = match preferences.and_then(|p| p.preferred(residue)) {
            Some(codon) => codon.to_vec(),
            None => codons_for(residue)
                .first()
                .map(|c| c.to_vec())
                .ok_or_else(|| {
                    DomesticationError::invalid_input(format!(
                        "Cannot back-translate residue '{}'",
                        residue as char
                    ))
                })?,
        };
        ret.extend(codon);
    }
    Ok(ret)
}

#[derive(Clone, Debug, Default)]
pub struct CodonUsage {
    species: HashMap<String, CodonPreferences>,
}

impl CodonUsage {
    pub fn from_csv_text(text: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());
        let species_names: Vec<String> = rdr.headers()?.iter().skip(2).map(|s| s.to_string()).collect();
        let mut ret = Self::default();
        for name in &species_names {
            ret.species.insert(
                name.clone(),
                CodonPreferences {
                    species: name.clone(),
                    codons: HashMap::new(),
                },
            );
        }
        for record in rdr.records() {
            let record = record?;
            let mut fields = record.iter();
            let letter = fields
                .next()
                .and_then(|l| l.chars().next())
                .ok_or_else(|| DomesticationError::invalid_input("Codon catalog row without letter"))?;
            let fields = fields.skip(1); // TLA
            for (codon, species) in fields.zip(species_names.iter()) {
                let codon = codon.trim().to_ascii_uppercase();
                if translate_codon(codon.as_bytes()) as char != letter {
                    return Err(DomesticationError::invalid_input(format!(
                        "Codon {codon} for {species} does not code for {letter}"
                    )));
                }
                if let Some(prefs) = ret.species.get_mut(species) {
                    prefs.codons.insert(letter, codon);
                }
            }
        }
        Ok(ret)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_csv_text(BUILTIN_CODON_CATALOG)
    }

    pub fn species(&self, name: &str) -> Result<CodonPreferences> {
        self.species.get(name).cloned().ok_or_else(|| {
            DomesticationError::not_found(format!("No codon usage for species '{name}'"))
        })
    }

    pub fn species_names(&self) -> Vec<&str> {
        let mut ret: Vec<&str> = self.species.keys().map(|s| s.as_str()).collect();
        ret.sort();
        ret
    }
}
