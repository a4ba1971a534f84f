//! Constraint and objective specifications handed to the optimization engine.

use crate::{
    amino_acids::{CodonPreferences, CodonUsage, translate},
    dna_sequence::{DNAsequence, feature_bounds, feature_is_reverse, feature_label},
    enzymes::Enzymes,
    error::{DomesticationError, Result},
    iupac_code::{find_pattern, reverse_complement},
    restriction_enzyme::RestrictionEnzyme,
};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Range, sync::Arc};

/// Half-open region `[start, end)` of the sequence under optimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecLocation {
    pub start: usize,
    pub end: usize,
    pub reverse: bool,
}

impl SpecLocation {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            reverse: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn shifted(self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            reverse: self.reverse,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Clipped to a sequence of length `len`.
    pub fn clamp(self, len: usize) -> Self {
        Self {
            start: self.start.min(len),
            end: self.end.min(len),
            reverse: self.reverse,
        }
    }

    pub fn intersect(&self, range: &Range<usize>) -> Option<Range<usize>> {
        let start = self.start.max(range.start);
        let end = self.end.min(range.end);
        (start < end).then_some(start..end)
    }

    /// Codon windows on the forward strand, read in the location's direction.
    /// A trailing partial codon is left out.
    pub fn codon_windows(&self) -> Vec<Range<usize>> {
        let n_codons = self.len() / 3;
        (0..n_codons)
            .map(|i| {
                if self.reverse {
                    let end = self.end - 3 * i;
                    end - 3..end
                } else {
                    let start = self.start + 3 * i;
                    start..start + 3
                }
            })
            .collect()
    }

    /// The codon window holding `position`, if any.
    pub fn codon_window_of(&self, position: usize) -> Option<Range<usize>> {
        if !self.contains(position) {
            return None;
        }
        let window = if self.reverse {
            let k = (self.end - position - 1) / 3;
            let end = self.end - 3 * k;
            end.checked_sub(3)?..end
        } else {
            let k = (position - self.start) / 3;
            let start = self.start + 3 * k;
            start..start + 3
        };
        (window.start >= self.start && window.end <= self.end).then_some(window)
    }
}

impl fmt::Display for SpecLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strand = if self.reverse { "-" } else { "+" };
        write!(f, "{}-{}({strand})", self.start, self.end)
    }
}

/// A sequence to keep out of a region, on either strand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePattern {
    pub name: String,
    pub site: String,
}

impl SitePattern {
    pub fn from_enzyme(enzyme: &RestrictionEnzyme) -> Self {
        Self {
            name: format!("{}_site", enzyme.name),
            site: enzyme.sequence.to_ascii_uppercase(),
        }
    }

    pub fn from_sequence(site: &str) -> Self {
        let site = site.to_ascii_uppercase();
        Self {
            name: site.clone(),
            site,
        }
    }

    /// Windows of every occurrence, both strands, sorted by start.
    pub fn occurrences(&self, sequence: &[u8]) -> Vec<Range<usize>> {
        let len = self.site.len();
        let forward = self.site.as_bytes();
        let reverse = reverse_complement(forward);
        let mut starts = find_pattern(sequence, forward);
        if reverse != forward {
            starts.extend(find_pattern(sequence, &reverse));
            starts.sort_unstable();
            starts.dedup();
        }
        starts.into_iter().map(|s| s..s + len).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// No occurrence of the pattern may overlap the location.
    AvoidPattern {
        pattern: SitePattern,
        location: Option<SpecLocation>,
    },
    /// The protein encoded over the location must not change.
    EnforceTranslation { location: SpecLocation },
    /// No nucleotide of the location may change.
    AvoidChanges { location: Option<SpecLocation> },
}

impl Constraint {
    pub fn location(&self) -> Option<SpecLocation> {
        match self {
            Self::AvoidPattern { location, .. } | Self::AvoidChanges { location } => *location,
            Self::EnforceTranslation { location } => Some(*location),
        }
    }

    pub fn location_or_full(&self, len: usize) -> SpecLocation {
        self.location()
            .map(|l| l.clamp(len))
            .unwrap_or_else(|| SpecLocation::new(0, len))
    }

    pub fn shifted(&self, offset: usize) -> Self {
        match self {
            Self::AvoidPattern { pattern, location } => Self::AvoidPattern {
                pattern: pattern.clone(),
                location: location.map(|l| l.shifted(offset)),
            },
            Self::EnforceTranslation { location } => Self::EnforceTranslation {
                location: location.shifted(offset),
            },
            Self::AvoidChanges { location } => Self::AvoidChanges {
                location: location.map(|l| l.shifted(offset)),
            },
        }
    }

    /// Regions where the constraint is breached; empty means it passes.
    pub fn breaches(&self, sequence: &[u8], before: &[u8]) -> Vec<Range<usize>> {
        let location = self.location_or_full(sequence.len());
        match self {
            Self::AvoidPattern { pattern, .. } => pattern
                .occurrences(sequence)
                .into_iter()
                .filter(|window| location.intersect(window).is_some())
                .collect(),
            Self::EnforceTranslation { .. } => location
                .codon_windows()
                .into_iter()
                .filter(|w| {
                    codon_amino_acid(&sequence[w.clone()], location.reverse)
                        != codon_amino_acid(&before[w.clone()], location.reverse)
                })
                .collect(),
            Self::AvoidChanges { .. } => location
                .range()
                .filter(|i| sequence.get(*i) != before.get(*i))
                .map(|i| i..i + 1)
                .collect(),
        }
    }

    pub fn passes(&self, sequence: &[u8], before: &[u8]) -> bool {
        self.breaches(sequence, before).is_empty()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self
            .location()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "all".to_string());
        match self {
            Self::AvoidPattern { pattern, .. } => {
                write!(f, "AvoidPattern[{}]({location})", pattern.name)
            }
            Self::EnforceTranslation { .. } => write!(f, "EnforceTranslation({location})"),
            Self::AvoidChanges { .. } => write!(f, "AvoidChanges({location})"),
        }
    }
}

fn codon_amino_acid(codon: &[u8], reverse: bool) -> Vec<u8> {
    if reverse {
        translate(&reverse_complement(codon))
    } else {
        translate(codon)
    }
}

pub const DEFAULT_CODON_OPTIMIZATION_BOOST: f64 = 4.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Objective {
    /// Each changed nucleotide costs `boost`.
    AvoidChanges {
        location: Option<SpecLocation>,
        boost: f64,
    },
    /// Each codon differing from the species' preferred codon costs `boost`.
    CodonOptimize {
        preferences: CodonPreferences,
        location: SpecLocation,
        boost: f64,
    },
}

impl Objective {
    pub fn avoid_changes() -> Self {
        Self::AvoidChanges {
            location: None,
            boost: 1.0,
        }
    }

    pub fn codon_optimize(preferences: CodonPreferences, location: SpecLocation) -> Self {
        Self::CodonOptimize {
            preferences,
            location,
            boost: DEFAULT_CODON_OPTIMIZATION_BOOST,
        }
    }

    pub fn location(&self) -> Option<SpecLocation> {
        match self {
            Self::AvoidChanges { location, .. } => *location,
            Self::CodonOptimize { location, .. } => Some(*location),
        }
    }

    pub fn shifted(&self, offset: usize) -> Self {
        match self {
            Self::AvoidChanges { location, boost } => Self::AvoidChanges {
                location: location.map(|l| l.shifted(offset)),
                boost: *boost,
            },
            Self::CodonOptimize {
                preferences,
                location,
                boost,
            } => Self::CodonOptimize {
                preferences: preferences.clone(),
                location: location.shifted(offset),
                boost: *boost,
            },
        }
    }

    /// Higher is better; a perfect score is zero.
    pub fn score(&self, sequence: &[u8], before: &[u8]) -> f64 {
        match self {
            Self::AvoidChanges { location, boost } => {
                let location = location
                    .map(|l| l.clamp(sequence.len()))
                    .unwrap_or_else(|| SpecLocation::new(0, sequence.len()));
                let changes = location
                    .range()
                    .filter(|i| sequence.get(*i) != before.get(*i))
                    .count();
                -boost * changes as f64
            }
            Self::CodonOptimize {
                preferences,
                location,
                boost,
            } => {
                let misses = non_preferred_codons(sequence, location, preferences).len();
                -boost * misses as f64
            }
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self
            .location()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "all".to_string());
        match self {
            Self::AvoidChanges { .. } => write!(f, "AvoidChanges({location})"),
            Self::CodonOptimize { preferences, .. } => {
                write!(f, "CodonOptimize[{}]({location})", preferences.species)
            }
        }
    }
}

/// Codon windows whose codon is not the preferred one, with that preferred
/// codon already oriented for the forward strand.
pub fn non_preferred_codons(
    sequence: &[u8],
    location: &SpecLocation,
    preferences: &CodonPreferences,
) -> Vec<(Range<usize>, Vec<u8>)> {
    let location = location.clamp(sequence.len());
    location
        .codon_windows()
        .into_iter()
        .filter_map(|window| {
            let forward = &sequence[window.clone()];
            let codon = if location.reverse {
                reverse_complement(forward)
            } else {
                forward.to_vec()
            };
            let aa = *translate(&codon).first()?;
            let preferred = preferences.preferred(aa)?;
            if preferred.eq_ignore_ascii_case(&codon) {
                return None;
            }
            let replacement = if location.reverse {
                reverse_complement(preferred)
            } else {
                preferred.to_vec()
            };
            Some((window, replacement))
        })
        .collect()
}

/// Either a fixed specification or one computed from the raw insert when a
/// domesticator builds its problem.
pub enum SpecSource<T> {
    Static(T),
    Derived(Arc<dyn Fn(&[u8]) -> T + Send + Sync>),
}

impl<T: Clone> SpecSource<T> {
    pub fn derived(f: impl Fn(&[u8]) -> T + Send + Sync + 'static) -> Self {
        Self::Derived(Arc::new(f))
    }

    pub fn resolve(&self, insert: &[u8]) -> T {
        match self {
            Self::Static(spec) => spec.clone(),
            Self::Derived(f) => f(insert),
        }
    }
}

impl<T: Clone> Clone for SpecSource<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(spec) => Self::Static(spec.clone()),
            Self::Derived(f) => Self::Derived(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SpecSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(spec) => f.debug_tuple("Static").field(spec).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl<T> From<T> for SpecSource<T> {
    fn from(spec: T) -> Self {
        Self::Static(spec)
    }
}

/// Specifications read back from feature labels such as
/// `@avoid_pattern(BsaI_site)`, `@cds`, `@keep` or `~codon_optimize(e_coli)`.
#[derive(Clone, Debug, Default)]
pub struct AnnotatedSpecs {
    pub constraints: Vec<Constraint>,
    pub objectives: Vec<Objective>,
}

/// Pulls spec annotations out of a record. The spec features are removed from
/// the record; all other features stay.
pub fn extract_annotated_specs(
    record: &mut DNAsequence,
    enzymes: &Enzymes,
    codon_usage: &CodonUsage,
) -> Result<AnnotatedSpecs> {
    let mut ret = AnnotatedSpecs::default();
    let mut kept = vec![];
    for feature in record.features().iter() {
        let label = feature_label(feature).unwrap_or_default().trim();
        let is_constraint = label.starts_with('@');
        let is_objective = label.starts_with('~');
        if !is_constraint && !is_objective {
            kept.push(feature.clone());
            continue;
        }
        let (start, end) = feature_bounds(feature).ok_or_else(|| {
            DomesticationError::invalid_input(format!("Spec feature '{label}' has no usable location"))
        })?;
        let mut location = SpecLocation::new(start, end);
        if feature_is_reverse(feature) {
            location = location.reversed();
        }
        let (name, argument) = parse_spec_label(&label[1..]);
        match (is_constraint, name.as_str()) {
            (true, "avoid_pattern") | (true, "no") => {
                let argument = argument.ok_or_else(|| {
                    DomesticationError::invalid_input(format!("'{label}' needs a pattern"))
                })?;
                let pattern = match argument.strip_suffix("_site") {
                    Some(enzyme) => SitePattern::from_enzyme(enzymes.require(enzyme)?),
                    None => match enzymes.get(&argument) {
                        Some(enzyme) => SitePattern::from_enzyme(enzyme),
                        None => SitePattern::from_sequence(&argument),
                    },
                };
                ret.constraints.push(Constraint::AvoidPattern {
                    pattern,
                    location: Some(location),
                });
            }
            (true, "cds") | (true, "enforce_translation") => {
                ret.constraints
                    .push(Constraint::EnforceTranslation { location });
            }
            (true, "keep") | (true, "avoid_changes") => {
                ret.constraints.push(Constraint::AvoidChanges {
                    location: Some(location),
                });
            }
            (false, "keep") | (false, "avoid_changes") => {
                ret.objectives.push(Objective::AvoidChanges {
                    location: Some(location),
                    boost: 1.0,
                });
            }
            (false, "codon_optimize") => {
                let species = argument.ok_or_else(|| {
                    DomesticationError::invalid_input(format!("'{label}' needs a species"))
                })?;
                ret.objectives.push(Objective::codon_optimize(
                    codon_usage.species(&species)?,
                    location,
                ));
            }
            _ => {
                return Err(DomesticationError::invalid_input(format!(
                    "Unknown specification annotation '{label}'"
                )));
            }
        }
    }
    *record.features_mut() = kept;
    Ok(ret)
}

fn parse_spec_label(label: &str) -> (String, Option<String>) {
    match label.split_once('(') {
        Some((name, rest)) => {
            let argument = rest.trim_end_matches(')').trim();
            (
                name.trim().to_ascii_lowercase(),
                (!argument.is_empty()).then(|| argument.to_string()),
            )
        }
        None => (label.trim().to_ascii_lowercase(), None),
    }
}
