//! Sequence optimization problems and the engine that solves them.

use crate::{
    amino_acids::synonymous_codons,
    dna_sequence::DNAsequence,
    error::{OptimizationError, OptimizationErrorKind},
    iupac_code::reverse_complement,
    specs::{Constraint, Objective, SpecLocation, non_preferred_codons},
};
use itertools::Itertools;
use log::debug;
use std::{collections::HashSet, ops::Range};

const BASES: &[u8; 4] = b"ACGT";

/// Replaces `replacement.len()` nucleotides starting at `start`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Mutation {
    pub start: usize,
    pub replacement: Vec<u8>,
}

impl Mutation {
    pub fn end(&self) -> usize {
        self.start + self.replacement.len()
    }

    fn overlaps(&self, other: &Mutation) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// One breached constraint, by index into the problem's constraints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Breach {
    pub constraint: usize,
    pub window: Range<usize>,
}

/// A sequence, the record it came from, and the specifications it has to
/// satisfy.
#[derive(Clone, Debug)]
pub struct OptimizationProblem {
    record: DNAsequence,
    sequence: Vec<u8>,
    pub constraints: Vec<Constraint>,
    pub objectives: Vec<Objective>,
    /// Upper bound on mutations combined in one search step
    pub simultaneous_mutations: usize,
}

impl OptimizationProblem {
    pub fn new(mut record: DNAsequence, constraints: Vec<Constraint>, objectives: Vec<Objective>) -> Self {
        record.make_uppercase();
        let sequence = record.sequence().to_vec();
        Self {
            record,
            sequence,
            constraints,
            objectives,
            simultaneous_mutations: 1,
        }
    }

    pub fn with_simultaneous_mutations(mut self, n: usize) -> Self {
        self.simultaneous_mutations = n.max(1);
        self
    }

    pub fn record_before(&self) -> &DNAsequence {
        &self.record
    }

    pub fn sequence_before(&self) -> &[u8] {
        self.record.sequence()
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn breaches(&self, sequence: &[u8]) -> Vec<Breach> {
        let before = self.sequence_before();
        self.constraints
            .iter()
            .enumerate()
            .flat_map(|(constraint, spec)| {
                spec.breaches(sequence, before)
                    .into_iter()
                    .map(move |window| Breach { constraint, window })
            })
            .collect()
    }

    pub fn all_constraints_pass(&self) -> bool {
        self.breaches(&self.sequence).is_empty()
    }

    pub fn objectives_score(&self, sequence: &[u8]) -> f64 {
        let before = self.sequence_before();
        self.objectives
            .iter()
            .map(|o| o.score(sequence, before))
            .sum()
    }

    /// Positions no candidate edit may touch.
    pub fn frozen_mask(&self) -> Vec<bool> {
        let mut ret = vec![false; self.len()];
        for constraint in &self.constraints {
            if let Constraint::AvoidChanges { .. } = constraint {
                for i in constraint.location_or_full(self.len()).range() {
                    ret[i] = true;
                }
            }
        }
        ret
    }

    fn translated_locations(&self) -> Vec<SpecLocation> {
        self.constraints
            .iter()
            .filter_map(|c| match c {
                Constraint::EnforceTranslation { location } => Some(location.clamp(self.len())),
                _ => None,
            })
            .collect()
    }

    /// Edits inside `window`: synonymous codon swaps where the position is
    /// translated, single-base substitutions elsewhere.
    pub fn candidate_mutations(&self, window: Range<usize>, frozen: &[bool]) -> Vec<Mutation> {
        let cds = self.translated_locations();
        let mut seen_codons = HashSet::new();
        let mut ret = vec![];
        for position in window {
            if frozen.get(position).copied().unwrap_or(true) {
                continue;
            }
            let codon = cds
                .iter()
                .find_map(|l| l.codon_window_of(position).map(|w| (w, l.reverse)));
            match codon {
                Some((codon_window, reverse)) => {
                    if !seen_codons.insert(codon_window.start) {
                        continue;
                    }
                    if codon_window.clone().any(|i| frozen[i]) {
                        continue;
                    }
                    let forward = &self.sequence[codon_window.clone()];
                    let codon = if reverse {
                        reverse_complement(forward)
                    } else {
                        forward.to_vec()
                    };
                    for alternative in synonymous_codons(&codon) {
                        let replacement = if reverse {
                            reverse_complement(&alternative)
                        } else {
                            alternative.to_vec()
                        };
                        ret.push(Mutation {
                            start: codon_window.start,
                            replacement,
                        });
                    }
                }
                None => {
                    for base in BASES.iter().filter(|b| **b != self.sequence[position]) {
                        ret.push(Mutation {
                            start: position,
                            replacement: vec![*base],
                        });
                    }
                }
            }
        }
        ret
    }

    pub fn mutated(&self, mutations: &[&Mutation]) -> Vec<u8> {
        let mut ret = self.sequence.clone();
        for mutation in mutations {
            ret[mutation.start..mutation.end()].copy_from_slice(&mutation.replacement);
        }
        ret
    }

    pub fn set_sequence(&mut self, sequence: Vec<u8>) {
        self.sequence = sequence;
    }

    /// Positions that differ from the starting sequence.
    pub fn edited_positions(&self) -> Vec<usize> {
        let before = self.sequence_before();
        (0..self.len())
            .filter(|i| !self.sequence[*i].eq_ignore_ascii_case(&before[*i]))
            .collect()
    }

    /// The starting record carrying the current sequence. With
    /// `with_sequence_edits`, each run of edited positions gets an
    /// `is_edit` feature.
    pub fn to_record(&self, with_sequence_edits: bool) -> DNAsequence {
        let mut ret = self.record.clone();
        ret.set_sequence(self.sequence.clone());
        if with_sequence_edits {
            for run in contiguous_runs(&self.edited_positions()) {
                ret.annotate(
                    run,
                    false,
                    "misc_feature",
                    &[("label", "edit"), ("is_edit", "true")],
                );
            }
        }
        ret
    }

    /// One line per constraint and objective, evaluated on `sequence`.
    pub fn evaluations_summary(&self, sequence: &[u8]) -> Vec<String> {
        let before = self.sequence_before();
        let mut ret: Vec<String> = self
            .constraints
            .iter()
            .map(|c| {
                let breaches = c.breaches(sequence, before);
                if breaches.is_empty() {
                    format!("PASS {c}")
                } else {
                    let windows = breaches
                        .iter()
                        .map(|w| format!("{}-{}", w.start, w.end))
                        .join(", ");
                    format!("FAIL {c}: breached at {windows}")
                }
            })
            .collect();
        ret.extend(
            self.objectives
                .iter()
                .map(|o| format!("SCORE {:.2} {o}", o.score(sequence, before))),
        );
        ret
    }
}

fn contiguous_runs(positions: &[usize]) -> Vec<Range<usize>> {
    let mut ret: Vec<Range<usize>> = vec![];
    for &p in positions {
        match ret.last_mut() {
            Some(run) if run.end == p => run.end = p + 1,
            _ => ret.push(p..p + 1),
        }
    }
    ret
}

/// Solves optimization problems in place.
pub trait OptimizationEngine: Send + Sync {
    /// Edits the sequence until every constraint passes.
    fn resolve_constraints(&self, problem: &mut OptimizationProblem) -> Result<(), OptimizationError>;

    /// Improves the objectives without breaking any constraint.
    fn optimize(&self, problem: &mut OptimizationProblem) -> Result<(), OptimizationError>;
}

/// Deterministic local search: fixes the first breach with the best
/// combination of up to `simultaneous_mutations` candidate edits, then climbs
/// the objective score one edit at a time.
#[derive(Clone, Debug)]
pub struct LocalSearchEngine {
    pub max_steps: usize,
    pub max_optimization_passes: usize,
}

impl Default for LocalSearchEngine {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            max_optimization_passes: 20,
        }
    }
}

impl LocalSearchEngine {
    fn better(candidate: (usize, f64), best: Option<(usize, f64)>) -> bool {
        match best {
            None => true,
            Some((breaches, score)) => {
                candidate.0 < breaches || (candidate.0 == breaches && candidate.1 > score)
            }
        }
    }

    fn improvement_candidates(&self, problem: &OptimizationProblem, frozen: &[bool]) -> Vec<Mutation> {
        let sequence = problem.sequence();
        let before = problem.sequence_before();
        let cds = problem.translated_locations();
        let mut ret = vec![];
        for objective in &problem.objectives {
            match objective {
                Objective::AvoidChanges { location, .. } => {
                    let location = location
                        .map(|l| l.clamp(problem.len()))
                        .unwrap_or_else(|| SpecLocation::new(0, problem.len()));
                    for position in location.range().filter(|i| sequence[*i] != before[*i]) {
                        let window = cds
                            .iter()
                            .find_map(|l| l.codon_window_of(position))
                            .unwrap_or(position..position + 1);
                        ret.push(Mutation {
                            start: window.start,
                            replacement: before[window].to_ascii_uppercase(),
                        });
                    }
                }
                Objective::CodonOptimize {
                    preferences,
                    location,
                    ..
                } => {
                    for (window, replacement) in non_preferred_codons(sequence, location, preferences) {
                        ret.push(Mutation {
                            start: window.start,
                            replacement,
                        });
                    }
                }
            }
        }
        ret.into_iter()
            .unique()
            .filter(|m| !(m.start..m.end()).any(|i| frozen[i]))
            .collect()
    }
}

impl OptimizationEngine for LocalSearchEngine {
    fn resolve_constraints(&self, problem: &mut OptimizationProblem) -> Result<(), OptimizationError> {
        let frozen = problem.frozen_mask();
        for step in 0..self.max_steps {
            let breaches = problem.breaches(problem.sequence());
            let Some(first) = breaches.first() else {
                return Ok(());
            };
            let constraint = &problem.constraints[first.constraint];
            let location = constraint.location_or_full(problem.len());
            let window = location
                .intersect(&first.window)
                .unwrap_or_else(|| first.window.clone());
            let candidates = problem.candidate_mutations(window.clone(), &frozen);
            if candidates.is_empty() {
                return Err(OptimizationError::new(
                    OptimizationErrorKind::NoMutationSpace,
                    format!(
                        "{constraint} is breached at {}-{} and no position there may be mutated",
                        first.window.start, first.window.end
                    ),
                ));
            }
            let current = breaches.len();
            let mut best: Option<(Vec<u8>, (usize, f64))> = None;
            for k in 1..=problem.simultaneous_mutations.min(candidates.len()) {
                for combination in candidates.iter().combinations(k) {
                    let disjoint = combination
                        .iter()
                        .tuple_combinations()
                        .all(|(a, b)| !a.overlaps(b));
                    if !disjoint {
                        continue;
                    }
                    let sequence = problem.mutated(&combination);
                    let n_breaches = problem.breaches(&sequence).len();
                    if n_breaches >= current {
                        continue;
                    }
                    let key = (n_breaches, problem.objectives_score(&sequence));
                    if Self::better(key, best.as_ref().map(|(_, k)| *k)) {
                        best = Some((sequence, key));
                    }
                }
                if best.is_some() {
                    break;
                }
            }
            match best {
                Some((sequence, (remaining, _))) => {
                    debug!(
                        "step {step}: fixed {constraint} at {}-{}, {remaining} breach(es) left",
                        window.start, window.end
                    );
                    problem.set_sequence(sequence);
                }
                None => {
                    return Err(OptimizationError::new(
                        OptimizationErrorKind::Unsatisfiable,
                        format!(
                            "Could not resolve {constraint} at {}-{}: no combination of up to {} \
                             mutation(s) reduces the {current} remaining breach(es)",
                            first.window.start, first.window.end, problem.simultaneous_mutations
                        ),
                    ));
                }
            }
        }
        if problem.all_constraints_pass() {
            Ok(())
        } else {
            Err(OptimizationError::new(
                OptimizationErrorKind::BudgetExhausted,
                format!("Constraints still breached after {} steps", self.max_steps),
            ))
        }
    }

    fn optimize(&self, problem: &mut OptimizationProblem) -> Result<(), OptimizationError> {
        if !problem.all_constraints_pass() {
            return Err(OptimizationError::new(
                OptimizationErrorKind::Unsatisfiable,
                "Cannot optimize objectives while constraints are breached",
            ));
        }
        let frozen = problem.frozen_mask();
        let mut score = problem.objectives_score(problem.sequence());
        for pass in 0..self.max_optimization_passes {
            let mut improved = false;
            for mutation in self.improvement_candidates(problem, &frozen) {
                let sequence = problem.mutated(&[&mutation]);
                if !problem.breaches(&sequence).is_empty() {
                    continue;
                }
                let new_score = problem.objectives_score(&sequence);
                if new_score > score + 1e-9 {
                    score = new_score;
                    problem.set_sequence(sequence);
                    improved = true;
                }
            }
            debug!("optimization pass {pass}: score {score:.2}");
            if !improved {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{amino_acids::{CodonUsage, translate}, specs::SitePattern};

    fn avoid(site: &str) -> Constraint {
        Constraint::AvoidPattern {
            pattern: SitePattern::from_sequence(site),
            location: None,
        }
    }

    #[test]
    fn test_removes_site_with_single_base_change() {
        let record = DNAsequence::new("r", b"AAAACGTCTCAAAA");
        let mut problem = OptimizationProblem::new(
            record,
            vec![avoid("CGTCTC")],
            vec![Objective::avoid_changes()],
        );
        LocalSearchEngine::default()
            .resolve_constraints(&mut problem)
            .unwrap();
        assert!(problem.all_constraints_pass());
        assert_eq!(problem.edited_positions().len(), 1);
    }

    #[test]
    fn test_synonymous_change_inside_cds() {
        // CGTCTC spans the codons CGT CTC (R L)
        let seq = b"ATGCGTCTCAAATAA";
        let record = DNAsequence::new("r", seq);
        let mut problem = OptimizationProblem::new(
            record,
            vec![
                avoid("CGTCTC"),
                Constraint::EnforceTranslation {
                    location: SpecLocation::new(0, 15),
                },
            ],
            vec![],
        );
        LocalSearchEngine::default()
            .resolve_constraints(&mut problem)
            .unwrap();
        assert!(problem.all_constraints_pass());
        assert_eq!(translate(problem.sequence()), translate(seq));
    }

    #[test]
    fn test_frozen_site_has_no_mutation_space() {
        let record = DNAsequence::new("r", b"AACGTCTCAA");
        let mut problem = OptimizationProblem::new(
            record,
            vec![avoid("CGTCTC"), Constraint::AvoidChanges { location: None }],
            vec![],
        );
        let err = LocalSearchEngine::default()
            .resolve_constraints(&mut problem)
            .unwrap_err();
        assert_eq!(err.kind, OptimizationErrorKind::NoMutationSpace);
        assert_eq!(problem.sequence(), b"AACGTCTCAA");
    }

    #[test]
    fn test_codon_optimization_keeps_protein() {
        let usage = CodonUsage::builtin().unwrap();
        let seq = b"TTACTATTG";
        let mut problem = OptimizationProblem::new(
            DNAsequence::new("r", seq),
            vec![Constraint::EnforceTranslation {
                location: SpecLocation::new(0, 9),
            }],
            vec![Objective::codon_optimize(
                usage.species("e_coli").unwrap(),
                SpecLocation::new(0, 9),
            )],
        );
        let engine = LocalSearchEngine::default();
        engine.resolve_constraints(&mut problem).unwrap();
        engine.optimize(&mut problem).unwrap();
        assert_eq!(problem.sequence(), b"CTGCTGCTG");
    }

    #[test]
    fn test_edit_features() {
        let mut problem = OptimizationProblem::new(DNAsequence::new("r", b"AAAAAA"), vec![], vec![]);
        problem.set_sequence(b"ACCAAT".to_vec());
        let record = problem.to_record(true);
        assert_eq!(record.features().len(), 2);
        assert_eq!(record.sequence(), b"ACCAAT");
        assert!(problem.to_record(false).features().is_empty());
    }

    #[test]
    fn test_contiguous_runs() {
        assert_eq!(contiguous_runs(&[1, 2, 3, 7, 9, 10]), vec![1..4, 7..8, 9..11]);
        assert!(contiguous_runs(&[]).is_empty());
    }
}
