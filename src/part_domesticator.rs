//! Flanks a part with standard-specific sequences and turns it into an
//! optimization problem.

use crate::{
    amino_acids::{CodonPreferences, CodonUsage, back_translate},
    dna_sequence::DNAsequence,
    domestication_result::DomesticationResult,
    enzymes::Enzymes,
    error::{DomesticationError, Result},
    iupac_code::{normalize_dna, reverse_complement},
    optimization_driver::run_optimization,
    optimizer::{OptimizationEngine, OptimizationProblem},
    specs::{Constraint, Objective, SitePattern, SpecLocation, SpecSource, extract_annotated_specs},
};
use log::debug;
use std::fmt;

/// What gets domesticated.
#[derive(Clone, Debug)]
pub enum DomesticationInput {
    Dna(Vec<u8>),
    /// Features and annotated specifications are carried over
    Record(DNAsequence),
    /// Back-translated; always handled as a coding sequence
    Protein(String),
}

impl From<DNAsequence> for DomesticationInput {
    fn from(record: DNAsequence) -> Self {
        Self::Record(record)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DomesticationOptions {
    /// `None` falls back to the domesticator's `cds_by_default`
    pub is_cds: Option<bool>,
    pub codon_optimization: Option<CodonPreferences>,
    pub extra_constraints: Vec<SpecSource<Constraint>>,
    pub extra_objectives: Vec<SpecSource<Objective>>,
    /// Whether the insert may be changed outside of coding regions
    pub edit: bool,
    pub with_report: bool,
}

/// Everything a domesticator needs besides its own definition.
#[derive(Clone, Copy)]
pub struct DomesticationContext<'a> {
    pub engine: &'a dyn OptimizationEngine,
    pub enzymes: &'a Enzymes,
    pub codon_usage: &'a CodonUsage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoldenGateDetails {
    pub enzyme: String,
    pub enzyme_site: String,
    pub left_overhang: String,
    pub right_overhang: String,
    pub extra_avoided_sites: Vec<String>,
}

/// Definition of a Golden Gate part slot.
#[derive(Clone, Debug, Default)]
pub struct GoldenGateConfig {
    pub name: String,
    pub description: Option<String>,
    pub enzyme: String,
    pub left_overhang: String,
    pub right_overhang: String,
    pub left_addition: String,
    pub right_addition: String,
    pub extra_avoided_sites: Vec<String>,
    pub cds_by_default: bool,
}

#[derive(Clone, Debug)]
pub struct PartDomesticator {
    pub name: String,
    pub description: Option<String>,
    pub left_flank: DNAsequence,
    pub right_flank: DNAsequence,
    pub constraints: Vec<SpecSource<Constraint>>,
    pub objectives: Vec<SpecSource<Objective>>,
    pub simultaneous_mutations: usize,
    pub minimize_edits: bool,
    pub cds_by_default: bool,
    pub golden_gate: Option<GoldenGateDetails>,
}

impl PartDomesticator {
    /// Plain flanks, each annotated as a whole.
    pub fn new(name: &str, left_flank: &str, right_flank: &str) -> Self {
        let mut left = DNAsequence::new("left_flank", left_flank.to_ascii_uppercase().as_bytes());
        if !left.is_empty() {
            left.annotate_full("left flank");
        }
        let mut right = DNAsequence::new("right_flank", right_flank.to_ascii_uppercase().as_bytes());
        if !right.is_empty() {
            right.annotate_full("right flank");
        }
        Self::with_flanks(name, left, right)
    }

    pub fn with_flanks(name: &str, left_flank: DNAsequence, right_flank: DNAsequence) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            left_flank,
            right_flank,
            constraints: vec![],
            objectives: vec![],
            simultaneous_mutations: 1,
            minimize_edits: true,
            cds_by_default: false,
            golden_gate: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<SpecSource<Constraint>>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_objective(mut self, objective: impl Into<SpecSource<Objective>>) -> Self {
        self.objectives.push(objective.into());
        self
    }

    pub fn with_cds_by_default(mut self, cds_by_default: bool) -> Self {
        self.cds_by_default = cds_by_default;
        self
    }

    pub fn with_simultaneous_mutations(mut self, n: usize) -> Self {
        self.simultaneous_mutations = n.max(1);
        self
    }

    pub fn with_minimize_edits(mut self, minimize_edits: bool) -> Self {
        self.minimize_edits = minimize_edits;
        self
    }

    /// Flanks `site + "A" + overhang + addition` on the left and the mirror
    /// image on the right. The assembly site and every extra site are kept
    /// out of the insert.
    pub fn golden_gate(config: &GoldenGateConfig, enzymes: &Enzymes) -> Result<Self> {
        let enzyme = enzymes.require(&config.enzyme)?;
        let site = enzyme.sequence.to_ascii_uppercase();
        let left_overhang = config.left_overhang.to_ascii_uppercase();
        let right_overhang = config.right_overhang.to_ascii_uppercase();

        let left_sequence = format!("{site}A{left_overhang}{}", config.left_addition.to_ascii_uppercase());
        let mut left = DNAsequence::new("left_flank", left_sequence.as_bytes());
        left.annotate(0..site.len(), false, "misc_feature", &[("label", enzyme.name.as_str())]);
        let oh_start = site.len() + 1;
        left.annotate(
            oh_start..oh_start + left_overhang.len(),
            false,
            "misc_feature",
            &[("label", left_overhang.as_str())],
        );

        let right_addition = config.right_addition.to_ascii_uppercase();
        let mut right_sequence = format!("{right_addition}{right_overhang}").into_bytes();
        right_sequence.extend(reverse_complement(format!("{site}A").as_bytes()));
        let mut right = DNAsequence::new("right_flank", &right_sequence);
        let oh_start = right_addition.len();
        right.annotate(
            oh_start..oh_start + right_overhang.len(),
            false,
            "misc_feature",
            &[("label", right_overhang.as_str())],
        );
        let site_start = oh_start + right_overhang.len() + 1;
        right.annotate(
            site_start..site_start + site.len(),
            true,
            "misc_feature",
            &[("label", enzyme.name.as_str())],
        );

        for (side, flank) in [("left", &left), ("right", &right)] {
            let n_sites = enzyme.find_sites(flank.sequence()).len();
            if n_sites != 1 {
                return Err(DomesticationError::invalid_input(format!(
                    "{}: {side} flank {} has {n_sites} {} site(s) instead of one",
                    config.name,
                    flank.get_forward_string(),
                    enzyme.name
                )));
            }
        }

        let mut ret = Self::with_flanks(&config.name, left, right).with_cds_by_default(config.cds_by_default);
        ret.description = config.description.clone().filter(|d| !d.is_empty());

        let left_len = ret.left_flank.len();
        let mut avoided = vec![enzyme];
        for name in &config.extra_avoided_sites {
            avoided.push(enzymes.require(name)?);
        }
        for avoided_enzyme in avoided {
            let pattern = SitePattern::from_enzyme(avoided_enzyme);
            ret.constraints.push(SpecSource::derived(move |insert: &[u8]| {
                Constraint::AvoidPattern {
                    pattern: pattern.clone(),
                    location: Some(SpecLocation::new(left_len, left_len + insert.len())),
                }
            }));
        }
        ret.golden_gate = Some(GoldenGateDetails {
            enzyme: enzyme.name.clone(),
            enzyme_site: site,
            left_overhang,
            right_overhang,
            extra_avoided_sites: config.extra_avoided_sites.clone(),
        });
        Ok(ret)
    }

    pub fn left_overhang(&self) -> Option<&str> {
        self.golden_gate.as_ref().map(|gg| gg.left_overhang.as_str())
    }

    pub fn right_overhang(&self) -> Option<&str> {
        self.golden_gate.as_ref().map(|gg| gg.right_overhang.as_str())
    }

    /// Flanked sequence plus every constraint and objective that applies to it.
    pub fn build_problem(
        &self,
        input: DomesticationInput,
        options: &DomesticationOptions,
        enzymes: &Enzymes,
        codon_usage: &CodonUsage,
    ) -> Result<OptimizationProblem> {
        let mut is_cds = options.is_cds.unwrap_or(self.cds_by_default);
        let mut extra_constraints = options.extra_constraints.clone();
        let mut extra_objectives = options.extra_objectives.clone();
        let left_len = self.left_flank.len();
        let insert = match input {
            DomesticationInput::Dna(sequence) => DNAsequence::new("", &normalize_dna(&sequence)),
            DomesticationInput::Protein(protein) => {
                is_cds = true;
                DNAsequence::new("", &back_translate(&protein, None)?)
            }
            DomesticationInput::Record(mut record) => {
                record.make_uppercase();
                let specs = extract_annotated_specs(&mut record, enzymes, codon_usage)?;
                extra_constraints.extend(
                    specs
                        .constraints
                        .iter()
                        .map(|c| SpecSource::Static(c.shifted(left_len))),
                );
                extra_objectives.extend(
                    specs
                        .objectives
                        .iter()
                        .map(|o| SpecSource::Static(o.shifted(left_len))),
                );
                record
            }
        };
        let raw = insert.sequence().to_vec();
        let insert_location = SpecLocation::new(left_len, left_len + raw.len());

        let mut constraints: Vec<Constraint> = extra_constraints
            .iter()
            .chain(self.constraints.iter())
            .map(|source| source.resolve(&raw))
            .collect();
        if is_cds {
            constraints.push(Constraint::EnforceTranslation {
                location: insert_location,
            });
        }
        if !options.edit && !is_cds {
            constraints.push(Constraint::AvoidChanges { location: None });
        }

        let mut objectives: Vec<Objective> = extra_objectives
            .iter()
            .chain(self.objectives.iter())
            .map(|source| source.resolve(&raw))
            .collect();
        if let Some(preferences) = &options.codon_optimization {
            objectives.push(Objective::codon_optimize(preferences.clone(), insert_location));
        }
        if self.minimize_edits {
            objectives.push(Objective::avoid_changes());
        }

        let id = insert.id().to_string();
        let mut extended = self.left_flank.concat(&insert).concat(&self.right_flank);
        extended.set_id(&id);
        Ok(OptimizationProblem::new(extended, constraints, objectives)
            .with_simultaneous_mutations(self.simultaneous_mutations))
    }

    pub fn domesticate(
        &self,
        context: &DomesticationContext,
        input: DomesticationInput,
        options: &DomesticationOptions,
    ) -> Result<DomesticationResult> {
        let problem = self.build_problem(input, options, context.enzymes, context.codon_usage)?;
        let project_name = match problem.record_before().id() {
            "" => self.name.clone(),
            id => format!("{} ({id})", self.name),
        };
        debug!(
            "{project_name}: {} constraint(s), {} objective(s)",
            problem.constraints.len(),
            problem.objectives.len()
        );
        let outcome = run_optimization(
            context.engine,
            problem,
            self.minimize_edits,
            options.with_report,
            &project_name,
        );
        Ok(DomesticationResult {
            record_before: outcome.record_before,
            record_after: outcome.final_record,
            edits_record: outcome.edits_record,
            success: outcome.success,
            message: outcome.message,
            report_data: outcome.report_data,
        })
    }

    /// `(label, value)` pairs describing the domesticator, empty values left out.
    pub fn details_list(&self) -> Vec<(String, String)> {
        let mut ret = vec![("Name".to_string(), self.name.clone())];
        if let Some(description) = &self.description {
            ret.push(("Description".to_string(), description.clone()));
        }
        match &self.golden_gate {
            Some(gg) => {
                ret.push(("Enzyme".to_string(), format!("{} ({})", gg.enzyme, gg.enzyme_site)));
                ret.push(("Left overhang".to_string(), gg.left_overhang.clone()));
                ret.push(("Right overhang".to_string(), gg.right_overhang.clone()));
                if !gg.extra_avoided_sites.is_empty() {
                    ret.push((
                        "Other avoided sites".to_string(),
                        gg.extra_avoided_sites.join(", "),
                    ));
                }
            }
            None => {
                ret.push(("Left flank".to_string(), self.left_flank.get_forward_string()));
                ret.push(("Right flank".to_string(), self.right_flank.get_forward_string()));
            }
        }
        ret.retain(|(_, value)| !value.is_empty());
        ret
    }
}

impl fmt::Display for PartDomesticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.golden_gate {
            Some(gg) => write!(
                f,
                "{}[{}]({}-{})",
                self.name, gg.enzyme, gg.left_overhang, gg.right_overhang
            ),
            None => write!(f, "{}", self.name),
        }
    }
}
