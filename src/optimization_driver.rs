use crate::{
    dna_sequence::DNAsequence,
    optimizer::{OptimizationEngine, OptimizationProblem},
};
use log::{debug, info};

/// Outcome of one optimization run. A failed run carries whatever edits the
/// engine made before giving up, and the engine's message.
#[derive(Clone, Debug)]
pub struct OptimizationOutcome {
    pub record_before: DNAsequence,
    pub final_record: DNAsequence,
    pub edits_record: DNAsequence,
    pub success: bool,
    pub message: Option<String>,
    pub report_data: Option<Vec<u8>>,
}

/// Runs an engine on a problem and never fails: engine errors become a
/// failed outcome.
///
/// The problem is returned untouched when its constraints already pass and it
/// has no objective besides the edit minimization added by `minimize_edits`.
pub fn run_optimization(
    engine: &dyn OptimizationEngine,
    mut problem: OptimizationProblem,
    minimize_edits: bool,
    with_report: bool,
    project_name: &str,
) -> OptimizationOutcome {
    let record_before = problem.record_before().clone();
    let counted_objectives = problem
        .objectives
        .len()
        .saturating_sub(usize::from(minimize_edits));
    if problem.all_constraints_pass() && counted_objectives == 0 {
        debug!("{project_name}: nothing to optimize");
        let report_data = with_report.then(|| {
            render_report(project_name, &problem, true, None).into_bytes()
        });
        return OptimizationOutcome {
            final_record: record_before.clone(),
            edits_record: record_before.clone(),
            record_before,
            success: true,
            message: None,
            report_data,
        };
    }

    let result = engine
        .resolve_constraints(&mut problem)
        .and_then(|_| engine.optimize(&mut problem));
    let (success, message) = match result {
        Ok(()) => (true, None),
        Err(e) => {
            info!("{project_name}: optimization failed: {e}");
            (false, Some(e.message))
        }
    };
    let report_data = with_report.then(|| {
        render_report(project_name, &problem, success, message.as_deref()).into_bytes()
    });
    OptimizationOutcome {
        final_record: problem.to_record(false),
        edits_record: problem.to_record(true),
        record_before,
        success,
        message,
        report_data,
    }
}

fn render_report(
    project_name: &str,
    problem: &OptimizationProblem,
    success: bool,
    message: Option<&str>,
) -> String {
    let mut lines = vec![
        format!("Optimization report: {project_name}"),
        format!("Sequence length: {} bp", problem.len()),
        format!(
            "Status: {}",
            if success { "success" } else { "failure" }
        ),
    ];
    if let Some(message) = message {
        lines.push(format!("Error: {message}"));
    }
    lines.push(format!("Edited positions: {}", problem.edited_positions().len()));
    lines.push(String::new());
    lines.push("Before optimization:".to_string());
    lines.extend(
        problem
            .evaluations_summary(problem.sequence_before())
            .into_iter()
            .map(|l| format!("  {l}")),
    );
    lines.push(String::new());
    lines.push("After optimization:".to_string());
    lines.extend(
        problem
            .evaluations_summary(problem.sequence())
            .into_iter()
            .map(|l| format!("  {l}")),
    );
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dna_sequence::feature_qualifier,
        optimizer::LocalSearchEngine,
        specs::{Constraint, Objective, SitePattern, SpecLocation},
    };

    fn avoid_bsmbi() -> Constraint {
        Constraint::AvoidPattern {
            pattern: SitePattern::from_sequence("CGTCTC"),
            location: None,
        }
    }

    #[test]
    fn test_short_circuit_ignores_edit_objective() {
        let record = DNAsequence::new("ok", b"AAAATTTT");
        let problem = OptimizationProblem::new(
            record,
            vec![avoid_bsmbi()],
            vec![Objective::avoid_changes()],
        );
        let outcome = run_optimization(&LocalSearchEngine::default(), problem, true, false, "ok");
        assert!(outcome.success);
        assert_eq!(outcome.final_record.sequence(), b"AAAATTTT");
        assert!(outcome.report_data.is_none());
    }

    #[test]
    fn test_edits_are_flagged() {
        let record = DNAsequence::new("site", b"AAAACGTCTCAAAA");
        let problem = OptimizationProblem::new(
            record,
            vec![avoid_bsmbi()],
            vec![Objective::avoid_changes()],
        );
        let outcome = run_optimization(&LocalSearchEngine::default(), problem, true, true, "site");
        assert!(outcome.success);
        assert_ne!(outcome.final_record.sequence(), b"AAAACGTCTCAAAA");
        assert!(outcome.final_record.features().is_empty());
        assert!(
            outcome
                .edits_record
                .features()
                .iter()
                .any(|f| feature_qualifier(f, "is_edit").is_some())
        );
        let report = String::from_utf8(outcome.report_data.unwrap()).unwrap();
        assert!(report.contains("Status: success"));
        let (before, after) = report.split_once("After optimization:").unwrap();
        assert!(before.contains("FAIL AvoidPattern[CGTCTC]"));
        assert!(after.contains("PASS AvoidPattern[CGTCTC]"));
    }

    #[test]
    fn test_failure_is_captured() {
        let record = DNAsequence::new("frozen", b"AACGTCTCAA");
        let problem = OptimizationProblem::new(
            record,
            vec![avoid_bsmbi(), Constraint::AvoidChanges { location: None }],
            vec![],
        );
        let outcome = run_optimization(&LocalSearchEngine::default(), problem, false, true, "frozen");
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("no position there may be mutated"));
        assert_eq!(outcome.final_record.sequence(), b"AACGTCTCAA");
        assert!(outcome.edits_record.features().is_empty());
        let report = String::from_utf8(outcome.report_data.unwrap()).unwrap();
        assert!(report.contains("FAIL AvoidPattern[CGTCTC]"));
    }

    #[test]
    fn test_failure_keeps_edits_made_so_far() {
        // the first site can be fixed, the second one is frozen
        let sequence = b"AACGTCTCAAGGGGCGTCTCAA";
        let record = DNAsequence::new("half", sequence);
        let problem = OptimizationProblem::new(
            record,
            vec![
                avoid_bsmbi(),
                Constraint::AvoidChanges {
                    location: Some(SpecLocation::new(14, 20)),
                },
            ],
            vec![],
        );
        let outcome = run_optimization(&LocalSearchEngine::default(), problem, false, false, "half");
        assert!(!outcome.success);
        assert_eq!(outcome.record_before.sequence(), sequence);
        let edited = outcome
            .final_record
            .sequence()
            .iter()
            .zip(sequence.iter())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(edited, 1);
        assert_eq!(&outcome.final_record.sequence()[14..20], b"CGTCTC");
        let edit_features: Vec<_> = outcome
            .edits_record
            .features()
            .iter()
            .filter(|f| feature_qualifier(f, "is_edit").is_some())
            .collect();
        assert_eq!(edit_features.len(), 1);
    }
}
