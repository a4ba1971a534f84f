use crate::dna_sequence::{DNAsequence, feature_bounds, feature_qualifier};
use std::fmt;

/// A domesticated part, or the reason it could not be domesticated.
#[derive(Clone, Debug)]
pub struct DomesticationResult {
    /// Flanked sequence before optimization
    pub record_before: DNAsequence,
    /// Flanked sequence after optimization, without edit annotations
    pub record_after: DNAsequence,
    /// `record_after` with every edit run flagged `is_edit`
    pub edits_record: DNAsequence,
    pub success: bool,
    pub message: Option<String>,
    pub report_data: Option<Vec<u8>>,
}

impl DomesticationResult {
    /// Edited nucleotides, counted from the edit annotations.
    pub fn number_of_edits(&self) -> usize {
        self.edits_record
            .features()
            .iter()
            .filter(|f| feature_qualifier(f, "is_edit").is_some())
            .filter_map(feature_bounds)
            .map(|(start, end)| end - start)
            .sum()
    }

    pub fn summary(&self) -> String {
        if self.success {
            format!("SUCCESS - {} nucleotides edited.", self.number_of_edits())
        } else {
            format!(
                "FAILURE - {}",
                self.message.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

impl fmt::Display for DomesticationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool) -> DomesticationResult {
        let record = DNAsequence::new("r", b"AAAAAAAAAA");
        let mut edits = record.clone();
        edits.annotate(2..4, false, "misc_feature", &[("is_edit", "true")]);
        edits.annotate(7..8, false, "misc_feature", &[("is_edit", "true")]);
        edits.annotate(0..10, false, "misc_feature", &[("label", "part")]);
        DomesticationResult {
            record_before: record.clone(),
            record_after: record,
            edits_record: edits,
            success,
            message: (!success).then(|| "No solution".to_string()),
            report_data: None,
        }
    }

    #[test]
    fn test_number_of_edits() {
        assert_eq!(result(true).number_of_edits(), 3);
    }

    #[test]
    fn test_summary() {
        assert_eq!(result(true).summary(), "SUCCESS - 3 nucleotides edited.");
        assert_eq!(result(false).to_string(), "FAILURE - No solution");
    }
}
