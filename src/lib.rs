pub mod amino_acids;
pub mod barcodes;
pub mod batch;
pub mod dna_sequence;
pub mod domestication_result;
pub mod enzymes;
pub mod error;
pub mod iupac_code;
pub mod optimization_driver;
pub mod optimizer;
pub mod order_ids;
pub mod output;
pub mod part_domesticator;
pub mod report;
pub mod restriction_enzyme;
pub mod specs;
pub mod standard;
