use gentle_domestication::{
    amino_acids::CodonUsage,
    barcodes::{BarcodeOrder, BarcodesCollection},
    batch::{BatchOptions, DomesticatorSelector, ProgressMode, batch_domestication, batch_domestication_from_files},
    dna_sequence::DNAsequence,
    enzymes::Enzymes,
    error::ErrorCode,
    optimizer::LocalSearchEngine,
    output::{BatchOutput, OutputTarget},
    part_domesticator::{DomesticationContext, GoldenGateConfig, PartDomesticator},
    standard::DomesticationStandard,
};
use std::collections::HashSet;

const STANDARD_CSV: &str = "\
slot_name,left_overhang,right_overhang,left_addition,right_addition,enzyme,extra_avoided_sites,description,is_cds
p1,GGAG,TACT,,,BsmBI,,Promoter,no
p2,TACT,AATG,,,BsmBI,,RBS,no
p3,AATG,GCTT,,,BsmBI,,CDS,yes
";

const P1: &str = "ATGGCTAGCAAAGGAGAAGAACTTTTCACTGGAGTTGTCCCAATTCTTGTTGAATTAGATGGTGATGTTAATGGGCACAAATTTTCTGTC";
// BsmBI site outside of any coding region
const P2: &str = "TTGACAGCTAGCTCAGTCCTAGGTATAATGCTAGCCGTCTCAAAGAGGAGAAA";
// BsmBI site across two codons
const P3: &str = "ATGAAACGTCTCTACTGGCAGTAA";

struct Fixture {
    enzymes: Enzymes,
    codon_usage: CodonUsage,
    engine: LocalSearchEngine,
}

impl Fixture {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            enzymes: Enzymes::builtin().unwrap(),
            codon_usage: CodonUsage::builtin().unwrap(),
            engine: LocalSearchEngine::default(),
        }
    }

    fn context(&self) -> DomesticationContext<'_> {
        DomesticationContext {
            engine: &self.engine,
            enzymes: &self.enzymes,
            codon_usage: &self.codon_usage,
        }
    }

    fn standard(&self) -> DomesticationStandard {
        DomesticationStandard::from_csv_reader("three_slots", STANDARD_CSV.as_bytes(), "", &self.enzymes)
            .unwrap()
    }

    fn single(&self) -> PartDomesticator {
        let config = GoldenGateConfig {
            name: "single".to_string(),
            enzyme: "BsmBI".to_string(),
            left_overhang: "GGAG".to_string(),
            right_overhang: "TACT".to_string(),
            ..Default::default()
        };
        PartDomesticator::golden_gate(&config, &self.enzymes).unwrap()
    }
}

fn records() -> Vec<DNAsequence> {
    vec![
        DNAsequence::new("p1_x", P1.as_bytes()),
        DNAsequence::new("p2_y", P2.as_bytes()),
        DNAsequence::new("p3_z", P3.as_bytes()),
    ]
}

fn silent() -> BatchOptions {
    BatchOptions {
        progress: ProgressMode::Silent,
        ..Default::default()
    }
}

fn text(output: &BatchOutput, name: &str) -> String {
    String::from_utf8(output.read_file(name).unwrap()).unwrap()
}

#[test]
fn three_slot_standard_with_edits() {
    let fixture = Fixture::new();
    let standard = fixture.standard();
    let options = BatchOptions {
        allow_edits: true,
        ..silent()
    };
    let outcome = batch_domestication(
        &records(),
        DomesticatorSelector::Standard(&standard),
        &fixture.context(),
        &OutputTarget::Memory,
        &options,
    )
    .unwrap();
    assert_eq!(outcome.failures, 0);

    let order_ids = text(&outcome.output, "order_ids.csv");
    let rows: Vec<&str> = order_ids.lines().skip(1).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().collect::<HashSet<_>>().len(), 3);

    let domesticators: Vec<&str> = outcome.rows.iter().map(|r| r.domesticator.as_str()).collect();
    assert_eq!(domesticators, vec!["p1", "p2", "p3"]);
    assert!(outcome.rows.iter().all(|r| r.added_bp == 22));
    assert_eq!(outcome.rows[0].edited_bp, 0);
    assert!(outcome.rows[1].edited_bp >= 1);

    let files = outcome.output.file_names().unwrap();
    for expected in [
        "domesticated/p1_x.gb",
        "original/p2_y.gb",
        "summary.csv",
        "sequences_to_order.fa",
        "sequences_to_order.csv",
        "Report.md",
    ] {
        assert!(files.iter().any(|f| f == expected), "missing {expected}");
    }
    assert!(!files.iter().any(|f| f.starts_with("error_reports/")));

    let domesticated =
        DNAsequence::from_genbank_bytes(&outcome.output.read_file("domesticated/p2_y.gb").unwrap()).unwrap();
    let sequence = domesticated[0].get_forward_string();
    assert!(sequence.starts_with("CGTCTCATACT"));
    assert!(sequence.ends_with("AATGTGAGACG"));
    assert_eq!(sequence.matches("CGTCTC").count(), 1);
}

#[test]
fn edits_are_gated_outside_coding_regions() {
    let fixture = Fixture::new();
    let standard = fixture.standard();
    let dir = tempfile::tempdir().unwrap();
    let target = OutputTarget::Folder(dir.path().join("batch"));
    let outcome = batch_domestication(
        &records(),
        DomesticatorSelector::Standard(&standard),
        &fixture.context(),
        &target,
        &silent(),
    )
    .unwrap();
    // p2 is not coding and may not be edited; p3 gets a synonymous codon
    assert_eq!(outcome.failures, 1);
    let failed = outcome.rows.iter().find(|r| r.record == "p2_y").unwrap();
    assert!(failed.status.starts_with("Failed: "));
    assert_eq!(failed.edited_bp, 0);
    let p3 = outcome.rows.iter().find(|r| r.record == "p3_z").unwrap();
    assert!(p3.success);
    assert!(p3.edited_bp >= 1);

    let root = dir.path().join("batch");
    assert!(root.join("error_reports/p2_y.txt").exists());
    assert!(!root.join("error_reports/p3_z.txt").exists());
    assert!(root.join("domesticated/p2_y.gb").exists());
    let report = std::fs::read_to_string(root.join("Report.md")).unwrap();
    assert!(report.contains("1 failure(s)"));
}

#[test]
fn barcodes_cycle_over_records() {
    let fixture = Fixture::new();
    let single = fixture.single();
    let records: Vec<DNAsequence> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|id| DNAsequence::new(&format!("part_{id}"), P1.as_bytes()))
        .collect();
    let options = BatchOptions {
        barcodes: Some(
            BarcodesCollection::new(vec![
                ("BC1".to_string(), "ACGTACGTAC".to_string()),
                ("BC2".to_string(), "TTGGCCAATT".to_string()),
            ])
            .unwrap(),
        ),
        ..silent()
    };
    let outcome = batch_domestication(
        &records,
        DomesticatorSelector::Single(&single),
        &fixture.context(),
        &OutputTarget::Memory,
        &options,
    )
    .unwrap();
    let barcodes: Vec<&str> = outcome
        .rows
        .iter()
        .map(|r| r.barcode.as_deref().unwrap())
        .collect();
    assert_eq!(barcodes, vec!["BC1", "BC2", "BC1", "BC2", "BC1"]);
    // the barcode is not counted as added sequence
    assert!(outcome.rows.iter().all(|r| r.added_bp == 22));
    assert!(outcome.rows[1].final_sequence.starts_with("TTGGCCAATTAACGTCTC"));
    let fasta = text(&outcome.output, "sequences_to_order.fa");
    assert!(fasta.starts_with(">part_a\nACGTACGTACAA"));
}

#[test]
fn barcodes_by_size() {
    let fixture = Fixture::new();
    let single = fixture.single();
    let records = vec![
        DNAsequence::new("long", b"TTGACAGCTAGCTCAGTCCTAGGTATAATGCTAGCTAC"),
        DNAsequence::new("short", b"TTGACAGCTAGC"),
        DNAsequence::new("mid", b"TTGACAGCTAGCTCAGTCCTAGG"),
    ];
    let options = BatchOptions {
        barcodes: Some(
            BarcodesCollection::new(vec![
                ("BC1".to_string(), "ACGTACGTAC".to_string()),
                ("BC2".to_string(), "TTGGCCAATT".to_string()),
            ])
            .unwrap(),
        ),
        barcode_order: BarcodeOrder::BySize,
        ..silent()
    };
    let outcome = batch_domestication(
        &records,
        DomesticatorSelector::Single(&single),
        &fixture.context(),
        &OutputTarget::Memory,
        &options,
    )
    .unwrap();
    let barcode_of = |id: &str| {
        outcome
            .rows
            .iter()
            .find(|r| r.record == id)
            .and_then(|r| r.barcode.clone())
            .unwrap()
    };
    assert_eq!(barcode_of("short"), "BC1");
    assert_eq!(barcode_of("mid"), "BC2");
    assert_eq!(barcode_of("long"), "BC1");
}

#[test]
fn order_ids_are_sanitized_and_unique() {
    let fixture = Fixture::new();
    let single = fixture.single();
    let records = vec![
        DNAsequence::new("promoter-5'UTR_version_one", P1.as_bytes()),
        DNAsequence::new("promoter-5'UTR_version_two", P1.as_bytes()),
        DNAsequence::new("gene*", P1.as_bytes()),
    ];
    let outcome = batch_domestication(
        &records,
        DomesticatorSelector::Single(&single),
        &fixture.context(),
        &OutputTarget::Memory,
        &silent(),
    )
    .unwrap();
    let order_ids: Vec<&str> = outcome.rows.iter().map(|r| r.order_id.as_str()).collect();
    assert_eq!(order_ids, vec!["genes", "promoter_5pUTR2", "promoter_5pUTR_"]);
    let pairs = text(&outcome.output, "order_ids.csv");
    assert!(pairs.contains("promoter-5'UTR_version_two,promoter_5pUTR2"));
}

#[test]
fn unknown_slot_aborts_the_batch() {
    let fixture = Fixture::new();
    let standard = fixture.standard();
    let records = vec![DNAsequence::new("p7_unknown", P1.as_bytes())];
    let err = batch_domestication(
        &records,
        DomesticatorSelector::Standard(&standard),
        &fixture.context(),
        &OutputTarget::Memory,
        &silent(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn records_from_files_into_zip() {
    let fixture = Fixture::new();
    let single = fixture.single();
    let dir = tempfile::tempdir().unwrap();
    let genbank = dir.path().join("parts.gb");
    let mut record = DNAsequence::new("gfp", P1.as_bytes());
    record.annotate(0..P1.len(), false, "CDS", &[("label", "GFP")]);
    record.write_genbank_file(&genbank).unwrap();
    let zip_path = dir.path().join("out.zip");
    let outcome = batch_domestication_from_files(
        &[genbank.as_path()],
        DomesticatorSelector::Single(&single),
        &fixture.context(),
        &OutputTarget::Zip(zip_path.clone()),
        &BatchOptions {
            domesticated_suffix: "_dom".to_string(),
            include_original_records: false,
            ..silent()
        },
    )
    .unwrap();
    assert_eq!(outcome.output, BatchOutput::ZipFile(zip_path));
    let files = outcome.output.file_names().unwrap();
    assert!(files.contains(&"domesticated/gfp_dom.gb".to_string()));
    assert!(!files.iter().any(|f| f.starts_with("original/")));
    let domesticated =
        DNAsequence::from_genbank_bytes(&outcome.output.read_file("domesticated/gfp_dom.gb").unwrap()).unwrap();
    assert!(
        domesticated[0]
            .features()
            .iter()
            .any(|f| gentle_domestication::dna_sequence::feature_label(f) == Some("GFP"))
    );
}

#[test]
fn unsupported_record_format() {
    let fixture = Fixture::new();
    let single = fixture.single();
    let dir = tempfile::tempdir().unwrap();
    let snapgene = dir.path().join("part.dna");
    std::fs::write(&snapgene, b"\x09binary").unwrap();
    let err = batch_domestication_from_files(
        &[snapgene.as_path()],
        DomesticatorSelector::Single(&single),
        &fixture.context(),
        &OutputTarget::Memory,
        &silent(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unsupported);
}

#[test]
fn records_sharing_an_id_keep_their_own_files() {
    let fixture = Fixture::new();
    let single = fixture.single();
    let records = vec![
        DNAsequence::new("dup", b"AAAAAAAAAAAA"),
        DNAsequence::new("dup", b"CCCCCCCCCCCC"),
    ];
    let outcome = batch_domestication(
        &records,
        DomesticatorSelector::Single(&single),
        &fixture.context(),
        &OutputTarget::Memory,
        &silent(),
    )
    .unwrap();
    let files = outcome.output.file_names().unwrap();
    for expected in [
        "domesticated/dup.gb",
        "domesticated/dup_2.gb",
        "original/dup.gb",
        "original/dup_2.gb",
    ] {
        assert!(files.iter().any(|f| f == expected), "missing {expected}");
    }
    let first =
        DNAsequence::from_genbank_bytes(&outcome.output.read_file("domesticated/dup.gb").unwrap()).unwrap();
    let second =
        DNAsequence::from_genbank_bytes(&outcome.output.read_file("domesticated/dup_2.gb").unwrap()).unwrap();
    assert_eq!(first[0].get_forward_string(), "CGTCTCAGGAGAAAAAAAAAAAATACTTGAGACG");
    assert_eq!(second[0].get_forward_string(), "CGTCTCAGGAGCCCCCCCCCCCCTACTTGAGACG");
    let order_ids: Vec<&str> = outcome.rows.iter().map(|r| r.order_id.as_str()).collect();
    // the second "dup" gets the uniquified order ID
    assert_eq!(order_ids, vec!["du2", "dup"]);
    assert!(outcome.rows[0].final_sequence.contains("CCCCCCCCCCCC"));
}

#[test]
fn unknown_slot_aborts_before_writing() {
    let fixture = Fixture::new();
    let standard = fixture.standard();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("batch");
    let records = vec![
        DNAsequence::new("p1_ok", P1.as_bytes()),
        DNAsequence::new("p9_bad", P1.as_bytes()),
    ];
    let err = batch_domestication(
        &records,
        DomesticatorSelector::Standard(&standard),
        &fixture.context(),
        &OutputTarget::Folder(root.clone()),
        &silent(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
    assert!(!root.exists());
}

#[test]
fn later_fatal_record_keeps_finished_ones() {
    let fixture = Fixture::new();
    let single = fixture.single();
    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("partial.zip");
    let mut bad = DNAsequence::new("bad", P1.as_bytes());
    bad.annotate(0..10, false, "misc_feature", &[("label", "@teleport")]);
    let records = vec![DNAsequence::new("good", P1.as_bytes()), bad];
    let err = batch_domestication(
        &records,
        DomesticatorSelector::Single(&single),
        &fixture.context(),
        &OutputTarget::Zip(zip_path.clone()),
        &silent(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    let partial = BatchOutput::ZipFile(zip_path);
    let files = partial.file_names().unwrap();
    assert!(files.contains(&"domesticated/good.gb".to_string()));
    assert!(!files.contains(&"domesticated/bad.gb".to_string()));
    let summary = text(&partial, "summary.csv");
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("good,"));
}
