use crate::error::{DomesticationError, ErrorCode, Result};
use bio::io::fasta;
use gb_io::seq::{Feature, Location, Seq, Topology};
use std::{
    fs::File,
    io::{Cursor, Write},
    ops::Range,
    path::Path,
};

const PLACEHOLDER_IDS: [&str; 5] = ["None", "", "<unknown id>", ".", " "];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceFormat {
    Fasta,
    GenBank,
}

impl SequenceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "fa" | "fasta" | "fna" => Ok(Self::Fasta),
            "gb" | "gbk" | "genbank" => Ok(Self::GenBank),
            _ => Err(DomesticationError::unsupported(format!(
                "Unsupported sequence file format '.{extension}' for {}",
                path.display()
            ))),
        }
    }
}

/// An identified DNA sequence with its annotations.
#[derive(Clone, Debug)]
pub struct DNAsequence {
    seq: Seq,
}

impl DNAsequence {
    pub fn new(id: &str, sequence: &[u8]) -> Self {
        let mut ret = Self::from_u8(sequence);
        ret.seq.name = Some(id.to_string());
        ret
    }

    fn from_u8(s: &[u8]) -> Self {
        let seq = Seq {
            name: None,
            topology: Topology::Linear,
            date: None,
            len: Some(s.len()),
            molecule_type: Some("DNA".to_string()),
            division: String::new(),
            definition: None,
            accession: None,
            version: None,
            source: None,
            dblink: None,
            keywords: None,
            references: vec![],
            comments: vec![],
            seq: s.to_vec(),
            contig: None,
            features: vec![],
        };
        Self { seq }
    }

    pub fn from_genbank_seq(seq: Seq) -> Self {
        let mut ret = Self { seq };
        ret.seq.len = Some(ret.seq.seq.len());
        ret
    }

    pub fn from_fasta_record(record: &fasta::Record) -> Self {
        let mut ret = Self::new(record.id(), record.seq());
        if let Some(desc) = record.desc() {
            ret.seq.comments.push(desc.to_string())
        }
        ret
    }

    pub fn from_fasta_file(filename: &Path) -> Result<Vec<Self>> {
        let file = File::open(filename)?;
        fasta::Reader::new(file)
            .records()
            .map(|record| {
                record
                    .map(|r| Self::from_fasta_record(&r))
                    .map_err(|e| DomesticationError::invalid_input(format!("Bad FASTA record in {}: {e}", filename.display())))
            })
            .collect()
    }

    pub fn from_genbank_file(filename: &Path) -> Result<Vec<Self>> {
        Ok(gb_io::reader::parse_file(filename)
            .map_err(|e| {
                DomesticationError::invalid_input(format!(
                    "Could not parse GenBank file {}: {e}",
                    filename.display()
                ))
            })?
            .into_iter()
            .map(Self::from_genbank_seq)
            .collect())
    }

    pub fn from_genbank_bytes(data: &[u8]) -> Result<Vec<Self>> {
        gb_io::reader::SeqReader::new(Cursor::new(data))
            .map(|seq| {
                seq.map(Self::from_genbank_seq).map_err(|e| {
                    DomesticationError::invalid_input(format!("Could not parse GenBank data: {e}"))
                })
            })
            .collect()
    }

    /// Loads every record of a FASTA or GenBank file. Sequences are
    /// upper-cased; missing IDs are derived from the path.
    pub fn load_records(path: &Path) -> Result<Vec<Self>> {
        let mut records = match SequenceFormat::from_path(path)? {
            SequenceFormat::Fasta => Self::from_fasta_file(path)?,
            SequenceFormat::GenBank => Self::from_genbank_file(path)?,
        };
        let several = records.len() > 1;
        for (i, record) in records.iter_mut().enumerate() {
            record.make_uppercase();
            if PLACEHOLDER_IDS.contains(&record.id()) {
                let mut id = path.to_string_lossy().replace(['/', '\\'], "_");
                if several {
                    id += &format!("_{i:04}");
                }
                record.set_id(&id);
            }
        }
        Ok(records)
    }

    pub fn load_many(paths: &[&Path]) -> Result<Vec<Self>> {
        let mut ret = vec![];
        for path in paths {
            ret.extend(Self::load_records(path)?);
        }
        Ok(ret)
    }

    pub fn write_genbank<W: Write>(&self, writer: W) -> Result<()> {
        let mut seq = self.seq.clone();
        seq.name = Some(self.locus_name());
        seq.len = Some(seq.seq.len());
        gb_io::writer::write(writer, &seq).map_err(|e| {
            DomesticationError::new(ErrorCode::Io, format!("Could not write GenBank for '{}': {e}", self.id()))
        })
    }

    pub fn to_genbank_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![];
        self.write_genbank(&mut buffer)?;
        Ok(buffer)
    }

    pub fn write_genbank_file(&self, filename: &Path) -> Result<()> {
        let file = File::create(filename)?;
        self.write_genbank(file)
    }

    /// LOCUS names cannot hold whitespace.
    fn locus_name(&self) -> String {
        self.id()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect()
    }

    pub fn id(&self) -> &str {
        self.seq.name.as_deref().unwrap_or("")
    }

    pub fn set_id(&mut self, id: &str) {
        self.seq.name = Some(id.to_string());
    }

    pub fn sequence(&self) -> &[u8] {
        &self.seq.seq
    }

    pub fn get_forward_string(&self) -> String {
        String::from_utf8_lossy(&self.seq.seq).to_string()
    }

    /// Replaces the bases; features stay where they are.
    pub fn set_sequence(&mut self, sequence: Vec<u8>) {
        self.seq.len = Some(sequence.len());
        self.seq.seq = sequence;
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.seq.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.seq.is_empty()
    }

    pub fn make_uppercase(&mut self) {
        self.seq.seq.make_ascii_uppercase();
    }

    pub fn features(&self) -> &Vec<Feature> {
        &self.seq.features
    }

    pub fn features_mut(&mut self) -> &mut Vec<Feature> {
        &mut self.seq.features
    }

    /// Adds a feature on `range`; the reverse strand wraps it in a complement.
    pub fn annotate(
        &mut self,
        range: Range<usize>,
        reverse: bool,
        kind: &str,
        qualifiers: &[(&str, &str)],
    ) {
        let mut location = Location::simple_range(range.start as i64, range.end as i64);
        if reverse {
            location = Location::Complement(Box::new(location));
        }
        self.seq.features.push(Feature {
            kind: kind.to_string().into(),
            location,
            qualifiers: qualifiers
                .iter()
                .map(|(k, v)| (k.to_string().into(), Some(v.to_string())))
                .collect(),
        });
    }

    /// Labels the whole sequence with a `misc_feature`.
    pub fn annotate_full(&mut self, label: &str) {
        let len = self.len();
        self.annotate(0..len, false, "misc_feature", &[("label", label)]);
    }

    /// Appends `other` after `self`, shifting its features.
    pub fn concat(&self, other: &DNAsequence) -> Self {
        let mut ret = self.clone();
        let offset = self.len() as i64;
        let mut sequence = self.seq.seq.clone();
        sequence.extend_from_slice(&other.seq.seq);
        ret.set_sequence(sequence);
        ret.seq.features.extend(other.seq.features.iter().map(|f| Feature {
            kind: f.kind.clone(),
            location: shift_location(&f.location, offset),
            qualifiers: f.qualifiers.clone(),
        }));
        ret
    }

    pub fn shift_features(&mut self, offset: i64) {
        for feature in self.seq.features.iter_mut() {
            feature.location = shift_location(&feature.location, offset);
        }
    }
}

pub fn shift_location(location: &Location, offset: i64) -> Location {
    match location {
        Location::Range((from, before), (to, after)) => {
            Location::Range((from + offset, before.clone()), (to + offset, after.clone()))
        }
        Location::Between(from, to) => Location::Between(from + offset, to + offset),
        Location::Complement(inner) => Location::Complement(Box::new(shift_location(inner, offset))),
        Location::Join(parts) => Location::Join(parts.iter().map(|p| shift_location(p, offset)).collect()),
        Location::Order(parts) => Location::Order(parts.iter().map(|p| shift_location(p, offset)).collect()),
        Location::Bond(parts) => Location::Bond(parts.iter().map(|p| shift_location(p, offset)).collect()),
        Location::OneOf(parts) => Location::OneOf(parts.iter().map(|p| shift_location(p, offset)).collect()),
        Location::External(_, _) | Location::Gap(_) => location.clone(),
    }
}

pub fn feature_qualifier<'a>(feature: &'a Feature, key: &str) -> Option<&'a str> {
    feature
        .qualifiers
        .iter()
        .find(|(k, _)| &**k == key)
        .and_then(|(_, v)| v.as_deref())
}

pub fn feature_label(feature: &Feature) -> Option<&str> {
    feature_qualifier(feature, "label")
}

/// Half-open `(start, end)` of a feature, if it has usable coordinates.
pub fn feature_bounds(feature: &Feature) -> Option<(usize, usize)> {
    let (from, to) = feature.location.find_bounds().ok()?;
    let (start, end) = if from <= to { (from, to) } else { (to, from) };
    Some((usize::try_from(start).ok()?, usize::try_from(end).ok()?))
}

pub fn feature_is_reverse(feature: &Feature) -> bool {
    matches!(feature.location, Location::Complement(_))
}
