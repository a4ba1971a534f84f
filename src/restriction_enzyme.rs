use crate::iupac_code::{find_pattern, reverse_complement};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestrictionEnzyme {
    pub name: String,
    pub sequence: String,
    pub note: Option<String>,
    pub cut: isize,
    pub overlap: isize,
    #[serde(skip_serializing, default)]
    is_palindromic: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestrictionEnzymeSite {
    pub offset: usize,
    pub forward_strand: bool,
}

impl RestrictionEnzyme {
    pub fn new(name: &str, sequence: &str, cut: isize, overlap: isize) -> Self {
        let mut ret = Self {
            name: name.to_string(),
            sequence: sequence.to_ascii_uppercase(),
            note: None,
            cut,
            overlap,
            is_palindromic: false,
        };
        ret.check_palindromic();
        ret
    }

    pub fn check_palindromic(&mut self) {
        self.sequence = self.sequence.to_ascii_uppercase();
        self.is_palindromic = self.sequence.as_bytes() == self.sequence_rc().as_slice();
    }

    pub fn is_palindromic(&self) -> bool {
        self.is_palindromic
    }

    pub fn sequence_rc(&self) -> Vec<u8> {
        reverse_complement(self.sequence.as_bytes())
    }

    /// Recognition sites on both strands. Palindromic sites are reported once.
    pub fn find_sites(&self, sequence: &[u8]) -> Vec<RestrictionEnzymeSite> {
        let mut ret: Vec<RestrictionEnzymeSite> = find_pattern(sequence, self.sequence.as_bytes())
            .into_iter()
            .map(|offset| RestrictionEnzymeSite {
                offset,
                forward_strand: true,
            })
            .collect();
        if !self.is_palindromic {
            ret.extend(
                find_pattern(sequence, &self.sequence_rc())
                    .into_iter()
                    .map(|offset| RestrictionEnzymeSite {
                        offset,
                        forward_strand: false,
                    }),
            );
            ret.sort_by_key(|site| site.offset);
        }
        ret
    }
}
