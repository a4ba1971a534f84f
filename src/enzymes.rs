use crate::{
    error::{DomesticationError, ErrorCode, Result},
    restriction_enzyme::RestrictionEnzyme,
};
use std::{fs, path::Path};

const BUILTIN_ENZYMES_JSON: &str = include_str!("../assets/enzymes.json");

/// Restriction enzyme catalog. Built explicitly and passed to whatever needs
/// to resolve enzyme names.
#[derive(Clone, Debug)]
pub struct Enzymes {
    restriction_enzymes: Vec<RestrictionEnzyme>,
}

impl Enzymes {
    pub fn from_json_text(json_text: &str) -> Result<Self> {
        let mut ret = Self {
            restriction_enzymes: vec![],
        };
        let res: serde_json::Value = serde_json::from_str(json_text)?;
        let arr = res
            .as_array()
            .ok_or_else(|| DomesticationError::invalid_input("Enzymes file is not a JSON array"))?;
        for row in arr {
            match row.get("type").and_then(|t| t.as_str()) {
                Some("restriction") => {
                    let mut re: RestrictionEnzyme = serde_json::from_value(row.clone())
                        .map_err(|e| {
                            DomesticationError::invalid_input(format!(
                                "Bad restriction enzyme: {row}: {e}"
                            ))
                        })?;
                    re.check_palindromic();
                    ret.restriction_enzymes.push(re);
                }
                Some(other) => {
                    return Err(DomesticationError::invalid_input(format!(
                        "Unknown enzyme type '{other}' in {row}"
                    )));
                }
                None => {
                    return Err(DomesticationError::invalid_input(format!(
                        "Missing enzyme type for {row}"
                    )));
                }
            }
        }
        Ok(ret)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            DomesticationError::new(
                ErrorCode::Io,
                format!("Could not read enzyme catalog {}: {e}", path.display()),
            )
        })?;
        Self::from_json_text(&text)
    }

    /// The catalog bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_text(BUILTIN_ENZYMES_JSON)
    }

    pub fn len(&self) -> usize {
        self.restriction_enzymes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restriction_enzymes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RestrictionEnzyme> {
        self.restriction_enzymes.iter().find(|re| re.name == name)
    }

    /// Like `get`, but an unknown name is a configuration error.
    pub fn require(&self, name: &str) -> Result<&RestrictionEnzyme> {
        self.get(name)
            .ok_or_else(|| DomesticationError::not_found(format!("Unknown enzyme '{name}'")))
    }
}
