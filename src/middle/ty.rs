use strum::{EnumIter, EnumString};

/// The types a Ram declaration or expression can resolve to.
///
/// Numbers cover both integer and floating point literals. There is no boolean
/// type: comparisons and logical operators produce numbers (0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    Number,
    String,
    Void,
}

impl Type {
    /// Resolves a type name as spelled in the source. Matching is exact and
    /// case sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}
