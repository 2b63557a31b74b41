//! The confidence ladder shared by every matcher in the analyzer.

use serde::{Deserialize, Serialize};

/// Total ordering `None < Weak < Strong < Definitive`.
///
/// Only [`Confidence::Strong`] and [`Confidence::Definitive`] auto-accept
/// during analysis (they stamp `mapped_at` and the local id). `Weak` and
/// `None` leave the entity unmapped but still surface as a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    None,
    Weak,
    Strong,
    Definitive,
}

impl Confidence {
    pub fn auto_accepts(self) -> bool {
        matches!(self, Confidence::Strong | Confidence::Definitive)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::None => "none",
            Confidence::Weak => "weak",
            Confidence::Strong => "strong",
            Confidence::Definitive => "definitive",
        };
        f.write_str(s)
    }
}
