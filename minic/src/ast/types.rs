//! Type AST nodes

use serde::{Deserialize, Serialize};

/// The language's resolved types.
///
/// `Undefined` marks a node whose type is not known yet; semantic analysis
/// fills it in for identifiers before lowering runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    #[default]
    Undefined,
    Int,
    Float,
    Bool,
}

impl Type {
    /// Storage size in bytes of one value of this type.
    ///
    /// Lowering reads and writes whole words, so booleans occupy a full
    /// word; only floats take a double word.
    pub fn size(self) -> u64 {
        match self {
            Type::Float => 8,
            Type::Undefined | Type::Int | Type::Bool => 4,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Undefined => write!(f, "undefined"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
        }
    }
}
