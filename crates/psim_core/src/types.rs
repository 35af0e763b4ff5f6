use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-particle activity tag, stored as `i8` in the Activity column
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Activity {
    #[default]
    Active = 0,
    /// Rigidly attached to a moving body; skipped by collision resolution
    Constrained = 1,
    InActive = 2,
    SemiActive = 3,
}

impl Activity {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(Self::Active),
            1 => Some(Self::Constrained),
            2 => Some(Self::InActive),
            3 => Some(Self::SemiActive),
            _ => None,
        }
    }

    pub fn tag(self) -> i8 {
        self as i8
    }
}

/// Collision response of a rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BoundaryCondition {
    /// Particles take the surface velocity
    Sticky,
    /// Normal velocity removed, tangential kept (minus friction)
    #[default]
    Slip,
    /// Like Slip, but only for particles moving into the surface
    Separate,
}

impl BoundaryCondition {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "Sticky" => Ok(Self::Sticky),
            "Slip" => Ok(Self::Slip),
            "Separate" => Ok(Self::Separate),
            other => Err(Error::InvalidConfigValue {
                field: "BCType".into(),
                reason: format!("unknown boundary condition `{other}`"),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sticky => "Sticky",
            Self::Slip => "Slip",
            Self::Separate => "Separate",
        }
    }
}

/// Point-set file formats understood by the particle file cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileFormat {
    #[serde(rename = "OBJ", alias = "obj")]
    Obj,
    #[serde(rename = "BGEO", alias = "bgeo")]
    Bgeo,
    #[default]
    #[serde(rename = "BNN", alias = "bnn")]
    Bnn,
    #[serde(rename = "BINARY", alias = "Binary", alias = "binary")]
    Binary,
}

impl FileFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "OBJ" | "obj" => Ok(Self::Obj),
            "BGEO" | "bgeo" => Ok(Self::Bgeo),
            "BNN" | "bnn" => Ok(Self::Bnn),
            "BINARY" | "Binary" | "binary" => Ok(Self::Binary),
            other => Err(Error::UnknownFileFormat(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Obj => "OBJ",
            Self::Bgeo => "BGEO",
            Self::Bnn => "BNN",
            Self::Binary => "Binary",
        }
    }

    /// File name extension for frame exports
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Bgeo => "bgeo",
            Self::Bnn => "bnn",
            Self::Binary => "bin",
        }
    }
}
