//! Errors shared by the data store, the simulation objects and the file cache.
//!
//! Nearly every variant is a setup-time configuration mistake: a duplicate or
//! colliding name, a group used before it was created, a missing required
//! JSON field. Callers are expected to abort on them. Type-contract
//! violations on typed values are bugs and panic instead of appearing here.

use thiserror::Error;

use crate::types::FileFormat;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Two distinct names produced the same DJB2 hash.
    #[error("hash collision: `{name}` and `{existing}` both hash to {hash:#010x}")]
    HashCollision {
        name: String,
        existing: String,
        hash: u32,
    },

    #[error("group `{0}` already exists")]
    DuplicateGroup(String),

    #[error("group `{0}` does not exist")]
    GroupNotFound(String),

    #[error("parameter `{name}` already exists in group `{group}`")]
    DuplicateParameter { group: String, name: String },

    #[error("parameter `{name}` does not exist in group `{group}`")]
    ParameterNotFound { group: String, name: String },

    #[error("property `{name}` already exists in group `{group}`")]
    DuplicateProperty { group: String, name: String },

    #[error("property `{name}` does not exist in group `{group}`")]
    PropertyNotFound { group: String, name: String },

    /// A column was requested with an element type other than the one it stores.
    #[error("property `{group}/{name}` stores {found}, not {expected}")]
    ColumnTypeMismatch {
        group: String,
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("required field `{0}` is missing")]
    MissingRequiredField(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidConfigValue { field: String, reason: String },

    #[error("unknown geometry type `{0}`")]
    UnknownGeometry(String),

    #[error("unknown file format `{0}`")]
    UnknownFileFormat(String),

    #[error("file format {0:?} is not supported by the particle cache")]
    UnsupportedFormat(FileFormat),

    #[error("object `{0}` generated no particle")]
    NoParticleGenerated(String),

    #[error("object `{0}` found no particle to constrain")]
    NoConstrainedParticle(String),

    #[error("particle file is malformed: {0}")]
    Codec(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
