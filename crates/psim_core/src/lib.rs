pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod math;
pub mod registry;
pub mod types;

pub use config::GlobalParameters;
pub use constants::*;
pub use error::{Error, Result};
pub use ids::ObjectIdAllocator;
pub use math::VectorN;
pub use registry::{NameRegistry, string_hash};
pub use types::*;
