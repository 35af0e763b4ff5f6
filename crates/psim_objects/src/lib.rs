//! Simulation objects: particle generators that fill a shape with a material,
//! and rigid bodies that push particles out, emit ghost particles along their
//! surface and carry constrained particles along their animation.

pub mod collision;
pub mod constrained;
pub mod generator;
pub mod object;
pub mod rigid_body;

use psim_core::VectorN;
use psim_data::ColumnElement;

pub use collision::resolve_group_collisions;
pub use constrained::ConstrainedSet;
pub use generator::{ParticleGenerator, mass_of};
pub use object::{GenerationParams, ParticleCache, SamplingRegion, SimulationObject};
pub use rigid_body::RigidBody;

/// A vector type that is both dimension-generic math and a storable column element
pub trait SimVector: VectorN + ColumnElement {}

impl<T: VectorN + ColumnElement> SimVector for T {}
