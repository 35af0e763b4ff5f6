//! Owner of the stores and objects of one scene, and the per-frame
//! object update / collision sequence that runs on them.

pub mod context;

pub use context::{FrameStats, SceneVector, SimulationContext};
