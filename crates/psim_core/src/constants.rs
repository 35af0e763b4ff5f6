// Names shared by every crate that reads or writes the parameter and property stores.
// Hashing these is part of the schema: renaming one is a breaking change for saved scenes.

/// Parameter group holding the frame/IO settings
pub const GLOBAL_PARAMETERS: &str = "GlobalParameters";

/// Parameter group holding the physical settings consumed by objects
pub const SIMULATION_PARAMETERS: &str = "SimulationParameters";

pub const PARTICLE_RADIUS: &str = "ParticleRadius";
pub const GRAVITY: &str = "Gravity";
pub const BOX_MIN: &str = "BoxMin";
pub const BOX_MAX: &str = "BoxMax";

/// Property group for free (simulated) particles
pub const PARTICLE_DATA: &str = "ParticleData";

/// Property group for ghost particles emitted by rigid bodies
pub const BOUNDARY_PARTICLES: &str = "BoundaryParticles";

// Column names
pub const POSITION: &str = "Position";
pub const VELOCITY: &str = "Velocity";
pub const MASS: &str = "Mass";
pub const ACTIVITY: &str = "Activity";
pub const OBJECT_INDEX: &str = "ObjectIndex";
pub const ANGULAR_VELOCITY: &str = "AngularVelocity";
pub const FIRST_COTANGENT: &str = "FirstCotangent";

/// DJB2 seed
pub const HASH_SEED: u32 = 5381;

/// Below this, a jitter magnitude counts as zero
pub const TINY_REAL: f32 = 1e-10;

/// Finite-difference step for signed distance gradients
pub const GRADIENT_EPSILON: f32 = 1e-4;

/// Squared gradient length under which a normal is left unnormalized
pub const NORMAL_EPSILON_SQ: f32 = 1e-20;

pub const DEFAULT_PARTICLE_RADIUS: f32 = 0.02;

/// Ghost particles are sampled this much denser than fluid particles
pub const DEFAULT_GHOST_DENSITY_RATIO: f32 = 1.5;
