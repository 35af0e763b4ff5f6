use std::ops::Range;
use std::sync::Arc;

use glam::Vec3;
use psim_core::{
    ACTIVITY, ANGULAR_VELOCITY, Activity, BOUNDARY_PARTICLES, BOX_MAX, BOX_MIN,
    DEFAULT_PARTICLE_RADIUS, Error, FIRST_COTANGENT, GRAVITY, GlobalParameters, MASS,
    NameRegistry, OBJECT_INDEX, ObjectIdAllocator, PARTICLE_DATA, PARTICLE_RADIUS, POSITION,
    Result, SIMULATION_PARAMETERS, VELOCITY,
};
use psim_data::{ParameterManager, PropertyGroup, PropertyManager, ValueType};
use psim_objects::{ParticleGenerator, RigidBody, SimVector, SimulationObject, resolve_group_collisions};
use serde_json::Value;
use tracing::{debug, info};

const STANDARD_GRAVITY: f32 = -9.81;

/// A vector type usable everywhere in a scene: math, column element and parameter value
pub trait SceneVector: SimVector + ValueType {}

impl<T: SimVector + ValueType> SceneVector for T {}

/// What one frame step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u32,
    /// At least one rigid body moved
    pub objects_moved: bool,
    /// Free particles pushed back by a rigid body
    pub collisions: usize,
}

/// Stores, identities and objects of one scene
#[derive(Debug)]
pub struct SimulationContext<V: SceneVector> {
    registry: Arc<NameRegistry>,
    parameters: ParameterManager,
    properties: PropertyManager,
    ids: ObjectIdAllocator,
    global: GlobalParameters,
    generators: Vec<ParticleGenerator<V>>,
    bodies: Vec<RigidBody<V>>,
}

impl<V: SceneVector> SimulationContext<V> {
    /// Empty scene with the standard parameters and property groups registered
    pub fn new(global: GlobalParameters) -> Result<Self> {
        Self::with_parameters(global, &Value::Null)
    }

    /// Reads `GlobalParameters`, `SimulationParameters`, `ParticleGenerators`
    /// and `RigidBodies` from a scene description. Missing blocks use defaults.
    pub fn from_json(scene: &Value) -> Result<Self> {
        let global = GlobalParameters::from_json(scene)?;
        let block = scene.get(SIMULATION_PARAMETERS).unwrap_or(&Value::Null);
        let mut context = Self::with_parameters(global, block)?;
        let radius = context.particle_radius()?;

        for object in objects(scene, "ParticleGenerators") {
            let generator = ParticleGenerator::from_json(object, radius, &mut context.ids)?;
            context.generators.push(generator);
        }
        for object in objects(scene, "RigidBodies") {
            let body = RigidBody::from_json(object, radius, &mut context.ids)?;
            context.bodies.push(body);
        }
        info!(
            generators = context.generators.len(),
            rigid_bodies = context.bodies.len(),
            names = context.registry.len(),
            "loaded scene"
        );
        Ok(context)
    }

    fn with_parameters(global: GlobalParameters, block: &Value) -> Result<Self> {
        let registry = Arc::new(NameRegistry::new());
        let mut context = Self {
            parameters: ParameterManager::new(registry.clone()),
            properties: PropertyManager::new(registry.clone()),
            ids: ObjectIdAllocator::new(global.seed),
            registry,
            global,
            generators: Vec::new(),
            bodies: Vec::new(),
        };
        context.register_parameters(block)?;
        context.register_properties()?;
        Ok(context)
    }

    fn register_parameters(&mut self, block: &Value) -> Result<()> {
        let group = SIMULATION_PARAMETERS;
        self.parameters
            .add_group(group, "Physical settings shared by every object")?;
        self.parameters.add_parameter_from_json(
            group,
            PARTICLE_RADIUS,
            "Radius of every particle",
            DEFAULT_PARTICLE_RADIUS,
            block,
            false,
        )?;
        self.parameters.add_parameter_from_json(
            group,
            GRAVITY,
            "Gravitational acceleration",
            V::unit(1) * STANDARD_GRAVITY,
            block,
            false,
        )?;
        self.parameters.add_parameter_from_json(
            group,
            BOX_MIN,
            "Lower corner of the simulation domain",
            V::splat(-1.0),
            block,
            false,
        )?;
        self.parameters.add_parameter_from_json(
            group,
            BOX_MAX,
            "Upper corner of the simulation domain",
            V::splat(1.0),
            block,
            false,
        )?;

        let radius = self.particle_radius()?;
        if !(radius > 0.0) {
            return Err(Error::InvalidConfigValue {
                field: PARTICLE_RADIUS.into(),
                reason: format!("must be positive, got {radius}"),
            });
        }
        Ok(())
    }

    fn register_properties(&mut self) -> Result<()> {
        let radius = self.particle_radius()?;

        let particles = self.properties.add_group(PARTICLE_DATA, "Simulated particles")?;
        particles.add_property::<V>(POSITION, "Particle position", None)?;
        particles.add_property::<V>(VELOCITY, "Particle velocity", None)?;
        particles.add_property::<f32>(MASS, "Particle mass", None)?;
        particles.add_property::<i8>(ACTIVITY, "Activity tag", Some(Activity::Active.tag()))?;
        particles.add_property::<i32>(OBJECT_INDEX, "Index of the generating object", Some(-1))?;
        if V::DIM == 3 {
            particles.add_property::<Vec3>(ANGULAR_VELOCITY, "Particle angular velocity", None)?;
            particles.add_property::<Vec3>(FIRST_COTANGENT, "First cotangent vector", Some(Vec3::X))?;
        }
        particles.add_discrete_property(PARTICLE_RADIUS, "Radius of every particle", radius)?;

        let ghosts = self
            .properties
            .add_group(BOUNDARY_PARTICLES, "Ghost particles on rigid body surfaces")?;
        ghosts.add_property::<V>(POSITION, "Ghost position", None)?;
        ghosts.add_property::<V>(VELOCITY, "Ghost velocity", None)?;
        ghosts.add_property::<i8>(ACTIVITY, "Activity tag", Some(Activity::Active.tag()))?;
        ghosts.add_property::<i32>(OBJECT_INDEX, "Index of the emitting rigid body", Some(-1))?;
        ghosts.add_discrete_property(PARTICLE_RADIUS, "Radius of every particle", radius)?;
        Ok(())
    }

    pub fn registry(&self) -> &Arc<NameRegistry> {
        &self.registry
    }

    pub fn parameters(&self) -> &ParameterManager {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterManager {
        &mut self.parameters
    }

    pub fn properties(&self) -> &PropertyManager {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyManager {
        &mut self.properties
    }

    pub fn global(&self) -> &GlobalParameters {
        &self.global
    }

    /// Identity source for objects built outside [`from_json`](Self::from_json)
    pub fn ids_mut(&mut self) -> &mut ObjectIdAllocator {
        &mut self.ids
    }

    pub fn generators(&self) -> &[ParticleGenerator<V>] {
        &self.generators
    }

    pub fn bodies(&self) -> &[RigidBody<V>] {
        &self.bodies
    }

    pub fn add_generator(&mut self, generator: ParticleGenerator<V>) {
        self.generators.push(generator);
    }

    pub fn add_rigid_body(&mut self, body: RigidBody<V>) {
        self.bodies.push(body);
    }

    pub fn particle_radius(&self) -> Result<f32> {
        self.parameters.value(SIMULATION_PARAMETERS, PARTICLE_RADIUS)
    }

    pub fn gravity(&self) -> Result<V> {
        self.parameters.value(SIMULATION_PARAMETERS, GRAVITY)
    }

    /// Lower and upper corners of the domain
    pub fn domain(&self) -> Result<(V, V)> {
        Ok((
            self.parameters.value(SIMULATION_PARAMETERS, BOX_MIN)?,
            self.parameters.value(SIMULATION_PARAMETERS, BOX_MAX)?,
        ))
    }

    /// Fills generators with particles, emits ghost particles and collects
    /// the particles each constraining body encloses.
    ///
    /// Generators avoid one another and every body that does not constrain
    /// its inside particles. Sampling for all objects runs before any group
    /// is written. Returns the number of free particles added.
    pub fn generate_particles(&mut self) -> Result<usize> {
        let (generated, ghosts) = {
            let others: Vec<&SimulationObject<V>> = self
                .generators
                .iter()
                .map(ParticleGenerator::object)
                .chain(
                    self.bodies
                        .iter()
                        .filter(|b| !b.constrains_inside_particles())
                        .map(RigidBody::object),
                )
                .collect();
            let generated = self
                .generators
                .iter()
                .map(|g| g.prepare_particles(&others, false))
                .collect::<Result<Vec<_>>>()?;
            let ghosts = self
                .bodies
                .iter()
                .map(|b| b.prepare_particles(&[], true))
                .collect::<Result<Vec<_>>>()?;
            (generated, ghosts)
        };

        let particles = self.properties.group_mut(PARTICLE_DATA)?;
        let mut total = 0;
        for (index, (generator, positions)) in self.generators.iter_mut().zip(generated).enumerate() {
            let added = generator.append_particles(particles, positions)?;
            if added > 0 {
                tag_object_index(particles, generator.generated_range(), index)?;
            }
            total += added;
        }

        let boundary = self.properties.group_mut(BOUNDARY_PARTICLES)?;
        let mut total_ghosts = 0;
        for (index, (body, positions)) in self.bodies.iter_mut().zip(ghosts).enumerate() {
            let added = body.append_particles(boundary, positions)?;
            if added > 0 {
                tag_object_index(boundary, body.ghost_range(), index)?;
            }
            total_ghosts += added;
        }

        let particles = self.properties.group_mut(PARTICLE_DATA)?;
        let mut total_constrained = 0;
        for body in &mut self.bodies {
            total_constrained += body.find_constrained_particles(particles)?;
        }

        info!(
            particles = total,
            ghosts = total_ghosts,
            constrained = total_constrained,
            "generated scene particles"
        );
        Ok(total)
    }

    /// Moves every rigid body to `frame + frame_fraction`. Returns whether any moved.
    pub fn update_objects(&mut self, frame: u32, frame_fraction: f32, dt: f32) -> Result<bool> {
        let mut moved = false;
        for body in &mut self.bodies {
            moved |= body.update_object(frame, frame_fraction, dt, &mut self.properties)?;
        }
        Ok(moved)
    }

    /// Resolves free particles against every rigid body
    pub fn resolve_collisions(&mut self, dt: f32) -> Result<usize> {
        let particles = self.properties.group_mut(PARTICLE_DATA)?;
        resolve_group_collisions(particles, &self.bodies, dt)
    }

    /// Object update followed by collision resolution, for one whole frame
    pub fn advance_frame(&mut self, frame: u32) -> Result<FrameStats> {
        let dt = self.global.frame_duration;
        let objects_moved = self.update_objects(frame, 0.0, dt)?;
        let collisions = self.resolve_collisions(dt)?;
        self.global.finished_frame = frame;
        self.global.frame_local_time = 0.0;
        debug!(frame, objects_moved, collisions, time = self.global.system_time(), "finished frame");
        Ok(FrameStats {
            frame,
            objects_moved,
            collisions,
        })
    }
}

fn objects<'a>(scene: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    scene
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn tag_object_index(group: &mut PropertyGroup, rows: Range<usize>, index: usize) -> Result<()> {
    if group.has_property(OBJECT_INDEX) {
        group.property_mut::<i32>(OBJECT_INDEX)?.data_mut()[rows].fill(index as i32);
    }
    Ok(())
}
