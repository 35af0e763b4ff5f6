use std::ops::Range;

use psim_core::{
    ACTIVITY, Activity, BoundaryCondition, DEFAULT_GHOST_DENSITY_RATIO, NORMAL_EPSILON_SQ,
    ObjectIdAllocator, POSITION, Result,
};
use psim_data::{PropertyGroup, PropertyManager};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::SimVector;
use crate::constrained::ConstrainedSet;
use crate::generator::mean;
use crate::object::{SamplingRegion, SimulationObject, read_bool, read_f32};

/// A solid that particles collide with.
///
/// Besides pushing penetrating particles back to its surface, a rigid body
/// can emit ghost particles in a shell below its surface and drag the
/// particles it encloses along its animation.
#[derive(Debug)]
pub struct RigidBody<V: SimVector> {
    pub(crate) object: SimulationObject<V>,
    is_collision_object: bool,
    boundary_condition: BoundaryCondition,
    friction: f32,
    ghost_density_ratio: f32,
    ghost_group: Option<String>,
    ghost_range: Range<usize>,
    /// Ghost positions in the rest pose, as offsets from `center`
    ghost_rest: Vec<V>,
    pub(crate) center: V,
    pub(crate) constrain_inside_particles: bool,
    pub(crate) crash_if_no_constrained: bool,
    pub(crate) constrained: Vec<ConstrainedSet<V>>,
}

impl<V: SimVector> RigidBody<V> {
    pub fn new(object: SimulationObject<V>) -> Self {
        let center = object.aabb_center();
        Self {
            object,
            is_collision_object: true,
            boundary_condition: BoundaryCondition::default(),
            friction: 0.0,
            ghost_density_ratio: DEFAULT_GHOST_DENSITY_RATIO,
            ghost_group: None,
            ghost_range: 0..0,
            ghost_rest: Vec::new(),
            center,
            constrain_inside_particles: false,
            crash_if_no_constrained: false,
            constrained: Vec::new(),
        }
    }

    /// Object fields plus `IsCollisionObject`, `BCType`, `BoundaryFriction`,
    /// `GhostDensityRatio`, `ConstrainInsideParticles` and
    /// `CrashIfNoConstrainedParticle`.
    ///
    /// Ghost particles are only emitted when the description carries a
    /// `ParticleGeneration` block with `Enable` set.
    pub fn from_json(object: &Value, particle_radius: f32, ids: &mut ObjectIdAllocator) -> Result<Self> {
        let mut base = SimulationObject::from_json(object, particle_radius, ids)?;
        if object.get("ParticleGeneration").is_none() {
            let mut generation = base.generation().clone();
            generation.enabled = false;
            base = base.with_generation(generation);
        }
        let mut body = Self::new(base);

        if let Some(v) = read_bool(object, "IsCollisionObject")? {
            body.is_collision_object = v;
        }
        // collision settings mean nothing for a body particles pass through
        if body.is_collision_object {
            if let Some(name) = object.get("BCType").and_then(Value::as_str) {
                body.boundary_condition = BoundaryCondition::parse(name)?;
            }
            if let Some(v) = read_f32(object, "BoundaryFriction")? {
                body.friction = v;
            }
        }
        if let Some(v) = read_f32(object, "GhostDensityRatio")? {
            body.ghost_density_ratio = v;
        }
        if let Some(v) = read_bool(object, "ConstrainInsideParticles")? {
            body.constrain_inside_particles = v;
        }
        if let Some(v) = read_bool(object, "CrashIfNoConstrainedParticle")? {
            body.crash_if_no_constrained = v;
        }

        info!(
            object = body.object.name(),
            collision = body.is_collision_object,
            boundary_condition = body.boundary_condition.name(),
            friction = body.friction,
            constrain_inside = body.constrain_inside_particles,
            "created rigid body"
        );
        Ok(body)
    }

    pub fn with_boundary_condition(mut self, bc: BoundaryCondition) -> Self {
        self.boundary_condition = bc;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_collision(mut self, is_collision_object: bool) -> Self {
        self.is_collision_object = is_collision_object;
        self
    }

    pub fn with_constrain_inside_particles(mut self, constrain: bool) -> Self {
        self.constrain_inside_particles = constrain;
        self
    }

    pub fn with_crash_if_no_constrained(mut self, crash: bool) -> Self {
        self.crash_if_no_constrained = crash;
        self
    }

    pub fn object(&self) -> &SimulationObject<V> {
        &self.object
    }

    pub fn is_collision_object(&self) -> bool {
        self.is_collision_object
    }

    pub fn boundary_condition(&self) -> BoundaryCondition {
        self.boundary_condition
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn constrains_inside_particles(&self) -> bool {
        self.constrain_inside_particles
    }

    pub fn ghost_density_ratio(&self) -> f32 {
        self.ghost_density_ratio
    }

    pub fn ghost_range(&self) -> Range<usize> {
        self.ghost_range.clone()
    }

    /// Ghost centroid plus shift, or the bounding box center when no ghost was emitted
    pub fn center(&self) -> V {
        self.center
    }

    /// Velocity of the body surface at `p` over the last transformation step
    pub fn object_velocity(&self, p: V, dt: f32) -> V {
        let geometry = self.object.geometry();
        if !geometry.animation_transformed() {
            return V::ZERO;
        }
        let rest = geometry.inv_transform_animation(p - self.center);
        let last = V::transform_point(&geometry.prev_transformation(), rest) + self.center;
        (p - last) / dt
    }

    /// Pushes a penetrating particle back to the surface and applies the
    /// boundary condition to its velocity. Returns whether anything changed.
    pub fn resolve_collision(&self, pos: &mut V, vel: &mut V, dt: f32) -> bool {
        let Some((phi, n)) = self.penetration(*pos) else {
            return false;
        };
        match self.boundary_condition {
            BoundaryCondition::Sticky => {
                *pos -= n * phi;
                *vel = self.object_velocity(*pos, dt);
            }
            BoundaryCondition::Slip => {
                *pos -= n * phi;
                *vel = self.slip_velocity(*vel, n, self.object_velocity(*pos, dt));
            }
            BoundaryCondition::Separate => {
                if vel.dot(n) >= 0.0 {
                    return false;
                }
                *pos -= n * phi;
                *vel = self.slip_velocity(*vel, n, self.object_velocity(*pos, dt));
            }
        }
        true
    }

    /// Same as [`resolve_collision`](Self::resolve_collision) but leaves the position untouched
    pub fn resolve_collision_velocity_only(&self, pos: &V, vel: &mut V, dt: f32) -> bool {
        let Some((_, n)) = self.penetration(*pos) else {
            return false;
        };
        let object_velocity = self.object_velocity(*pos, dt);
        match self.boundary_condition {
            BoundaryCondition::Sticky => *vel = object_velocity,
            BoundaryCondition::Slip => *vel = self.slip_velocity(*vel, n, object_velocity),
            BoundaryCondition::Separate => {
                if vel.dot(n) >= 0.0 {
                    return false;
                }
                *vel = self.slip_velocity(*vel, n, object_velocity);
            }
        }
        true
    }

    /// Signed distance and outward normal at a penetrating point
    fn penetration(&self, p: V) -> Option<(f32, V)> {
        if !self.is_collision_object {
            return None;
        }
        let phi = self.object.signed_distance(p);
        if phi >= 0.0 {
            return None;
        }
        let grad = self.object.grad_signed_distance(p);
        let len2 = grad.length_squared();
        // no usable normal in a flat region, so no projection either
        let n = if len2 > NORMAL_EPSILON_SQ { grad / len2.sqrt() } else { V::ZERO };
        Some((phi, n))
    }

    /// Removes the normal component, then applies Coulomb friction to what is left
    fn slip_velocity(&self, v: V, n: V, object_velocity: V) -> V {
        let vdn = v.dot(n);
        let mut v = v - n * vdn;
        if self.friction > 0.0 && vdn < 0.0 {
            let vl = v.length();
            let damping = -vdn * self.friction;
            v = if damping < vl { v - v / vl * damping } else { V::ZERO };
        }
        v + object_velocity
    }

    /// Samples ghost particles in the shell `-thickness * r < phi < -r` and
    /// appends them to `group`. Returns the number of rows added.
    pub fn generate_particles(
        &mut self,
        group: &mut PropertyGroup,
        others: &[&SimulationObject<V>],
        ignore_overlap: bool,
    ) -> Result<usize> {
        let positions = self.prepare_particles(others, ignore_overlap)?;
        self.append_particles(group, positions)
    }

    /// Sampling half of [`generate_particles`](Self::generate_particles)
    pub fn prepare_particles(
        &self,
        others: &[&SimulationObject<V>],
        ignore_overlap: bool,
    ) -> Result<Vec<V>> {
        let generation = self.object.generation();
        if !generation.enabled {
            return Ok(Vec::new());
        }
        let r = self.object.particle_radius();
        let region = SamplingRegion {
            spacing: generation.sampling_ratio * (2.0 * r / self.ghost_density_ratio),
            min_phi: -generation.thickness_ratio * r,
            max_phi: -r,
        };
        self.object.sample_particles(region, others, ignore_overlap)
    }

    /// Writing half of [`generate_particles`](Self::generate_particles)
    pub fn append_particles(&mut self, group: &mut PropertyGroup, positions: Vec<V>) -> Result<usize> {
        if !self.object.generation().enabled {
            self.center = self.object.aabb_center();
            return Ok(0);
        }
        if positions.is_empty() {
            warn!(object = self.object.name(), "generated no ghost particle");
            return Ok(0);
        }

        group.property::<V>(POSITION)?;
        let start = group.size();
        let end = start + positions.len();
        group.resize(end);
        group.property_mut::<V>(POSITION)?.data_mut()[start..end].copy_from_slice(&positions);
        if group.has_property(ACTIVITY) {
            group.property_mut::<i8>(ACTIVITY)?.data_mut()[start..end]
                .fill(Activity::Active.tag());
        }

        self.center = mean(&positions) + self.object.generation().shift_center;
        let geometry = self.object.geometry();
        self.ghost_rest = positions
            .par_iter()
            .map(|&p| geometry.inv_transform_animation(p - self.center))
            .collect();
        self.ghost_group = Some(group.name().to_string());
        self.ghost_range = start..end;
        info!(
            object = self.object.name(),
            group = group.name(),
            count = end - start,
            "generated ghost particles"
        );
        Ok(end - start)
    }

    /// Ghost positions under the current transformation
    fn plan_ghost_positions(&self) -> Vec<V> {
        let geometry = self.object.geometry();
        self.ghost_rest
            .par_iter()
            .map(|&rest| geometry.transform_animation(rest) + self.center)
            .collect()
    }

    /// Advances the animation and moves ghost and constrained particles with it.
    ///
    /// Returns whether the body moved. A body that stays put zeroes the
    /// velocity of its constrained particles.
    pub fn update_object(
        &mut self,
        frame: u32,
        frame_fraction: f32,
        dt: f32,
        props: &mut PropertyManager,
    ) -> Result<bool> {
        if !self.object.update_transformation(frame, frame_fraction) {
            if self.has_constrained_particles() {
                self.reset_constrained_particles(props)?;
            }
            return Ok(false);
        }

        let (ghosts, constrained) = {
            let this = &*self;
            let snapshot = &*props;
            rayon::join(
                || this.plan_ghost_positions(),
                || this.plan_constrained(snapshot, dt),
            )
        };
        let constrained = constrained?;

        if let Some(name) = &self.ghost_group {
            let range = self.ghost_range.clone();
            props.property_mut::<V>(name, POSITION)?.data_mut()[range].copy_from_slice(&ghosts);
        }
        self.apply_constrained(props, constrained)?;
        debug!(object = self.object.name(), frame, frame_fraction, "updated rigid body");
        Ok(true)
    }
}
