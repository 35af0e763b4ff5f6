use std::ops::Range;

use psim_core::{ACTIVITY, Activity, Error, MASS, ObjectIdAllocator, POSITION, Result, VELOCITY};
use psim_data::PropertyGroup;
use serde_json::Value;
use tracing::{info, warn};

use crate::SimVector;
use crate::object::{SamplingRegion, SimulationObject, read_bool, read_f32, read_vector};

/// Fills a geometry with particles of one material.
#[derive(Debug)]
pub struct ParticleGenerator<V: SimVector> {
    object: SimulationObject<V>,
    material_density: f32,
    particle_mass: f32,
    initial_velocity: V,
    crash_if_no_particle: bool,
    /// Positions handed out by the last generation, reused on the next call
    generated: Vec<V>,
    /// Rows `[start, end)` of the last append
    range: Range<usize>,
    center: V,
}

impl<V: SimVector> ParticleGenerator<V> {
    pub fn new(object: SimulationObject<V>, material_density: f32) -> Self {
        let center = object.aabb_center();
        let particle_mass = mass_of::<V>(material_density, object.particle_radius());
        Self {
            object,
            material_density,
            particle_mass,
            initial_velocity: V::ZERO,
            crash_if_no_particle: true,
            generated: Vec::new(),
            range: 0..0,
            center,
        }
    }

    /// Object fields plus `MaterialDensity` (required), `InitialVelocity` and `CrashIfNoParticle`
    pub fn from_json(object: &Value, particle_radius: f32, ids: &mut ObjectIdAllocator) -> Result<Self> {
        let base = SimulationObject::from_json(object, particle_radius, ids)?;
        let density = read_f32(object, "MaterialDensity")?
            .ok_or_else(|| Error::MissingRequiredField("MaterialDensity".into()))?;
        let mut generator = Self::new(base, density);
        if let Some(v0) = read_vector(object, "InitialVelocity")? {
            generator.initial_velocity = v0;
        }
        if let Some(crash) = read_bool(object, "CrashIfNoParticle")? {
            generator.crash_if_no_particle = crash;
        }
        info!(
            object = generator.object.name(),
            material_density = generator.material_density,
            particle_mass = generator.particle_mass,
            "created particle generator"
        );
        Ok(generator)
    }

    pub fn with_initial_velocity(mut self, velocity: V) -> Self {
        self.initial_velocity = velocity;
        self
    }

    pub fn with_crash_if_no_particle(mut self, crash: bool) -> Self {
        self.crash_if_no_particle = crash;
        self
    }

    pub fn object(&self) -> &SimulationObject<V> {
        &self.object
    }

    pub fn material_density(&self) -> f32 {
        self.material_density
    }

    pub fn particle_mass(&self) -> f32 {
        self.particle_mass
    }

    pub fn initial_velocity(&self) -> V {
        self.initial_velocity
    }

    pub fn generated_range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Centroid of the generated particles plus the configured shift
    pub fn center(&self) -> V {
        self.center
    }

    /// Samples (or reuses) particle positions and appends them to `group`.
    ///
    /// Returns the number of rows added.
    pub fn generate_particles(
        &mut self,
        group: &mut PropertyGroup,
        others: &[&SimulationObject<V>],
        ignore_overlap: bool,
    ) -> Result<usize> {
        let positions = self.prepare_particles(others, ignore_overlap)?;
        self.append_particles(group, positions)
    }

    /// Sampling half of [`generate_particles`](Self::generate_particles).
    ///
    /// Returns an empty set when generation is disabled.
    pub fn prepare_particles(
        &self,
        others: &[&SimulationObject<V>],
        ignore_overlap: bool,
    ) -> Result<Vec<V>> {
        if !self.object.generation().enabled {
            return Ok(Vec::new());
        }
        if !self.generated.is_empty() {
            return Ok(self.generated.clone());
        }
        let region = SamplingRegion {
            spacing: self.object.generation().sampling_ratio
                * (2.0 * self.object.particle_radius()),
            min_phi: f32::MIN,
            max_phi: 0.0,
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
            if self.crash_if_no_particle {
                return Err(Error::NoParticleGenerated(self.object.name().to_string()));
            }
            warn!(object = self.object.name(), "generated no particle");
            return Ok(0);
        }

        // fail before the group grows
        group.property::<V>(POSITION)?;
        let start = group.size();
        let end = start + positions.len();
        group.resize(end);
        group.property_mut::<V>(POSITION)?.data_mut()[start..end].copy_from_slice(&positions);
        if group.has_property(VELOCITY) {
            group.property_mut::<V>(VELOCITY)?.data_mut()[start..end].fill(self.initial_velocity);
        }
        if group.has_property(MASS) {
            group.property_mut::<f32>(MASS)?.data_mut()[start..end].fill(self.particle_mass);
        }
        if group.has_property(ACTIVITY) {
            group.property_mut::<i8>(ACTIVITY)?.data_mut()[start..end]
                .fill(Activity::Active.tag());
        }

        self.center = mean(&positions) + self.object.generation().shift_center;
        self.range = start..end;
        self.generated = positions;
        info!(
            object = self.object.name(),
            group = group.name(),
            count = end - start,
            "generated particles"
        );
        Ok(end - start)
    }
}

/// `density * (2r)^dim`
pub fn mass_of<V: SimVector>(density: f32, particle_radius: f32) -> f32 {
    density * (2.0 * particle_radius).powi(V::DIM as i32)
}

pub(crate) fn mean<V: SimVector>(positions: &[V]) -> V {
    if positions.is_empty() {
        return V::ZERO;
    }
    positions.iter().fold(V::ZERO, |acc, &p| acc + p) / positions.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;
    use psim_core::{NameRegistry, PARTICLE_DATA};
    use psim_data::PropertyManager;
    use serde_json::json;
    use std::sync::Arc;

    fn particle_data() -> PropertyManager {
        let mut props = PropertyManager::new(Arc::new(NameRegistry::new()));
        let group = props.add_group(PARTICLE_DATA, "").unwrap();
        group.add_property::<Vec3>(POSITION, "", None).unwrap();
        group.add_property::<Vec3>(VELOCITY, "", None).unwrap();
        group.add_property::<f32>(MASS, "", None).unwrap();
        group.add_property::<i8>(ACTIVITY, "", Some(Activity::InActive.tag())).unwrap();
        props
    }

    fn cube(ids: &mut ObjectIdAllocator) -> ParticleGenerator<Vec3> {
        ParticleGenerator::from_json(
            &json!({
                "GeometryType": "Box",
                "BoxMin": [-1, -1, -1],
                "BoxMax": [1, 1, 1],
                "MaterialDensity": 1000.0,
                "InitialVelocity": [0.0, -1.0, 0.0],
                "ParticleGeneration": { "Enable": true, "ShiftCenter": [0.0, 0.5, 0.0] }
            }),
            0.125,
            ids,
        )
        .unwrap()
    }

    #[test]
    fn test_mass_formula() {
        assert_relative_eq!(mass_of::<Vec3>(1000.0, 0.1), 8.0, epsilon = 1e-4);
        assert_relative_eq!(mass_of::<glam::Vec2>(1000.0, 0.1), 40.0, epsilon = 1e-4);
    }

    #[test]
    fn test_fills_group_after_existing_rows() {
        let mut props = particle_data();
        let group = props.group_mut(PARTICLE_DATA).unwrap();
        group.resize(2);

        let mut ids = ObjectIdAllocator::new(3);
        let mut generator = cube(&mut ids);
        let added = generator.generate_particles(group, &[], false).unwrap();

        assert_eq!(added, 343);
        assert_eq!(group.size(), 345);
        assert_eq!(generator.generated_range(), 2..345);

        let velocity = group.property::<Vec3>(VELOCITY).unwrap();
        assert_eq!(velocity[1], Vec3::ZERO);
        assert!(velocity.data()[2..].iter().all(|v| *v == Vec3::new(0.0, -1.0, 0.0)));
        let mass = group.property::<f32>(MASS).unwrap();
        assert!(mass.data()[2..].iter().all(|m| (*m - 15.625).abs() < 1e-4));
        let activity = group.property::<i8>(ACTIVITY).unwrap();
        assert_eq!(activity[0], Activity::InActive.tag());
        assert_eq!(activity[2], Activity::Active.tag());

        let center = generator.center();
        assert_relative_eq!(center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(center.y, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_second_call_reuses_positions() {
        let mut props = particle_data();
        let group = props.group_mut(PARTICLE_DATA).unwrap();
        let mut ids = ObjectIdAllocator::new(3);
        let mut generator = cube(&mut ids);

        generator.generate_particles(group, &[], false).unwrap();
        generator.generate_particles(group, &[], false).unwrap();
        let positions = group.property::<Vec3>(POSITION).unwrap().data();
        assert_eq!(positions[..343], positions[343..]);
        assert_eq!(generator.generated_range(), 343..686);
    }

    #[test]
    fn test_empty_result() {
        let tiny = json!({
            "GeometryType": "Sphere",
            "Radius": 0.01,
            "MaterialDensity": 1000.0
        });
        let mut props = particle_data();
        let group = props.group_mut(PARTICLE_DATA).unwrap();
        let mut ids = ObjectIdAllocator::new(3);

        let mut strict = ParticleGenerator::<Vec3>::from_json(&tiny, 0.125, &mut ids).unwrap();
        assert!(matches!(
            strict.generate_particles(group, &[], false),
            Err(Error::NoParticleGenerated(_))
        ));

        let mut lenient = ParticleGenerator::<Vec3>::from_json(&tiny, 0.125, &mut ids)
            .unwrap()
            .with_crash_if_no_particle(false);
        assert_eq!(lenient.generate_particles(group, &[], false).unwrap(), 0);
        assert_eq!(group.size(), 0);
    }

    #[test]
    fn test_disabled_generation() {
        let mut props = particle_data();
        let group = props.group_mut(PARTICLE_DATA).unwrap();
        let mut ids = ObjectIdAllocator::new(3);
        let mut generator = ParticleGenerator::<Vec3>::from_json(
            &json!({
                "GeometryType": "Box",
                "BoxMin": [0, 0, 0],
                "BoxMax": [2, 4, 6],
                "MaterialDensity": 500.0,
                "ParticleGeneration": { "Enable": false }
            }),
            0.125,
            &mut ids,
        )
        .unwrap();
        assert_eq!(generator.generate_particles(group, &[], false).unwrap(), 0);
        assert_eq!(generator.center(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(group.size(), 0);
    }

    #[test]
    fn test_density_is_required() {
        let mut ids = ObjectIdAllocator::new(3);
        let result = ParticleGenerator::<Vec3>::from_json(
            &json!({ "GeometryType": "Sphere", "Radius": 1.0 }),
            0.1,
            &mut ids,
        );
        assert!(matches!(result, Err(Error::MissingRequiredField(ref f)) if f == "MaterialDensity"));
    }
}
