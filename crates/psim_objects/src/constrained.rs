use glam::{Quat, Vec3};
use psim_core::{
    ACTIVITY, ANGULAR_VELOCITY, Activity, Error, FIRST_COTANGENT, POSITION, Result, VELOCITY,
};
use psim_data::{PropertyGroup, PropertyManager};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::SimVector;
use crate::rigid_body::RigidBody;

/// Rows of one property group rigidly attached to a body
#[derive(Debug, Clone, PartialEq)]
pub struct ConstrainedSet<V> {
    group: String,
    indices: Vec<usize>,
    /// Rest-pose offsets from the body center
    rest: Vec<V>,
    /// First cotangent vectors with the body rotation undone
    rest_cotangents: Option<Vec<Vec3>>,
}

impl<V> ConstrainedSet<V> {
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// New state of one constrained set, computed before anything is written
#[derive(Debug)]
pub(crate) struct ConstrainedUpdate<V> {
    positions: Vec<V>,
    velocities: Vec<V>,
    angular_velocity: Option<Vec3>,
    cotangents: Option<Vec<Vec3>>,
}

impl<V: SimVector> RigidBody<V> {
    pub fn constrained_sets(&self) -> &[ConstrainedSet<V>] {
        &self.constrained
    }

    pub fn has_constrained_particles(&self) -> bool {
        self.constrained.iter().any(|set| !set.is_empty())
    }

    /// Tags every row of `group` inside the body as constrained and records
    /// its rest pose, replacing an earlier record for the same group. Rows of
    /// the earlier record that are no longer inside are tagged active again.
    ///
    /// Returns the number of rows found. Does nothing unless the body
    /// constrains inside particles.
    pub fn find_constrained_particles(&mut self, group: &mut PropertyGroup) -> Result<usize> {
        if !self.constrain_inside_particles {
            return Ok(0);
        }

        let geometry = self.object.geometry();
        let center = self.center;
        let (indices, rest): (Vec<usize>, Vec<V>) = group
            .property::<V>(POSITION)?
            .data()
            .par_iter()
            .enumerate()
            .filter(|(_, p)| self.object.is_inside(**p))
            .map(|(i, &p)| (i, geometry.inv_transform_animation(p - center)))
            .unzip();

        if indices.is_empty() && self.crash_if_no_constrained {
            return Err(Error::NoConstrainedParticle(self.object.name().to_string()));
        }

        let rest_cotangents: Option<Vec<Vec3>> = if V::DIM == 3 && group.has_property(FIRST_COTANGENT) {
            let undo = V::rotation_quat(&geometry.transformation()).inverse();
            let cotangents = group.property::<Vec3>(FIRST_COTANGENT)?;
            Some(indices.iter().map(|&i| undo * cotangents[i]).collect())
        } else {
            None
        };

        if group.has_property(ACTIVITY) {
            let previous = self
                .constrained
                .iter()
                .find(|set| set.group == group.name())
                .map(|set| set.indices.as_slice())
                .unwrap_or_default();
            let activity = group.property_mut::<i8>(ACTIVITY)?.data_mut();
            // rows that left the body go back to the solver
            for &i in previous {
                if let Some(tag) = activity.get_mut(i) {
                    *tag = Activity::Active.tag();
                }
            }
            for &i in &indices {
                activity[i] = Activity::Constrained.tag();
            }
        }

        let count = indices.len();
        if count == 0 {
            warn!(object = self.object.name(), group = group.name(), "found no constrained particle");
        } else {
            info!(object = self.object.name(), group = group.name(), count, "constrained particles");
        }
        self.constrained.retain(|set| set.group != group.name());
        self.constrained.push(ConstrainedSet {
            group: group.name().to_string(),
            indices,
            rest,
            rest_cotangents,
        });
        Ok(count)
    }

    /// Moves constrained rows to the current body pose; velocities are the
    /// displacement over `dt`.
    pub fn update_constrained_particles(&self, props: &mut PropertyManager, dt: f32) -> Result<()> {
        let updates = self.plan_constrained(props, dt)?;
        self.apply_constrained(props, updates)
    }

    /// Zeroes the velocity and angular velocity of every constrained row
    pub fn reset_constrained_particles(&self, props: &mut PropertyManager) -> Result<()> {
        for set in &self.constrained {
            let group = props.group_mut(&set.group)?;
            if group.has_property(VELOCITY) {
                let velocity = group.property_mut::<V>(VELOCITY)?;
                for &i in &set.indices {
                    velocity[i] = V::ZERO;
                }
            }
            if V::DIM == 3 && group.has_property(ANGULAR_VELOCITY) {
                let omega = group.property_mut::<Vec3>(ANGULAR_VELOCITY)?;
                for &i in &set.indices {
                    omega[i] = Vec3::ZERO;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn plan_constrained(
        &self,
        props: &PropertyManager,
        dt: f32,
    ) -> Result<Vec<ConstrainedUpdate<V>>> {
        let geometry = self.object.geometry();
        let center = self.center;
        let current = V::rotation_quat(&geometry.transformation());
        let previous = V::rotation_quat(&geometry.prev_transformation());

        self.constrained
            .iter()
            .map(|set| {
                let group = props.group(&set.group)?;
                let old = group.property::<V>(POSITION)?.data();
                let positions: Vec<V> = set
                    .rest
                    .par_iter()
                    .map(|&rest| geometry.transform_animation(rest) + center)
                    .collect();
                let velocities = set
                    .indices
                    .par_iter()
                    .zip(&positions)
                    .map(|(&i, &p)| (p - old[i]) / dt)
                    .collect();

                let angular_velocity = (V::DIM == 3 && group.has_property(ANGULAR_VELOCITY))
                    .then(|| incremental_angular_velocity(previous, current, dt));
                let cotangents = set
                    .rest_cotangents
                    .as_ref()
                    .map(|rest| rest.iter().map(|&c| current * c).collect());

                Ok(ConstrainedUpdate {
                    positions,
                    velocities,
                    angular_velocity,
                    cotangents,
                })
            })
            .collect()
    }

    pub(crate) fn apply_constrained(
        &self,
        props: &mut PropertyManager,
        updates: Vec<ConstrainedUpdate<V>>,
    ) -> Result<()> {
        for (set, update) in self.constrained.iter().zip(updates) {
            let group = props.group_mut(&set.group)?;
            scatter(group.property_mut::<V>(POSITION)?.data_mut(), &set.indices, &update.positions);
            if group.has_property(VELOCITY) {
                scatter(group.property_mut::<V>(VELOCITY)?.data_mut(), &set.indices, &update.velocities);
            }
            if let Some(omega) = update.angular_velocity {
                let column = group.property_mut::<Vec3>(ANGULAR_VELOCITY)?;
                for &i in &set.indices {
                    column[i] = omega;
                }
            }
            if let Some(cotangents) = &update.cotangents {
                scatter(group.property_mut::<Vec3>(FIRST_COTANGENT)?.data_mut(), &set.indices, cotangents);
            }
            debug!(object = self.object.name(), group = %set.group, count = set.len(), "moved constrained particles");
        }
        Ok(())
    }
}

fn scatter<T: Copy>(column: &mut [T], indices: &[usize], values: &[T]) {
    for (&i, &v) in indices.iter().zip(values) {
        column[i] = v;
    }
}

/// `axis * angle / dt` of the rotation taking `previous` to `current`
fn incremental_angular_velocity(previous: Quat, current: Quat, dt: f32) -> Vec3 {
    let (axis, angle) = (current * previous.inverse()).normalize().to_axis_angle();
    // shortest arc
    let angle = if angle > std::f32::consts::PI {
        angle - std::f32::consts::TAU
    } else {
        angle
    };
    axis * (angle / dt)
}
