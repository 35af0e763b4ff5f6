use psim_core::{ACTIVITY, Activity, POSITION, Result, VELOCITY};
use psim_data::PropertyGroup;
use rayon::prelude::*;

use crate::SimVector;
use crate::rigid_body::RigidBody;

/// Resolves every row of `group` against every body, in parallel.
///
/// Constrained rows are skipped. Returns the number of rows at least one
/// body acted on.
pub fn resolve_group_collisions<V: SimVector>(
    group: &mut PropertyGroup,
    bodies: &[RigidBody<V>],
    dt: f32,
) -> Result<usize> {
    if bodies.is_empty() || group.size() == 0 {
        return Ok(0);
    }
    let constrained = Activity::Constrained.tag();
    let activity = if group.has_property(ACTIVITY) {
        Some(group.property::<i8>(ACTIVITY)?.data().to_vec())
    } else {
        None
    };

    let (positions, velocities) = group.property_pair_mut::<V, V>(POSITION, VELOCITY)?;
    let resolved = positions
        .data_mut()
        .par_iter_mut()
        .zip(velocities.data_mut().par_iter_mut())
        .enumerate()
        .filter(|(i, _)| activity.as_ref().is_none_or(|tags| tags[*i] != constrained))
        .map(|(_, (p, v))| {
            let mut hit = false;
            for body in bodies {
                hit |= body.resolve_collision(p, v, dt);
            }
            usize::from(hit)
        })
        .sum();
    Ok(resolved)
}
