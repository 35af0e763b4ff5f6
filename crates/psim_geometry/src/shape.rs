use psim_core::VectorN;

/// Rest-pose primitive, in world coordinates before any animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<V> {
    Box { min: V, max: V },
    Sphere { center: V, radius: f32 },
}

impl<V: VectorN> Shape<V> {
    /// Signed distance, negative inside the primitive
    pub fn signed_distance(&self, p: V) -> f32 {
        match *self {
            Shape::Box { min, max } => {
                let center = (min + max) * 0.5;
                let half = (max - min) * 0.5;
                let q = V::from_fn(|i| (p.axis(i) - center.axis(i)).abs() - half.axis(i));
                let outside = V::from_fn(|i| q.axis(i).max(0.0)).length();
                let inside = (0..V::DIM)
                    .map(|i| q.axis(i))
                    .fold(f32::MIN, f32::max)
                    .min(0.0);
                outside + inside
            }
            Shape::Sphere { center, radius } => (p - center).length() - radius,
        }
    }

    pub fn aabb(&self) -> (V, V) {
        match *self {
            Shape::Box { min, max } => (min, max),
            Shape::Sphere { center, radius } => {
                (center - V::splat(radius), center + V::splat(radius))
            }
        }
    }

    pub fn center(&self) -> V {
        let (min, max) = self.aabb();
        (min + max) * 0.5
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::Box { .. } => "Box",
            Shape::Sphere { .. } => "Sphere",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Vec2, Vec3};

    #[test]
    fn test_box_distance() {
        let b = Shape::Box {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        assert_relative_eq!(b.signed_distance(Vec3::ZERO), -1.0);
        assert_relative_eq!(b.signed_distance(Vec3::new(0.5, 0.0, 0.0)), -0.5);
        assert_relative_eq!(b.signed_distance(Vec3::new(3.0, 0.0, 0.0)), 2.0);
        assert_relative_eq!(b.signed_distance(Vec3::new(2.0, 2.0, 1.0)), 2f32.sqrt());
    }

    #[test]
    fn test_sphere_distance_2d() {
        let s = Shape::Sphere {
            center: Vec2::new(1.0, 0.0),
            radius: 0.5,
        };
        assert_relative_eq!(s.signed_distance(Vec2::new(1.0, 0.0)), -0.5);
        assert_relative_eq!(s.signed_distance(Vec2::new(3.0, 0.0)), 1.5);
        assert_eq!(s.aabb(), (Vec2::new(0.5, -0.5), Vec2::new(1.5, 0.5)));
    }
}
