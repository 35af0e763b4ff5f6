use parking_lot::RwLock;
use psim_core::VectorN;

use crate::Geometry;
use crate::animation::Animation;
use crate::shape::Shape;

#[derive(Debug, Clone, Copy)]
struct TransformState<V: VectorN> {
    prev: V::Transform,
    current: V::Transform,
    inv_current: V::Transform,
    transformed: bool,
}

/// A primitive shape, optionally key-framed.
///
/// Animation transforms act on coordinates relative to the rest-pose center
/// of the shape; [`Geometry::transform_animation`] takes and returns such
/// centered points.
#[derive(Debug)]
pub struct GeometryObject<V: VectorN> {
    shape: Shape<V>,
    pivot: V,
    animation: Option<Animation<V>>,
    state: RwLock<TransformState<V>>,
}

impl<V: VectorN> GeometryObject<V> {
    pub fn new(shape: Shape<V>) -> Self {
        Self {
            pivot: shape.center(),
            shape,
            animation: None,
            state: RwLock::new(TransformState {
                prev: V::identity_transform(),
                current: V::identity_transform(),
                inv_current: V::identity_transform(),
                transformed: false,
            }),
        }
    }

    pub fn with_animation(mut self, animation: Animation<V>) -> Self {
        if !animation.is_empty() {
            let start = animation.transform_at(0.0);
            let state = self.state.get_mut();
            state.prev = start;
            state.current = start;
            state.inv_current = V::inverse(&start);
            self.animation = Some(animation);
        }
        self
    }

    pub fn shape(&self) -> &Shape<V> {
        &self.shape
    }

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }

    fn to_rest(&self, p: V) -> V {
        let inv = self.state.read().inv_current;
        V::transform_point(&inv, p - self.pivot) + self.pivot
    }

    fn to_world(&self, p: V) -> V {
        self.transform_animation(p - self.pivot) + self.pivot
    }
}

impl<V: VectorN> Geometry<V> for GeometryObject<V> {
    fn name(&self) -> &str {
        self.shape.type_name()
    }

    fn signed_distance(&self, p: V, negative_inside: bool) -> f32 {
        let scale = match &self.animation {
            // uniform scale, so a unit axis maps to a vector of length `scale`
            Some(_) => {
                let current = self.state.read().current;
                (V::transform_point(&current, V::unit(0)) - V::transform_point(&current, V::ZERO))
                    .length()
            }
            None => 1.0,
        };
        let d = self.shape.signed_distance(self.to_rest(p)) * scale;
        if negative_inside { d } else { -d }
    }

    fn aabb_min(&self) -> V {
        self.world_aabb().0
    }

    fn aabb_max(&self) -> V {
        self.world_aabb().1
    }

    fn update_transformation(&self, frame: u32, frame_fraction: f32) -> bool {
        let Some(animation) = &self.animation else {
            return false;
        };
        let next = animation.transform_at(frame as f32 + frame_fraction);
        let mut state = self.state.write();
        state.prev = state.current;
        state.current = next;
        state.inv_current = V::inverse(&next);
        state.transformed = state.prev != next;
        state.transformed
    }

    fn animation_transformed(&self) -> bool {
        self.state.read().transformed
    }

    fn transform_animation(&self, p: V) -> V {
        V::transform_point(&self.state.read().current, p)
    }

    fn inv_transform_animation(&self, p: V) -> V {
        V::transform_point(&self.state.read().inv_current, p)
    }

    fn prev_transformation(&self) -> V::Transform {
        self.state.read().prev
    }

    fn transformation(&self) -> V::Transform {
        self.state.read().current
    }
}

impl<V: VectorN> GeometryObject<V> {
    fn world_aabb(&self) -> (V, V) {
        let (min, max) = self.shape.aabb();
        if self.animation.is_none() {
            return (min, max);
        }
        (0..1usize << V::DIM)
            .map(|corner| {
                self.to_world(V::from_fn(|i| {
                    if (corner >> i) & 1 == 1 { max.axis(i) } else { min.axis(i) }
                }))
            })
            .fold(
                (V::splat(f32::MAX), V::splat(f32::MIN)),
                |(lo, hi), p| (lo.min_elem(p), hi.max_elem(p)),
            )
    }
}
