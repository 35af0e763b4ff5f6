//! Geometry capability consumed by simulation objects, with `Box` and
//! `Sphere` primitives and key-framed rigid animation.

pub mod animation;
pub mod object;
pub mod shape;

use std::fmt::Debug;
use std::sync::Arc;

use psim_core::{Error, Result, VectorN};
use serde_json::Value;
use tracing::debug;

pub use animation::{Animation, KeyFrame};
pub use object::GeometryObject;
pub use shape::Shape;

/// What a simulation object needs to know about its shape.
///
/// Implementations are shared across worker threads, so every query takes
/// `&self`; animation state is kept behind interior mutability.
pub trait Geometry<V: VectorN>: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Negative inside when `negative_inside` is set, sign flipped otherwise
    fn signed_distance(&self, p: V, negative_inside: bool) -> f32;

    /// Central-difference gradient of [`signed_distance`](Self::signed_distance); not normalized
    fn grad_signed_distance(&self, p: V, negative_inside: bool, eps: f32) -> V {
        V::from_fn(|i| {
            let step = V::unit(i) * eps;
            let forward = self.signed_distance(p + step, negative_inside);
            let backward = self.signed_distance(p - step, negative_inside);
            (forward - backward) / (2.0 * eps)
        })
    }

    fn is_inside(&self, p: V, negative_inside: bool) -> bool {
        self.signed_distance(p, negative_inside) < 0.0
    }

    fn aabb_min(&self) -> V;
    fn aabb_max(&self) -> V;

    /// Moves the geometry to `frame + frame_fraction`. Returns whether it moved.
    fn update_transformation(&self, frame: u32, frame_fraction: f32) -> bool;

    /// Whether the last [`update_transformation`](Self::update_transformation) moved the geometry
    fn animation_transformed(&self) -> bool;

    fn transform_animation(&self, p: V) -> V;
    fn inv_transform_animation(&self, p: V) -> V;
    fn prev_transformation(&self) -> V::Transform;
    fn transformation(&self) -> V::Transform;
}

/// Builds a geometry from the fields of an object description.
///
/// `GeometryType` selects the primitive: `Box` (`BoxMin`, `BoxMax`) or
/// `Sphere` (`Center`, `Radius`). An optional `Animation` block adds key frames.
pub fn create_geometry<V: VectorN>(object: &Value) -> Result<Arc<dyn Geometry<V>>> {
    let kind = object
        .get("GeometryType")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingRequiredField("GeometryType".into()))?;

    let shape = match kind {
        "Box" => Shape::Box {
            min: read_vector(object, "BoxMin")?,
            max: read_vector(object, "BoxMax")?,
        },
        "Sphere" => Shape::Sphere {
            center: match object.get("Center") {
                Some(_) => read_vector(object, "Center")?,
                None => V::ZERO,
            },
            radius: object
                .get("Radius")
                .and_then(Value::as_f64)
                .ok_or_else(|| Error::MissingRequiredField("Radius".into()))?
                as f32,
        },
        other => return Err(Error::UnknownGeometry(other.to_string())),
    };

    let mut geometry = GeometryObject::new(shape);
    if let Some(block) = object.get("Animation") {
        geometry = geometry.with_animation(Animation::from_json(block)?);
    }
    debug!(geometry = kind, animated = geometry.is_animated(), "created geometry");
    Ok(Arc::new(geometry))
}

fn read_vector<V: VectorN>(object: &Value, field: &str) -> Result<V> {
    let value = object
        .get(field)
        .ok_or_else(|| Error::MissingRequiredField(field.to_string()))?;
    V::from_json(value).ok_or_else(|| Error::InvalidConfigValue {
        field: field.to_string(),
        reason: format!("expected {} numbers", V::DIM),
    })
}
