//! Dimension-generic vector math.
//!
//! Objects and samplers are written once against [`VectorN`] and
//! instantiated for `glam::Vec2` (2D scenes) and `glam::Vec3` (3D scenes).
//! Each dimension also picks its rigid transform (`Affine2` / `Affine3A`) and
//! its rotation representation (an angle / a `Quat`).

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use bytemuck::Pod;
use glam::{Affine2, Affine3A, Quat, Vec2, Vec3};
use serde_json::Value;

pub trait VectorN:
    Copy
    + Default
    + PartialEq
    + Debug
    + Send
    + Sync
    + Pod
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Mul<f32, Output = Self>
    + Div<f32, Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + 'static
{
    const DIM: usize;
    const ZERO: Self;

    type Transform: Copy + PartialEq + Debug + Send + Sync + 'static;
    type Rotation: Copy + PartialEq + Debug + Send + Sync + 'static;

    fn splat(value: f32) -> Self;
    fn from_fn(f: impl FnMut(usize) -> f32) -> Self;
    fn axis(self, index: usize) -> f32;
    fn dot(self, rhs: Self) -> f32;
    fn min_elem(self, rhs: Self) -> Self;
    fn max_elem(self, rhs: Self) -> Self;

    fn length_squared(self) -> f32 {
        self.dot(self)
    }

    fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Unit vector along `axis`
    fn unit(axis: usize) -> Self {
        Self::from_fn(|i| if i == axis { 1.0 } else { 0.0 })
    }

    fn identity_transform() -> Self::Transform;
    fn identity_rotation() -> Self::Rotation;
    fn compose(translation: Self, rotation: Self::Rotation, scale: f32) -> Self::Transform;
    fn transform_point(transform: &Self::Transform, point: Self) -> Self;
    fn inverse(transform: &Self::Transform) -> Self::Transform;
    fn lerp_rotation(a: Self::Rotation, b: Self::Rotation, t: f32) -> Self::Rotation;

    /// Rotational part of a transform as a quaternion (2D rotates about +z)
    fn rotation_quat(transform: &Self::Transform) -> Quat;

    /// Reads a fixed-arity numeric array
    fn from_json(value: &Value) -> Option<Self>;

    /// Reads `RotationAngle` (radians), plus `RotationAxis` in 3D
    fn rotation_from_json(object: &Value) -> Option<Self::Rotation>;
}

fn read_floats<const N: usize>(value: &Value) -> Option<[f32; N]> {
    let array = value.as_array()?;
    if array.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, item) in out.iter_mut().zip(array) {
        *slot = item.as_f64()? as f32;
    }
    Some(out)
}

impl VectorN for Vec2 {
    const DIM: usize = 2;
    const ZERO: Self = Vec2::ZERO;

    type Transform = Affine2;
    type Rotation = f32;

    fn splat(value: f32) -> Self {
        Vec2::splat(value)
    }

    fn from_fn(mut f: impl FnMut(usize) -> f32) -> Self {
        Vec2::new(f(0), f(1))
    }

    fn axis(self, index: usize) -> f32 {
        self[index]
    }

    fn dot(self, rhs: Self) -> f32 {
        Vec2::dot(self, rhs)
    }

    fn min_elem(self, rhs: Self) -> Self {
        self.min(rhs)
    }

    fn max_elem(self, rhs: Self) -> Self {
        self.max(rhs)
    }

    fn identity_transform() -> Affine2 {
        Affine2::IDENTITY
    }

    fn identity_rotation() -> f32 {
        0.0
    }

    fn compose(translation: Self, rotation: f32, scale: f32) -> Affine2 {
        Affine2::from_scale_angle_translation(Vec2::splat(scale), rotation, translation)
    }

    fn transform_point(transform: &Affine2, point: Self) -> Self {
        transform.transform_point2(point)
    }

    fn inverse(transform: &Affine2) -> Affine2 {
        transform.inverse()
    }

    fn lerp_rotation(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    fn rotation_quat(transform: &Affine2) -> Quat {
        let (_, angle, _) = transform.to_scale_angle_translation();
        Quat::from_rotation_z(angle)
    }

    fn from_json(value: &Value) -> Option<Self> {
        read_floats::<2>(value).map(Vec2::from_array)
    }

    fn rotation_from_json(object: &Value) -> Option<f32> {
        object.get("RotationAngle")?.as_f64().map(|angle| angle as f32)
    }
}

impl VectorN for Vec3 {
    const DIM: usize = 3;
    const ZERO: Self = Vec3::ZERO;

    type Transform = Affine3A;
    type Rotation = Quat;

    fn splat(value: f32) -> Self {
        Vec3::splat(value)
    }

    fn from_fn(mut f: impl FnMut(usize) -> f32) -> Self {
        Vec3::new(f(0), f(1), f(2))
    }

    fn axis(self, index: usize) -> f32 {
        self[index]
    }

    fn dot(self, rhs: Self) -> f32 {
        Vec3::dot(self, rhs)
    }

    fn min_elem(self, rhs: Self) -> Self {
        self.min(rhs)
    }

    fn max_elem(self, rhs: Self) -> Self {
        self.max(rhs)
    }

    fn identity_transform() -> Affine3A {
        Affine3A::IDENTITY
    }

    fn identity_rotation() -> Quat {
        Quat::IDENTITY
    }

    fn compose(translation: Self, rotation: Quat, scale: f32) -> Affine3A {
        Affine3A::from_scale_rotation_translation(Vec3::splat(scale), rotation, translation)
    }

    fn transform_point(transform: &Affine3A, point: Self) -> Self {
        transform.transform_point3(point)
    }

    fn inverse(transform: &Affine3A) -> Affine3A {
        transform.inverse()
    }

    fn lerp_rotation(a: Quat, b: Quat, t: f32) -> Quat {
        a.slerp(b, t)
    }

    fn rotation_quat(transform: &Affine3A) -> Quat {
        let (_, rotation, _) = transform.to_scale_rotation_translation();
        rotation
    }

    fn from_json(value: &Value) -> Option<Self> {
        read_floats::<3>(value).map(Vec3::from_array)
    }

    fn rotation_from_json(object: &Value) -> Option<Quat> {
        let angle = object.get("RotationAngle")?.as_f64()? as f32;
        let axis = object
            .get("RotationAxis")
            .and_then(read_floats::<3>)
            .map(Vec3::from_array)
            .unwrap_or(Vec3::Y);
        Some(Quat::from_axis_angle(axis.normalize_or_zero(), angle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_compose_and_inverse() {
        let t = <Vec3 as VectorN>::compose(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.5),
            2.0,
        );
        let p = Vec3::new(0.3, -0.2, 0.9);
        let back = Vec3::transform_point(&Vec3::inverse(&t), Vec3::transform_point(&t, p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-5);
    }

    #[test]
    fn test_rotation_quat_2d() {
        let t = <Vec2 as VectorN>::compose(Vec2::ZERO, 0.25, 1.0);
        let q = Vec2::rotation_quat(&t);
        let (axis, angle) = q.to_axis_angle();
        assert_relative_eq!(angle, 0.25, epsilon = 1e-5);
        assert_relative_eq!(axis.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_json_readers() {
        assert_eq!(Vec3::from_json(&json!([1, 2.5, -3])), Some(Vec3::new(1.0, 2.5, -3.0)));
        assert_eq!(Vec3::from_json(&json!([1, 2])), None);
        assert_eq!(Vec2::from_json(&json!(["a", 2])), None);
        assert_eq!(Vec2::rotation_from_json(&json!({ "RotationAngle": 1.5 })), Some(1.5));
    }
}
