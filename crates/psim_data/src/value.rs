//! Closed set of value types a parameter (or a discrete group property) can hold.

use glam::{DVec4, IVec2, IVec3, IVec4, UVec2, UVec3, UVec4, Vec2, Vec3};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
    Vec2i(IVec2),
    Vec2u(UVec2),
    Vec2f(Vec2),
    Vec3i(IVec3),
    Vec3u(UVec3),
    Vec3f(Vec3),
    Vec4i(IVec4),
    Vec4u(UVec4),
    Vec4d(DVec4),
    String(String),
}

impl TypedValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => bool::TYPE_NAME,
            Self::Int(_) => i32::TYPE_NAME,
            Self::UInt(_) => u32::TYPE_NAME,
            Self::Float(_) => f32::TYPE_NAME,
            Self::Double(_) => f64::TYPE_NAME,
            Self::Vec2i(_) => IVec2::TYPE_NAME,
            Self::Vec2u(_) => UVec2::TYPE_NAME,
            Self::Vec2f(_) => Vec2::TYPE_NAME,
            Self::Vec3i(_) => IVec3::TYPE_NAME,
            Self::Vec3u(_) => UVec3::TYPE_NAME,
            Self::Vec3f(_) => Vec3::TYPE_NAME,
            Self::Vec4i(_) => IVec4::TYPE_NAME,
            Self::Vec4u(_) => UVec4::TYPE_NAME,
            Self::Vec4d(_) => DVec4::TYPE_NAME,
            Self::String(_) => String::TYPE_NAME,
        }
    }
}

/// A Rust type that has a [`TypedValue`] variant.
///
/// Only the types listed in the enum implement this, so storing anything else
/// is rejected at compile time.
pub trait ValueType: Clone + Sized + 'static {
    const TYPE_NAME: &'static str;

    fn wrap(self) -> TypedValue;
    fn peek(value: &TypedValue) -> Option<&Self>;
    fn peek_mut(value: &mut TypedValue) -> Option<&mut Self>;
    /// Converts a JSON field. Scalars use the scalar reader, vectors a fixed-arity array
    fn read_json(value: &Value) -> Option<Self>;
}

fn read_i32(value: &Value) -> Option<i32> {
    value.as_i64().and_then(|v| i32::try_from(v).ok())
}

fn read_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

fn read_f32(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32)
}

fn read_array<T: Copy + Default, const N: usize>(
    value: &Value,
    read: fn(&Value) -> Option<T>,
) -> Option<[T; N]> {
    let items = value.as_array()?;
    if items.len() != N {
        return None;
    }
    let mut out = [T::default(); N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = read(item)?;
    }
    Some(out)
}

macro_rules! value_type {
    ($ty:ty, $variant:ident, $name:literal, $read:expr) => {
        impl ValueType for $ty {
            const TYPE_NAME: &'static str = $name;

            fn wrap(self) -> TypedValue {
                TypedValue::$variant(self)
            }

            fn peek(value: &TypedValue) -> Option<&Self> {
                match value {
                    TypedValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn peek_mut(value: &mut TypedValue) -> Option<&mut Self> {
                match value {
                    TypedValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn read_json(value: &Value) -> Option<Self> {
                let read: fn(&Value) -> Option<Self> = $read;
                read(value)
            }
        }
    };
}

value_type!(bool, Bool, "bool", Value::as_bool);
value_type!(i32, Int, "i32", read_i32);
value_type!(u32, UInt, "u32", read_u32);
value_type!(f32, Float, "f32", read_f32);
value_type!(f64, Double, "f64", Value::as_f64);
value_type!(IVec2, Vec2i, "vec2i", |v| read_array(v, read_i32).map(IVec2::from_array));
value_type!(UVec2, Vec2u, "vec2u", |v| read_array(v, read_u32).map(UVec2::from_array));
value_type!(Vec2, Vec2f, "vec2f", |v| read_array(v, read_f32).map(Vec2::from_array));
value_type!(IVec3, Vec3i, "vec3i", |v| read_array(v, read_i32).map(IVec3::from_array));
value_type!(UVec3, Vec3u, "vec3u", |v| read_array(v, read_u32).map(UVec3::from_array));
value_type!(Vec3, Vec3f, "vec3f", |v| read_array(v, read_f32).map(Vec3::from_array));
value_type!(IVec4, Vec4i, "vec4i", |v| read_array(v, read_i32).map(IVec4::from_array));
value_type!(UVec4, Vec4u, "vec4u", |v| read_array(v, read_u32).map(UVec4::from_array));
value_type!(DVec4, Vec4d, "vec4d", |v| read_array(v, Value::as_f64).map(DVec4::from_array));
value_type!(String, String, "string", |v| v.as_str().map(str::to_string));

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrap_and_peek() {
        let value = 3.5f32.wrap();
        assert_eq!(value.type_name(), "f32");
        assert_eq!(f32::peek(&value), Some(&3.5));
        assert_eq!(f64::peek(&value), None);
        assert_eq!(i32::peek(&value), None);
    }

    #[test]
    fn test_json_scalars() {
        assert_eq!(bool::read_json(&json!(true)), Some(true));
        assert_eq!(i32::read_json(&json!(-7)), Some(-7));
        assert_eq!(i32::read_json(&json!(1u64 << 40)), None);
        assert_eq!(u32::read_json(&json!(-1)), None);
        assert_eq!(f32::read_json(&json!(2)), Some(2.0));
        assert_eq!(String::read_json(&json!("abc")), Some("abc".to_string()));
        assert_eq!(String::read_json(&json!(5)), None);
    }

    #[test]
    fn test_json_vectors() {
        assert_eq!(IVec3::read_json(&json!([1, -2, 3])), Some(IVec3::new(1, -2, 3)));
        assert_eq!(Vec2::read_json(&json!([0.5, 1])), Some(Vec2::new(0.5, 1.0)));
        assert_eq!(Vec3::read_json(&json!([0.5, 1])), None);
        assert_eq!(UVec4::read_json(&json!([1, 2, 3, -4])), None);
        assert_eq!(
            DVec4::read_json(&json!([1.0, 2.0, 3.0, 4.0])),
            Some(DVec4::new(1.0, 2.0, 3.0, 4.0))
        );
    }
}
