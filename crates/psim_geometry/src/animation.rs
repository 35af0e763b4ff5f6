use psim_core::{Error, Result, VectorN};
use serde_json::Value;

/// Pose of an object at one frame, relative to its rest pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyFrame<V: VectorN> {
    pub frame: u32,
    pub translation: V,
    pub rotation: V::Rotation,
    pub scale: f32,
}

impl<V: VectorN> KeyFrame<V> {
    pub fn new(frame: u32) -> Self {
        Self {
            frame,
            translation: V::ZERO,
            rotation: V::identity_rotation(),
            scale: 1.0,
        }
    }

    fn from_json(object: &Value) -> Result<Self> {
        let frame = object
            .get("Frame")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::MissingRequiredField("Frame".into()))?;
        let mut key = Self::new(frame as u32);
        if let Some(t) = object.get("Translation") {
            key.translation = V::from_json(t).ok_or_else(|| Error::InvalidConfigValue {
                field: "Translation".into(),
                reason: format!("expected {} numbers", V::DIM),
            })?;
        }
        if let Some(rotation) = V::rotation_from_json(object) {
            key.rotation = rotation;
        }
        if let Some(scale) = object.get("Scale").and_then(Value::as_f64) {
            key.scale = scale as f32;
        }
        Ok(key)
    }

    fn transform(&self) -> V::Transform {
        V::compose(self.translation, self.rotation, self.scale)
    }
}

/// Piecewise-linear key-framed motion, held constant outside the key range
#[derive(Debug, Clone, PartialEq)]
pub struct Animation<V: VectorN> {
    keys: Vec<KeyFrame<V>>,
}

impl<V: VectorN> Animation<V> {
    pub fn new(mut keys: Vec<KeyFrame<V>>) -> Self {
        keys.sort_by_key(|k| k.frame);
        Self { keys }
    }

    /// Reads `{"KeyFrames": [{"Frame", "Translation", "RotationAngle", ...}]}`
    pub fn from_json(object: &Value) -> Result<Self> {
        let keys = object
            .get("KeyFrames")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::MissingRequiredField("KeyFrames".into()))?
            .iter()
            .map(KeyFrame::<V>::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(keys))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Transform at `time`, measured in frames
    pub fn transform_at(&self, time: f32) -> V::Transform {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return V::identity_transform();
        };
        if time <= first.frame as f32 {
            return first.transform();
        }
        if time >= last.frame as f32 {
            return last.transform();
        }
        let next = self.keys.partition_point(|k| (k.frame as f32) <= time);
        let (a, b) = (&self.keys[next - 1], &self.keys[next]);
        let t = (time - a.frame as f32) / (b.frame - a.frame) as f32;
        V::compose(
            a.translation + (b.translation - a.translation) * t,
            V::lerp_rotation(a.rotation, b.rotation, t),
            a.scale + (b.scale - a.scale) * t,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Vec2, Vec3};
    use serde_json::json;

    #[test]
    fn test_interpolates_translation() {
        let animation = Animation::<Vec3>::from_json(&json!({
            "KeyFrames": [
                { "Frame": 10, "Translation": [2.0, 0.0, 0.0] },
                { "Frame": 0 }
            ]
        }))
        .unwrap();
        let p = Vec3::transform_point(&animation.transform_at(5.0), Vec3::ZERO);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-6);
        let clamped = Vec3::transform_point(&animation.transform_at(50.0), Vec3::ZERO);
        assert_relative_eq!(clamped.x, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_interpolates_rotation_2d() {
        let animation = Animation::<Vec2>::from_json(&json!({
            "KeyFrames": [
                { "Frame": 0 },
                { "Frame": 2, "RotationAngle": std::f64::consts::PI }
            ]
        }))
        .unwrap();
        let p = Vec2::transform_point(&animation.transform_at(1.0), Vec2::X);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_frame_is_error() {
        let result = Animation::<Vec2>::from_json(&json!({ "KeyFrames": [{ "Scale": 2.0 }] }));
        assert!(matches!(result, Err(Error::MissingRequiredField(_))));
    }
}
