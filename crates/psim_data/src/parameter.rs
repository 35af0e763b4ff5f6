use std::collections::HashMap;
use std::sync::Arc;

use psim_core::{Error, NameRegistry, Result, string_hash};
use serde_json::Value;
use tracing::debug;

use crate::value::{TypedValue, ValueType};

/// A named value of one fixed type.
///
/// The type is chosen by the default passed at creation and never changes.
/// Reading or writing it as any other type is a bug and panics.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    group: String,
    name: String,
    description: String,
    value: TypedValue,
}

impl Parameter {
    pub fn new<T: ValueType>(
        group: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        default: T,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            description: description.into(),
            value: default.wrap(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn value(&self) -> &TypedValue {
        &self.value
    }

    pub fn type_name(&self) -> &'static str {
        self.value.type_name()
    }

    pub fn set<T: ValueType>(&mut self, value: T) {
        *self.get_mut::<T>() = value;
    }

    pub fn get<T: ValueType>(&self) -> &T {
        match T::peek(&self.value) {
            Some(v) => v,
            None => self.type_violation::<T>(),
        }
    }

    pub fn get_mut<T: ValueType>(&mut self) -> &mut T {
        if T::peek(&self.value).is_none() {
            self.type_violation::<T>();
        }
        match T::peek_mut(&mut self.value) {
            Some(v) => v,
            None => unreachable!(),
        }
    }

    pub fn try_get<T: ValueType>(&self) -> Option<&T> {
        T::peek(&self.value)
    }

    /// Overwrite from the field of `object` named like this parameter.
    ///
    /// Returns `Ok(false)` and keeps the current value when the field is absent.
    pub fn parse_value<T: ValueType>(&mut self, object: &Value) -> Result<bool> {
        if T::peek(&self.value).is_none() {
            self.type_violation::<T>();
        }
        let Some(field) = object.get(&self.name) else {
            return Ok(false);
        };
        let value = T::read_json(field).ok_or_else(|| Error::InvalidConfigValue {
            field: self.name.clone(),
            reason: format!("expected {}, found `{field}`", T::TYPE_NAME),
        })?;
        self.set(value);
        Ok(true)
    }

    pub fn parse_required_value<T: ValueType>(&mut self, object: &Value) -> Result<()> {
        if self.parse_value::<T>(object)? {
            Ok(())
        } else {
            Err(Error::MissingRequiredField(self.name.clone()))
        }
    }

    fn type_violation<T: ValueType>(&self) -> ! {
        panic!(
            "parameter `{}/{}` holds {}, accessed as {}",
            self.group,
            self.name,
            self.value.type_name(),
            T::TYPE_NAME
        )
    }
}

/// Parameters of one group, keyed by the hash of their name
#[derive(Debug)]
pub struct ParameterGroup {
    name: String,
    description: String,
    registry: Arc<NameRegistry>,
    parameters: HashMap<u32, Parameter>,
}

impl ParameterGroup {
    fn new(name: &str, description: &str, registry: Arc<NameRegistry>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            registry,
            parameters: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn add_parameter<T: ValueType>(
        &mut self,
        name: &str,
        description: &str,
        default: T,
    ) -> Result<&mut Parameter> {
        let hash = self.registry.require(name)?;
        if self.parameters.contains_key(&hash) {
            return Err(Error::DuplicateParameter {
                group: self.name.clone(),
                name: name.to_string(),
            });
        }
        let parameter = Parameter::new(self.name.as_str(), name, description, default);
        Ok(self.parameters.entry(hash).or_insert(parameter))
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter> {
        self.lookup(name).ok_or_else(|| self.not_found(name))
    }

    pub fn parameter_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        match self.parameters.get_mut(&string_hash(name)) {
            Some(p) if p.name == name => Ok(p),
            _ => Err(Error::ParameterNotFound {
                group: self.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    pub fn remove_parameter(&mut self, name: &str) -> Result<Parameter> {
        if !self.has_parameter(name) {
            return Err(self.not_found(name));
        }
        self.parameters
            .remove(&string_hash(name))
            .ok_or_else(|| self.not_found(name))
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    fn lookup(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .get(&string_hash(name))
            .filter(|p| p.name == name)
    }

    fn not_found(&self, name: &str) -> Error {
        Error::ParameterNotFound {
            group: self.name.clone(),
            name: name.to_string(),
        }
    }
}

/// Two-level namespace of parameters: group, then name.
///
/// A group has to be added before any parameter can go into it.
#[derive(Debug)]
pub struct ParameterManager {
    registry: Arc<NameRegistry>,
    groups: HashMap<u32, ParameterGroup>,
}

impl ParameterManager {
    pub fn new(registry: Arc<NameRegistry>) -> Self {
        Self {
            registry,
            groups: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<NameRegistry> {
        &self.registry
    }

    pub fn add_group(&mut self, name: &str, description: &str) -> Result<&mut ParameterGroup> {
        let hash = self.registry.require(name)?;
        if self.groups.contains_key(&hash) {
            return Err(Error::DuplicateGroup(name.to_string()));
        }
        debug!(group = name, "added parameter group");
        let group = ParameterGroup::new(name, description, Arc::clone(&self.registry));
        Ok(self.groups.entry(hash).or_insert(group))
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.group(name).is_ok()
    }

    pub fn group(&self, name: &str) -> Result<&ParameterGroup> {
        self.groups
            .get(&string_hash(name))
            .filter(|g| g.name == name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    pub fn group_mut(&mut self, name: &str) -> Result<&mut ParameterGroup> {
        match self.groups.get_mut(&string_hash(name)) {
            Some(g) if g.name == name => Ok(g),
            _ => Err(Error::GroupNotFound(name.to_string())),
        }
    }

    pub fn remove_group(&mut self, name: &str) -> Result<ParameterGroup> {
        self.group(name)?;
        self.groups
            .remove(&string_hash(name))
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    pub fn add_parameter<T: ValueType>(
        &mut self,
        group: &str,
        name: &str,
        description: &str,
        default: T,
    ) -> Result<&mut Parameter> {
        self.group_mut(group)?.add_parameter(name, description, default)
    }

    /// Adds a parameter and immediately overwrites it from `object[name]`.
    ///
    /// With `required` set, an absent field is an error.
    pub fn add_parameter_from_json<T: ValueType>(
        &mut self,
        group: &str,
        name: &str,
        description: &str,
        default: T,
        object: &Value,
        required: bool,
    ) -> Result<&mut Parameter> {
        let parameter = self.add_parameter(group, name, description, default)?;
        if required {
            parameter.parse_required_value::<T>(object)?;
        } else {
            parameter.parse_value::<T>(object)?;
        }
        Ok(parameter)
    }

    pub fn has_parameter(&self, group: &str, name: &str) -> bool {
        self.group(group).is_ok_and(|g| g.has_parameter(name))
    }

    pub fn parameter(&self, group: &str, name: &str) -> Result<&Parameter> {
        self.group(group)?.parameter(name)
    }

    pub fn parameter_mut(&mut self, group: &str, name: &str) -> Result<&mut Parameter> {
        self.group_mut(group)?.parameter_mut(name)
    }

    /// Copy of a parameter's value; panics if it holds another type
    pub fn value<T: ValueType>(&self, group: &str, name: &str) -> Result<T> {
        Ok(self.parameter(group, name)?.get::<T>().clone())
    }

    pub fn remove_parameter(&mut self, group: &str, name: &str) -> Result<Parameter> {
        self.group_mut(group)?.remove_parameter(name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &ParameterGroup> {
        self.groups.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DVec4, IVec2, IVec3, IVec4, UVec2, UVec3, UVec4, Vec2, Vec3};
    use serde_json::json;

    fn manager() -> ParameterManager {
        let mut params = ParameterManager::new(Arc::new(NameRegistry::new()));
        params.add_group("Solver", "solver settings").unwrap();
        params
    }

    fn round_trip<T: ValueType + PartialEq + std::fmt::Debug>(default: T, value: T) {
        let mut p = Parameter::new("G", "P", "", default);
        p.set(value.clone());
        assert_eq!(p.get::<T>(), &value);
    }

    #[test]
    fn test_set_get_every_type() {
        round_trip(false, true);
        round_trip(0i32, i32::MIN);
        round_trip(0i32, i32::MAX);
        round_trip(0u32, u32::MAX);
        round_trip(0.0f32, f32::MAX);
        round_trip(0.0f32, f32::MIN_POSITIVE);
        round_trip(0.0f64, -f64::MAX);
        round_trip(IVec2::ZERO, IVec2::new(i32::MIN, i32::MAX));
        round_trip(UVec2::ZERO, UVec2::new(0, u32::MAX));
        round_trip(Vec2::ZERO, Vec2::new(-1.5, 2.5));
        round_trip(IVec3::ZERO, IVec3::new(1, -2, 3));
        round_trip(UVec3::ZERO, UVec3::new(1, 2, 3));
        round_trip(Vec3::ZERO, Vec3::new(0.1, 0.2, 0.3));
        round_trip(IVec4::ZERO, IVec4::new(1, 2, 3, i32::MIN));
        round_trip(UVec4::ZERO, UVec4::new(4, 3, 2, 1));
        round_trip(DVec4::ZERO, DVec4::new(1e300, -1e-300, 0.0, 1.0));
        round_trip(String::new(), "Ω unicode".to_string());
    }

    #[test]
    #[should_panic(expected = "holds f32, accessed as f64")]
    fn test_wrong_type_panics() {
        let p = Parameter::new("G", "P", "", 1.0f32);
        p.get::<f64>();
    }

    #[test]
    fn test_try_get() {
        let p = Parameter::new("G", "P", "", 7u32);
        assert_eq!(p.try_get::<u32>(), Some(&7));
        assert_eq!(p.try_get::<i32>(), None);
    }

    #[test]
    fn test_group_must_exist() {
        let mut params = manager();
        assert!(matches!(
            params.add_parameter("Missing", "A", "", 1.0f32),
            Err(Error::GroupNotFound(_))
        ));
        params.add_parameter("Solver", "A", "", 1.0f32).unwrap();
        assert!(params.has_parameter("Solver", "A"));
        assert!(!params.has_parameter("Solver", "B"));
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut params = manager();
        assert!(matches!(
            params.add_group("Solver", ""),
            Err(Error::DuplicateGroup(_))
        ));
        params.add_parameter("Solver", "A", "", 1i32).unwrap();
        assert!(matches!(
            params.add_parameter("Solver", "A", "", 2i32),
            Err(Error::DuplicateParameter { .. })
        ));
        // the first value survives
        assert_eq!(params.value::<i32>("Solver", "A").unwrap(), 1);
    }

    #[test]
    fn test_colliding_names_rejected() {
        let mut params = manager();
        params.add_parameter("Solver", "Ez", "", 1i32).unwrap();
        assert!(matches!(
            params.add_parameter("Solver", "FY", "", 1i32),
            Err(Error::HashCollision { .. })
        ));
        assert!(!params.has_parameter("Solver", "FY"));
    }

    #[test]
    fn test_parse_from_json() {
        let mut params = manager();
        let config = json!({ "Gravity": [0.0, -9.8, 0.0], "Steps": 5 });

        let gravity = params
            .add_parameter_from_json("Solver", "Gravity", "", Vec3::ZERO, &config, true)
            .unwrap();
        assert_eq!(gravity.get::<Vec3>(), &Vec3::new(0.0, -9.8, 0.0));

        // optional and absent keeps the default
        params
            .add_parameter_from_json("Solver", "Cfl", "", 0.4f32, &config, false)
            .unwrap();
        assert_eq!(params.value::<f32>("Solver", "Cfl").unwrap(), 0.4);

        assert!(matches!(
            params.add_parameter_from_json("Solver", "Density", "", 1.0f32, &config, true),
            Err(Error::MissingRequiredField(ref f)) if f == "Density"
        ));
    }

    #[test]
    fn test_parse_malformed_field() {
        let mut p = Parameter::new("G", "Steps", "", 1u32);
        let result = p.parse_value::<u32>(&json!({ "Steps": "many" }));
        assert!(matches!(result, Err(Error::InvalidConfigValue { .. })));
        assert_eq!(p.get::<u32>(), &1);
    }

    #[test]
    fn test_remove_parameter_and_group() {
        let mut params = manager();
        params.add_parameter("Solver", "A", "", true).unwrap();
        let removed = params.remove_parameter("Solver", "A").unwrap();
        assert_eq!(removed.name(), "A");
        assert!(params.remove_parameter("Solver", "A").is_err());

        params.remove_group("Solver").unwrap();
        assert!(!params.has_group("Solver"));
        // the name stays bound to its hash, so the group can come back
        params.add_group("Solver", "").unwrap();
    }
}
