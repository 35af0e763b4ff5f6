use std::collections::HashMap;
use std::sync::Arc;

use psim_core::{Error, NameRegistry, Result, string_hash};
use tracing::debug;

use crate::column::{Column, ColumnElement, Property};
use crate::parameter::Parameter;
use crate::value::ValueType;

#[derive(Debug)]
struct NamedColumn {
    name: String,
    description: String,
    column: Column,
}

/// Columns sharing one row count, plus singleton "discrete" values.
///
/// Every column has exactly [`size`](Self::size) rows whenever the group is
/// observed from outside. Rows are addressed by position.
#[derive(Debug)]
pub struct PropertyGroup {
    name: String,
    description: String,
    registry: Arc<NameRegistry>,
    columns: Vec<NamedColumn>,
    index: HashMap<u32, usize>,
    discrete: HashMap<u32, Parameter>,
    size: usize,
}

impl PropertyGroup {
    fn new(name: &str, description: &str, registry: Arc<NameRegistry>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            registry,
            columns: Vec::new(),
            index: HashMap::new(),
            discrete: HashMap::new(),
            size: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn num_properties(&self) -> usize {
        self.columns.len()
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Adds a column sized to the current row count
    pub fn add_property<T: ColumnElement>(
        &mut self,
        name: &str,
        description: &str,
        default: Option<T>,
    ) -> Result<&mut Property<T>> {
        let hash = self.registry.require(name)?;
        if self.index.contains_key(&hash) {
            return Err(Error::DuplicateProperty {
                group: self.name.clone(),
                name: name.to_string(),
            });
        }
        let mut property = Property::new(default);
        property.resize(self.size);
        self.index.insert(hash, self.columns.len());
        self.columns.push(NamedColumn {
            name: name.to_string(),
            description: description.to_string(),
            column: T::wrap(property),
        });
        let slot = self.columns.len() - 1;
        self.typed_mut(slot)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    pub fn property_description(&self, name: &str) -> Result<&str> {
        let slot = self.slot(name).ok_or_else(|| self.not_found(name))?;
        Ok(&self.columns[slot].description)
    }

    pub fn remove_property(&mut self, name: &str) -> Result<()> {
        let slot = self.slot(name).ok_or_else(|| self.not_found(name))?;
        self.columns.remove(slot);
        self.index = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (string_hash(&c.name), i))
            .collect();
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        let slot = self.slot(name).ok_or_else(|| self.not_found(name))?;
        Ok(&self.columns[slot].column)
    }

    pub fn property<T: ColumnElement>(&self, name: &str) -> Result<&Property<T>> {
        let slot = self.slot(name).ok_or_else(|| self.not_found(name))?;
        let column = &self.columns[slot].column;
        T::downcast(column).ok_or_else(|| self.mismatch::<T>(slot))
    }

    pub fn property_mut<T: ColumnElement>(&mut self, name: &str) -> Result<&mut Property<T>> {
        let slot = self.slot(name).ok_or_else(|| self.not_found(name))?;
        self.typed_mut(slot)
    }

    /// Mutable access to two distinct columns at once. Panics if `a == b`.
    pub fn property_pair_mut<A: ColumnElement, B: ColumnElement>(
        &mut self,
        a: &str,
        b: &str,
    ) -> Result<(&mut Property<A>, &mut Property<B>)> {
        let ia = self.slot(a).ok_or_else(|| self.not_found(a))?;
        let ib = self.slot(b).ok_or_else(|| self.not_found(b))?;
        assert_ne!(ia, ib, "property `{a}` borrowed twice");
        self.check_type::<A>(ia)?;
        self.check_type::<B>(ib)?;

        let (first, second) = if ia < ib {
            let (lo, hi) = self.columns.split_at_mut(ib);
            (&mut lo[ia], &mut hi[0])
        } else {
            let (lo, hi) = self.columns.split_at_mut(ia);
            (&mut hi[0], &mut lo[ib])
        };
        match (
            A::downcast_mut(&mut first.column),
            B::downcast_mut(&mut second.column),
        ) {
            (Some(pa), Some(pb)) => Ok((pa, pb)),
            _ => unreachable!("column types checked above"),
        }
    }

    /// Sets the row count of every column
    pub fn resize(&mut self, size: usize) {
        for c in &mut self.columns {
            c.column.resize(size);
        }
        self.size = size;
    }

    pub fn reserve(&mut self, additional: usize) {
        for c in &mut self.columns {
            c.column.reserve(additional);
        }
    }

    /// Removes row `index` from every column; a group without columns is left untouched
    pub fn remove_at(&mut self, index: usize) {
        if self.columns.is_empty() {
            return;
        }
        for c in &mut self.columns {
            c.column.remove_at(index);
        }
        self.size = self.columns[0].column.len();
    }

    pub fn add_discrete_property<T: ValueType>(
        &mut self,
        name: &str,
        description: &str,
        default: T,
    ) -> Result<&mut Parameter> {
        let hash = self.registry.require(name)?;
        if self.discrete.contains_key(&hash) {
            return Err(Error::DuplicateProperty {
                group: self.name.clone(),
                name: name.to_string(),
            });
        }
        let value = Parameter::new(self.name.as_str(), name, description, default);
        Ok(self.discrete.entry(hash).or_insert(value))
    }

    pub fn has_discrete_property(&self, name: &str) -> bool {
        self.discrete_property(name).is_ok()
    }

    pub fn discrete_property(&self, name: &str) -> Result<&Parameter> {
        self.discrete
            .get(&string_hash(name))
            .filter(|p| p.name() == name)
            .ok_or_else(|| self.not_found(name))
    }

    pub fn discrete_property_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        match self.discrete.get_mut(&string_hash(name)) {
            Some(p) if p.name() == name => Ok(p),
            _ => Err(Error::PropertyNotFound {
                group: self.name.clone(),
                name: name.to_string(),
            }),
        }
    }

    fn slot(&self, name: &str) -> Option<usize> {
        self.index
            .get(&string_hash(name))
            .copied()
            .filter(|&i| self.columns[i].name == name)
    }

    fn typed_mut<T: ColumnElement>(&mut self, slot: usize) -> Result<&mut Property<T>> {
        self.check_type::<T>(slot)?;
        match T::downcast_mut(&mut self.columns[slot].column) {
            Some(p) => Ok(p),
            None => unreachable!("column type checked above"),
        }
    }

    fn check_type<T: ColumnElement>(&self, slot: usize) -> Result<()> {
        match T::downcast(&self.columns[slot].column) {
            Some(_) => Ok(()),
            None => Err(self.mismatch::<T>(slot)),
        }
    }

    fn mismatch<T: ColumnElement>(&self, slot: usize) -> Error {
        let c = &self.columns[slot];
        Error::ColumnTypeMismatch {
            group: self.name.clone(),
            name: c.name.clone(),
            expected: T::TYPE_NAME,
            found: c.column.type_name(),
        }
    }

    fn not_found(&self, name: &str) -> Error {
        Error::PropertyNotFound {
            group: self.name.clone(),
            name: name.to_string(),
        }
    }
}

/// Named collection of property groups
#[derive(Debug)]
pub struct PropertyManager {
    registry: Arc<NameRegistry>,
    groups: HashMap<u32, PropertyGroup>,
}

impl PropertyManager {
    pub fn new(registry: Arc<NameRegistry>) -> Self {
        Self {
            registry,
            groups: HashMap::new(),
        }
    }

    pub fn add_group(&mut self, name: &str, description: &str) -> Result<&mut PropertyGroup> {
        let hash = self.registry.require(name)?;
        if self.groups.contains_key(&hash) {
            return Err(Error::DuplicateGroup(name.to_string()));
        }
        debug!(group = name, "added property group");
        let group = PropertyGroup::new(name, description, Arc::clone(&self.registry));
        Ok(self.groups.entry(hash).or_insert(group))
    }

    pub fn remove_group(&mut self, name: &str) -> Result<PropertyGroup> {
        self.group(name)?;
        self.groups
            .remove(&string_hash(name))
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.group(name).is_ok()
    }

    pub fn group(&self, name: &str) -> Result<&PropertyGroup> {
        self.groups
            .get(&string_hash(name))
            .filter(|g| g.name == name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    pub fn group_mut(&mut self, name: &str) -> Result<&mut PropertyGroup> {
        match self.groups.get_mut(&string_hash(name)) {
            Some(g) if g.name == name => Ok(g),
            _ => Err(Error::GroupNotFound(name.to_string())),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &PropertyGroup> {
        self.groups.values()
    }

    pub fn has_property(&self, group: &str, name: &str) -> bool {
        self.group(group).is_ok_and(|g| g.has_property(name))
    }

    pub fn add_property<T: ColumnElement>(
        &mut self,
        group: &str,
        name: &str,
        description: &str,
        default: Option<T>,
    ) -> Result<&mut Property<T>> {
        self.group_mut(group)?.add_property(name, description, default)
    }

    pub fn remove_property(&mut self, group: &str, name: &str) -> Result<()> {
        self.group_mut(group)?.remove_property(name)
    }

    pub fn property<T: ColumnElement>(&self, group: &str, name: &str) -> Result<&Property<T>> {
        self.group(group)?.property(name)
    }

    pub fn property_mut<T: ColumnElement>(
        &mut self,
        group: &str,
        name: &str,
    ) -> Result<&mut Property<T>> {
        self.group_mut(group)?.property_mut(name)
    }

    pub fn resize_group(&mut self, group: &str, size: usize) -> Result<()> {
        self.group_mut(group)?.resize(size);
        Ok(())
    }

    pub fn reserve_group(&mut self, group: &str, additional: usize) -> Result<()> {
        self.group_mut(group)?.reserve(additional);
        Ok(())
    }

    pub fn remove_group_element_at(&mut self, group: &str, index: usize) -> Result<()> {
        self.group_mut(group)?.remove_at(index);
        Ok(())
    }

    pub fn group_data_size(&self, group: &str) -> Result<usize> {
        Ok(self.group(group)?.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn manager() -> PropertyManager {
        let mut props = PropertyManager::new(Arc::new(NameRegistry::new()));
        props.add_group("Particles", "fluid particles").unwrap();
        props
    }

    #[test]
    fn test_add_has_remove_property() {
        let mut props = manager();
        props
            .add_property::<Vec3>("Particles", "Position", "", None)
            .unwrap();
        assert!(props.has_property("Particles", "Position"));
        props.remove_property("Particles", "Position").unwrap();
        assert!(!props.has_property("Particles", "Position"));
        assert!(matches!(
            props.remove_property("Particles", "Position"),
            Err(Error::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn test_group_must_exist() {
        let mut props = manager();
        assert!(matches!(
            props.add_property::<f32>("Ghosts", "Mass", "", None),
            Err(Error::GroupNotFound(_))
        ));
        assert!(matches!(
            props.add_group("Particles", ""),
            Err(Error::DuplicateGroup(_))
        ));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let mut props = manager();
        props.add_property::<f32>("Particles", "Mass", "", None).unwrap();
        assert!(matches!(
            props.add_property::<f64>("Particles", "Mass", "", None),
            Err(Error::DuplicateProperty { .. })
        ));
    }

    #[test]
    fn test_resize_keeps_columns_in_lockstep() {
        let mut props = manager();
        props.add_property::<Vec3>("Particles", "Position", "", None).unwrap();
        props.add_property::<f32>("Particles", "Mass", "", Some(2.0)).unwrap();
        props.add_property::<i8>("Particles", "Activity", "", None).unwrap();

        for n in [0, 100_000, 0] {
            props.resize_group("Particles", n).unwrap();
            let group = props.group("Particles").unwrap();
            assert_eq!(group.size(), n);
            for name in ["Position", "Mass", "Activity"] {
                assert_eq!(group.column(name).unwrap().len(), n);
            }
        }

        props.resize_group("Particles", 3).unwrap();
        assert_eq!(props.property::<f32>("Particles", "Mass").unwrap().data(), &[2.0; 3]);
    }

    #[test]
    fn test_late_column_is_sized() {
        let mut props = manager();
        props.add_property::<f32>("Particles", "Mass", "", None).unwrap();
        props.resize_group("Particles", 5).unwrap();
        let quat = props
            .add_property::<Quat>("Particles", "Orientation", "", Some(Quat::IDENTITY))
            .unwrap();
        assert_eq!(quat.len(), 5);
        assert_eq!(quat[4], Quat::IDENTITY);
    }

    #[test]
    fn test_remove_at_shifts_rows() {
        let mut props = manager();
        props.add_property::<i32>("Particles", "Id", "", None).unwrap();
        props.add_property::<f32>("Particles", "Mass", "", None).unwrap();
        props.resize_group("Particles", 4).unwrap();
        {
            let group = props.group_mut("Particles").unwrap();
            let (ids, mass) = group.property_pair_mut::<i32, f32>("Id", "Mass").unwrap();
            for i in 0..4 {
                ids[i] = i as i32;
                mass[i] = i as f32 * 10.0;
            }
        }

        props.remove_group_element_at("Particles", 1).unwrap();
        assert_eq!(props.group_data_size("Particles").unwrap(), 3);
        assert_eq!(props.property::<i32>("Particles", "Id").unwrap().data(), &[0, 2, 3]);
        assert_eq!(
            props.property::<f32>("Particles", "Mass").unwrap().data(),
            &[0.0, 20.0, 30.0]
        );
    }

    #[test]
    fn test_remove_at_without_columns() {
        let mut props = manager();
        props.resize_group("Particles", 3).unwrap();
        props.remove_group_element_at("Particles", 0).unwrap();
        assert_eq!(props.group_data_size("Particles").unwrap(), 3);
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let mut props = manager();
        props.add_property::<Vec3>("Particles", "Velocity", "", None).unwrap();
        assert!(matches!(
            props.property::<f32>("Particles", "Velocity"),
            Err(Error::ColumnTypeMismatch { expected: "f32", found: "vec3", .. })
        ));
    }

    #[test]
    fn test_pair_in_either_order() {
        let mut props = manager();
        props.add_property::<f32>("Particles", "A", "", Some(1.0)).unwrap();
        props.add_property::<f32>("Particles", "B", "", Some(2.0)).unwrap();
        props.resize_group("Particles", 1).unwrap();

        let group = props.group_mut("Particles").unwrap();
        let (b, a) = group.property_pair_mut::<f32, f32>("B", "A").unwrap();
        std::mem::swap(&mut a[0], &mut b[0]);
        assert_eq!(group.property::<f32>("A").unwrap()[0], 2.0);
        assert_eq!(group.property::<f32>("B").unwrap()[0], 1.0);
    }

    #[test]
    fn test_removing_column_keeps_others_addressable() {
        let mut props = manager();
        for name in ["A", "B", "C"] {
            props.add_property::<u32>("Particles", name, "", None).unwrap();
        }
        props.remove_property("Particles", "A").unwrap();
        assert!(props.property::<u32>("Particles", "B").is_ok());
        assert!(props.property::<u32>("Particles", "C").is_ok());
        let names: Vec<_> = props.group("Particles").unwrap().property_names().collect();
        assert_eq!(names, ["B", "C"]);
    }

    #[test]
    fn test_discrete_property() {
        let mut props = manager();
        let group = props.group_mut("Particles").unwrap();
        group.add_discrete_property("Radius", "", 0.02f32).unwrap();
        group.discrete_property_mut("Radius").unwrap().set(0.05f32);
        assert_eq!(group.discrete_property("Radius").unwrap().get::<f32>(), &0.05);
        assert!(group.add_discrete_property("Radius", "", 1.0f32).is_err());
        assert!(!group.has_discrete_property("Other"));
    }

    #[test]
    fn test_remove_group() {
        let mut props = manager();
        let removed = props.remove_group("Particles").unwrap();
        assert_eq!(removed.name(), "Particles");
        assert!(!props.has_group("Particles"));
        assert!(props.remove_group("Particles").is_err());
    }
}
