//! One typed column of a property group.

use std::fmt::Debug;
use std::ops::{Index, IndexMut};

use bytemuck::Pod;
use glam::{Quat, Vec2, Vec3, Vec4};

/// Dense per-row values of one attribute.
///
/// The row count is owned by the enclosing [`PropertyGroup`](crate::PropertyGroup),
/// so length-changing operations are crate-private.
#[derive(Debug, Clone, PartialEq)]
pub struct Property<T> {
    data: Vec<T>,
    default: Option<T>,
}

impl<T: ColumnElement> Property<T> {
    pub fn new(default: Option<T>) -> Self {
        Self {
            data: Vec::new(),
            default,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn default_value(&self) -> Option<T> {
        self.default
    }

    /// New rows get the default value, or all-zero bytes without one
    pub(crate) fn resize(&mut self, len: usize) {
        let fill = self.default.unwrap_or_else(T::zeroed);
        self.data.resize(len, fill);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    /// Removes row `index`, shifting later rows down; panics when out of range
    pub(crate) fn remove_at(&mut self, index: usize) {
        self.data.remove(index);
    }

    pub(crate) fn extend_from_slice(&mut self, values: &[T]) {
        self.data.extend_from_slice(values);
    }

    /// Overwrites every row with `value`
    pub fn assign(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn element_size(&self) -> usize {
        size_of::<T>()
    }
}

impl<T> Index<usize> for Property<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for Property<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

/// A column of any supported element type
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    I8(Property<i8>),
    U16(Property<u16>),
    U32(Property<u32>),
    I32(Property<i32>),
    F32(Property<f32>),
    F64(Property<f64>),
    Vec2(Property<Vec2>),
    Vec3(Property<Vec3>),
    Vec4(Property<Vec4>),
    Quat(Property<Quat>),
}

macro_rules! each_column {
    ($column:expr, $p:ident => $body:expr) => {
        match $column {
            Column::I8($p) => $body,
            Column::U16($p) => $body,
            Column::U32($p) => $body,
            Column::I32($p) => $body,
            Column::F32($p) => $body,
            Column::F64($p) => $body,
            Column::Vec2($p) => $body,
            Column::Vec3($p) => $body,
            Column::Vec4($p) => $body,
            Column::Quat($p) => $body,
        }
    };
}

impl Column {
    pub fn len(&self) -> usize {
        each_column!(self, p => p.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_size(&self) -> usize {
        each_column!(self, p => p.element_size())
    }

    pub fn as_bytes(&self) -> &[u8] {
        each_column!(self, p => p.as_bytes())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::I8(_) => i8::TYPE_NAME,
            Column::U16(_) => u16::TYPE_NAME,
            Column::U32(_) => u32::TYPE_NAME,
            Column::I32(_) => i32::TYPE_NAME,
            Column::F32(_) => f32::TYPE_NAME,
            Column::F64(_) => f64::TYPE_NAME,
            Column::Vec2(_) => Vec2::TYPE_NAME,
            Column::Vec3(_) => Vec3::TYPE_NAME,
            Column::Vec4(_) => Vec4::TYPE_NAME,
            Column::Quat(_) => Quat::TYPE_NAME,
        }
    }

    pub(crate) fn resize(&mut self, len: usize) {
        each_column!(self, p => p.resize(len))
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        each_column!(self, p => p.reserve(additional))
    }

    pub(crate) fn remove_at(&mut self, index: usize) {
        each_column!(self, p => p.remove_at(index))
    }
}

/// Element types a [`Column`] can hold
pub trait ColumnElement: Pod + Debug + Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    fn wrap(property: Property<Self>) -> Column;
    fn downcast(column: &Column) -> Option<&Property<Self>>;
    fn downcast_mut(column: &mut Column) -> Option<&mut Property<Self>>;
}

macro_rules! column_element {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ColumnElement for $ty {
            const TYPE_NAME: &'static str = $name;

            fn wrap(property: Property<Self>) -> Column {
                Column::$variant(property)
            }

            fn downcast(column: &Column) -> Option<&Property<Self>> {
                match column {
                    Column::$variant(p) => Some(p),
                    _ => None,
                }
            }

            fn downcast_mut(column: &mut Column) -> Option<&mut Property<Self>> {
                match column {
                    Column::$variant(p) => Some(p),
                    _ => None,
                }
            }
        }
    };
}

column_element!(i8, I8, "i8");
column_element!(u16, U16, "u16");
column_element!(u32, U32, "u32");
column_element!(i32, I32, "i32");
column_element!(f32, F32, "f32");
column_element!(f64, F64, "f64");
column_element!(Vec2, Vec2, "vec2");
column_element!(Vec3, Vec3, "vec3");
column_element!(Vec4, Vec4, "vec4");
column_element!(Quat, Quat, "quat");
