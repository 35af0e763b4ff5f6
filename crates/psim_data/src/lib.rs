//! Named runtime data: typed parameters grouped by name, and columnar
//! per-particle properties grouped by particle set.
//!
//! Every group, parameter and property name is checked against a shared
//! [`NameRegistry`](psim_core::NameRegistry) before it is accepted.

pub mod column;
pub mod parameter;
pub mod property;
pub mod value;

pub use column::{Column, ColumnElement, Property};
pub use parameter::{Parameter, ParameterGroup, ParameterManager};
pub use property::{PropertyGroup, PropertyManager};
pub use value::{TypedValue, ValueType};
