// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values carried by value nodes and value links.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Data type of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Single precision float
    Float,
    /// Double precision float
    Double,
    /// String value
    String,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// 4D vector
    Vec4,
    /// Actor reference (world object identity)
    Actor,
}

impl ValueType {
    /// Display name for this type
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::Vec2 => "Vec2",
            Self::Vec3 => "Vec3",
            Self::Vec4 => "Vec4",
            Self::Actor => "Actor",
        }
    }

    /// Default value for this type
    pub fn default_value(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::String => Value::String(String::new()),
            Self::Vec2 => Value::Vec2([0.0; 2]),
            Self::Vec3 => Value::Vec3([0.0; 3]),
            Self::Vec4 => Value::Vec4([0.0; 4]),
            Self::Actor => Value::Actor(None),
        }
    }

    /// Check if a value of this type can be read as another type
    pub fn can_convert_to(&self, other: &ValueType) -> bool {
        if self == other {
            return true;
        }

        matches!(
            (self, other),
            (Self::Bool | Self::Int | Self::Float | Self::Double, Self::Bool | Self::Int | Self::Float | Self::Double)
                | (_, Self::String)
        )
    }
}

/// A typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Double
    Double(f64),
    /// String
    String(String),
    /// 2D vector
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// 4D vector
    Vec4([f32; 4]),
    /// Actor reference
    Actor(Option<Uuid>),
}

impl Value {
    /// Get the type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Vec2(_) => ValueType::Vec2,
            Self::Vec3(_) => ValueType::Vec3,
            Self::Vec4(_) => ValueType::Vec4,
            Self::Actor(_) => ValueType::Actor,
        }
    }

    /// Read as a boolean. Numbers are true when non-zero.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(v) => *v,
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::Double(v) => *v != 0.0,
            Self::String(v) => v.eq_ignore_ascii_case("true") || v == "1",
            Self::Actor(v) => v.is_some(),
            Self::Vec2(_) | Self::Vec3(_) | Self::Vec4(_) => false,
        }
    }

    /// Read as an integer
    pub fn as_int(&self) -> i32 {
        match self {
            Self::Bool(v) => i32::from(*v),
            Self::Int(v) => *v,
            Self::Float(v) => *v as i32,
            Self::Double(v) => *v as i32,
            Self::String(v) => v.trim().parse().unwrap_or_default(),
            _ => 0,
        }
    }

    /// Read as a float
    pub fn as_float(&self) -> f32 {
        match self {
            Self::Bool(v) => f32::from(u8::from(*v)),
            Self::Int(v) => *v as f32,
            Self::Float(v) => *v,
            Self::Double(v) => *v as f32,
            Self::String(v) => v.trim().parse().unwrap_or_default(),
            _ => 0.0,
        }
    }

    /// Read as a double
    pub fn as_double(&self) -> f64 {
        match self {
            Self::Double(v) => *v,
            Self::String(v) => v.trim().parse().unwrap_or_default(),
            other => f64::from(other.as_float()),
        }
    }

    /// Read as an actor identity
    pub fn as_actor(&self) -> Option<Uuid> {
        match self {
            Self::Actor(v) => *v,
            Self::String(v) => Uuid::parse_str(v.trim()).ok(),
            _ => None,
        }
    }

    /// Convert this value to another type, if the conversion is supported
    pub fn convert(&self, target: ValueType) -> Option<Value> {
        if self.value_type() == target {
            return Some(self.clone());
        }
        if !self.value_type().can_convert_to(&target) {
            return None;
        }

        Some(match target {
            ValueType::Bool => Value::Bool(self.as_bool()),
            ValueType::Int => Value::Int(self.as_int()),
            ValueType::Float => Value::Float(self.as_float()),
            ValueType::Double => Value::Double(self.as_double()),
            ValueType::String => Value::String(self.to_string()),
            _ => return None,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Vec2([x, y]) => write!(f, "{x} {y}"),
            Self::Vec3([x, y, z]) => write!(f, "{x} {y} {z}"),
            Self::Vec4([x, y, z, w]) => write!(f, "{x} {y} {z} {w}"),
            Self::Actor(Some(id)) => write!(f, "{id}"),
            Self::Actor(None) => Ok(()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}
