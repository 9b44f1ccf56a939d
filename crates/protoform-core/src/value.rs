//! Dynamic field values moved between documents, records and live instances.

use crate::math::{Color, Quat, Vec2, Vec3, Vec4};
use crate::reflect::{EnumInfo, Reflect, TypeKey};

/// A decoded or reflected field value.
///
/// Collections of any kind are carried as [`Value::List`]; the declared
/// field type decides whether they become a `Vec` or a set on assignment.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Color(Color),
    Quat(Quat),
    Enum(EnumValue),
    Type(TypeKey),
    Reference(RootRef),
    List(Vec<Value>),
    Record(Box<dyn Reflect>),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "bool".into(),
            Value::I8(_) => "i8".into(),
            Value::I16(_) => "i16".into(),
            Value::I32(_) => "i32".into(),
            Value::I64(_) => "i64".into(),
            Value::U8(_) => "u8".into(),
            Value::U16(_) => "u16".into(),
            Value::U32(_) => "u32".into(),
            Value::U64(_) => "u64".into(),
            Value::F32(_) => "f32".into(),
            Value::F64(_) => "f64".into(),
            Value::String(_) => "string".into(),
            Value::Vec2(_) => "Vec2".into(),
            Value::Vec3(_) => "Vec3".into(),
            Value::Vec4(_) => "Vec4".into(),
            Value::Color(_) => "Color".into(),
            Value::Quat(_) => "Quat".into(),
            Value::Enum(e) => e.info.name.into(),
            Value::Type(_) => "type".into(),
            Value::Reference(r) => format!("reference to {}", r.target.full_name()),
            Value::List(_) => "collection".into(),
            Value::Record(r) => r.type_key().full_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One variant of a described enum.
#[derive(Debug, Clone, Copy)]
pub struct EnumValue {
    pub info: &'static EnumInfo,
    pub index: usize,
}

impl EnumValue {
    pub fn name(&self) -> &'static str {
        self.info.variants[self.index]
    }
}

/// A reference that was resolved against a root pool: the identifier plus
/// the concrete type of the instance it named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRef {
    pub identifier: String,
    pub target: TypeKey,
}
