//! Runtime field access for loadable types.
//!
//! Rust has no runtime reflection, so loadable types describe themselves:
//! [`Described`] carries static metadata (name, namespace, fields, bases),
//! [`Reflect`] gives object-safe get/set by field name, and [`FieldValue`]
//! converts each Rust field type to and from the dynamic [`Value`].
//!
//! The [`describe!`](crate::describe) and
//! [`describe_enum!`](crate::describe_enum) macros generate all three:
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, Default)]
//! pub struct Item {
//!     pub id: String,
//!     pub rate: f32,
//!     pub tags: Vec<String>,
//!     pub upgrade: Option<Ref<Item>>,
//! }
//!
//! protoform_core::describe! {
//!     Item as "Item" in "game.items", root = id {
//!         rate: f32,
//!         tags: Vec<String>,
//!         upgrade: Option<Ref<Item>>,
//!     }
//! }
//! ```

use crate::math::{Color, Quat, Vec2, Vec3, Vec4};
use crate::value::{EnumValue, RootRef, Value};
use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

// ---------------------------------------------------------------------------
// Type identity
// ---------------------------------------------------------------------------

/// Identity of a described type. Compared by Rust `TypeId`; the names are
/// what documents use.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    pub id: TypeId,
    pub name: &'static str,
    pub namespace: &'static str,
}

impl TypeKey {
    pub fn of<T: Described>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::NAME,
            namespace: T::NAMESPACE,
        }
    }

    /// `namespace.Name`, or just `Name` for the empty namespace.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.to_string()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Static description of a `describe_enum!` enum.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumInfo {
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

/// How a collection field stores its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    List,
    Set,
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Vec2,
    Vec3,
    Vec4,
    Color,
    Quat,
    Enum(&'static EnumInfo),
    /// A handle to a described type, written as its name.
    TypeRef,
    /// A root instance referenced by identifier.
    Reference(TypeKey),
    Collection(CollectionKind, Box<FieldType>),
    /// A nested compound written inline; may be overridden polymorphically.
    Compound(TypeKey),
}

impl FieldType {
    pub fn is_collection(&self) -> bool {
        matches!(self, FieldType::Collection(..))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Reference(_))
    }

    /// Element type of a collection.
    pub fn element(&self) -> Option<&FieldType> {
        match self {
            FieldType::Collection(_, element) => Some(element),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Enum(info) => f.write_str(info.name),
            FieldType::TypeRef => f.write_str("type"),
            FieldType::Reference(key) => write!(f, "reference to {}", key.full_name()),
            FieldType::Collection(CollectionKind::List, element) => write!(f, "list of {element}"),
            FieldType::Collection(CollectionKind::Set, element) => write!(f, "set of {element}"),
            FieldType::Compound(key) => f.write_str(&key.full_name()),
            other => write!(f, "{other:?}"),
        }
    }
}

/// One field of a described type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
    /// `Option<T>` fields accept the null token and may stay unset.
    pub nullable: bool,
    pub serialized: bool,
    /// Write the null token instead of omitting an unset field.
    pub always_serialized: bool,
}

impl FieldDescriptor {
    /// Markers: `non_serialized`, `always`. Unknown markers are ignored.
    pub fn new<F: FieldValue>(name: &'static str, markers: &[&str]) -> Self {
        Self {
            name,
            ty: F::field_type(),
            nullable: F::nullable(),
            serialized: !markers.contains(&"non_serialized"),
            always_serialized: markers.contains(&"always"),
        }
    }
}

/// Errors from reflected field access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field {0}")]
    Unknown(String),
    #[error("field {field} cannot hold a value of kind {found}")]
    Mismatch { field: String, found: String },
}

// ---------------------------------------------------------------------------
// Reflect / Described
// ---------------------------------------------------------------------------

/// Object-safe access to the fields of a live instance.
pub trait Reflect: Any + fmt::Debug {
    fn type_key(&self) -> TypeKey;

    /// Current value of a field, `None` if the field does not exist.
    fn get_field(&self, name: &str) -> Option<Value>;

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError>;

    fn clone_reflect(&self) -> Box<dyn Reflect>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Identifier of a root instance. `None` for nested compounds.
    fn identifier(&self) -> Option<&str> {
        None
    }

    fn set_identifier(&mut self, identifier: &str) {
        let _ = identifier;
    }
}

impl<'a> dyn Reflect + 'a {
    pub fn is<T: Reflect>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Reflect>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Reflect>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl Clone for Box<dyn Reflect> {
    fn clone(&self) -> Self {
        self.clone_reflect()
    }
}

/// Static metadata of a loadable type. `Default` is the bare-instance
/// factory used before any field is applied.
pub trait Described: Reflect + Default + Clone {
    const NAME: &'static str;
    const NAMESPACE: &'static str;

    fn fields() -> Vec<FieldDescriptor>;

    /// Types this one may stand in for in polymorphic fields and references.
    fn bases() -> Vec<TypeKey> {
        Vec::new()
    }

    /// Roots carry an identifier and can be referenced.
    fn is_root() -> bool {
        false
    }

    fn key() -> TypeKey {
        TypeKey::of::<Self>()
    }
}

/// Metadata of a `describe_enum!` enum.
pub trait DescribedEnum: Sized + Copy + 'static {
    fn info() -> &'static EnumInfo;
    fn variant_name(&self) -> &'static str;
    fn from_variant_name(name: &str) -> Option<Self>;
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// Conversion between a Rust field type and [`Value`].
pub trait FieldValue: Sized {
    fn field_type() -> FieldType;

    fn nullable() -> bool {
        false
    }

    fn to_value(&self) -> Value;

    /// Returns the rejected value on mismatch.
    fn from_value(value: Value) -> Result<Self, Value>;
}

macro_rules! scalar_field_value {
    ($($rust:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldValue for $rust {
                fn field_type() -> FieldType {
                    FieldType::$variant
                }

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> Result<Self, Value> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

scalar_field_value! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Color => Color,
    Quat => Quat,
}

impl FieldValue for TypeKey {
    fn field_type() -> FieldType {
        FieldType::TypeRef
    }

    fn to_value(&self) -> Value {
        Value::Type(*self)
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Type(key) => Ok(key),
            other => Err(other),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn collect_items<T: FieldValue, C: FromIterator<T>>(items: Vec<Value>) -> Result<C, Value> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(T::from_value(item)?);
    }
    Ok(out.into_iter().collect())
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::Collection(CollectionKind::List, Box::new(T::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::List(items) => collect_items(items),
            other => Err(other),
        }
    }
}

impl<T: FieldValue + Eq + Hash> FieldValue for HashSet<T> {
    fn field_type() -> FieldType {
        FieldType::Collection(CollectionKind::Set, Box::new(T::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::List(items) => collect_items(items),
            other => Err(other),
        }
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn field_type() -> FieldType {
        FieldType::Collection(CollectionKind::Set, Box::new(T::field_type()))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::List(items) => collect_items(items),
            other => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Ref<T>: reference to a root by identifier
// ---------------------------------------------------------------------------

/// A reference to a root instance of type `T` (or a type declaring `T` as a
/// base). Holds only the identifier; look the instance up through
/// [`RootPool::resolve`](crate::pool::RootPool::resolve).
pub struct Ref<T> {
    identifier: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            _marker: PhantomData,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self::new(self.identifier.clone())
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({})", self.identifier)
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl<T> PartialOrd for Ref<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ref<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.identifier.cmp(&other.identifier)
    }
}

impl<T: Described> FieldValue for Ref<T> {
    fn field_type() -> FieldType {
        FieldType::Reference(TypeKey::of::<T>())
    }

    fn to_value(&self) -> Value {
        Value::Reference(RootRef {
            identifier: self.identifier.clone(),
            target: TypeKey::of::<T>(),
        })
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Reference(r) => Ok(Ref::new(r.identifier)),
            other => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Poly<T>: polymorphic nested compound
// ---------------------------------------------------------------------------

/// A nested compound declared as `T` that may hold any type declaring `T`
/// among its bases.
pub struct Poly<T> {
    inner: Box<dyn Reflect>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Poly<T> {
    pub fn new<U: Described>(value: U) -> Self {
        Self {
            inner: Box::new(value),
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> &dyn Reflect {
        self.inner.as_ref()
    }

    pub fn type_key(&self) -> TypeKey {
        self.inner.type_key()
    }

    pub fn downcast_ref<U: Reflect>(&self) -> Option<&U> {
        self.inner.downcast_ref::<U>()
    }
}

impl<T> Clone for Poly<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_reflect(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Poly<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Poly").field(&self.inner).finish()
    }
}

impl<T: Described> FieldValue for Poly<T> {
    fn field_type() -> FieldType {
        FieldType::Compound(TypeKey::of::<T>())
    }

    fn to_value(&self) -> Value {
        Value::Record(self.inner.clone_reflect())
    }

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Record(inner) => Ok(Self {
                inner,
                _marker: PhantomData,
            }),
            other => Err(other),
        }
    }
}

/// `to_value` for enums; the macro routes through here.
pub fn enum_to_value<E: DescribedEnum>(value: &E) -> Value {
    let info = E::info();
    let name = value.variant_name();
    let index = info.variants.iter().position(|v| *v == name).unwrap_or(0);
    Value::Enum(EnumValue { info, index })
}

/// `from_value` for enums; the macro routes through here.
pub fn enum_from_value<E: DescribedEnum>(value: Value) -> Result<E, Value> {
    match value {
        Value::Enum(e) if e.info == E::info() => match E::from_variant_name(e.name()) {
            Some(v) => Ok(v),
            None => Err(Value::Enum(e)),
        },
        other => Err(other),
    }
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

/// Implements [`Reflect`], [`Described`] and [`FieldValue`] for a struct.
///
/// `root = field` marks the type as a root whose identifier lives in the
/// given `String` field (not listed among the data fields). `extends = [..]`
/// declares the described types it may stand in for.
#[macro_export]
macro_rules! describe {
    (
        $ty:ident as $name:literal in $ns:literal
        $(, root = $id:ident)?
        $(, extends = [$($base:ty),* $(,)?])?
        {
            $( $(#[$flag:ident])* $field:ident : $fty:ty ),* $(,)?
        }
    ) => {
        impl $crate::reflect::Reflect for $ty {
            fn type_key(&self) -> $crate::reflect::TypeKey {
                $crate::reflect::TypeKey::of::<$ty>()
            }

            fn get_field(&self, name: &str) -> Option<$crate::value::Value> {
                $(
                    if name == stringify!($field) {
                        return Some(<$fty as $crate::reflect::FieldValue>::to_value(&self.$field));
                    }
                )*
                None
            }

            fn set_field(
                &mut self,
                name: &str,
                value: $crate::value::Value,
            ) -> Result<(), $crate::reflect::FieldError> {
                $(
                    if name == stringify!($field) {
                        self.$field = <$fty as $crate::reflect::FieldValue>::from_value(value)
                            .map_err(|found| $crate::reflect::FieldError::Mismatch {
                                field: name.to_string(),
                                found: found.kind(),
                            })?;
                        return Ok(());
                    }
                )*
                let _ = value;
                Err($crate::reflect::FieldError::Unknown(name.to_string()))
            }

            fn clone_reflect(&self) -> Box<dyn $crate::reflect::Reflect> {
                Box::new(self.clone())
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }

            fn into_any(self: Box<Self>) -> Box<dyn std::any::Any> {
                self
            }

            $(
                fn identifier(&self) -> Option<&str> {
                    Some(&self.$id)
                }

                fn set_identifier(&mut self, identifier: &str) {
                    self.$id = identifier.to_string();
                }
            )?
        }

        impl $crate::reflect::Described for $ty {
            const NAME: &'static str = $name;
            const NAMESPACE: &'static str = $ns;

            fn fields() -> Vec<$crate::reflect::FieldDescriptor> {
                vec![
                    $(
                        $crate::reflect::FieldDescriptor::new::<$fty>(
                            stringify!($field),
                            &[$(stringify!($flag)),*],
                        )
                    ),*
                ]
            }

            fn bases() -> Vec<$crate::reflect::TypeKey> {
                vec![$($(<$base as $crate::reflect::Described>::key()),*)?]
            }

            fn is_root() -> bool {
                false $(|| !stringify!($id).is_empty())?
            }
        }

        impl $crate::reflect::FieldValue for $ty {
            fn field_type() -> $crate::reflect::FieldType {
                $crate::reflect::FieldType::Compound($crate::reflect::TypeKey::of::<$ty>())
            }

            fn to_value(&self) -> $crate::value::Value {
                $crate::value::Value::Record(Box::new(self.clone()))
            }

            fn from_value(value: $crate::value::Value) -> Result<Self, $crate::value::Value> {
                match value {
                    $crate::value::Value::Record(record) if record.is::<$ty>() => record
                        .into_any()
                        .downcast::<$ty>()
                        .map(|boxed| *boxed)
                        .map_err(|_| $crate::value::Value::Null),
                    other => Err(other),
                }
            }
        }
    };
}

/// Implements [`DescribedEnum`] and [`FieldValue`] for a fieldless enum.
#[macro_export]
macro_rules! describe_enum {
    ($ty:ident as $name:literal { $($variant:ident),* $(,)? }) => {
        impl $crate::reflect::DescribedEnum for $ty {
            fn info() -> &'static $crate::reflect::EnumInfo {
                static INFO: $crate::reflect::EnumInfo = $crate::reflect::EnumInfo {
                    name: $name,
                    variants: &[$(stringify!($variant)),*],
                };
                &INFO
            }

            fn variant_name(&self) -> &'static str {
                match self {
                    $($ty::$variant => stringify!($variant),)*
                }
            }

            fn from_variant_name(name: &str) -> Option<Self> {
                $(
                    if name == stringify!($variant) {
                        return Some($ty::$variant);
                    }
                )*
                None
            }
        }

        impl $crate::reflect::FieldValue for $ty {
            fn field_type() -> $crate::reflect::FieldType {
                $crate::reflect::FieldType::Enum(
                    <$ty as $crate::reflect::DescribedEnum>::info(),
                )
            }

            fn to_value(&self) -> $crate::value::Value {
                $crate::reflect::enum_to_value(self)
            }

            fn from_value(value: $crate::value::Value) -> Result<Self, $crate::value::Value> {
                $crate::reflect::enum_from_value(value)
            }
        }
    };
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Crate {
        id: String,
        weight: f32,
        labels: Vec<String>,
        scratch: i32,
        note: Option<String>,
    }

    crate::describe! {
        Crate as "Crate" in "test.reflect", root = id {
            weight: f32,
            labels: Vec<String>,
            #[non_serialized] scratch: i32,
            #[always] note: Option<String>,
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    enum Tier {
        #[default]
        Low,
        High,
    }

    crate::describe_enum!(Tier as "Tier" { Low, High });

    #[test]
    fn descriptor_metadata_from_macro() {
        assert!(Crate::is_root());
        assert_eq!(Crate::NAME, "Crate");
        assert_eq!(Crate::key().full_name(), "test.reflect.Crate");

        let fields = Crate::fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].ty, FieldType::F32);
        assert_eq!(
            fields[1].ty,
            FieldType::Collection(CollectionKind::List, Box::new(FieldType::String))
        );
        assert!(!fields[2].serialized);
        assert!(fields[3].nullable);
        assert!(fields[3].always_serialized);
    }

    #[test]
    fn get_and_set_by_name() {
        let mut c = Crate::default();
        c.set_field("weight", Value::F32(2.5)).unwrap();
        c.set_field("labels", Value::List(vec![Value::String("a".into())]))
            .unwrap();
        assert_eq!(c.weight, 2.5);
        assert_eq!(c.labels, vec!["a".to_string()]);

        match c.get_field("weight") {
            Some(Value::F32(v)) => assert_eq!(v, 2.5),
            other => panic!("unexpected {other:?}"),
        }
        assert!(c.get_field("missing").is_none());
    }

    #[test]
    fn set_rejects_unknown_and_mismatched() {
        let mut c = Crate::default();
        assert_eq!(
            c.set_field("nope", Value::Bool(true)),
            Err(FieldError::Unknown("nope".into()))
        );
        assert!(matches!(
            c.set_field("weight", Value::String("x".into())),
            Err(FieldError::Mismatch { .. })
        ));
        assert_eq!(c.weight, 0.0);
    }

    #[test]
    fn identifier_accessors_on_roots() {
        let mut c = Crate::default();
        c.set_identifier("crate_a");
        assert_eq!(c.identifier(), Some("crate_a"));
        assert_eq!(c.id, "crate_a");
    }

    #[test]
    fn option_maps_null() {
        assert!(matches!(Option::<i32>::from_value(Value::Null), Ok(None)));
        assert!(matches!(Option::<i32>::from_value(Value::I32(3)), Ok(Some(3))));
        assert!(Value::Null.is_null());
        assert!(i32::from_value(Value::Null).is_err());
    }

    #[test]
    fn enum_round_trips_through_value() {
        let v = Tier::High.to_value();
        match &v {
            Value::Enum(e) => assert_eq!(e.name(), "High"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(Tier::from_value(v).unwrap(), Tier::High);
        assert!(matches!(Tier::field_type(), FieldType::Enum(info) if info.name == "Tier"));
    }

    #[test]
    fn compound_downcast_checks_type() {
        let value = Crate {
            weight: 1.0,
            ..Default::default()
        }
        .to_value();
        let back = Crate::from_value(value).unwrap();
        assert_eq!(back.weight, 1.0);
        assert!(Crate::from_value(Value::I32(1)).is_err());
    }

    #[test]
    fn ref_carries_identifier_only() {
        let r: Ref<Crate> = Ref::new("other");
        let v = r.to_value();
        let back = Ref::<Crate>::from_value(v).unwrap();
        assert_eq!(back.identifier(), "other");
        assert_eq!(
            Ref::<Crate>::field_type(),
            FieldType::Reference(TypeKey::of::<Crate>())
        );
    }

    #[test]
    fn set_collections_deduplicate() {
        let value = Value::List(vec![Value::I32(1), Value::I32(1), Value::I32(2)]);
        let set = HashSet::<i32>::from_value(value).unwrap();
        assert_eq!(set.len(), 2);
    }
}
