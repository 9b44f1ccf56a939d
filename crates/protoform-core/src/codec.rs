//! Value codecs: text <-> [`Value`] for scalar and fixed-shape field types.
//!
//! The registry answers `best_codec_for(field_type)` with the first codec
//! whose `can_handle` accepts it. Collections, references and nested
//! compounds have no codec; the record decoder handles those structurally.
//! All numeric text is locale-invariant (`.` radix point, radix 10).

use crate::math::{Color, Components, Quat, Vec2, Vec3, Vec4};
use crate::reflect::{FieldType, FieldValue};
use crate::types::TypeRegistry;
use crate::value::{EnumValue, Value};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("cannot read {text:?} as {expected}: {reason}")]
    Format {
        text: String,
        expected: String,
        reason: String,
    },
    #[error("{variant:?} is not a variant of {enum_name}")]
    UnknownVariant { enum_name: String, variant: String },
    #[error("unknown type {0:?}")]
    UnknownType(String),
    #[error("codec {codec} cannot encode a value of kind {found}")]
    Unsupported { codec: &'static str, found: String },
}

fn unsupported(codec: &'static str, value: &Value) -> CodecError {
    CodecError::Unsupported {
        codec,
        found: value.kind(),
    }
}

// ---------------------------------------------------------------------------
// Codec trait
// ---------------------------------------------------------------------------

/// What a codec may consult while converting.
#[derive(Debug, Clone, Copy)]
pub struct CodecContext<'a> {
    pub types: &'a TypeRegistry,
    /// Preferred namespace for short type names.
    pub namespace: Option<&'a str>,
}

/// A stateless converter for one family of field types.
pub trait ValueCodec: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn can_handle(&self, ty: &FieldType) -> bool;

    fn decode(&self, ty: &FieldType, text: &str, cx: &CodecContext<'_>) -> Result<Value, CodecError>;

    fn encode(&self, value: &Value, cx: &CodecContext<'_>) -> Result<String, CodecError>;
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Numbers parsed with `FromStr` after trimming and written with `Display`.
/// Rust's float formatting is the shortest text that reads back to the same
/// value, so floats round-trip exactly.
pub struct ScalarCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ScalarCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ScalarCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ScalarCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScalarCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T> ValueCodec for ScalarCodec<T>
where
    T: FieldValue + FromStr + fmt::Display + 'static,
    T::Err: fmt::Display,
{
    fn name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn can_handle(&self, ty: &FieldType) -> bool {
        *ty == T::field_type()
    }

    fn decode(&self, _ty: &FieldType, text: &str, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        text.trim()
            .parse::<T>()
            .map(|v| v.to_value())
            .map_err(|e| CodecError::Format {
                text: text.to_string(),
                expected: self.name().to_string(),
                reason: e.to_string(),
            })
    }

    fn encode(&self, value: &Value, _cx: &CodecContext<'_>) -> Result<String, CodecError> {
        T::from_value(value.clone())
            .map(|v| v.to_string())
            .map_err(|v| unsupported(self.name(), &v))
    }
}

/// `true`/`false`, any letter case.
#[derive(Debug, Default)]
pub struct BoolCodec;

impl ValueCodec for BoolCodec {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn can_handle(&self, ty: &FieldType) -> bool {
        *ty == FieldType::Bool
    }

    fn decode(&self, _ty: &FieldType, text: &str, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        let t = text.trim();
        if t.eq_ignore_ascii_case("true") {
            Ok(Value::Bool(true))
        } else if t.eq_ignore_ascii_case("false") {
            Ok(Value::Bool(false))
        } else {
            Err(CodecError::Format {
                text: text.to_string(),
                expected: "bool".into(),
                reason: "expected true or false".into(),
            })
        }
    }

    fn encode(&self, value: &Value, _cx: &CodecContext<'_>) -> Result<String, CodecError> {
        match value {
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(unsupported(self.name(), other)),
        }
    }
}

/// Text taken verbatim, whitespace included.
#[derive(Debug, Default)]
pub struct StringCodec;

impl ValueCodec for StringCodec {
    fn name(&self) -> &'static str {
        "string"
    }

    fn can_handle(&self, ty: &FieldType) -> bool {
        *ty == FieldType::String
    }

    fn decode(&self, _ty: &FieldType, text: &str, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        Ok(Value::String(text.to_string()))
    }

    fn encode(&self, value: &Value, _cx: &CodecContext<'_>) -> Result<String, CodecError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(unsupported(self.name(), other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Any described enum, by variant name.
#[derive(Debug, Default)]
pub struct EnumCodec;

impl ValueCodec for EnumCodec {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn can_handle(&self, ty: &FieldType) -> bool {
        matches!(ty, FieldType::Enum(_))
    }

    fn decode(&self, ty: &FieldType, text: &str, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        let &FieldType::Enum(info) = ty else {
            return Err(CodecError::Format {
                text: text.to_string(),
                expected: ty.to_string(),
                reason: "not an enum field".into(),
            });
        };
        let name = text.trim();
        info.variants
            .iter()
            .position(|v| *v == name)
            .map(|index| Value::Enum(EnumValue { info, index }))
            .ok_or_else(|| CodecError::UnknownVariant {
                enum_name: info.name.to_string(),
                variant: name.to_string(),
            })
    }

    fn encode(&self, value: &Value, _cx: &CodecContext<'_>) -> Result<String, CodecError> {
        match value {
            Value::Enum(e) => Ok(e.name().to_string()),
            other => Err(unsupported(self.name(), other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixed-arity float tuples
// ---------------------------------------------------------------------------

/// Comma-separated components, exact arity.
pub struct VectorCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> VectorCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for VectorCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for VectorCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VectorCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Components + FieldValue + 'static> ValueCodec for VectorCodec<T> {
    fn name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn can_handle(&self, ty: &FieldType) -> bool {
        *ty == T::field_type()
    }

    fn decode(&self, ty: &FieldType, text: &str, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        let format_error = |reason: String| CodecError::Format {
            text: text.to_string(),
            expected: format!("{ty} ({})", T::SHAPE),
            reason,
        };

        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() != T::ARITY {
            return Err(format_error(format!(
                "expected {} components, found {}",
                T::ARITY,
                parts.len()
            )));
        }
        let mut components = Vec::with_capacity(T::ARITY);
        for part in parts {
            let c = part
                .trim()
                .parse::<f32>()
                .map_err(|e| format_error(e.to_string()))?;
            components.push(c);
        }
        Ok(T::from_components(&components).to_value())
    }

    fn encode(&self, value: &Value, _cx: &CodecContext<'_>) -> Result<String, CodecError> {
        let v = T::from_value(value.clone()).map_err(|v| unsupported(self.name(), &v))?;
        Ok(v.components()
            .iter()
            .map(f32::to_string)
            .collect::<Vec<_>>()
            .join(","))
    }
}

// ---------------------------------------------------------------------------
// Type names
// ---------------------------------------------------------------------------

/// A registered type, written by name.
#[derive(Debug, Default)]
pub struct TypeCodec;

impl ValueCodec for TypeCodec {
    fn name(&self) -> &'static str {
        "type"
    }

    fn can_handle(&self, ty: &FieldType) -> bool {
        *ty == FieldType::TypeRef
    }

    fn decode(&self, _ty: &FieldType, text: &str, cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        cx.types
            .lookup_by_name(text, cx.namespace)
            .map(|desc| Value::Type(desc.key()))
            .ok_or_else(|| CodecError::UnknownType(text.trim().to_string()))
    }

    /// Short name when it reads back to the same type, full name otherwise.
    fn encode(&self, value: &Value, cx: &CodecContext<'_>) -> Result<String, CodecError> {
        let Value::Type(key) = value else {
            return Err(unsupported(self.name(), value));
        };
        let short_resolves = cx
            .types
            .lookup_by_name(key.name, cx.namespace)
            .is_some_and(|desc| desc.key() == *key);
        if short_resolves {
            Ok(key.name.to_string())
        } else {
            Ok(key.full_name())
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered codec list; first match wins.
#[derive(Debug)]
pub struct CodecRegistry {
    codecs: Vec<Box<dyn ValueCodec>>,
}

fn standard_codecs() -> Vec<Box<dyn ValueCodec>> {
    vec![
        Box::new(BoolCodec),
        Box::new(ScalarCodec::<i8>::new()),
        Box::new(ScalarCodec::<i16>::new()),
        Box::new(ScalarCodec::<i32>::new()),
        Box::new(ScalarCodec::<i64>::new()),
        Box::new(ScalarCodec::<u8>::new()),
        Box::new(ScalarCodec::<u16>::new()),
        Box::new(ScalarCodec::<u32>::new()),
        Box::new(ScalarCodec::<u64>::new()),
        Box::new(ScalarCodec::<f32>::new()),
        Box::new(ScalarCodec::<f64>::new()),
        Box::new(StringCodec),
        Box::new(EnumCodec),
        Box::new(VectorCodec::<Vec2>::new()),
        Box::new(VectorCodec::<Vec3>::new()),
        Box::new(VectorCodec::<Vec4>::new()),
        Box::new(VectorCodec::<Color>::new()),
        Box::new(VectorCodec::<Quat>::new()),
        Box::new(TypeCodec),
    ]
}

impl CodecRegistry {
    /// The process-wide standard set, built on first use.
    pub fn standard() -> Arc<CodecRegistry> {
        static STANDARD: OnceLock<Arc<CodecRegistry>> = OnceLock::new();
        Arc::clone(STANDARD.get_or_init(|| {
            Arc::new(CodecRegistry {
                codecs: standard_codecs(),
            })
        }))
    }

    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::default()
    }

    pub fn best_codec_for(&self, ty: &FieldType) -> Option<&dyn ValueCodec> {
        self.codecs
            .iter()
            .find(|c| c.can_handle(ty))
            .map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

/// Custom codecs, consulted before the standard set.
#[derive(Debug, Default)]
pub struct CodecRegistryBuilder {
    custom: Vec<Box<dyn ValueCodec>>,
}

impl CodecRegistryBuilder {
    pub fn with_codec(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.custom.push(Box::new(codec));
        self
    }

    pub fn build(self) -> CodecRegistry {
        let mut codecs = self.custom;
        codecs.extend(standard_codecs());
        CodecRegistry { codecs }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{Described, FieldValue};
    use crate::test_utils::*;

    fn decode(types: &TypeRegistry, ty: FieldType, text: &str) -> Result<Value, CodecError> {
        let codecs = CodecRegistry::standard();
        let cx = CodecContext {
            types,
            namespace: Some(TEST_NAMESPACE),
        };
        let codec = codecs.best_codec_for(&ty).unwrap();
        codec.decode(&ty, text, &cx)
    }

    fn encode(types: &TypeRegistry, ty: FieldType, value: &Value) -> String {
        let codecs = CodecRegistry::standard();
        let cx = CodecContext {
            types,
            namespace: Some(TEST_NAMESPACE),
        };
        codecs.best_codec_for(&ty).unwrap().encode(value, &cx).unwrap()
    }

    // -----------------------------------------------------------------------
    // Scalars
    // -----------------------------------------------------------------------

    #[test]
    fn integers_trim_whitespace() {
        let types = registry();
        assert!(matches!(decode(&types, FieldType::I32, "  42\n"), Ok(Value::I32(42))));
        assert!(matches!(decode(&types, FieldType::U8, "255"), Ok(Value::U8(255))));
        assert!(matches!(decode(&types, FieldType::I64, "-7"), Ok(Value::I64(-7))));
    }

    #[test]
    fn integer_overflow_is_format_error() {
        let types = registry();
        assert!(matches!(
            decode(&types, FieldType::U8, "256"),
            Err(CodecError::Format { .. })
        ));
        assert!(matches!(
            decode(&types, FieldType::I32, "1.5"),
            Err(CodecError::Format { .. })
        ));
    }

    #[test]
    fn floats_use_dot_radix() {
        let types = registry();
        match decode(&types, FieldType::F32, "2.5") {
            Ok(Value::F32(v)) => assert_eq!(v, 2.5),
            other => panic!("unexpected {other:?}"),
        }
        assert!(decode(&types, FieldType::F32, "2,5").is_err());
        assert_eq!(encode(&types, FieldType::F32, &Value::F32(4.0)), "4");
        assert_eq!(encode(&types, FieldType::F64, &Value::F64(0.1)), "0.1");
    }

    #[test]
    fn bool_is_case_insensitive() {
        let types = registry();
        assert!(matches!(decode(&types, FieldType::Bool, "True"), Ok(Value::Bool(true))));
        assert!(matches!(decode(&types, FieldType::Bool, "FALSE"), Ok(Value::Bool(false))));
        assert!(decode(&types, FieldType::Bool, "yes").is_err());
        assert_eq!(encode(&types, FieldType::Bool, &Value::Bool(true)), "true");
    }

    #[test]
    fn string_is_verbatim() {
        let types = registry();
        match decode(&types, FieldType::String, "  spaced  ") {
            Ok(Value::String(s)) => assert_eq!(s, "  spaced  "),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn encode_rejects_wrong_kind() {
        let types = registry();
        let codecs = CodecRegistry::standard();
        let cx = CodecContext {
            types: &types,
            namespace: None,
        };
        let codec = codecs.best_codec_for(&FieldType::I32).unwrap();
        assert!(matches!(
            codec.encode(&Value::Bool(true), &cx),
            Err(CodecError::Unsupported { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Enums, vectors, types
    // -----------------------------------------------------------------------

    #[test]
    fn enum_matched_structurally() {
        let types = registry();
        let ty = Rarity::field_type();
        match decode(&types, ty.clone(), " Epic ") {
            Ok(Value::Enum(e)) => assert_eq!(e.name(), "Epic"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            decode(&types, ty.clone(), "Legendary"),
            Err(CodecError::UnknownVariant { .. })
        ));
        assert_eq!(encode(&types, ty, &Rarity::Rare.to_value()), "Rare");
    }

    #[test]
    fn vectors_require_exact_arity() {
        let types = registry();
        match decode(&types, FieldType::Vec3, "1, 2.5,-3") {
            Ok(Value::Vec3(v)) => assert_eq!(v, Vec3::new(1.0, 2.5, -3.0)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            decode(&types, FieldType::Vec3, "1,2"),
            Err(CodecError::Format { .. })
        ));
        assert!(matches!(
            decode(&types, FieldType::Color, "1,1,1,x"),
            Err(CodecError::Format { .. })
        ));
        assert_eq!(
            encode(&types, FieldType::Color, &Value::Color(Color::new(1.0, 0.5, 0.0, 1.0))),
            "1,0.5,0,1"
        );
    }

    #[test]
    fn type_names_resolve_through_registry() {
        let types = registry();
        match decode(&types, FieldType::TypeRef, "Burn") {
            Ok(Value::Type(key)) => assert_eq!(key, Burn::key()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            decode(&types, FieldType::TypeRef, "Missing"),
            Err(CodecError::UnknownType(_))
        ));
        assert_eq!(encode(&types, FieldType::TypeRef, &Value::Type(Item::key())), "Item");
        assert_eq!(
            encode(&types, FieldType::TypeRef, &Value::Type(AltItem::key())),
            "protoform.alt.Item"
        );
    }

    #[test]
    fn structural_types_have_no_codec() {
        let codecs = CodecRegistry::standard();
        assert!(codecs.best_codec_for(&Vec::<i32>::field_type()).is_none());
        assert!(codecs.best_codec_for(&Stats::field_type()).is_none());
        assert!(codecs
            .best_codec_for(&crate::reflect::Ref::<Item>::field_type())
            .is_none());
    }

    // -----------------------------------------------------------------------
    // Custom codecs
    // -----------------------------------------------------------------------

    #[derive(Debug)]
    struct HexCodec;

    impl ValueCodec for HexCodec {
        fn name(&self) -> &'static str {
            "hex"
        }

        fn can_handle(&self, ty: &FieldType) -> bool {
            *ty == FieldType::U32
        }

        fn decode(&self, _ty: &FieldType, text: &str, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
            let t = text.trim().trim_start_matches("0x");
            u32::from_str_radix(t, 16)
                .map(Value::U32)
                .map_err(|e| CodecError::Format {
                    text: text.into(),
                    expected: "hex".into(),
                    reason: e.to_string(),
                })
        }

        fn encode(&self, value: &Value, _cx: &CodecContext<'_>) -> Result<String, CodecError> {
            match value {
                Value::U32(v) => Ok(format!("0x{v:x}")),
                other => Err(unsupported("hex", other)),
            }
        }
    }

    #[test]
    fn custom_codec_takes_precedence() {
        let codecs = CodecRegistry::builder().with_codec(HexCodec).build();
        assert_eq!(codecs.len(), CodecRegistry::standard().len() + 1);
        let codec = codecs.best_codec_for(&FieldType::U32).unwrap();
        assert_eq!(codec.name(), "hex");
        let types = registry();
        let cx = CodecContext {
            types: &types,
            namespace: None,
        };
        assert!(matches!(codec.decode(&FieldType::U32, "0xff", &cx), Ok(Value::U32(255))));
        assert_eq!(codecs.best_codec_for(&FieldType::I32).unwrap().name(), "i32");
    }
}
