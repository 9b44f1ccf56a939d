//! Integration tests for a downstream content crate.
//!
//! Types are described outside `protoform-core` with the public macros, the
//! loader is configured from TOML with a custom codec, and content is loaded
//! file by file through `PrototypeParser` then written back out.

use protoform_core::codec::{CodecContext, CodecError, CodecRegistry, ValueCodec};
use protoform_core::config::LoaderConfig;
use protoform_core::math::Quat;
use protoform_core::reflect::{FieldType, Poly, Ref};
use protoform_core::types::TypeRegistry;
use protoform_core::value::Value;
use protoform_core::{describe, describe_enum, Loader};
use protoform_prototypes::PrototypeParser;
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Content types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Slot {
    #[default]
    Hand,
    Back,
}

describe_enum!(Slot as "Slot" { Hand, Back });

#[derive(Debug, Clone, Default)]
struct Projectile {
    speed: f32,
}

describe! {
    Projectile as "Projectile" in "game" {
        speed: f32,
    }
}

#[derive(Debug, Clone, Default)]
struct Arrow {
    speed: f32,
    pierce: u8,
}

describe! {
    Arrow as "Arrow" in "game", extends = [Projectile] {
        speed: f32,
        pierce: u8,
    }
}

#[derive(Debug, Clone, Default)]
struct Ammo {
    name: String,
    stack: u16,
}

describe! {
    Ammo as "Ammo" in "game", root = name {
        stack: u16,
    }
}

#[derive(Debug, Clone, Default)]
struct Weapon {
    name: String,
    slot: Slot,
    color_code: u32,
    grip: Quat,
    keywords: HashSet<String>,
    ammo: Vec<Ref<Ammo>>,
    projectile: Option<Poly<Projectile>>,
}

describe! {
    Weapon as "Weapon" in "game", root = name {
        slot: Slot,
        color_code: u32,
        grip: Quat,
        keywords: HashSet<String>,
        ammo: Vec<Ref<Ammo>>,
        projectile: Option<Poly<Projectile>>,
    }
}

// ============================================================================
// Loader setup
// ============================================================================

/// Colors are written as `#rrggbb`.
#[derive(Debug)]
struct HexColorCodec;

impl ValueCodec for HexColorCodec {
    fn name(&self) -> &'static str {
        "hex-color"
    }

    fn can_handle(&self, ty: &FieldType) -> bool {
        *ty == FieldType::U32
    }

    fn decode(&self, _ty: &FieldType, text: &str, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        let digits = text.trim().trim_start_matches('#');
        u32::from_str_radix(digits, 16)
            .map(Value::U32)
            .map_err(|e| CodecError::Format {
                text: text.to_string(),
                expected: "#rrggbb".into(),
                reason: e.to_string(),
            })
    }

    fn encode(&self, value: &Value, _cx: &CodecContext<'_>) -> Result<String, CodecError> {
        match value {
            Value::U32(v) => Ok(format!("#{v:06x}")),
            other => Err(CodecError::Unsupported {
                codec: "hex-color",
                found: other.kind(),
            }),
        }
    }
}

const CONFIG: &str = r#"
container_element = "Defs"
standard_namespace = "game"
default_override_policy = "Replace"
indent = "  "

[attributes]
identifier = "Name"
inherits = "ParentName"
"#;

fn content_loader() -> Loader {
    let mut types = TypeRegistry::builder();
    types
        .register::<Weapon>()
        .register::<Ammo>()
        .register::<Projectile>()
        .register::<Arrow>();
    let codecs = CodecRegistry::builder().with_codec(HexColorCodec).build();
    let config = LoaderConfig::from_toml_str(CONFIG).unwrap();
    Loader::new(Arc::new(types.build()))
        .with_config(config)
        .with_codecs(Arc::new(codecs))
}

const AMMO: &str = r#"<Defs>
  <Ammo Name="arrow_basic"><stack>50</stack></Ammo>
  <Ammo Name="arrow_fire"><stack>20</stack></Ammo>
</Defs>"#;

const WEAPONS: &str = r#"<Defs>
  <Weapon Name="bow_base" Abstract="True">
    <slot>Back</slot>
    <color_code>#8b4513</color_code>
    <keywords><li>ranged</li><li>wood</li></keywords>
    <ammo><li>arrow_basic</li></ammo>
  </Weapon>
  <Weapon Name="longbow" ParentName="bow_base">
    <grip>0,0,0.7071,0.7071</grip>
    <ammo CollectionOverrideAction="Combine"><li>arrow_fire</li></ammo>
    <projectile Type="Arrow"><speed>40</speed><pierce>2</pierce></projectile>
  </Weapon>
  <Weapon Name="shortbow" ParentName="bow_base">
    <keywords><li>light</li></keywords>
  </Weapon>
</Defs>"#;

fn load() -> PrototypeParser {
    let mut parser = PrototypeParser::new(content_loader());
    parser.parse(AMMO, "ammo.xml");
    parser.parse(WEAPONS, "weapons.xml");
    parser
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn configured_vocabulary_is_used() {
    let parser = load();
    assert!(parser.diagnostics().is_empty(), "{:?}", parser.diagnostics());
    assert_eq!(parser.prototypes::<Ammo>().count(), 2);
    assert_eq!(parser.prototypes::<Weapon>().count(), 2);
    assert!(parser.get::<Weapon>("bow_base").is_none());
}

#[test]
fn configured_default_policy_replaces() {
    let parser = load();
    let shortbow = parser.get::<Weapon>("shortbow").unwrap();
    let expected: HashSet<String> = ["light".to_string()].into_iter().collect();
    assert_eq!(shortbow.keywords, expected);
    assert_eq!(shortbow.slot, Slot::Back);
}

#[test]
fn explicit_combine_overrides_configured_default() {
    let parser = load();
    let longbow = parser.get::<Weapon>("longbow").unwrap();
    let ammo: Vec<&str> = longbow.ammo.iter().map(|r| r.identifier()).collect();
    assert_eq!(ammo, vec!["arrow_basic", "arrow_fire"]);
    let fire = parser.roots().resolve(&longbow.ammo[1]).unwrap();
    assert_eq!(fire.stack, 20);
    assert_eq!(longbow.keywords.len(), 2);
}

#[test]
fn custom_codec_and_compound_values() {
    let parser = load();
    let longbow = parser.get::<Weapon>("longbow").unwrap();
    assert_eq!(longbow.color_code, 0x8b4513);
    assert_eq!(longbow.grip.z, 0.7071);
    let arrow = longbow
        .projectile
        .as_ref()
        .unwrap()
        .downcast_ref::<Arrow>()
        .unwrap();
    assert_eq!(arrow.pierce, 2);
    assert_eq!(arrow.speed, 40.0);
}

#[test]
fn missing_ammo_is_reported_with_file() {
    let mut parser = PrototypeParser::new(content_loader());
    parser.parse(WEAPONS, "weapons.xml");
    let diagnostics = parser.take_diagnostics();
    assert_eq!(diagnostics.error_count(), 2);
    assert!(diagnostics.iter().all(|d| d.file == "weapons.xml"));
    let longbow = parser.get::<Weapon>("longbow").unwrap();
    assert!(longbow.ammo.is_empty());
}

#[test]
fn round_trip_through_serializer() {
    let parser = load();
    let loader = parser.loader().clone();
    let written = loader.serialize_pool(parser.roots());
    assert!(written.diagnostics.is_empty(), "{:?}", written.diagnostics);
    assert!(written.text.starts_with("<Defs>\n  <"));
    assert!(written.text.contains("Name=\"longbow\""));
    assert!(written.text.contains("<color_code>#8b4513</color_code>"));
    assert!(written.text.contains("<projectile Type=\"Arrow\">"));

    let mut reread = PrototypeParser::new(loader);
    reread.parse(&written.text, "written.xml");
    assert!(reread.diagnostics().is_empty(), "{:?}", reread.diagnostics());

    for original in parser.prototypes::<Weapon>() {
        let back = reread.get::<Weapon>(&original.name).unwrap();
        assert_eq!(back.slot, original.slot);
        assert_eq!(back.color_code, original.color_code);
        assert_eq!(back.grip, original.grip);
        assert_eq!(back.keywords, original.keywords);
        assert_eq!(back.ammo, original.ammo);
        assert_eq!(
            back.projectile.as_ref().map(|p| p.type_key()),
            original.projectile.as_ref().map(|p| p.type_key())
        );
    }
    for original in parser.prototypes::<Ammo>() {
        assert_eq!(reread.get::<Ammo>(&original.name).unwrap().stack, original.stack);
    }
}

#[test]
fn roots_are_reflectable() {
    let parser = load();
    let root = parser.get_dyn("arrow_basic").unwrap();
    assert!(matches!(root.get_field("stack"), Some(Value::U16(50))));
    assert_eq!(root.identifier(), Some("arrow_basic"));
}
