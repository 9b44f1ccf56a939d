//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so the fixture
//! types are available everywhere a test needs them.

use crate::codec::{CodecContext, CodecError, CodecRegistry, ValueCodec};
use crate::config::LoaderConfig;
use crate::engine::{Loader, ParseOutput};
use crate::math::{Color, Vec3};
use crate::reflect::{FieldType, Poly, Ref, TypeKey};
use crate::types::TypeRegistry;
use crate::value::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const TEST_NAMESPACE: &str = "protoform.test";
pub const ALT_NAMESPACE: &str = "protoform.alt";

// ===========================================================================
// Fixture types
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rarity {
    #[default]
    Common,
    Rare,
    Epic,
}

crate::describe_enum!(Rarity as "Rarity" { Common, Rare, Epic });

/// Polymorphic base for effect fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effect {
    pub power: f32,
}

crate::describe! {
    Effect as "Effect" in "protoform.test" {
        power: f32,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Burn {
    pub power: f32,
    pub duration: f32,
}

crate::describe! {
    Burn as "Burn" in "protoform.test", extends = [Effect] {
        power: f32,
        duration: f32,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heal {
    pub power: f32,
    pub amount: i32,
}

crate::describe! {
    Heal as "Heal" in "protoform.test", extends = [Effect] {
        power: f32,
        amount: i32,
    }
}

/// Nested compound without polymorphism.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub hp: i32,
    pub speed: f32,
    pub effects: Vec<Poly<Effect>>,
}

crate::describe! {
    Stats as "Stats" in "protoform.test" {
        hp: i32,
        speed: f32,
        effects: Vec<Poly<Effect>>,
    }
}

/// The main root fixture; covers every field shape.
#[derive(Debug, Clone, Default)]
pub struct Item {
    pub id: String,
    pub rate: f32,
    pub count: i32,
    pub tags: Vec<i32>,
    pub names: Vec<String>,
    pub flags: BTreeSet<String>,
    pub label: Option<String>,
    pub upgrade: Option<Ref<Item>>,
    pub links: Vec<Ref<Item>>,
    pub tint: Color,
    pub offset: Vec3,
    pub rarity: Rarity,
    pub effect: Option<Poly<Effect>>,
    pub stats: Stats,
    pub kind: Option<TypeKey>,
    pub cache: i32,
}

crate::describe! {
    Item as "Item" in "protoform.test", root = id {
        rate: f32,
        count: i32,
        tags: Vec<i32>,
        names: Vec<String>,
        flags: BTreeSet<String>,
        #[always] label: Option<String>,
        upgrade: Option<Ref<Item>>,
        links: Vec<Ref<Item>>,
        tint: Color,
        offset: Vec3,
        rarity: Rarity,
        effect: Option<Poly<Effect>>,
        stats: Stats,
        kind: Option<TypeKey>,
        #[non_serialized] cache: i32,
    }
}

/// A root that may stand in for [`Item`] in references.
#[derive(Debug, Clone, Default)]
pub struct Blade {
    pub id: String,
    pub damage: f32,
    pub owner: Option<Ref<Recipe>>,
}

crate::describe! {
    Blade as "Blade" in "protoform.test", root = id, extends = [Item] {
        damage: f32,
        owner: Option<Ref<Recipe>>,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recipe {
    pub id: String,
    pub output: Option<Ref<Item>>,
    pub inputs: Vec<Ref<Item>>,
    pub time: f64,
}

crate::describe! {
    Recipe as "Recipe" in "protoform.test", root = id {
        output: Option<Ref<Item>>,
        inputs: Vec<Ref<Item>>,
        time: f64,
    }
}

/// Shares the short name `Item` with [`Item`] in another namespace.
#[derive(Debug, Clone, Default)]
pub struct AltItem {
    pub id: String,
    pub weight: f32,
}

crate::describe! {
    AltItem as "Item" in "protoform.alt", root = id {
        weight: f32,
    }
}

// ===========================================================================
// Registry and loader
// ===========================================================================

/// Every fixture type, [`Item`] registered before [`AltItem`].
pub fn registry() -> TypeRegistry {
    let mut b = TypeRegistry::builder();
    b.register::<Item>()
        .register::<Blade>()
        .register::<Recipe>()
        .register::<Stats>()
        .register::<Effect>()
        .register::<Burn>()
        .register::<Heal>()
        .register::<AltItem>();
    b.build()
}

pub fn test_config() -> LoaderConfig {
    LoaderConfig::default().with_standard_namespace(TEST_NAMESPACE)
}

/// Loader over [`registry`] preferring the test namespace.
pub fn loader() -> Loader {
    Loader::new(Arc::new(registry())).with_config(test_config())
}

/// Claims `f64` fields and panics on every call.
#[derive(Debug)]
pub struct PanickingCodec;

impl ValueCodec for PanickingCodec {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn can_handle(&self, ty: &FieldType) -> bool {
        *ty == FieldType::F64
    }

    fn decode(&self, _ty: &FieldType, text: &str, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        panic!("cannot read {text}")
    }

    fn encode(&self, value: &Value, _cx: &CodecContext<'_>) -> Result<String, CodecError> {
        panic!("cannot write {value:?}")
    }
}

/// [`loader`] with [`PanickingCodec`] ahead of the standard codecs.
pub fn panicking_loader() -> Loader {
    let codecs = CodecRegistry::builder().with_codec(PanickingCodec).build();
    loader().with_codecs(Arc::new(codecs))
}

/// Wrap record elements in a default container element.
pub fn container(body: &str) -> String {
    format!("<Container>{body}</Container>")
}

/// Parse one document named `test.xml` with [`loader`].
pub fn parse_one(text: &str) -> ParseOutput {
    match loader().parse(&[text], &["test.xml"], None) {
        Ok(out) => out,
        Err(e) => panic!("parse failed: {e}"),
    }
}

/// `count` prototypes inheriting one abstract base, as one document.
pub fn prototype_document(count: usize) -> String {
    let mut doc = String::from(
        "<Container>\n<Item Id=\"base\" Abstract=\"True\"><rate>1.5</rate><tags><li>1</li><li>2</li></tags></Item>\n",
    );
    for i in 0..count {
        doc.push_str(&format!(
            "<Item Id=\"item_{i}\" Inherits=\"base\"><count>{i}</count><tags><li>{i}</li></tags></Item>\n"
        ));
    }
    doc.push_str("</Container>\n");
    doc
}
