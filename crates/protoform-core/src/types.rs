//! Type descriptor cache.
//!
//! Types are registered once on a [`TypeRegistryBuilder`] and frozen into a
//! [`TypeRegistry`]. Each [`TypeDescriptor`] is built on first lookup and
//! memoized for the life of the registry; the short-name index used by
//! [`TypeRegistry::lookup_by_name`] is likewise built on first use.

use crate::reflect::{Described, FieldDescriptor, FieldType, Reflect, TypeKey};
use crate::value::Value;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

// ---------------------------------------------------------------------------
// TypeDescriptor
// ---------------------------------------------------------------------------

/// Cached metadata of one described type.
#[derive(Debug)]
pub struct TypeDescriptor {
    key: TypeKey,
    fields: Vec<FieldDescriptor>,
    field_index: HashMap<&'static str, usize>,
    bases: Vec<TypeKey>,
    is_root: bool,
    factory: fn() -> Box<dyn Reflect>,
}

fn create_bare<T: Described>() -> Box<dyn Reflect> {
    Box::new(T::default())
}

fn build_descriptor<T: Described>() -> TypeDescriptor {
    TypeDescriptor::of::<T>()
}

impl TypeDescriptor {
    pub fn of<T: Described>() -> Self {
        let fields = T::fields();
        let field_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name, i))
            .collect();
        Self {
            key: T::key(),
            fields,
            field_index,
            bases: T::bases(),
            is_root: T::is_root(),
            factory: create_bare::<T>,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.key.name
    }

    pub fn full_name(&self) -> String {
        self.key.full_name()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_index.contains_key(name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.field(name).map(|f| &f.ty)
    }

    /// Whether the field holds a reference to a root.
    pub fn is_reference_field(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.ty.is_reference())
    }

    pub fn is_serialized(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.serialized)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn bases(&self) -> &[TypeKey] {
        &self.bases
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// A bare instance with every field at its default.
    pub fn create(&self) -> Box<dyn Reflect> {
        (self.factory)()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    key: TypeKey,
    build: fn() -> TypeDescriptor,
    descriptor: OnceLock<Arc<TypeDescriptor>>,
}

/// Collects the loadable types before the registry is frozen.
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    entries: Vec<Entry>,
    by_id: HashMap<TypeId, usize>,
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a described type. Registering the same type twice is a no-op.
    pub fn register<T: Described>(&mut self) -> &mut Self {
        let key = T::key();
        if self.by_id.contains_key(&key.id) {
            return self;
        }
        self.by_id.insert(key.id, self.entries.len());
        self.entries.push(Entry {
            key,
            build: build_descriptor::<T>,
            descriptor: OnceLock::new(),
        });
        self
    }

    pub fn is_registered<T: Described>(&self) -> bool {
        self.by_id.contains_key(&TypeId::of::<T>())
    }

    /// Freeze into an immutable registry.
    pub fn build(self) -> TypeRegistry {
        log::debug!(target: "protoform", "type registry frozen with {} types", self.entries.len());
        TypeRegistry {
            entries: self.entries,
            by_id: self.by_id,
            name_index: OnceLock::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable set of loadable types. Descriptors are built lazily but only
/// once, so the registry can be shared behind an `Arc` across threads.
#[derive(Debug)]
pub struct TypeRegistry {
    entries: Vec<Entry>,
    by_id: HashMap<TypeId, usize>,
    name_index: OnceLock<HashMap<&'static str, Vec<usize>>>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        self.by_id.contains_key(&key.id)
    }

    fn descriptor_at(&self, index: usize) -> Arc<TypeDescriptor> {
        let entry = &self.entries[index];
        Arc::clone(entry.descriptor.get_or_init(|| {
            log::trace!(target: "protoform", "describing {}", entry.key.full_name());
            Arc::new((entry.build)())
        }))
    }

    /// Descriptor of a registered type.
    pub fn lookup(&self, key: TypeKey) -> Option<Arc<TypeDescriptor>> {
        self.by_id.get(&key.id).map(|&i| self.descriptor_at(i))
    }

    pub fn lookup_of<T: Described>(&self) -> Option<Arc<TypeDescriptor>> {
        self.lookup(T::key())
    }

    fn name_index(&self) -> &HashMap<&'static str, Vec<usize>> {
        self.name_index.get_or_init(|| {
            let mut index: HashMap<&'static str, Vec<usize>> = HashMap::new();
            for (i, entry) in self.entries.iter().enumerate() {
                index.entry(entry.key.name).or_default().push(i);
            }
            index
        })
    }

    /// Resolve a written type name.
    ///
    /// A qualified name (`namespace.Name`) must match exactly. A short name
    /// prefers `preferred_namespace` and otherwise falls back to the first
    /// registered type with that name.
    pub fn lookup_by_name(
        &self,
        written: &str,
        preferred_namespace: Option<&str>,
    ) -> Option<Arc<TypeDescriptor>> {
        let written = written.trim();
        if let Some((namespace, name)) = written.rsplit_once('.') {
            let candidates = self.name_index().get(name)?;
            return candidates
                .iter()
                .find(|&&i| self.entries[i].key.namespace == namespace)
                .map(|&i| self.descriptor_at(i));
        }

        let candidates = self.name_index().get(written)?;
        let preferred = preferred_namespace.and_then(|ns| {
            candidates
                .iter()
                .find(|&&i| self.entries[i].key.namespace == ns)
        });
        preferred
            .or_else(|| candidates.first())
            .map(|&i| self.descriptor_at(i))
    }

    /// Whether more than one registered type uses this short name.
    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.name_index().get(name).is_some_and(|c| c.len() > 1)
    }

    /// Whether a value of type `from` may be stored where `to` is declared:
    /// same type, or `to` reachable through declared bases.
    pub fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let bases: Vec<TypeKey> = match self.lookup(current) {
                Some(desc) => desc.bases().to_vec(),
                None => continue,
            };
            for base in bases {
                if base == to {
                    return true;
                }
                stack.push(base);
            }
        }
        false
    }

    /// Structural check run right before a value is assigned to a field.
    pub fn accepts(&self, field: &FieldDescriptor, value: &Value) -> bool {
        if value.is_null() {
            return field.nullable;
        }
        self.matches(&field.ty, value)
    }

    fn matches(&self, ty: &FieldType, value: &Value) -> bool {
        match (ty, value) {
            (FieldType::Bool, Value::Bool(_))
            | (FieldType::I8, Value::I8(_))
            | (FieldType::I16, Value::I16(_))
            | (FieldType::I32, Value::I32(_))
            | (FieldType::I64, Value::I64(_))
            | (FieldType::U8, Value::U8(_))
            | (FieldType::U16, Value::U16(_))
            | (FieldType::U32, Value::U32(_))
            | (FieldType::U64, Value::U64(_))
            | (FieldType::F32, Value::F32(_))
            | (FieldType::F64, Value::F64(_))
            | (FieldType::String, Value::String(_))
            | (FieldType::Vec2, Value::Vec2(_))
            | (FieldType::Vec3, Value::Vec3(_))
            | (FieldType::Vec4, Value::Vec4(_))
            | (FieldType::Color, Value::Color(_))
            | (FieldType::Quat, Value::Quat(_))
            | (FieldType::TypeRef, Value::Type(_)) => true,
            (FieldType::Enum(info), Value::Enum(e)) => e.info == *info,
            (FieldType::Reference(declared), Value::Reference(r)) => {
                self.is_assignable(r.target, *declared)
            }
            (FieldType::Compound(declared), Value::Record(record)) => {
                self.is_assignable(record.type_key(), *declared)
            }
            (FieldType::Collection(_, element), Value::List(items)) => {
                items.iter().all(|item| self.matches(element, item))
            }
            _ => false,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::Described;
    use crate::test_utils::*;
    use crate::value::RootRef;

    #[test]
    fn descriptor_reports_fields() {
        let reg = registry();
        let desc = reg.lookup_of::<Item>().unwrap();
        assert_eq!(desc.name(), "Item");
        assert!(desc.is_root());
        assert!(desc.has_field("rate"));
        assert!(!desc.has_field("id"));
        assert!(desc.is_reference_field("upgrade"));
        assert!(!desc.is_serialized("cache"));
        assert_eq!(desc.field_type("count"), Some(&FieldType::I32));
    }

    #[test]
    fn descriptor_is_built_once() {
        let reg = registry();
        let a = reg.lookup_of::<Item>().unwrap();
        let b = reg.lookup_of::<Item>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn factory_creates_bare_instance() {
        let reg = registry();
        let bare = reg.lookup_of::<Item>().unwrap().create();
        let item = bare.downcast_ref::<Item>().unwrap();
        assert_eq!(item.rate, 0.0);
        assert!(item.tags.is_empty());
    }

    #[test]
    fn unregistered_type_is_none() {
        let reg = TypeRegistry::builder().build();
        assert!(reg.lookup_of::<Item>().is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn register_twice_is_noop() {
        let mut b = TypeRegistry::builder();
        b.register::<Item>().register::<Item>();
        assert!(b.is_registered::<Item>());
        assert_eq!(b.build().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Name lookup
    // -----------------------------------------------------------------------

    #[test]
    fn short_name_prefers_namespace() {
        let reg = registry();
        let test_ns = reg.lookup_by_name("Item", Some(TEST_NAMESPACE)).unwrap();
        assert_eq!(test_ns.key(), Item::key());

        let alt = reg.lookup_by_name("Item", Some(ALT_NAMESPACE)).unwrap();
        assert_eq!(alt.key(), AltItem::key());
        assert!(reg.is_ambiguous("Item"));
    }

    #[test]
    fn short_name_falls_back_to_first_match() {
        let reg = registry();
        let found = reg.lookup_by_name("Item", Some("nowhere")).unwrap();
        assert_eq!(found.key(), Item::key());
        let found = reg.lookup_by_name("Item", None).unwrap();
        assert_eq!(found.key(), Item::key());
    }

    #[test]
    fn qualified_name_matches_exactly() {
        let reg = registry();
        let found = reg.lookup_by_name("protoform.alt.Item", None).unwrap();
        assert_eq!(found.key(), AltItem::key());
        assert!(reg.lookup_by_name("nowhere.Item", None).is_none());
        assert!(reg.lookup_by_name("Nope", None).is_none());
    }

    // -----------------------------------------------------------------------
    // Assignability
    // -----------------------------------------------------------------------

    #[test]
    fn assignability_follows_bases() {
        let reg = registry();
        assert!(reg.is_assignable(Burn::key(), Effect::key()));
        assert!(reg.is_assignable(Effect::key(), Effect::key()));
        assert!(!reg.is_assignable(Effect::key(), Burn::key()));
        assert!(!reg.is_assignable(Item::key(), Effect::key()));
        assert!(reg.is_assignable(Blade::key(), Item::key()));
    }

    #[test]
    fn accepts_checks_structure() {
        let reg = registry();
        let desc = reg.lookup_of::<Item>().unwrap();

        let rate = desc.field("rate").unwrap();
        assert!(reg.accepts(rate, &Value::F32(1.0)));
        assert!(!reg.accepts(rate, &Value::I32(1)));
        assert!(!reg.accepts(rate, &Value::Null));

        let label = desc.field("label").unwrap();
        assert!(reg.accepts(label, &Value::Null));

        let tags = desc.field("tags").unwrap();
        assert!(reg.accepts(tags, &Value::List(vec![Value::I32(1)])));
        assert!(!reg.accepts(tags, &Value::List(vec![Value::String("x".into())])));

        let upgrade = desc.field("upgrade").unwrap();
        let to_blade = Value::Reference(RootRef {
            identifier: "b".into(),
            target: Blade::key(),
        });
        assert!(reg.accepts(upgrade, &to_blade));
        let to_recipe = Value::Reference(RootRef {
            identifier: "r".into(),
            target: Recipe::key(),
        });
        assert!(!reg.accepts(upgrade, &to_recipe));

        let effect = desc.field("effect").unwrap();
        assert!(reg.accepts(effect, &Value::Record(Box::new(Burn::default()))));
        assert!(!reg.accepts(effect, &Value::Record(Box::new(Stats::default()))));
    }
}
