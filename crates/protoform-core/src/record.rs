//! Parse-time record model and the document node decoder.
//!
//! A [`Record`] holds everything read from one record element before any
//! instance exists: scalars already decoded, references as identifier
//! placeholders, nested compounds and collections as child structures.

use crate::codec::{CodecContext, CodecRegistry};
use crate::config::{LoaderConfig, OverridePolicy};
use crate::diagnostic::{Diagnostics, Location};
use crate::reflect::{FieldDescriptor, FieldType};
use crate::types::{TypeDescriptor, TypeRegistry};
use crate::value::{RootRef, Value};
use roxmltree::Node;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// One object as written in a document.
#[derive(Debug, Clone)]
pub struct Record {
    pub descriptor: Arc<TypeDescriptor>,
    /// Present on root records only.
    pub identifier: Option<String>,
    pub inherits: Option<String>,
    pub is_abstract: bool,
    pub location: Location,
    /// Field entries in document order; a later entry for the same field wins.
    pub fields: Vec<FieldEntry>,
    /// Excluded from every pass after being marked.
    pub invalid: bool,
}

impl Record {
    pub fn new(descriptor: Arc<TypeDescriptor>, location: Location) -> Self {
        Self {
            descriptor,
            identifier: None,
            inherits: None,
            is_abstract: false,
            location,
            fields: Vec::new(),
            invalid: false,
        }
    }

    /// Last entry written for `name`.
    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().rev().find(|f| f.name == name)
    }

    /// Visit every reference placeholder, nested ones included.
    pub fn for_each_reference_mut(&mut self, f: &mut impl FnMut(&mut ReferencePlaceholder)) {
        for entry in &mut self.fields {
            entry.data.for_each_reference_mut(f);
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub name: &'static str,
    pub data: FieldData,
    /// Explicit override policy written on the field element.
    pub policy: Option<OverridePolicy>,
    pub line: Option<u32>,
}

/// A field value before application.
#[derive(Debug, Clone)]
pub enum FieldData {
    Value(Value),
    Record(Record),
    Collection(CollectionRecord),
    Reference(ReferencePlaceholder),
}

impl FieldData {
    fn for_each_reference_mut(&mut self, f: &mut impl FnMut(&mut ReferencePlaceholder)) {
        match self {
            FieldData::Value(_) => {}
            FieldData::Record(record) => record.for_each_reference_mut(f),
            FieldData::Collection(collection) => {
                for element in &mut collection.elements {
                    element.for_each_reference_mut(f);
                }
            }
            FieldData::Reference(placeholder) => f(placeholder),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectionRecord {
    pub field_type: FieldType,
    pub elements: Vec<FieldData>,
}

/// A reference waiting for the resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePlaceholder {
    pub identifier: String,
    pub line: Option<u32>,
    pub resolved: Option<RootRef>,
}

impl ReferencePlaceholder {
    pub fn new(identifier: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            identifier: identifier.into(),
            line,
            resolved: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Record library
// ---------------------------------------------------------------------------

/// Identified records of one or more sessions, abstract ones included, so
/// later parse calls can inherit from them.
#[derive(Debug, Clone, Default)]
pub struct RecordLibrary {
    records: HashMap<String, Record>,
}

impl RecordLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records without an identifier are ignored. Replaces a previous record
    /// with the same identifier.
    pub fn insert(&mut self, record: Record) {
        if let Some(id) = record.identifier.clone() {
            self.records.insert(id, record);
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&Record> {
        self.records.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.records.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records already present keep their first definition.
    pub fn extend(&mut self, other: RecordLibrary) {
        for (id, record) in other.records {
            self.records.entry(id).or_insert(record);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for RecordLibrary {
    type Item = (String, Record);
    type IntoIter = std::collections::hash_map::IntoIter<String, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// 1-based source line of a node.
pub(crate) fn line_of(node: Node<'_, '_>) -> Option<u32> {
    Some(node.document().text_pos_at(node.range().start).row)
}

/// Concatenated direct text content.
fn text_of(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect()
}

/// Turns record elements into [`Record`]s for one document.
pub(crate) struct RecordDecoder<'a> {
    pub types: &'a TypeRegistry,
    pub codecs: &'a CodecRegistry,
    pub config: &'a LoaderConfig,
    pub file: Arc<str>,
    pub diagnostics: &'a mut Diagnostics,
}

impl RecordDecoder<'_> {
    fn location(&self, node: Node<'_, '_>) -> Location {
        Location::new(Arc::clone(&self.file), line_of(node))
    }

    fn error(&mut self, node: Node<'_, '_>, message: impl Into<String>) {
        let location = self.location(node);
        self.diagnostics.error(&location, message);
    }

    /// Decode every field element under `node` into `record`.
    pub fn decode_fields(&mut self, record: &mut Record, node: Node<'_, '_>) {
        for child in node.children() {
            if child.is_text() {
                if child.text().is_some_and(|t| !t.trim().is_empty()) {
                    self.error(
                        child,
                        format!(
                            "unexpected text inside record of type {}",
                            record.descriptor.name()
                        ),
                    );
                }
                continue;
            }
            if !child.is_element() {
                continue;
            }

            let name = child.tag_name().name();
            let Some(field) = record.descriptor.field(name).cloned() else {
                self.error(
                    child,
                    format!("unknown field {name} on type {}", record.descriptor.full_name()),
                );
                continue;
            };

            let policy = self.read_policy(child);
            if let Some(data) = self.decode_field(&field, child) {
                record.fields.push(FieldEntry {
                    name: field.name,
                    data,
                    policy,
                    line: line_of(child),
                });
            }
        }
    }

    fn read_policy(&mut self, node: Node<'_, '_>) -> Option<OverridePolicy> {
        let raw = node.attribute(self.config.attributes.override_policy.as_str())?;
        match raw.parse::<OverridePolicy>() {
            Ok(policy) => Some(policy),
            Err(message) => {
                self.error(node, message);
                None
            }
        }
    }

    fn is_null_token(&self, node: Node<'_, '_>) -> bool {
        !node.children().any(|c| c.is_element()) && text_of(node).trim() == self.config.null_token
    }

    fn decode_field(&mut self, field: &FieldDescriptor, node: Node<'_, '_>) -> Option<FieldData> {
        if self.is_null_token(node) {
            if field.nullable {
                return Some(FieldData::Value(Value::Null));
            }
            self.error(node, format!("field {} cannot be null", field.name));
            return None;
        }
        self.decode_data(&field.ty, node, field.name)
    }

    fn decode_data(&mut self, ty: &FieldType, node: Node<'_, '_>, field: &str) -> Option<FieldData> {
        let codecs = self.codecs;
        if let Some(codec) = codecs.best_codec_for(ty) {
            if let Some(child) = node.children().find(|c| c.is_element()) {
                self.error(
                    child,
                    format!("unexpected element <{}> in field {field}", child.tag_name().name()),
                );
                return None;
            }
            let text = text_of(node);
            let config = self.config;
            let cx = CodecContext {
                types: self.types,
                namespace: config.standard_namespace.as_deref(),
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| codec.decode(ty, &text, &cx)));
            return match outcome {
                Ok(Ok(value)) => Some(FieldData::Value(value)),
                Ok(Err(e)) => {
                    self.error(node, format!("field {field}: {e}"));
                    None
                }
                Err(_) => {
                    self.error(
                        node,
                        format!("codec {} panicked while reading field {field}", codec.name()),
                    );
                    None
                }
            };
        }

        match ty {
            FieldType::Collection(_, element) => {
                let mut elements = Vec::new();
                for child in node.children() {
                    if child.is_element() {
                        if let Some(data) = self.decode_element(element, child, field) {
                            elements.push(data);
                        }
                    } else if child.is_text() && child.text().is_some_and(|t| !t.trim().is_empty()) {
                        self.error(child, format!("collection field {field} expects item elements"));
                    }
                }
                Some(FieldData::Collection(CollectionRecord {
                    field_type: ty.clone(),
                    elements,
                }))
            }
            FieldType::Reference(_) => {
                let identifier = text_of(node).trim().to_string();
                if identifier.is_empty() {
                    self.error(node, format!("empty reference in field {field}"));
                    return None;
                }
                Some(FieldData::Reference(ReferencePlaceholder::new(
                    identifier,
                    line_of(node),
                )))
            }
            FieldType::Compound(declared) => {
                let descriptor = self.compound_type(*declared, node, field)?;
                let mut record = Record::new(descriptor, self.location(node));
                self.decode_fields(&mut record, node);
                Some(FieldData::Record(record))
            }
            other => {
                self.error(node, format!("no codec can read {other} for field {field}"));
                None
            }
        }
    }

    /// Collection items may themselves be the null token only when the
    /// element type has a codec; everything else decodes like a field.
    fn decode_element(&mut self, ty: &FieldType, node: Node<'_, '_>, field: &str) -> Option<FieldData> {
        if self.is_null_token(node) {
            self.error(node, format!("collection field {field} cannot hold null items"));
            return None;
        }
        self.decode_data(ty, node, field)
    }

    /// Declared type, or the assignable type named by the override attribute.
    fn compound_type(
        &mut self,
        declared: crate::reflect::TypeKey,
        node: Node<'_, '_>,
        field: &str,
    ) -> Option<Arc<TypeDescriptor>> {
        let attribute = self.config.attributes.type_override.as_str();
        if let Some(written) = node.attribute(attribute) {
            let namespace = self.config.standard_namespace.as_deref();
            let Some(descriptor) = self.types.lookup_by_name(written, namespace) else {
                self.error(node, format!("unknown type {written} in field {field}"));
                return None;
            };
            if !self.types.is_assignable(descriptor.key(), declared) {
                self.error(
                    node,
                    format!(
                        "type {} is not assignable to {} in field {field}",
                        descriptor.full_name(),
                        declared.full_name()
                    ),
                );
                return None;
            }
            return Some(descriptor);
        }

        match self.types.lookup(declared) {
            Some(descriptor) => Some(descriptor),
            None => {
                self.error(
                    node,
                    format!("type {} of field {field} is not registered", declared.full_name()),
                );
                None
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
