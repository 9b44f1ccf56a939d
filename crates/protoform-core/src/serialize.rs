//! Serialization: live roots back to one container document.
//!
//! Each root is first turned into a [`Record`] (the same model the parser
//! produces) and the record is then written out with the field codecs, so
//! the output reads back through [`Loader::parse`] to equal field values.

use crate::codec::CodecContext;
use crate::diagnostic::{Diagnostics, Location};
use crate::engine::Loader;
use crate::pool::RootPool;
use crate::record::{CollectionRecord, FieldData, FieldEntry, Record, ReferencePlaceholder};
use crate::reflect::{FieldType, Reflect, TypeKey};
use crate::value::Value;
use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Result of one serialize call.
#[derive(Debug, Clone, Default)]
pub struct SerializeOutput {
    pub text: String,
    pub diagnostics: Diagnostics,
}

impl Loader {
    /// Write `roots` into one container document. Roots that cannot be
    /// written are reported and left out.
    pub fn serialize(&self, roots: &[&dyn Reflect]) -> SerializeOutput {
        let mut writer = DocumentWriter {
            loader: self,
            location: Location::new(Arc::from("<serialize>"), None),
            diagnostics: Diagnostics::new(),
            xml: XmlWriter::new(&self.config().indent),
        };

        let container = self.config().container_element.as_str();
        writer.xml.open(container, &[]);
        for root in roots {
            writer.write_root(*root);
        }
        writer.xml.close(container);

        let text = match writer.xml.finish() {
            Ok(text) => text,
            Err(message) => {
                writer
                    .diagnostics
                    .error(&writer.location, format!("cannot write document: {message}"));
                String::new()
            }
        };
        log::debug!(target: "protoform", "serialized {} roots", roots.len());
        SerializeOutput {
            text,
            diagnostics: writer.diagnostics,
        }
    }

    /// Every root of a pool, in insertion order.
    pub fn serialize_pool(&self, pool: &RootPool) -> SerializeOutput {
        let roots: Vec<&dyn Reflect> = pool.iter().collect();
        self.serialize(&roots)
    }

    /// Name written for a type: the short name when it reads back to the
    /// same type, the qualified name otherwise.
    fn written_type_name(&self, key: TypeKey) -> String {
        let namespace = self.config().standard_namespace.as_deref();
        let short_resolves = self
            .types()
            .lookup_by_name(key.name, namespace)
            .is_some_and(|d| d.key() == key);
        if short_resolves {
            key.name.to_string()
        } else {
            key.full_name()
        }
    }
}

// ---------------------------------------------------------------------------
// Instance -> Record -> text
// ---------------------------------------------------------------------------

struct DocumentWriter<'a> {
    loader: &'a Loader,
    location: Location,
    diagnostics: Diagnostics,
    xml: XmlWriter,
}

impl DocumentWriter<'_> {
    fn write_root(&mut self, root: &dyn Reflect) {
        let Some(identifier) = root.identifier().filter(|id| !id.is_empty()) else {
            self.diagnostics.error(
                &self.location,
                format!("root of type {} has no identifier", root.type_key().full_name()),
            );
            return;
        };
        let Some(mut record) = self.to_record(root) else {
            return;
        };
        record.identifier = Some(identifier.to_string());

        let tag = self.loader.written_type_name(record.descriptor.key());
        let id_attr = self.loader.config().attributes.identifier.clone();
        self.write_record(&tag, &[(id_attr.as_str(), identifier)], &record);
    }

    fn to_record(&mut self, instance: &dyn Reflect) -> Option<Record> {
        let key = instance.type_key();
        let Some(descriptor) = self.loader.types().lookup(key) else {
            self.diagnostics.error(
                &self.location,
                format!("type {} is not registered", key.full_name()),
            );
            return None;
        };

        let mut record = Record::new(Arc::clone(&descriptor), self.location.clone());
        for field in descriptor.fields().iter().filter(|f| f.serialized) {
            let Some(value) = instance.get_field(field.name) else {
                continue;
            };
            if value.is_null() {
                if field.always_serialized {
                    record.fields.push(entry(field.name, FieldData::Value(Value::Null)));
                }
                continue;
            }
            if let Some(data) = self.to_data(&field.ty, value, field.name) {
                record.fields.push(entry(field.name, data));
            }
        }
        Some(record)
    }

    fn to_data(&mut self, ty: &FieldType, value: Value, field: &str) -> Option<FieldData> {
        if self.loader.codecs().best_codec_for(ty).is_some() {
            return Some(FieldData::Value(value));
        }
        match (ty, value) {
            (FieldType::Collection(_, element), Value::List(items)) => {
                let elements = items
                    .into_iter()
                    .filter_map(|item| self.to_data(element, item, field))
                    .collect();
                Some(FieldData::Collection(CollectionRecord {
                    field_type: ty.clone(),
                    elements,
                }))
            }
            (FieldType::Reference(_), Value::Reference(r)) => Some(FieldData::Reference(
                ReferencePlaceholder::new(r.identifier, None),
            )),
            (FieldType::Compound(_), Value::Record(inner)) => {
                self.to_record(inner.as_ref()).map(FieldData::Record)
            }
            (_, other) => {
                self.diagnostics.error(
                    &self.location,
                    format!("cannot write field {field}: no codec for a value of kind {}", other.kind()),
                );
                None
            }
        }
    }

    fn write_record(&mut self, tag: &str, attrs: &[(&str, &str)], record: &Record) {
        if record.fields.is_empty() {
            self.xml.empty(tag, attrs);
            return;
        }
        self.xml.open(tag, attrs);
        for entry in &record.fields {
            let Some(field) = record.descriptor.field(entry.name) else {
                continue;
            };
            let declared = field.ty.clone();
            self.write_data(entry.name, &declared, &entry.data);
        }
        self.xml.close(tag);
    }

    fn write_data(&mut self, tag: &str, declared: &FieldType, data: &FieldData) {
        match data {
            FieldData::Value(Value::Null) => {
                let token = self.loader.config().null_token.clone();
                self.xml.leaf(tag, &[], &token);
            }
            FieldData::Value(value) => {
                if let Some(text) = self.encode(declared, value, tag) {
                    self.xml.leaf(tag, &[], &text);
                }
            }
            FieldData::Reference(placeholder) => {
                self.xml.leaf(tag, &[], &placeholder.identifier);
            }
            FieldData::Record(nested) => {
                let actual = nested.descriptor.key();
                let type_name = match declared {
                    FieldType::Compound(key) if *key != actual => {
                        Some(self.loader.written_type_name(actual))
                    }
                    _ => None,
                };
                let type_attr = self.loader.config().attributes.type_override.clone();
                let attrs: Vec<(&str, &str)> = type_name
                    .as_deref()
                    .map(|name| (type_attr.as_str(), name))
                    .into_iter()
                    .collect();
                self.write_record(tag, &attrs, nested);
            }
            FieldData::Collection(collection) => {
                if collection.elements.is_empty() {
                    self.xml.empty(tag, &[]);
                    return;
                }
                let element = declared.element().cloned().unwrap_or_else(|| declared.clone());
                let item = self.loader.config().collection_item_element.clone();
                self.xml.open(tag, &[]);
                for data in &collection.elements {
                    self.write_data(&item, &element, data);
                }
                self.xml.close(tag);
            }
        }
    }

    fn encode(&mut self, ty: &FieldType, value: &Value, field: &str) -> Option<String> {
        let codec = self.loader.codecs().best_codec_for(ty)?;
        let cx = CodecContext {
            types: self.loader.types(),
            namespace: self.loader.config().standard_namespace.as_deref(),
        };
        match panic::catch_unwind(AssertUnwindSafe(|| codec.encode(value, &cx))) {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                self.diagnostics.error(&self.location, format!("field {field}: {e}"));
                None
            }
            Err(_) => {
                self.diagnostics.error(
                    &self.location,
                    format!("codec {} panicked while writing field {field}", codec.name()),
                );
                None
            }
        }
    }
}

fn entry(name: &'static str, data: FieldData) -> FieldEntry {
    FieldEntry {
        name,
        data,
        policy: None,
        line: None,
    }
}

// ---------------------------------------------------------------------------
// XML text
// ---------------------------------------------------------------------------

/// Indented element writer over `quick_xml`. The first write error is kept
/// and reported once the document is finished.
struct XmlWriter {
    inner: Writer<Vec<u8>>,
    failure: Option<String>,
}

impl XmlWriter {
    fn new(indent: &str) -> Self {
        let inner = match indent.as_bytes().first() {
            Some(&unit) => Writer::new_with_indent(Vec::new(), unit, indent.len()),
            None => Writer::new(Vec::new()),
        };
        Self { inner, failure: None }
    }

    fn emit(&mut self, event: Event<'_>) {
        if self.failure.is_some() {
            return;
        }
        if let Err(e) = self.inner.write_event(event) {
            self.failure = Some(e.to_string());
        }
    }

    fn start<'t>(tag: &'t str, attrs: &[(&str, &str)]) -> BytesStart<'t> {
        let mut start = BytesStart::new(tag);
        for &attr in attrs {
            start.push_attribute(attr);
        }
        start
    }

    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.emit(Event::Start(Self::start(tag, attrs)));
    }

    fn close(&mut self, tag: &str) {
        self.emit(Event::End(BytesEnd::new(tag)));
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.emit(Event::Empty(Self::start(tag, attrs)));
    }

    /// Element holding only text. Carriage returns are written as character
    /// references so they survive end-of-line normalization on read.
    fn leaf(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) {
        self.open(tag, attrs);
        let escaped = escape(text);
        let text = if escaped.contains('\r') {
            BytesText::from_escaped(escaped.replace('\r', "&#13;"))
        } else {
            BytesText::from_escaped(escaped)
        };
        self.emit(Event::Text(text));
        self.close(tag);
    }

    fn finish(self) -> Result<String, String> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        String::from_utf8(self.inner.into_inner()).map_err(|e| e.to_string())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
