//! The loader: documents in, root instances and diagnostics out.
//!
//! # Pipeline
//!
//! Every call to [`Loader::parse`] runs one session through six phases, each
//! finishing before the next starts:
//!
//! 1. **Pre-parse** -- Read each document and create an empty [`Record`]
//!    per record element.
//! 2. **Instantiate** -- Check identifiers and create a bare root instance
//!    for every non-abstract record, so any reference can find its target.
//! 3. **Decode** -- Fill each record's fields from its element.
//! 4. **Sort** -- Order records so ancestors precede descendants; unknown
//!    parents and cycles are reported and their edges dropped.
//! 5. **Resolve** -- Bind reference placeholders to session or external roots.
//! 6. **Apply** -- Write ancestor fields (farthest first), then the record's
//!    own fields, onto each instance.
//!
//! Recoverable problems become [`Diagnostic`](crate::diagnostic::Diagnostic)s;
//! only mismatched input slices are a hard error.

use crate::codec::CodecRegistry;
use crate::config::{LoaderConfig, OverridePolicy};
use crate::diagnostic::{Diagnostics, Location};
use crate::pool::RootPool;
use crate::record::{line_of, FieldData, Record, RecordDecoder, RecordLibrary};
use crate::reflect::{Described, Reflect};
use crate::sort::inheritance_order;
use crate::types::TypeRegistry;
use crate::value::{RootRef, Value};
use roxmltree::{Document, Node};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Caller contract violations. Everything else is a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("{documents} documents but {filenames} file names")]
    MismatchedInputs { documents: usize, filenames: usize },
}

/// Earlier results a parse call may build on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext<'a> {
    /// Roots outside the session that references may name, searched in
    /// order after the session's own roots.
    pub external: &'a [&'a RootPool],
    /// Records of earlier sessions that records may inherit from.
    pub library: Option<&'a RecordLibrary>,
}

/// Result of one parse session.
#[derive(Debug, Default)]
pub struct ParseOutput {
    /// One instance per valid non-abstract record, in document order.
    pub roots: RootPool,
    pub diagnostics: Diagnostics,
    /// Every identified record of the session, abstract ones included.
    pub records: RecordLibrary,
}

impl ParseOutput {
    pub fn get<T: Described>(&self, identifier: &str) -> Option<&T> {
        self.roots.get_as::<T>(identifier)
    }
}

/// Parses and serializes documents against a frozen type registry.
#[derive(Debug, Clone)]
pub struct Loader {
    types: Arc<TypeRegistry>,
    codecs: Arc<CodecRegistry>,
    config: LoaderConfig,
}

impl Loader {
    /// Standard codecs, default configuration.
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            codecs: CodecRegistry::standard(),
            config: LoaderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Parse `documents` as one session. `filenames[i]` names `documents[i]`
    /// in diagnostics.
    pub fn parse(
        &self,
        documents: &[&str],
        filenames: &[&str],
        external: Option<&RootPool>,
    ) -> Result<ParseOutput, LoadError> {
        let external: Vec<&RootPool> = external.into_iter().collect();
        self.parse_with(
            documents,
            filenames,
            ParseContext {
                external: &external,
                library: None,
            },
        )
    }

    /// Like [`parse`](Self::parse), with records of earlier sessions
    /// available as inheritance parents.
    pub fn parse_with(
        &self,
        documents: &[&str],
        filenames: &[&str],
        cx: ParseContext<'_>,
    ) -> Result<ParseOutput, LoadError> {
        if documents.len() != filenames.len() {
            return Err(LoadError::MismatchedInputs {
                documents: documents.len(),
                filenames: filenames.len(),
            });
        }

        let mut diagnostics = Diagnostics::new();
        let mut pool = RootPool::new();

        // Phases 1-3 work on borrowed document trees.
        let mut parsed = Vec::with_capacity(documents.len());
        for (text, name) in documents.iter().zip(filenames) {
            let file: Arc<str> = Arc::from(*name);
            match Document::parse(text) {
                Ok(doc) => parsed.push((file, doc)),
                Err(e) => diagnostics.error(
                    &Location::new(file, Some(e.pos().row)),
                    format!("malformed document: {e}"),
                ),
            }
        }

        let mut shells = Vec::new();
        for (file, doc) in &parsed {
            self.collect_shells(file, doc, &mut shells, &mut diagnostics);
        }
        self.instantiate(&mut shells, &mut pool, &mut diagnostics);
        for shell in shells.iter_mut().filter(|s| !s.record.invalid) {
            let mut decoder = RecordDecoder {
                types: &self.types,
                codecs: &self.codecs,
                config: &self.config,
                file: Arc::clone(&shell.record.location.file),
                diagnostics: &mut diagnostics,
            };
            decoder.decode_fields(&mut shell.record, shell.node);
        }
        let mut records: Vec<Record> = shells
            .into_iter()
            .map(|s| s.record)
            .filter(|r| !r.invalid)
            .collect();
        drop(parsed);
        log::debug!(
            target: "protoform",
            "decoded {} records from {} documents, {} roots",
            records.len(),
            documents.len(),
            pool.len()
        );

        let (order, links) = self.sort(&records, cx.library, &mut diagnostics);
        let resolved = resolve_references(&mut records, &pool, cx.external, &mut diagnostics);
        log::debug!(target: "protoform", "resolved {resolved} references");

        let mut applier = Applier {
            types: &self.types,
            config: &self.config,
            diagnostics: &mut diagnostics,
            reported: HashSet::new(),
        };
        for &index in &order {
            let record = &records[index];
            if record.is_abstract {
                continue;
            }
            let Some(id) = record.identifier.as_deref() else {
                continue;
            };
            let Some(instance) = pool.get_mut(id) else {
                continue;
            };
            let chain = ancestor_chain(index, &records, &links, cx.library);
            for ancestor in chain.iter().rev() {
                applier.apply_record(instance, ancestor);
            }
            applier.apply_record(instance, record);
            log::trace!(
                target: "protoform",
                "applied {id} with {} ancestors",
                chain.len()
            );
        }

        let mut library = RecordLibrary::new();
        for record in records {
            library.insert(record);
        }

        if diagnostics.has_errors() {
            log::warn!(
                target: "protoform",
                "parse finished with {} errors",
                diagnostics.error_count()
            );
        }
        Ok(ParseOutput {
            roots: pool,
            diagnostics,
            records: library,
        })
    }

    // -----------------------------------------------------------------------
    // Phase 1: record shells
    // -----------------------------------------------------------------------

    fn collect_shells<'d, 'i>(
        &self,
        file: &Arc<str>,
        doc: &'d Document<'i>,
        shells: &mut Vec<Shell<'d, 'i>>,
        diagnostics: &mut Diagnostics,
    ) {
        let root = doc.root_element();
        let at = |node: Node<'_, '_>| Location::new(Arc::clone(file), line_of(node));

        if root.tag_name().name() != self.config.container_element {
            diagnostics.error(
                &at(root),
                format!(
                    "expected <{}> as document element, found <{}>",
                    self.config.container_element,
                    root.tag_name().name()
                ),
            );
            return;
        }

        let attrs = &self.config.attributes;
        let container_type = root.attribute(attrs.type_override.as_str());
        for node in root.children() {
            if node.is_text() {
                if node.text().is_some_and(|t| !t.trim().is_empty()) {
                    diagnostics.error(&at(node), "unexpected text between records");
                }
                continue;
            }
            if !node.is_element() {
                continue;
            }

            let written = node
                .attribute(attrs.type_override.as_str())
                .or(container_type)
                .unwrap_or_else(|| node.tag_name().name());
            let namespace = self.config.standard_namespace.as_deref();
            let Some(descriptor) = self.types.lookup_by_name(written, namespace) else {
                diagnostics.error(&at(node), format!("unknown record type {written}"));
                continue;
            };
            if !descriptor.is_root() {
                diagnostics.error(
                    &at(node),
                    format!("type {} cannot be used as a record: it has no identifier", descriptor.full_name()),
                );
                continue;
            }

            let mut record = Record::new(descriptor, at(node));
            let text_attr = |name: &str| {
                node.attribute(name)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            record.identifier = text_attr(attrs.identifier.as_str());
            record.inherits = text_attr(attrs.inherits.as_str());
            if let Some(flag) = text_attr(attrs.is_abstract.as_str()) {
                if flag.eq_ignore_ascii_case("true") {
                    record.is_abstract = true;
                } else if !flag.eq_ignore_ascii_case("false") {
                    diagnostics.error(&at(node), format!("invalid {} value {flag:?}", attrs.is_abstract));
                }
            }
            shells.push(Shell { record, node });
        }
    }

    // -----------------------------------------------------------------------
    // Phase 3: instantiate
    // -----------------------------------------------------------------------

    fn instantiate(&self, shells: &mut [Shell<'_, '_>], pool: &mut RootPool, diagnostics: &mut Diagnostics) {
        let mut seen = HashSet::new();
        for shell in shells.iter_mut() {
            let record = &mut shell.record;
            let Some(id) = record.identifier.clone() else {
                let message = format!("record of type {} has no identifier", record.descriptor.name());
                if record.is_abstract {
                    diagnostics.warning(&record.location, format!("abstract {message} and is ignored"));
                } else {
                    diagnostics.error(&record.location, message);
                }
                record.invalid = true;
                continue;
            };
            if !seen.insert(id.clone()) {
                diagnostics.error(&record.location, format!("duplicate identifier {id}"));
                record.invalid = true;
                continue;
            }
            if record.is_abstract {
                continue;
            }

            let mut instance = record.descriptor.create();
            instance.set_identifier(&id);
            if let Err(e) = pool.insert(instance) {
                diagnostics.error(&record.location, e.to_string());
                record.invalid = true;
            }
        }
        log::debug!(target: "protoform", "instantiated {} roots", pool.len());
    }

    // -----------------------------------------------------------------------
    // Phase 4: sort
    // -----------------------------------------------------------------------

    fn sort(
        &self,
        records: &[Record],
        library: Option<&RecordLibrary>,
        diagnostics: &mut Diagnostics,
    ) -> (Vec<usize>, Vec<Link>) {
        let index: HashMap<&str, usize> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.identifier.as_deref().map(|id| (id, i)))
            .collect();

        let mut links = Vec::with_capacity(records.len());
        let mut parents = Vec::with_capacity(records.len());
        for record in records {
            let link = match record.inherits.as_deref() {
                None => Link::None,
                Some(parent) => {
                    if let Some(&p) = index.get(parent) {
                        Link::Session(p)
                    } else if library.is_some_and(|l| l.contains(parent)) {
                        Link::Library(parent.to_string())
                    } else {
                        diagnostics.error(
                            &record.location,
                            format!("unknown parent {parent}; inheritance ignored"),
                        );
                        Link::None
                    }
                }
            };
            parents.push(match link {
                Link::Session(p) => Some(p),
                _ => None,
            });
            links.push(link);
        }

        let outcome = inheritance_order(&parents);
        for cycle in &outcome.cycles {
            let ids: Vec<&str> = cycle
                .iter()
                .map(|&i| records[i].identifier.as_deref().unwrap_or("?"))
                .collect();
            let (Some(&first), Some(&cut)) = (cycle.first(), cycle.last()) else {
                continue;
            };
            let first_id = records[first].identifier.as_deref().unwrap_or("?");
            diagnostics.error(
                &records[cut].location,
                format!(
                    "inheritance cycle {} -> {first_id}; {} no longer inherits {first_id}",
                    ids.join(" -> "),
                    records[cut].identifier.as_deref().unwrap_or("?"),
                ),
            );
            links[cut] = Link::None;
        }
        (outcome.order, links)
    }
}

// ---------------------------------------------------------------------------
// Session internals
// ---------------------------------------------------------------------------

/// A record still attached to its document node.
struct Shell<'d, 'i> {
    record: Record,
    node: Node<'d, 'i>,
}

/// Where a record's parent lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Link {
    None,
    Session(usize),
    Library(String),
}

/// Ancestors of `index`, nearest first.
fn ancestor_chain<'r>(
    index: usize,
    records: &'r [Record],
    links: &[Link],
    library: Option<&'r RecordLibrary>,
) -> Vec<&'r Record> {
    let mut chain = Vec::new();
    let mut visited_session = HashSet::from([index]);
    let mut visited_library = HashSet::new();
    let mut link = links[index].clone();
    loop {
        match link {
            Link::None => break,
            Link::Session(p) => {
                if !visited_session.insert(p) {
                    break;
                }
                chain.push(&records[p]);
                link = links[p].clone();
            }
            Link::Library(id) => {
                let Some(parent) = library.and_then(|l| l.get(&id)) else {
                    break;
                };
                if !visited_library.insert(id) {
                    break;
                }
                chain.push(parent);
                link = match &parent.inherits {
                    Some(next) => Link::Library(next.clone()),
                    None => Link::None,
                };
            }
        }
    }
    chain
}

/// Phase 5. Returns how many placeholders were bound.
fn resolve_references(
    records: &mut [Record],
    pool: &RootPool,
    external: &[&RootPool],
    diagnostics: &mut Diagnostics,
) -> usize {
    let mut resolved = 0;
    for record in records.iter_mut() {
        let location = record.location.clone();
        record.for_each_reference_mut(&mut |placeholder| {
            let target = pool
                .get(&placeholder.identifier)
                .or_else(|| external.iter().find_map(|e| e.get(&placeholder.identifier)));
            match target {
                Some(root) => {
                    placeholder.resolved = Some(RootRef {
                        identifier: placeholder.identifier.clone(),
                        target: root.type_key(),
                    });
                    resolved += 1;
                }
                None => diagnostics.error(
                    &location.at_line(placeholder.line),
                    format!("unresolved reference {}", placeholder.identifier),
                ),
            }
        });
    }
    resolved
}

/// Phase 6: writes record fields onto live instances.
struct Applier<'a> {
    types: &'a TypeRegistry,
    config: &'a LoaderConfig,
    diagnostics: &'a mut Diagnostics,
    /// Ancestors are applied once per descendant; each problem is reported
    /// once per record, keyed by the record's address.
    reported: HashSet<(usize, String)>,
}

impl Applier<'_> {
    fn error(&mut self, record: &Record, location: &Location, message: String) {
        if self.reported.insert((std::ptr::from_ref(record) as usize, message.clone())) {
            self.diagnostics.error(location, message);
        }
    }

    fn apply_record(&mut self, instance: &mut dyn Reflect, record: &Record) {
        let Some(descriptor) = self.types.lookup(instance.type_key()) else {
            self.error(
                record,
                &record.location,
                format!("type {} is not registered", instance.type_key().full_name()),
            );
            return;
        };

        for entry in &record.fields {
            let location = record.location.at_line(entry.line);
            let Some(field) = descriptor.field(entry.name) else {
                self.error(
                    record,
                    &location,
                    format!("unknown field {} on type {}", entry.name, descriptor.full_name()),
                );
                continue;
            };
            let policy = entry.policy.unwrap_or(self.config.default_override_policy);
            let existing = instance.get_field(entry.name);
            let value = self.materialize(&entry.data, existing, policy);
            // An unresolved reference was already reported; a required field
            // keeps what it had.
            if value.is_null() && !field.nullable && matches!(entry.data, FieldData::Reference(_)) {
                continue;
            }
            if !self.types.accepts(field, &value) {
                self.error(
                    record,
                    &location,
                    format!(
                        "field {}: a value of kind {} is not assignable to {}",
                        field.name,
                        value.kind(),
                        field.ty
                    ),
                );
                continue;
            }
            if let Err(e) = instance.set_field(entry.name, value) {
                self.error(record, &location, e.to_string());
            }
        }
    }

    /// The value a field entry contributes, merged with what the instance
    /// already holds. An unresolved reference contributes null.
    fn materialize(&mut self, data: &FieldData, existing: Option<Value>, policy: OverridePolicy) -> Value {
        match data {
            FieldData::Value(v) => v.clone(),
            FieldData::Reference(p) => p.resolved.clone().map_or(Value::Null, Value::Reference),
            FieldData::Record(child) => {
                let mut target = match existing {
                    Some(Value::Record(current)) if current.type_key() == child.descriptor.key() => current,
                    _ => child.descriptor.create(),
                };
                self.apply_record(target.as_mut(), child);
                Value::Record(target)
            }
            FieldData::Collection(collection) => {
                let items: Vec<Value> = collection
                    .elements
                    .iter()
                    .filter(|element| !matches!(element, FieldData::Reference(p) if p.resolved.is_none()))
                    .map(|element| self.materialize(element, None, OverridePolicy::Replace))
                    .collect();
                match (policy, existing) {
                    (OverridePolicy::Combine, Some(Value::List(mut inherited))) => {
                        inherited.extend(items);
                        Value::List(inherited)
                    }
                    _ => Value::List(items),
                }
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
