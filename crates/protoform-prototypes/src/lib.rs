//! Accumulating prototype parser.
//!
//! [`PrototypeParser`] wraps a [`Loader`] and keeps everything earlier calls
//! produced: roots stay addressable by later references, identified records
//! stay available as inheritance parents, and diagnostics pile up until
//! taken.

use protoform_core::diagnostic::{Diagnostics, Location};
use protoform_core::engine::{LoadError, Loader, ParseContext};
use protoform_core::pool::RootPool;
use protoform_core::record::RecordLibrary;
use protoform_core::reflect::{Described, Reflect};
use std::sync::Arc;

/// Parses documents across many calls into one growing root pool.
#[derive(Debug)]
pub struct PrototypeParser {
    loader: Loader,
    roots: RootPool,
    records: RecordLibrary,
    diagnostics: Diagnostics,
}

impl PrototypeParser {
    pub fn new(loader: Loader) -> Self {
        Self {
            loader,
            roots: RootPool::new(),
            records: RecordLibrary::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Parse one document. Returns how many roots it added.
    pub fn parse(&mut self, text: &str, filename: &str) -> usize {
        self.parse_inner(&[text], &[filename], None).unwrap_or_default()
    }

    /// Parse several documents as one session. Returns how many roots they
    /// added.
    pub fn parse_many(&mut self, texts: &[&str], filenames: &[&str]) -> Result<usize, LoadError> {
        self.parse_inner(texts, filenames, None)
    }

    /// Like [`parse_many`](Self::parse_many), with `external` roots also
    /// available to references. External roots are not kept.
    pub fn parse_with_external(
        &mut self,
        texts: &[&str],
        filenames: &[&str],
        external: &RootPool,
    ) -> Result<usize, LoadError> {
        self.parse_inner(texts, filenames, Some(external))
    }

    fn parse_inner(
        &mut self,
        texts: &[&str],
        filenames: &[&str],
        external: Option<&RootPool>,
    ) -> Result<usize, LoadError> {
        let pools: Vec<&RootPool> = std::iter::once(&self.roots).chain(external).collect();
        let mut output = self.loader.parse_with(
            texts,
            filenames,
            ParseContext {
                external: &pools,
                library: Some(&self.records),
            },
        )?;
        self.diagnostics.extend(output.diagnostics);

        // Identifiers are unique across calls; the first definition wins.
        let mut duplicates: Vec<(String, Location)> = output
            .records
            .iter()
            .filter(|(id, _)| self.records.contains(id))
            .map(|(id, record)| (id.to_string(), record.location.clone()))
            .collect();
        // A redefinition contributes no root, even when the earlier one was
        // abstract and never became one.
        duplicates.sort_by(|a, b| (&a.1.file, a.1.line).cmp(&(&b.1.file, b.1.line)));
        for (id, location) in duplicates {
            self.diagnostics.error(
                &location,
                format!("duplicate identifier {id} (defined by an earlier parse)"),
            );
            output.roots.remove(&id);
        }

        let before = self.roots.len();
        for rejected in self.roots.merge(output.roots) {
            self.diagnostics
                .error(&Location::new(Arc::from("<merge>"), None), rejected.to_string());
        }
        self.records.extend(output.records);

        let added = self.roots.len() - before;
        log::debug!(
            target: "protoform",
            "prototype parser added {added} roots ({} total, {} records)",
            self.roots.len(),
            self.records.len()
        );
        Ok(added)
    }

    /// Every root so far, in parse order.
    pub fn roots(&self) -> &RootPool {
        &self.roots
    }

    /// Identified records so far, abstract ones included.
    pub fn records(&self) -> &RecordLibrary {
        &self.records
    }

    pub fn get<T: Described>(&self, identifier: &str) -> Option<&T> {
        self.roots.get_as::<T>(identifier)
    }

    pub fn get_dyn(&self, identifier: &str) -> Option<&dyn Reflect> {
        self.roots.get(identifier)
    }

    /// Roots of exactly type `T`, in parse order.
    pub fn prototypes<T: Described>(&self) -> impl Iterator<Item = &T> {
        self.roots.iter_as::<T>()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Hand over accumulated diagnostics, leaving none behind.
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// Give up the parser, keeping its roots.
    pub fn into_roots(self) -> RootPool {
        self.roots
    }
}
