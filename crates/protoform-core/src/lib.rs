//! Protoform Core -- data-driven content loading into typed object graphs.
//!
//! Content is authored as container documents of records. Each record names
//! a registered type and carries field values as child elements. The loader
//! turns those documents into live root objects, resolving prototype
//! inheritance and cross-record references along the way.
//!
//! # Load Pipeline
//!
//! Each call to [`engine::Loader::parse`] runs these phases over every
//! supplied document at once:
//!
//! 1. **Pre-parse** -- Read each document, check its container element and
//!    create an empty [`record::Record`] per record element.
//! 2. **Instantiate** -- Create one bare instance per identified
//!    non-abstract root, so references can find their targets.
//! 3. **Decode** -- Fill each record's fields using the type registry and
//!    the codec registry.
//! 4. **Sort** -- Order records so every prototype precedes its children,
//!    cutting inheritance cycles.
//! 5. **Resolve** -- Bind reference placeholders to roots of this session
//!    or of an external pool.
//! 6. **Apply** -- Write inherited and own fields onto each instance,
//!    merging collections per override policy.
//!
//! Problems never abort a load; they are collected as
//! [`diagnostic::Diagnostic`]s and the affected record or field is skipped.
//!
//! # Key Types
//!
//! - [`engine::Loader`] -- Parse and serialize entry point.
//! - [`types::TypeRegistry`] -- Immutable registry of describable types
//!   (frozen at startup), with lazily built descriptors.
//! - [`codec::CodecRegistry`] -- Text codecs for leaf values.
//! - [`pool::RootPool`] -- Live roots addressed by identifier.
//! - [`reflect::Ref`] and [`reflect::Poly`] -- Reference and polymorphic
//!   field types.
//! - [`config::LoaderConfig`] -- Element and attribute names, null token and
//!   default override policy; loadable from TOML or RON.

pub mod codec;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod math;
pub mod pool;
pub mod record;
pub mod reflect;
pub mod serialize;
pub mod sort;
pub mod types;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use engine::{LoadError, Loader, ParseContext, ParseOutput};
pub use serialize::SerializeOutput;
