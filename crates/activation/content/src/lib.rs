//! Data-driven content definitions and loaders.
//!
//! This crate houses a sample catalog of actions and actors stored as RON and
//! the loaders that turn it into activation-core types. Content is consumed by
//! entity resolvers and never appears in replicated records except through
//! identifiers.

pub mod loaders;

pub use loaders::{ActionCatalog, ActorCatalog, Catalog, CatalogAction};
