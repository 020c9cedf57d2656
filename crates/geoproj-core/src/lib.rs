//! Core types and trait definitions for the geoproj import service.
//!
//! No HTTP, database or GIS code lives here. Adapter crates implement
//! [`store::ProjectStore`], [`engine::GeometryEngine`] and
//! [`spatial::SpatialDatabase`]; the workflow and API crates see only the
//! traits.

pub mod dataset;
pub mod engine;
pub mod error;
pub mod layer;
pub mod naming;
pub mod project;
pub mod spatial;
pub mod store;

pub use error::{Error, Result};
