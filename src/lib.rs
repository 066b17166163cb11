//! Source Sheet Library
//!
//! Turns scanned pages into a sheet of named, referenced source excerpts.
//!
//! # Modules
//!
//! - `region`: Region model and the editing operations on it
//! - `page`: Page rasters and the rasterizer collaborator
//! - `clip`: Rotation-aware clipping of regions out of pages
//! - `detect`: First-draft regions from an external detection service
//! - `identify`: Candidate corpus matches, verified against canonical text
//! - `sheet`: Persisted sheet document and composite preview
//! - `session`: Orchestration of one document from upload to save
//! - `config`: Environment configuration for the external services

pub mod clip;
pub mod codec;
pub mod config;
pub mod detect;
pub mod error;
pub mod identify;
pub mod page;
pub mod region;
pub mod session;
pub mod sheet;
pub mod telemetry;

pub use error::{Result, SheetError};
pub use session::{DetectionProgress, SheetSession, SheetStorage, StorageError};
