#![warn(missing_docs)]

//! STEP support for facetag.
//!
//! Reads the faces of a STEP file (ISO 10303-21) as
//! [`FaceDescriptor`](facetag_ir::FaceDescriptor)s and carries face metadata
//! inside the file text, where it survives tools that know nothing about it.
//!
//! # Example
//!
//! ```no_run
//! use facetag_step::{annotate, read_step};
//!
//! let model = read_step("model.step").unwrap();
//! println!("{} faces", model.faces.len());
//!
//! let meta = annotate::extract(&model.text);
//! println!("{} annotated faces", meta.len());
//! ```

pub mod annotate;
mod entities;
mod error;
mod exporter;
pub mod lexer;
pub mod parser;
mod reader;

#[cfg(test)]
mod test_fixtures;

pub use annotate::{embed, extract, strip, Extraction, Strategy, StripReport, Stripped};
pub use error::StepError;
pub use exporter::{Exporter, StepExporter};
pub use reader::{read_faces, read_step, LoadedModel, Loader, StepLoader};
