#![warn(missing_docs)]

//! Per-face annotations for STEP models that survive reloads and exports.
//!
//! A [`Workspace`] holds one loaded document. Every face gets a fingerprint
//! computed from its geometry; annotations (color, thread, tolerance) are
//! stored under that fingerprint in a SQLite store and embedded in the STEP
//! file on export, so they find their face again even after the file has
//! been rewritten and its face order has changed.
//!
//! # Example
//!
//! ```no_run
//! use facetag::{FaceUpdate, FacetagConfig, PurgeScope, Workspace};
//!
//! let mut ws = Workspace::open(FacetagConfig::default()).unwrap();
//! let loaded = ws.import("bracket.step".as_ref()).unwrap();
//!
//! ws.set_color(&[FaceUpdate::set(3, "#FF0000".to_string())]).unwrap();
//! let exported = ws.export().unwrap();
//! println!("wrote {}", exported.path.display());
//!
//! ws.purge(&loaded.document_id, PurgeScope::File).unwrap();
//! ```

mod config;
mod edit;
mod error;
mod holes;
mod purge;
mod session;
mod workspace;

pub use config::{ConfigError, FacetagConfig};
pub use edit::{BatchReport, FaceUpdate};
pub use error::SessionError;
pub use holes::{group_holes, HoleGroup, DIAMETER_DECIMALS};
pub use purge::{PurgeReport, PurgeScope};
pub use session::{DocumentSession, FaceSummary, LoadedDocument, SessionFace, UNKNOWN_FINGERPRINT};
pub use workspace::{ExportedFile, LoadSummary, Workspace, STEP_EXTENSIONS};

pub use facetag_ir::{
    Attribute, AttributeKind, Color, FaceIndex, FaceMetadata, Fingerprint, ThreadSpec, ToleranceSpec,
};
pub use facetag_store::{StoreEntry, StoreStats};
