//! STEP file reader: turns a STEP file into an ordered list of face descriptors.

use std::path::Path;

use crate::entities::{ordered_face_ids, parse_face, parse_loop_points, parse_surface, to_ir};
use crate::error::StepError;
use crate::parser::{Parser, StepFile};
use facetag_ir::{Bounds, FaceDescriptor};
use tracing::{debug, warn};

/// A loaded STEP document: its text and its faces in stable order.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// Full file text, kept for annotation extraction and export.
    pub text: String,
    /// One descriptor per face. Position in this list is the face index.
    pub faces: Vec<FaceDescriptor>,
}

/// Source of faces for a document session.
///
/// Loading is all-or-nothing: an implementation either returns every face of
/// the file or an error.
pub trait Loader {
    /// Load the model at `path`.
    fn load(&self, path: &Path) -> Result<LoadedModel, StepError>;
}

/// [`Loader`] for ISO 10303-21 files.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepLoader;

impl Loader for StepLoader {
    fn load(&self, path: &Path) -> Result<LoadedModel, StepError> {
        read_step(path)
    }
}

/// Read a STEP file from a path.
pub fn read_step(path: impl AsRef<Path>) -> Result<LoadedModel, StepError> {
    let data = std::fs::read(path.as_ref())?;
    let text = match String::from_utf8(data) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.as_ref().display(), "STEP file is not valid UTF-8, replacing bytes");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };
    let faces = read_faces(&text)?;
    Ok(LoadedModel { text, faces })
}

/// Parse STEP text and describe every face.
pub fn read_faces(text: &str) -> Result<Vec<FaceDescriptor>, StepError> {
    let file = Parser::parse(text.as_bytes())?;
    let face_ids = ordered_face_ids(&file)?;
    if face_ids.is_empty() {
        return Err(StepError::NoFaces);
    }

    let faces = face_ids
        .into_iter()
        .map(|id| describe_face(&file, id))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(faces = faces.len(), "read faces");
    Ok(faces)
}

fn describe_face(file: &StepFile, id: u64) -> Result<FaceDescriptor, StepError> {
    let face = parse_face(file, id)?;
    let surface = parse_surface(file, face.surface_id)?;

    // Inner loops lie inside the outer one; faces without an outer bound
    // (closed cylinders) use every loop.
    let has_outer = face.bounds.iter().any(|b| b.is_outer);
    let mut points = Vec::new();
    for bound in face.bounds.iter().filter(|b| b.is_outer || !has_outer) {
        points.extend(parse_loop_points(file, bound.loop_id)?);
    }

    Ok(FaceDescriptor {
        entity_id: face.id,
        label: face.name,
        surface,
        bounds: Bounds::from_points(points.iter().map(to_ir)),
    })
}
