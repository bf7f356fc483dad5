//! In-memory state of the active document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use facetag_ir::{
    Attribute, AttributeKind, EmbeddedMetadata, FaceDescriptor, FaceIndex, FaceMetadata,
    Fingerprint, MetadataMap,
};
use serde::Serialize;

use crate::error::SessionError;

/// Rendered in place of a fingerprint that could not be computed.
pub const UNKNOWN_FINGERPRINT: &str = "unknown";

/// One face of the loaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFace {
    /// Geometry as read by the loader.
    pub descriptor: FaceDescriptor,
    /// `None` when the surface cannot be fingerprinted.
    pub fingerprint: Option<Fingerprint>,
}

/// Per-face overview returned by loads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceSummary {
    /// Current face index.
    pub index: FaceIndex,
    /// Surface kind, e.g. `cylinder`.
    pub surface: String,
    /// Face name from the file, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Fingerprint hex, or `unknown`.
    pub fingerprint: String,
    /// Current annotations.
    pub meta: FaceMetadata,
}

/// A loaded document.
///
/// Faces, fingerprints and descriptors live side by side in one list, so
/// they always have the same length. Metadata keys are always valid face
/// indices and records in the map are never empty.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    id: String,
    path: PathBuf,
    text: String,
    faces: Vec<SessionFace>,
    meta: MetadataMap,
}

impl LoadedDocument {
    /// A document with no metadata yet.
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, text: String, faces: Vec<SessionFace>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            text,
            faces,
            meta: MetadataMap::new(),
        }
    }

    /// Document identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// File the document was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.text = text;
    }

    /// Faces in index order.
    pub fn faces(&self) -> &[SessionFace] {
        &self.faces
    }

    /// Number of faces.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Fingerprint of a face, `None` if unknown or out of range.
    pub fn fingerprint(&self, index: FaceIndex) -> Option<&Fingerprint> {
        self.faces.get(index).and_then(|f| f.fingerprint.as_ref())
    }

    /// Descriptor of a face.
    pub fn descriptor(&self, index: FaceIndex) -> Option<&FaceDescriptor> {
        self.faces.get(index).map(|f| &f.descriptor)
    }

    /// Every known fingerprint, in face order, without duplicates.
    pub fn known_fingerprints(&self) -> Vec<Fingerprint> {
        let mut seen = std::collections::HashSet::new();
        self.faces
            .iter()
            .filter_map(|f| f.fingerprint.clone())
            .filter(|fp| seen.insert(fp.clone()))
            .collect()
    }

    /// Live metadata.
    pub fn metadata(&self) -> &MetadataMap {
        &self.meta
    }

    /// Annotations of one face.
    pub fn metadata_for(&self, index: FaceIndex) -> Option<&FaceMetadata> {
        self.meta.get(&index)
    }

    fn check_index(&self, index: FaceIndex) -> Result<(), SessionError> {
        if index < self.faces.len() {
            Ok(())
        } else {
            Err(SessionError::invalid(format!(
                "face {index} out of range (document has {} faces)",
                self.faces.len()
            )))
        }
    }

    /// The record `index` would have after `edit`, leaving the document
    /// untouched. Pair with [`LoadedDocument::commit`].
    pub fn edited(
        &self,
        index: FaceIndex,
        edit: impl FnOnce(&mut FaceMetadata),
    ) -> Result<FaceMetadata, SessionError> {
        self.check_index(index)?;
        let mut record = self.meta.get(&index).cloned().unwrap_or_default();
        edit(&mut record);
        Ok(record)
    }

    /// Replace the record of `index`. An empty record drops the face from
    /// the map.
    pub fn commit(&mut self, index: FaceIndex, record: FaceMetadata) {
        if record.is_empty() {
            self.meta.remove(&index);
        } else {
            self.meta.insert(index, record);
        }
    }

    /// Set an attribute on a face. Returns the face's record afterwards.
    pub fn set(&mut self, index: FaceIndex, attribute: Attribute) -> Result<FaceMetadata, SessionError> {
        let record = self.edited(index, |r| r.set(attribute))?;
        self.commit(index, record.clone());
        Ok(record)
    }

    /// Remove an attribute from a face. A record left empty is dropped.
    /// Returns the face's record afterwards, possibly empty.
    pub fn remove(&mut self, index: FaceIndex, kind: AttributeKind) -> Result<FaceMetadata, SessionError> {
        let record = self.edited(index, |r| {
            r.remove(kind);
        })?;
        self.commit(index, record.clone());
        Ok(record)
    }

    /// Forget all metadata. Returns how many faces had some.
    pub fn clear_metadata(&mut self) -> usize {
        let cleared = self.meta.len();
        self.meta.clear();
        cleared
    }

    /// Apply metadata recovered from the file. Entries with a fingerprint go
    /// to every face with that fingerprint; entries without one go to the
    /// face at their index. Returns the number of faces annotated.
    pub fn apply_embedded(&mut self, embedded: &EmbeddedMetadata) -> usize {
        let by_fingerprint = embedded.by_fingerprint();
        let mut applied = 0;

        for (index, face) in self.faces.iter().enumerate() {
            let Some(meta) = face.fingerprint.as_ref().and_then(|fp| by_fingerprint.get(fp)) else {
                continue;
            };
            self.meta.insert(index, meta.clone());
            applied += 1;
        }

        for entry in embedded.faces.iter().filter(|e| e.fingerprint.is_none()) {
            if entry.index < self.faces.len() && !self.meta.contains_key(&entry.index) {
                self.meta.insert(entry.index, entry.meta.clone());
                applied += 1;
            }
        }
        applied
    }

    /// Apply records from the fingerprint store, replacing anything the
    /// file provided for the same face. Returns the number of faces
    /// annotated.
    pub fn apply_stored(&mut self, stored: &HashMap<Fingerprint, FaceMetadata>) -> usize {
        let mut applied = 0;
        for (index, face) in self.faces.iter().enumerate() {
            let Some(meta) = face.fingerprint.as_ref().and_then(|fp| stored.get(fp)) else {
                continue;
            };
            if !meta.is_empty() {
                self.meta.insert(index, meta.clone());
                applied += 1;
            }
        }
        applied
    }

    /// Metadata in embeddable form.
    pub fn embedded(&self) -> EmbeddedMetadata {
        EmbeddedMetadata::from_map(&self.meta, |index| self.fingerprint(index).cloned())
    }

    /// Overview of every face.
    pub fn summary(&self) -> Vec<FaceSummary> {
        self.faces
            .iter()
            .enumerate()
            .map(|(index, face)| FaceSummary {
                index,
                surface: face.descriptor.surface.kind_name().to_string(),
                label: face.descriptor.label.clone(),
                fingerprint: face
                    .fingerprint
                    .as_ref()
                    .map_or_else(|| UNKNOWN_FINGERPRINT.to_string(), ToString::to_string),
                meta: self.meta.get(&index).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

/// The single document slot: empty, or holding one loaded document.
#[derive(Debug, Clone, Default)]
pub enum DocumentSession {
    /// Nothing loaded.
    #[default]
    Empty,
    /// A document is active.
    Loaded(LoadedDocument),
}

impl DocumentSession {
    /// The active document.
    pub fn loaded(&self) -> Result<&LoadedDocument, SessionError> {
        match self {
            DocumentSession::Loaded(doc) => Ok(doc),
            DocumentSession::Empty => Err(SessionError::NotLoaded),
        }
    }

    /// The active document, mutably.
    pub fn loaded_mut(&mut self) -> Result<&mut LoadedDocument, SessionError> {
        match self {
            DocumentSession::Loaded(doc) => Ok(doc),
            DocumentSession::Empty => Err(SessionError::NotLoaded),
        }
    }

    /// True when a document is active.
    pub fn is_loaded(&self) -> bool {
        matches!(self, DocumentSession::Loaded(_))
    }

    /// Identifier of the active document.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            DocumentSession::Loaded(doc) => Some(doc.id()),
            DocumentSession::Empty => None,
        }
    }

    /// Drop the active document.
    pub fn reset(&mut self) {
        *self = DocumentSession::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetag_ir::{Color, EmbeddedFace, SurfaceDescriptor, Vec3};

    fn face(radius: f64, fingerprint: Option<&str>) -> SessionFace {
        SessionFace {
            descriptor: FaceDescriptor {
                entity_id: 1,
                label: None,
                surface: SurfaceDescriptor::Cylinder {
                    origin: Vec3::new(0.0, 0.0, 0.0),
                    axis: Vec3::new(0.0, 0.0, 1.0),
                    radius,
                },
                bounds: None,
            },
            fingerprint: fingerprint.map(|b| Fingerprint::from_hex(&b.repeat(32)).unwrap()),
        }
    }

    fn doc() -> LoadedDocument {
        LoadedDocument::new(
            "doc",
            "documents/doc.step",
            String::new(),
            vec![face(1.0, Some("aa")), face(2.0, None), face(3.0, Some("cc"))],
        )
    }

    fn red() -> Attribute {
        Attribute::Color(Color::new(0xFF, 0, 0))
    }

    #[test]
    fn test_set_and_remove_last_attribute() {
        let mut doc = doc();
        let record = doc.set(0, red()).unwrap();
        assert_eq!(record.color, Some(Color::new(0xFF, 0, 0)));
        assert_eq!(doc.metadata().len(), 1);

        let record = doc.remove(0, AttributeKind::Color).unwrap();
        assert!(record.is_empty());
        assert!(doc.metadata().is_empty());
    }

    #[test]
    fn test_edited_leaves_document_until_commit() {
        let mut doc = doc();
        let staged = doc.edited(1, |r| r.set(red())).unwrap();
        assert!(doc.metadata().is_empty());

        doc.commit(1, staged);
        assert_eq!(doc.metadata_for(1).unwrap().color, Some(Color::new(0xFF, 0, 0)));
        doc.commit(1, FaceMetadata::default());
        assert!(doc.metadata().is_empty());
        assert!(doc.edited(99, |_| {}).is_err());
    }

    #[test]
    fn test_out_of_range_is_invalid() {
        let mut doc = doc();
        assert!(matches!(doc.set(3, red()), Err(SessionError::InvalidInput(_))));
        assert!(doc.metadata().is_empty());
    }

    #[test]
    fn test_apply_embedded_by_fingerprint_then_index() {
        let mut doc = doc();
        let mut meta = FaceMetadata::default();
        meta.set(red());
        let embedded = EmbeddedMetadata {
            faces: vec![
                // Index is stale; the fingerprint points at face 2.
                EmbeddedFace {
                    index: 0,
                    fingerprint: doc.fingerprint(2).cloned(),
                    meta: meta.clone(),
                },
                EmbeddedFace {
                    index: 1,
                    fingerprint: None,
                    meta: meta.clone(),
                },
                EmbeddedFace {
                    index: 9,
                    fingerprint: None,
                    meta: meta.clone(),
                },
            ],
        };

        assert_eq!(doc.apply_embedded(&embedded), 2);
        assert!(doc.metadata_for(0).is_none());
        assert_eq!(doc.metadata_for(1), Some(&meta));
        assert_eq!(doc.metadata_for(2), Some(&meta));
    }

    #[test]
    fn test_stored_overrides_embedded() {
        let mut doc = doc();
        let fp = doc.fingerprint(0).cloned().unwrap();
        let mut file_meta = FaceMetadata::default();
        file_meta.set(red());
        doc.apply_embedded(&EmbeddedMetadata {
            faces: vec![EmbeddedFace {
                index: 0,
                fingerprint: Some(fp.clone()),
                meta: file_meta,
            }],
        });

        let mut db_meta = FaceMetadata::default();
        db_meta.set(Attribute::Color(Color::new(0, 0, 0xFF)));
        let stored = [(fp, db_meta.clone())].into_iter().collect();
        assert_eq!(doc.apply_stored(&stored), 1);
        assert_eq!(doc.metadata_for(0), Some(&db_meta));
    }

    #[test]
    fn test_summary_marks_unknown_fingerprints() {
        let mut doc = doc();
        doc.set(2, red()).unwrap();
        let summary = doc.summary();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[1].fingerprint, UNKNOWN_FINGERPRINT);
        assert_eq!(summary[0].surface, "cylinder");
        assert!(summary[2].meta.color.is_some());
    }

    #[test]
    fn test_session_states() {
        let mut session = DocumentSession::default();
        assert!(matches!(session.loaded(), Err(SessionError::NotLoaded)));
        session = DocumentSession::Loaded(doc());
        assert_eq!(session.document_id(), Some("doc"));
        session.reset();
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_known_fingerprints_skip_unknown() {
        assert_eq!(doc().known_fingerprints().len(), 2);
    }
}
