//! The workspace: one document slot plus the collaborators it works with.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use facetag_ir::{FaceIndex, FingerprintHasher};
use facetag_step::{annotate, Exporter, Loader, StepExporter, StepLoader};
use facetag_store::{FingerprintStore, StoreEntry, StoreStats};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::FacetagConfig;
use crate::error::SessionError;
use crate::holes::{group_holes, HoleGroup};
use crate::session::{DocumentSession, FaceSummary, LoadedDocument, SessionFace};

/// Extensions accepted by [`Workspace::import`].
pub const STEP_EXTENSIONS: [&str; 2] = ["step", "stp"];

/// Result of loading a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    /// Identifier of the loaded document.
    pub document_id: String,
    /// Every face with its current metadata.
    pub faces: Vec<FaceSummary>,
    /// Faces annotated from the file's embedded payload.
    pub from_file: usize,
    /// Faces annotated from the fingerprint store.
    pub from_store: usize,
}

/// An exported document.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    /// Suggested download name, `<document_id>.step`.
    pub file_name: String,
    /// Where the annotated file was written.
    pub path: PathBuf,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Holds at most one loaded document and runs every operation on it.
///
/// Nothing here is synchronized: callers must not overlap operations on the
/// same workspace. The fingerprint store serializes its own writes and may
/// be shared.
pub struct Workspace {
    config: FacetagConfig,
    hasher: FingerprintHasher,
    store: Arc<FingerprintStore>,
    loader: Box<dyn Loader + Send + Sync>,
    exporter: Box<dyn Exporter + Send + Sync>,
    pub(crate) session: DocumentSession,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("config", &self.config)
            .field("session", &self.session.document_id())
            .finish_non_exhaustive()
    }
}

impl Workspace {
    /// Open the store named in `config` and use the STEP collaborators.
    pub fn open(config: FacetagConfig) -> Result<Self, SessionError> {
        let store = FingerprintStore::open(&config.database_path)?;
        Ok(Self::with_parts(
            config,
            Arc::new(store),
            Box::new(StepLoader),
            Box::new(StepExporter),
        ))
    }

    /// Assemble a workspace from explicit parts.
    pub fn with_parts(
        config: FacetagConfig,
        store: Arc<FingerprintStore>,
        loader: Box<dyn Loader + Send + Sync>,
        exporter: Box<dyn Exporter + Send + Sync>,
    ) -> Self {
        Self {
            hasher: FingerprintHasher::new(config.fingerprint_precision),
            config,
            store,
            loader,
            exporter,
            session: DocumentSession::Empty,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &FacetagConfig {
        &self.config
    }

    /// The document slot.
    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    /// The fingerprint store.
    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    pub(crate) fn store_handle(&self) -> Arc<FingerprintStore> {
        Arc::clone(&self.store)
    }

    /// Path of the file backing `document_id`.
    pub fn document_path(&self, document_id: &str) -> PathBuf {
        self.config.documents_dir.join(format!("{document_id}.step"))
    }

    /// Copy a STEP file into the documents directory under a new identifier
    /// and load it. The copy is removed if loading fails.
    pub fn import(&mut self, source: &Path) -> Result<LoadSummary, SessionError> {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !STEP_EXTENSIONS.contains(&ext.as_str()) {
            return Err(SessionError::invalid(format!(
                "only .step / .stp files are supported, got '{}'",
                source.display()
            )));
        }
        if !source.is_file() {
            return Err(SessionError::not_found(source.display().to_string()));
        }

        let document_id = Uuid::new_v4().simple().to_string();
        let target = self.document_path(&document_id);
        std::fs::create_dir_all(&self.config.documents_dir)?;
        std::fs::copy(source, &target)?;

        match self.load_or_reload(&document_id, &target) {
            Ok(summary) => {
                info!(document = %document_id, source = %source.display(), "imported document");
                Ok(summary)
            }
            Err(err) => {
                if let Err(rm) = std::fs::remove_file(&target) {
                    warn!(path = %target.display(), error = %rm, "cannot remove failed import");
                }
                Err(err)
            }
        }
    }

    /// Load a previously imported document by identifier.
    pub fn open_document(&mut self, document_id: &str) -> Result<LoadSummary, SessionError> {
        validate_document_id(document_id)?;
        let path = self.document_path(document_id);
        if !path.is_file() {
            return Err(SessionError::not_found(format!("document {document_id}")));
        }
        self.load_or_reload(document_id, &path)
    }

    /// Replace the active document with the one at `path`.
    ///
    /// Metadata is hydrated from the payload embedded in the file, then from
    /// the fingerprint store, which wins per face. On any failure the
    /// session is left empty.
    pub fn load_or_reload(&mut self, document_id: &str, path: &Path) -> Result<LoadSummary, SessionError> {
        self.session.reset();
        let (doc, from_file, from_store) = match self.load_document(document_id, path) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(document = %document_id, path = %path.display(), error = %err, "load failed");
                return Err(err);
            }
        };

        let summary = LoadSummary {
            document_id: document_id.to_string(),
            faces: doc.summary(),
            from_file,
            from_store,
        };
        info!(
            document = %document_id,
            faces = summary.faces.len(),
            from_file,
            from_store,
            "loaded document"
        );
        self.session = DocumentSession::Loaded(doc);
        Ok(summary)
    }

    fn load_document(
        &self,
        document_id: &str,
        path: &Path,
    ) -> Result<(LoadedDocument, usize, usize), SessionError> {
        let model = self.loader.load(path).map_err(SessionError::LoadFailure)?;
        let faces: Vec<SessionFace> = model
            .faces
            .into_iter()
            .map(|descriptor| SessionFace {
                fingerprint: self.hasher.fingerprint(&descriptor),
                descriptor,
            })
            .collect();

        let embedded = annotate::extract(&model.text);
        let mut doc = LoadedDocument::new(document_id, path, model.text, faces);
        let from_file = doc.apply_embedded(&embedded);

        let known = doc.known_fingerprints();
        let stored = self.store.get_many(&known)?;
        let from_store = doc.apply_stored(&stored);

        Ok((doc, from_file, from_store))
    }

    /// Drop the active document.
    pub fn reset(&mut self) {
        if let Some(id) = self.session.document_id() {
            info!(document = %id, "session reset");
        }
        self.session.reset();
    }

    /// Overview of the active document's faces.
    pub fn faces(&self) -> Result<Vec<FaceSummary>, SessionError> {
        Ok(self.session.loaded()?.summary())
    }

    /// Cylindrical faces of the active document grouped by diameter.
    pub fn holes(&self) -> Result<Vec<HoleGroup>, SessionError> {
        let doc = self.session.loaded()?;
        Ok(group_holes(doc.faces().iter().map(|f| &f.descriptor)))
    }

    /// Write the active document with its metadata embedded back to the
    /// documents directory and return the bytes. The store is not touched.
    pub fn export(&mut self) -> Result<ExportedFile, SessionError> {
        let target = {
            let doc = self.session.loaded()?;
            self.document_path(doc.id())
        };
        let doc = self.session.loaded_mut()?;
        let embedded = doc.embedded();
        let bytes = self
            .exporter
            .export(doc.text(), &embedded)
            .map_err(SessionError::ExportFailure)?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &bytes)?;
        doc.set_text(String::from_utf8_lossy(&bytes).into_owned());

        info!(
            document = %doc.id(),
            faces = embedded.len(),
            path = %target.display(),
            "exported document"
        );
        Ok(ExportedFile {
            file_name: format!("{}.step", doc.id()),
            path: target,
            bytes,
        })
    }

    /// The store row behind face `index` of the active document. `None` when
    /// the face has no fingerprint or nothing is stored for it.
    pub fn face_entry(&self, index: FaceIndex) -> Result<Option<StoreEntry>, SessionError> {
        let doc = self.session.loaded()?;
        if index >= doc.face_count() {
            return Err(SessionError::invalid(format!(
                "face {index} out of range (document has {} faces)",
                doc.face_count()
            )));
        }
        match doc.fingerprint(index) {
            Some(fingerprint) => Ok(self.store.entry(fingerprint)?),
            None => Ok(None),
        }
    }

    /// Aggregate counts of the fingerprint store.
    pub fn stats(&self) -> Result<StoreStats, SessionError> {
        Ok(self.store.stats()?)
    }
}

/// Identifiers become file stems, so only `[A-Za-z0-9_-]` is accepted.
pub(crate) fn validate_document_id(document_id: &str) -> Result<(), SessionError> {
    let valid = !document_id.is_empty()
        && document_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(SessionError::invalid(format!(
            "invalid document id '{document_id}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids() {
        assert!(validate_document_id("0f3c9a2b").is_ok());
        assert!(validate_document_id("sample_part-2").is_ok());
        assert!(validate_document_id("").is_err());
        assert!(validate_document_id("../etc/passwd").is_err());
        assert!(validate_document_id("a b").is_err());
    }

    #[test]
    fn test_operations_need_a_document() {
        let store = Arc::new(FingerprintStore::open_in_memory().unwrap());
        let mut ws = Workspace::with_parts(
            FacetagConfig::default(),
            store,
            Box::new(StepLoader),
            Box::new(StepExporter),
        );
        assert!(matches!(ws.faces(), Err(SessionError::NotLoaded)));
        assert!(matches!(ws.holes(), Err(SessionError::NotLoaded)));
        assert!(matches!(ws.export(), Err(SessionError::NotLoaded)));
        assert_eq!(ws.stats().unwrap().total_entries, 0);
    }
}
