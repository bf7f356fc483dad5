//! Erasing metadata from the store, the document file and the session.

use std::fmt;
use std::str::FromStr;

use facetag_step::annotate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SessionError;
use crate::workspace::{validate_document_id, Workspace};

/// What a purge erases besides the in-memory metadata, which is always
/// cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurgeScope {
    /// Store entries of this document's fingerprints.
    Db,
    /// Every embedding in this document's file.
    File,
    /// The entire store plus this document's file.
    #[default]
    All,
}

impl PurgeScope {
    fn touches_store(self) -> bool {
        matches!(self, PurgeScope::Db | PurgeScope::All)
    }

    fn touches_file(self) -> bool {
        matches!(self, PurgeScope::File | PurgeScope::All)
    }

    /// Name used on the command line and in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            PurgeScope::Db => "db",
            PurgeScope::File => "file",
            PurgeScope::All => "all",
        }
    }
}

impl fmt::Display for PurgeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurgeScope {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "db" => Ok(PurgeScope::Db),
            "file" => Ok(PurgeScope::File),
            "all" => Ok(PurgeScope::All),
            other => Err(SessionError::invalid(format!(
                "unknown purge scope '{other}' (expected db, file or all)"
            ))),
        }
    }
}

/// Outcome of a purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Scope that ran.
    pub scope: PurgeScope,
    /// Store entries removed.
    pub deleted_count: usize,
    /// Steps performed, joined with ` & `.
    pub message: String,
    /// True if metadata could still be extracted from the file after
    /// stripping.
    pub residue: bool,
}

impl Workspace {
    /// Erase metadata of `document_id` within `scope`.
    ///
    /// The document is loaded first if it is not the active one. The
    /// in-memory metadata is cleared last, even when an earlier step fails,
    /// so a later export cannot write the erased metadata back.
    pub fn purge(&mut self, document_id: &str, scope: PurgeScope) -> Result<PurgeReport, SessionError> {
        validate_document_id(document_id)?;
        if self.session.document_id() != Some(document_id) {
            self.open_document(document_id)?;
        }

        let outcome = self.purge_persistent(document_id, scope);

        let cleared = match self.session.loaded_mut() {
            Ok(doc) => doc.clear_metadata(),
            Err(_) => 0,
        };
        info!(document = %document_id, %scope, cleared, "cleared in-memory metadata");

        let (deleted_count, mut steps, residue) = outcome?;
        steps.push("Cleared in-memory metadata".to_string());
        Ok(PurgeReport {
            scope,
            deleted_count,
            message: steps.join(" & "),
            residue,
        })
    }

    fn purge_persistent(
        &mut self,
        document_id: &str,
        scope: PurgeScope,
    ) -> Result<(usize, Vec<String>, bool), SessionError> {
        let mut steps = Vec::new();
        let mut deleted_count = 0;
        let mut residue = false;

        if scope.touches_store() {
            if scope == PurgeScope::All {
                deleted_count = self.store().clear_all()?;
                steps.push(format!(
                    "Deleted ALL DB entries (global wipe, {deleted_count} removed)"
                ));
            } else {
                let known = self.session.loaded()?.known_fingerprints();
                deleted_count = self.store().delete_many(&known)?;
                steps.push(format!("Deleted {deleted_count} DB entries"));
            }
        }

        if scope.touches_file() {
            let path = self.document_path(document_id);
            if !path.is_file() {
                return Err(SessionError::not_found(format!(
                    "file of document {document_id}"
                )));
            }
            let bytes = std::fs::read(&path)?;
            let text = String::from_utf8_lossy(&bytes);

            let before = annotate::extract(&text);
            info!(document = %document_id, faces = before.len(), "embedded metadata before strip");

            let stripped = annotate::strip(&text).map_err(SessionError::ExportFailure)?;
            std::fs::write(&path, stripped.text.as_bytes())?;

            let after = std::fs::read(&path)?;
            let remaining = annotate::extract(&String::from_utf8_lossy(&after));
            residue = !remaining.is_empty();
            if residue {
                warn!(
                    document = %document_id,
                    faces = remaining.len(),
                    "metadata still present after strip"
                );
            } else {
                info!(
                    document = %document_id,
                    bytes_removed = stripped.report.bytes_removed,
                    "document file is clean"
                );
            }

            self.session.loaded_mut()?.set_text(stripped.text);
            steps.push(format!(
                "Stripped STEP file ({} chars removed)",
                stripped.report.bytes_removed
            ));
        }

        Ok((deleted_count, steps, residue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse() {
        assert_eq!("db".parse::<PurgeScope>().unwrap(), PurgeScope::Db);
        assert_eq!(" FILE ".parse::<PurgeScope>().unwrap(), PurgeScope::File);
        assert_eq!("all".parse::<PurgeScope>().unwrap(), PurgeScope::All);
        assert!(matches!(
            "everything".parse::<PurgeScope>(),
            Err(SessionError::InvalidInput(_))
        ));
        assert_eq!(PurgeScope::default(), PurgeScope::All);
    }

    #[test]
    fn test_scope_coverage() {
        assert!(PurgeScope::Db.touches_store() && !PurgeScope::Db.touches_file());
        assert!(!PurgeScope::File.touches_store() && PurgeScope::File.touches_file());
        assert!(PurgeScope::All.touches_store() && PurgeScope::All.touches_file());
    }
}
