//! Batch edits of face metadata.

use facetag_ir::{Attribute, AttributeKind, Color, FaceIndex, ThreadSpec, ToleranceSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::workspace::Workspace;

/// One item of a batch edit: set `value` on `face`, or remove the attribute
/// when `value` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceUpdate<T> {
    /// Target face index.
    pub face: FaceIndex,
    /// New value, `None` to remove.
    #[serde(default)]
    pub value: Option<T>,
}

impl<T> FaceUpdate<T> {
    /// Set `value` on `face`.
    pub fn set(face: FaceIndex, value: T) -> Self {
        Self {
            face,
            value: Some(value),
        }
    }

    /// Remove the attribute from `face`.
    pub fn clear(face: FaceIndex) -> Self {
        Self { face, value: None }
    }
}

/// Outcome of a batch edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Items applied to the session.
    pub updated: usize,
    /// Records written to the fingerprint store.
    pub persisted: usize,
    /// Items skipped as invalid.
    pub skipped: usize,
}

impl Workspace {
    /// Apply a batch of edits of one attribute kind.
    ///
    /// Invalid items (face out of range, value of another kind) are skipped
    /// and the batch continues. Each applied item on a face with a known
    /// fingerprint is written to the store before the session sees it, and
    /// an emptied record deletes the store entry. A store failure aborts the
    /// batch: items before it stay applied, the failing one is applied
    /// nowhere.
    pub fn set_attributes(
        &mut self,
        kind: AttributeKind,
        updates: Vec<FaceUpdate<Attribute>>,
    ) -> Result<BatchReport, SessionError> {
        let store = self.store_handle();
        let doc = self.session.loaded_mut()?;
        let mut report = BatchReport::default();

        for update in updates {
            if let Some(value) = &update.value {
                if value.kind() != kind {
                    warn!(face = update.face, expected = %kind, got = %value.kind(), "skipping mismatched attribute");
                    report.skipped += 1;
                    continue;
                }
            }

            let staged = match update.value {
                Some(value) => doc.edited(update.face, |r| r.set(value)),
                None => doc.edited(update.face, |r| {
                    r.remove(kind);
                }),
            };
            let record = match staged {
                Ok(record) => record,
                Err(err) => {
                    warn!(face = update.face, error = %err, "skipping batch item");
                    report.skipped += 1;
                    continue;
                }
            };

            match doc.fingerprint(update.face) {
                Some(fingerprint) => {
                    if store.put(fingerprint, &record, doc.descriptor(update.face))? {
                        report.persisted += 1;
                    }
                }
                None => debug!(face = update.face, "no fingerprint, edit stays in session"),
            }
            doc.commit(update.face, record);
            report.updated += 1;
        }

        debug!(%kind, ?report, "batch applied");
        Ok(report)
    }

    /// Set or clear colors. Values must be `#RRGGBB`; others are skipped.
    pub fn set_color(&mut self, updates: &[FaceUpdate<String>]) -> Result<BatchReport, SessionError> {
        let mut skipped = 0;
        let mut parsed = Vec::with_capacity(updates.len());
        for update in updates {
            match update.value.as_deref().map(str::parse::<Color>).transpose() {
                Ok(value) => parsed.push(FaceUpdate {
                    face: update.face,
                    value: value.map(Attribute::Color),
                }),
                Err(err) => {
                    warn!(face = update.face, error = %err, "skipping invalid color");
                    skipped += 1;
                }
            }
        }

        let mut report = self.set_attributes(AttributeKind::Color, parsed)?;
        report.skipped += skipped;
        Ok(report)
    }

    /// Set or clear thread callouts.
    pub fn set_thread(&mut self, updates: &[FaceUpdate<ThreadSpec>]) -> Result<BatchReport, SessionError> {
        let updates = updates
            .iter()
            .map(|u| FaceUpdate {
                face: u.face,
                value: u.value.clone().map(Attribute::Thread),
            })
            .collect();
        self.set_attributes(AttributeKind::Thread, updates)
    }

    /// Set or clear tolerance callouts.
    pub fn set_tolerance(
        &mut self,
        updates: &[FaceUpdate<ToleranceSpec>],
    ) -> Result<BatchReport, SessionError> {
        let updates = updates
            .iter()
            .map(|u| FaceUpdate {
                face: u.face,
                value: u.value.clone().map(Attribute::Tolerance),
            })
            .collect();
        self.set_attributes(AttributeKind::Tolerance, updates)
    }
}
