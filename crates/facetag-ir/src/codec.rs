//! Text-safe payloads for metadata records and whole-document metadata.
//!
//! Both payload kinds are standard base64 over JSON. The base64 alphabet
//! (`A-Z a-z 0-9 + / =`) never contains a quote, parenthesis, comma,
//! semicolon, bracket or `*`, so a payload can sit inside a STEP string
//! literal, a bracketed tag, or a comment without escaping.

use crate::{FaceIndex, FaceMetadata, Fingerprint, MetadataMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Version written into document payloads.
pub const PAYLOAD_VERSION: u32 = 1;

/// Errors from encoding or decoding payloads.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The payload could not be decoded. Callers treat this as "no metadata".
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// Serialization failed.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CodecError {
    fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptPayload(message.into())
    }
}

/// Metadata of one face as carried inside an interchange file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedFace {
    /// Face index at the time of embedding.
    pub index: FaceIndex,
    /// Fingerprint of the face, when it was known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    /// The annotations. Never empty.
    pub meta: FaceMetadata,
}

impl EmbeddedFace {
    fn key(&self) -> EntryKey {
        match &self.fingerprint {
            Some(fp) => EntryKey::Fingerprint(fp.clone()),
            None => EntryKey::Index(self.index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum EntryKey {
    Fingerprint(Fingerprint),
    Index(FaceIndex),
}

/// All metadata of one document, as embedded in or extracted from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedMetadata {
    /// One entry per annotated face, ordered by index.
    pub faces: Vec<EmbeddedFace>,
}

impl EmbeddedMetadata {
    /// Build from a live metadata map. `fingerprint_of` resolves the known
    /// fingerprint of a face index. Empty records are skipped.
    pub fn from_map<F>(map: &MetadataMap, fingerprint_of: F) -> Self
    where
        F: Fn(FaceIndex) -> Option<Fingerprint>,
    {
        let faces = map
            .iter()
            .filter(|(_, meta)| !meta.is_empty())
            .map(|(&index, meta)| EmbeddedFace {
                index,
                fingerprint: fingerprint_of(index),
                meta: meta.clone(),
            })
            .collect();
        Self { faces }
    }

    /// True when no face carries metadata.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Number of annotated faces.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Records keyed by embedded face index.
    pub fn by_index(&self) -> MetadataMap {
        self.faces
            .iter()
            .map(|f| (f.index, f.meta.clone()))
            .collect()
    }

    /// Records keyed by fingerprint, for entries that carry one.
    pub fn by_fingerprint(&self) -> BTreeMap<Fingerprint, FaceMetadata> {
        self.faces
            .iter()
            .filter_map(|f| f.fingerprint.clone().map(|fp| (fp, f.meta.clone())))
            .collect()
    }

    /// Merge `lower` underneath `self`: entries of `self` win, entries of
    /// `lower` are kept only for faces `self` does not mention. Faces are
    /// matched by fingerprint when present, otherwise by index.
    pub fn overlay_on(self, lower: EmbeddedMetadata) -> EmbeddedMetadata {
        let taken: HashSet<EntryKey> = self.faces.iter().map(EmbeddedFace::key).collect();
        let mut faces = self.faces;
        faces.extend(lower.faces.into_iter().filter(|f| !taken.contains(&f.key())));
        faces.sort_by_key(|f| f.index);
        EmbeddedMetadata { faces }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    faces: Vec<EmbeddedFace>,
}

/// Encode one record for storage.
pub fn encode_record(meta: &FaceMetadata) -> Result<String, CodecError> {
    let json = serde_json::to_vec(meta)?;
    Ok(STANDARD.encode(json))
}

/// Decode a record produced by [`encode_record`].
pub fn decode_record(payload: &str) -> Result<FaceMetadata, CodecError> {
    let json = decode_base64(payload)?;
    serde_json::from_slice(&json).map_err(|e| CodecError::corrupt(format!("record json: {e}")))
}

/// Encode a document's metadata for embedding.
pub fn encode_document(doc: &EmbeddedMetadata) -> Result<String, CodecError> {
    let envelope = Envelope {
        version: PAYLOAD_VERSION,
        faces: doc.faces.clone(),
    };
    let json = serde_json::to_vec(&envelope)?;
    Ok(STANDARD.encode(json))
}

/// Decode a payload produced by [`encode_document`]. Entries with empty
/// records are dropped.
pub fn decode_document(payload: &str) -> Result<EmbeddedMetadata, CodecError> {
    let json = decode_base64(payload)?;
    let envelope: Envelope = serde_json::from_slice(&json)
        .map_err(|e| CodecError::corrupt(format!("document json: {e}")))?;
    if envelope.version != PAYLOAD_VERSION {
        return Err(CodecError::corrupt(format!(
            "unsupported payload version {}",
            envelope.version
        )));
    }
    let mut faces: Vec<EmbeddedFace> = envelope
        .faces
        .into_iter()
        .filter(|f| !f.meta.is_empty())
        .collect();
    faces.sort_by_key(|f| f.index);
    Ok(EmbeddedMetadata { faces })
}

/// True if `s` consists only of base64 alphabet characters.
pub fn is_payload_text(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, CodecError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(CodecError::corrupt("empty payload"));
    }
    STANDARD
        .decode(trimmed)
        .map_err(|e| CodecError::corrupt(format!("base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attribute, Color, ThreadSpec, ToleranceSpec};
    use proptest::prelude::*;

    fn sample_record() -> FaceMetadata {
        let mut meta = FaceMetadata::default();
        meta.set(Attribute::Color(Color::new(0xFF, 0, 0)));
        meta.set(Attribute::Tolerance(ToleranceSpec {
            kind: "Position".into(),
            value: "+/- 0.005".into(),
            datum: "A".into(),
        }));
        meta
    }

    #[test]
    fn test_record_round_trip() {
        let meta = sample_record();
        let payload = encode_record(&meta).unwrap();
        assert!(is_payload_text(&payload));
        assert_eq!(decode_record(&payload).unwrap(), meta);
    }

    #[test]
    fn test_corrupt_inputs() {
        for bad in ["", "!!!not base64", "aGVsbG8=", "e30x"] {
            assert!(
                matches!(decode_record(bad), Err(CodecError::CorruptPayload(_))),
                "{bad}"
            );
        }
        assert!(matches!(
            decode_document("aGVsbG8="),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_document_version_is_checked() {
        let payload = STANDARD.encode(br#"{"version":99,"faces":[]}"#);
        assert!(matches!(
            decode_document(&payload),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_overlay_prefers_upper_entries() {
        let fp = Fingerprint::from_hex(&"ab".repeat(32)).unwrap();
        let mut upper_meta = FaceMetadata::default();
        upper_meta.set(Attribute::Color(Color::new(1, 1, 1)));
        let upper = EmbeddedMetadata {
            faces: vec![EmbeddedFace {
                index: 3,
                fingerprint: Some(fp.clone()),
                meta: upper_meta.clone(),
            }],
        };
        let lower = EmbeddedMetadata {
            faces: vec![
                EmbeddedFace {
                    index: 7,
                    fingerprint: Some(fp),
                    meta: sample_record(),
                },
                EmbeddedFace {
                    index: 1,
                    fingerprint: None,
                    meta: sample_record(),
                },
            ],
        };
        let merged = upper.overlay_on(lower);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.faces[0].index, 1);
        assert_eq!(merged.faces[1].meta, upper_meta);
    }

    fn arb_text() -> impl Strategy<Value = String> {
        "[ -~]{0,12}"
    }

    fn arb_record() -> impl Strategy<Value = FaceMetadata> {
        (
            proptest::option::of(any::<(u8, u8, u8)>()),
            proptest::option::of((arb_text(), arb_text(), arb_text(), arb_text())),
            proptest::option::of((arb_text(), arb_text(), arb_text())),
        )
            .prop_map(|(color, thread, tolerance)| FaceMetadata {
                color: color.map(|(r, g, b)| Color::new(r, g, b)),
                thread: thread.map(|(kind, size, pitch, class)| ThreadSpec {
                    kind,
                    size,
                    pitch,
                    class,
                }),
                tolerance: tolerance.map(|(kind, value, datum)| ToleranceSpec {
                    kind,
                    value,
                    datum,
                }),
            })
    }

    proptest! {
        #[test]
        fn prop_record_round_trip(meta in arb_record()) {
            let payload = encode_record(&meta).unwrap();
            prop_assert!(is_payload_text(&payload));
            prop_assert_eq!(decode_record(&payload).unwrap(), meta);
        }
    }
}
