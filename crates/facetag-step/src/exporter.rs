//! Annotated STEP export.

use crate::annotate::embed;
use crate::error::StepError;
use facetag_ir::EmbeddedMetadata;

/// Produces interchange-file bytes for a loaded document.
pub trait Exporter {
    /// Render `source_text` with `meta` embedded.
    fn export(&self, source_text: &str, meta: &EmbeddedMetadata) -> Result<Vec<u8>, StepError>;
}

/// [`Exporter`] that writes the loaded STEP text back out with the metadata
/// embedded by every strategy. Geometry is passed through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepExporter;

impl Exporter for StepExporter {
    fn export(&self, source_text: &str, meta: &EmbeddedMetadata) -> Result<Vec<u8>, StepError> {
        Ok(embed(source_text, meta)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::extract;
    use crate::test_fixtures::BLOCK_WITH_HOLE;
    use facetag_ir::{Attribute, Color, EmbeddedFace, FaceMetadata};

    #[test]
    fn test_export_embeds_metadata() {
        let mut meta = FaceMetadata::default();
        meta.set(Attribute::Color(Color::new(0, 0x80, 0xFF)));
        let doc = EmbeddedMetadata {
            faces: vec![EmbeddedFace {
                index: 2,
                fingerprint: None,
                meta,
            }],
        };

        let bytes = StepExporter.export(BLOCK_WITH_HOLE, &doc).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(extract(&text), doc);
    }

    #[test]
    fn test_export_without_metadata_is_clean() {
        let bytes = StepExporter
            .export(BLOCK_WITH_HOLE, &EmbeddedMetadata::default())
            .unwrap();
        assert_eq!(bytes, BLOCK_WITH_HOLE.as_bytes());
    }
}
