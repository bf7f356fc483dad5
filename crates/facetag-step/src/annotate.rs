//! Embedding face metadata in STEP text.
//!
//! A document payload is written into the file three times:
//!
//! 1. as the second argument of a `DESCRIPTIVE_REPRESENTATION_ITEM('FACETAG_META', ...)`
//!    entity in the DATA section,
//! 2. as a `[FACETAG:...]` tag appended to every `PRODUCT` description,
//! 3. inside a `/* __FACETAG_META_START__ ... __FACETAG_META_END__ */` comment
//!    placed before `DATA;`.
//!
//! Locations come from a token scan of the file, never from text search, so
//! an edit only ever touches the string literal or comment it was aimed at.
//! Edits are collected as byte-range replacements and applied back to front.

use std::ops::Range;

use crate::error::StepError;
use crate::lexer::{Lexer, SpannedToken, Token};
use facetag_ir::codec::{decode_document, encode_document, is_payload_text};
use facetag_ir::EmbeddedMetadata;
use tracing::{debug, warn};

/// Entity type carrying the entity-field payload.
pub const ANNOTATION_ENTITY: &str = "DESCRIPTIVE_REPRESENTATION_ITEM";
/// Name argument identifying our annotation entity.
pub const ANNOTATION_NAME: &str = "FACETAG_META";
/// Opening of a description tag.
pub const TAG_PREFIX: &str = "[FACETAG:";
/// Closing of a description tag.
pub const TAG_SUFFIX: &str = "]";
/// Start sentinel of the comment block.
pub const COMMENT_START: &str = "__FACETAG_META_START__";
/// End sentinel of the comment block.
pub const COMMENT_END: &str = "__FACETAG_META_END__";

/// Embedding strategies, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// Payload in the annotation entity.
    EntityField,
    /// Payload tagged onto product descriptions.
    DescriptionTag,
    /// Payload in a file comment.
    CommentBlock,
}

impl Strategy {
    /// All strategies, highest precedence first.
    pub const ALL: [Strategy; 3] = [
        Strategy::EntityField,
        Strategy::DescriptionTag,
        Strategy::CommentBlock,
    ];

    /// Short name for logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::EntityField => "entity",
            Strategy::DescriptionTag => "description",
            Strategy::CommentBlock => "comment",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata found in a file, per strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Decoded entity-field payload.
    pub entity_field: Option<EmbeddedMetadata>,
    /// Decoded description-tag payload.
    pub description_tag: Option<EmbeddedMetadata>,
    /// Decoded comment-block payload.
    pub comment_block: Option<EmbeddedMetadata>,
    /// Strategies whose payload was present but could not be decoded.
    pub corrupt: Vec<Strategy>,
}

impl Extraction {
    /// Payload recovered by one strategy.
    pub fn get(&self, strategy: Strategy) -> Option<&EmbeddedMetadata> {
        match strategy {
            Strategy::EntityField => self.entity_field.as_ref(),
            Strategy::DescriptionTag => self.description_tag.as_ref(),
            Strategy::CommentBlock => self.comment_block.as_ref(),
        }
    }

    /// Strategies that produced a payload.
    pub fn found(&self) -> Vec<Strategy> {
        Strategy::ALL
            .into_iter()
            .filter(|s| self.get(*s).is_some())
            .collect()
    }

    /// Merge all strategies; on conflict the higher-precedence one wins.
    pub fn merged(&self) -> EmbeddedMetadata {
        Strategy::ALL
            .iter()
            .rev()
            .filter_map(|s| self.get(*s).cloned())
            .fold(EmbeddedMetadata::default(), |lower, upper| {
                upper.overlay_on(lower)
            })
    }
}

/// What [`strip`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripReport {
    /// Annotation entities whose payload was blanked.
    pub entity_fields: usize,
    /// Tags removed from descriptions.
    pub description_tags: usize,
    /// Comment blocks removed.
    pub comment_blocks: usize,
    /// Total bytes removed from the text.
    pub bytes_removed: usize,
}

impl StripReport {
    /// True if anything was removed.
    pub fn touched(&self) -> bool {
        self.entity_fields + self.description_tags + self.comment_blocks > 0
    }
}

/// Output of [`strip`].
#[derive(Debug, Clone)]
pub struct Stripped {
    /// The cleaned text.
    pub text: String,
    /// What was removed.
    pub report: StripReport,
}

/// Write `meta` into `text` using all three strategies, replacing any
/// payload already present. Empty metadata strips instead.
pub fn embed(text: &str, meta: &EmbeddedMetadata) -> Result<String, StepError> {
    if meta.is_empty() {
        return Ok(strip(text)?.text);
    }

    let payload = encode_document(meta)?;
    let scan = Scan::run(text)?;
    let (data_start, data_end) = match (scan.data_start, scan.data_end) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return Err(StepError::Annotation(
                "file has no complete DATA section".into(),
            ))
        }
    };

    let mut edits = Vec::new();

    if scan.entities.is_empty() {
        edits.push(Edit::insert(
            data_end,
            format!(
                "#{}={}('{}','{}');\n",
                scan.max_id + 1,
                ANNOTATION_ENTITY,
                ANNOTATION_NAME,
                payload
            ),
        ));
    } else {
        for site in &scan.entities {
            edits.push(Edit::replace(site.clone(), payload.clone()));
        }
    }

    let tag = format!("{TAG_PREFIX}{payload}{TAG_SUFFIX}");
    for site in &scan.descriptions {
        let mut contents = without_tags(&text[site.clone()]);
        if !contents.is_empty() {
            contents.push(' ');
        }
        contents.push_str(&tag);
        edits.push(Edit::replace(site.clone(), contents));
    }

    let block = format!("/* {COMMENT_START} {payload} {COMMENT_END} */");
    match scan.comments.split_first() {
        Some((first, rest)) => {
            edits.push(Edit::replace(first.span.clone(), block));
            for extra in rest {
                edits.push(Edit::remove(extra.removal_range(text)));
            }
        }
        None => edits.push(Edit::insert(data_start, format!("{block}\n"))),
    }

    debug!(
        faces = meta.len(),
        entities = scan.entities.len().max(1),
        descriptions = scan.descriptions.len(),
        "embedding metadata"
    );
    apply(text, edits)
}

/// Recover embedded metadata, merged across strategies. Unreadable text or
/// payloads yield empty metadata.
pub fn extract(text: &str) -> EmbeddedMetadata {
    match extract_detailed(text) {
        Ok(extraction) => extraction.merged(),
        Err(err) => {
            warn!(%err, "cannot scan file for embedded metadata");
            EmbeddedMetadata::default()
        }
    }
}

/// Recover embedded metadata per strategy. Fails only if the text cannot
/// be tokenized; corrupt payloads are reported in [`Extraction::corrupt`].
pub fn extract_detailed(text: &str) -> Result<Extraction, StepError> {
    let scan = Scan::run(text)?;
    let mut extraction = Extraction::default();

    let entity_payloads = scan.entities.iter().map(|r| &text[r.clone()]);
    extraction.entity_field = decode_all(Strategy::EntityField, entity_payloads, &mut extraction.corrupt);

    let tag_payloads: Vec<&str> = scan
        .descriptions
        .iter()
        .flat_map(|site| {
            let raw = &text[site.clone()];
            find_tags(raw).into_iter().map(move |tag| &raw[tag.payload])
        })
        .collect();
    extraction.description_tag =
        decode_all(Strategy::DescriptionTag, tag_payloads.into_iter(), &mut extraction.corrupt);

    let comment_payloads = scan.comments.iter().map(|c| &text[c.payload.clone()]);
    extraction.comment_block =
        decode_all(Strategy::CommentBlock, comment_payloads, &mut extraction.corrupt);

    Ok(extraction)
}

/// Remove every embedded payload. The annotation entity stays in place with
/// a blank payload so the entity list remains valid.
pub fn strip(text: &str) -> Result<Stripped, StepError> {
    let scan = Scan::run(text)?;
    let mut report = StripReport::default();
    let mut edits = Vec::new();

    for site in scan.entities.iter().filter(|r| !r.is_empty()) {
        report.entity_fields += 1;
        edits.push(Edit::remove(site.clone()));
    }

    for site in &scan.descriptions {
        let raw = &text[site.clone()];
        let tags = find_tags(raw);
        if tags.is_empty() {
            continue;
        }
        report.description_tags += tags.len();
        edits.push(Edit::replace(site.clone(), without_tags(raw)));
    }

    for comment in &scan.comments {
        report.comment_blocks += 1;
        edits.push(Edit::remove(comment.removal_range(text)));
    }

    let stripped = apply(text, edits)?;
    report.bytes_removed = text.len() - stripped.len();
    debug!(?report, "stripped embedded metadata");
    Ok(Stripped {
        text: stripped,
        report,
    })
}

fn decode_all<'a>(
    strategy: Strategy,
    payloads: impl Iterator<Item = &'a str>,
    corrupt: &mut Vec<Strategy>,
) -> Option<EmbeddedMetadata> {
    let mut found: Option<EmbeddedMetadata> = None;
    for payload in payloads.filter(|p| !p.trim().is_empty()) {
        match decode_document(payload) {
            Ok(doc) => {
                found = Some(match found {
                    // The first payload in file order wins.
                    Some(earlier) => earlier.overlay_on(doc),
                    None => doc,
                });
            }
            Err(err) => {
                warn!(strategy = %strategy, %err, "skipping corrupt embedded payload");
                if !corrupt.contains(&strategy) {
                    corrupt.push(strategy);
                }
            }
        }
    }
    found
}

/// A tag inside raw description contents.
struct TagSite {
    /// Tag plus the single space before it, if any.
    whole: Range<usize>,
    /// The payload between prefix and suffix.
    payload: Range<usize>,
}

fn find_tags(raw: &str) -> Vec<TagSite> {
    let mut tags = Vec::new();
    let mut cursor = 0;
    while let Some(found) = raw[cursor..].find(TAG_PREFIX) {
        let start = cursor + found;
        let payload_start = start + TAG_PREFIX.len();
        let Some(len) = raw[payload_start..].find(TAG_SUFFIX) else {
            break;
        };
        let payload_end = payload_start + len;
        let end = payload_end + TAG_SUFFIX.len();
        if !is_payload_text(&raw[payload_start..payload_end]) {
            // Prose that happens to start like a tag.
            cursor = payload_start;
            continue;
        }
        let whole_start = if raw[..start].ends_with(' ') {
            start - 1
        } else {
            start
        };
        tags.push(TagSite {
            whole: whole_start..end,
            payload: payload_start..payload_end,
        });
        cursor = end;
    }
    tags
}

fn without_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for tag in find_tags(raw) {
        out.push_str(&raw[last..tag.whole.start]);
        last = tag.whole.end;
    }
    out.push_str(&raw[last..]);
    out
}

#[derive(Debug, Clone)]
struct CommentSite {
    span: Range<usize>,
    payload: Range<usize>,
}

impl CommentSite {
    /// The comment plus the line break after it.
    fn removal_range(&self, text: &str) -> Range<usize> {
        let rest = &text[self.span.end..];
        let newline = if rest.starts_with("\r\n") {
            2
        } else if rest.starts_with('\n') {
            1
        } else {
            0
        };
        self.span.start..self.span.end + newline
    }
}

/// Positions of everything the engine reads or edits.
#[derive(Debug, Default)]
struct Scan {
    /// Offset of the `DATA` keyword.
    data_start: Option<usize>,
    /// Offset of the `ENDSEC` closing the DATA section.
    data_end: Option<usize>,
    max_id: u64,
    /// Payload string contents of annotation entities.
    entities: Vec<Range<usize>>,
    /// Raw contents of PRODUCT description strings.
    descriptions: Vec<Range<usize>>,
    comments: Vec<CommentSite>,
}

impl Scan {
    fn run(text: &str) -> Result<Self, StepError> {
        let tokens = Lexer::with_comments(text.as_bytes()).tokenize()?;
        let mut scan = Scan::default();
        let mut in_data = false;
        let mut statement: Vec<&SpannedToken> = Vec::new();

        for tok in &tokens {
            match &tok.token {
                Token::Comment(body) => {
                    if let Some(site) = comment_site(tok, body) {
                        scan.comments.push(site);
                    }
                }
                Token::Semicolon => {
                    scan.statement(&statement, &mut in_data);
                    statement.clear();
                }
                _ => statement.push(tok),
            }
        }
        Ok(scan)
    }

    fn statement(&mut self, tokens: &[&SpannedToken], in_data: &mut bool) {
        match tokens {
            [first, ..] if matches!(&first.token, Token::Keyword(k) if k == "DATA") => {
                if self.data_start.is_none() {
                    self.data_start = Some(first.span.start);
                    *in_data = true;
                }
            }
            [only] if matches!(&only.token, Token::Keyword(k) if k == "ENDSEC") => {
                if *in_data {
                    self.data_end = Some(only.span.start);
                    *in_data = false;
                }
            }
            [id, eq, name, open, rest @ ..]
                if matches!(eq.token, Token::Equals) && matches!(open.token, Token::LParen) =>
            {
                let Token::EntityRef(id) = id.token else {
                    return;
                };
                self.max_id = self.max_id.max(id);
                let Token::Keyword(name) = &name.token else {
                    return;
                };
                let args = split_args(rest);
                match name.as_str() {
                    ANNOTATION_ENTITY => {
                        let named = matches!(
                            args.first().map(Vec::as_slice),
                            Some([tok]) if matches!(&tok.token, Token::String(s) if s == ANNOTATION_NAME)
                        );
                        if let (true, Some([payload])) = (named, args.get(1).map(Vec::as_slice)) {
                            if let Some(range) = payload.string_contents() {
                                self.entities.push(range);
                            }
                        }
                    }
                    "PRODUCT" => {
                        if let Some([description]) = args.get(2).map(Vec::as_slice) {
                            if let Some(range) = description.string_contents() {
                                self.descriptions.push(range);
                            }
                        }
                    }
                    _ => {}
                }
            }
            [id, eq, ..] if matches!(eq.token, Token::Equals) => {
                // Complex entity instance.
                if let Token::EntityRef(id) = id.token {
                    self.max_id = self.max_id.max(id);
                }
            }
            _ => {}
        }
    }
}

/// Split the tokens after an entity's opening parenthesis into top-level
/// arguments.
fn split_args<'a>(tokens: &[&'a SpannedToken]) -> Vec<Vec<&'a SpannedToken>> {
    let mut args = vec![Vec::new()];
    let mut depth = 1usize;
    for tok in tokens {
        match tok.token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Token::Comma if depth == 1 => {
                args.push(Vec::new());
                continue;
            }
            _ => {}
        }
        if let Some(current) = args.last_mut() {
            current.push(*tok);
        }
    }
    args
}

fn comment_site(tok: &SpannedToken, body: &str) -> Option<CommentSite> {
    let start = body.find(COMMENT_START)?;
    let after = start + COMMENT_START.len();
    let end = body[after..]
        .find(COMMENT_END)
        .map_or(body.len(), |n| after + n);
    // Body starts two bytes into the span, after `/*`.
    let body_offset = tok.span.start + 2;
    let raw = &body[after..end];
    let lead = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    let payload_start = body_offset + after + lead;
    Some(CommentSite {
        span: tok.span.clone(),
        payload: payload_start..payload_start + trimmed.len(),
    })
}

#[derive(Debug)]
struct Edit {
    range: Range<usize>,
    replacement: String,
}

impl Edit {
    fn replace(range: Range<usize>, replacement: String) -> Self {
        Self { range, replacement }
    }

    fn insert(at: usize, text: String) -> Self {
        Self::replace(at..at, text)
    }

    fn remove(range: Range<usize>) -> Self {
        Self::replace(range, String::new())
    }
}

fn apply(text: &str, mut edits: Vec<Edit>) -> Result<String, StepError> {
    edits.sort_by_key(|e| (e.range.start, e.range.end));
    for pair in edits.windows(2) {
        if pair[0].range.end > pair[1].range.start {
            return Err(StepError::Annotation(format!(
                "overlapping edits at bytes {:?} and {:?}",
                pair[0].range, pair[1].range
            )));
        }
    }

    let mut out = text.to_string();
    for edit in edits.iter().rev() {
        out.replace_range(edit.range.clone(), &edit.replacement);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_faces;
    use crate::test_fixtures::BLOCK_WITH_HOLE;
    use facetag_ir::{Attribute, Color, EmbeddedFace, FaceMetadata, Fingerprint, ThreadSpec};
    use proptest::prelude::{any, prop, prop_assert, prop_assert_eq, proptest};
    use proptest::strategy::Strategy as _;

    fn red_face(index: usize) -> EmbeddedMetadata {
        let mut meta = FaceMetadata::default();
        meta.set(Attribute::Color(Color::new(0xFF, 0, 0)));
        EmbeddedMetadata {
            faces: vec![EmbeddedFace {
                index,
                fingerprint: Some(Fingerprint::from_hex(&"ab".repeat(32)).unwrap()),
                meta,
            }],
        }
    }

    #[test]
    fn test_embed_writes_all_three_strategies() {
        let meta = red_face(3);
        let text = embed(BLOCK_WITH_HOLE, &meta).unwrap();

        assert!(text.contains("#212=DESCRIPTIVE_REPRESENTATION_ITEM('FACETAG_META','"));
        assert!(text.contains("machined block, rev ''A'' [FACETAG:"));
        assert!(text.contains(&format!("/* {COMMENT_START} ")));

        let extraction = extract_detailed(&text).unwrap();
        assert_eq!(extraction.found(), Strategy::ALL.to_vec());
        assert!(extraction.corrupt.is_empty());
        assert_eq!(extraction.merged(), meta);
        assert_eq!(extract(&text), meta);
    }

    #[test]
    fn test_embedded_file_still_reads() {
        let text = embed(BLOCK_WITH_HOLE, &red_face(0)).unwrap();
        assert_eq!(read_faces(&text).unwrap().len(), 6);
    }

    #[test]
    fn test_reembed_replaces_instead_of_accumulating() {
        let once = embed(BLOCK_WITH_HOLE, &red_face(1)).unwrap();
        let twice = embed(&once, &red_face(1)).unwrap();
        assert_eq!(once, twice);

        let moved = embed(&once, &red_face(4)).unwrap();
        assert_eq!(moved.matches(ANNOTATION_ENTITY).count(), 1);
        assert_eq!(moved.matches(TAG_PREFIX).count(), 1);
        assert_eq!(moved.matches(COMMENT_START).count(), 1);
        assert_eq!(extract(&moved), red_face(4));
    }

    #[test]
    fn test_entity_field_wins_on_conflict() {
        let text = embed(BLOCK_WITH_HOLE, &red_face(2)).unwrap();
        let entity_payload = encode_document(&red_face(5)).unwrap();
        let old_payload = encode_document(&red_face(2)).unwrap();
        let conflicting = text.replacen(
            &format!("'{ANNOTATION_NAME}','{old_payload}'"),
            &format!("'{ANNOTATION_NAME}','{entity_payload}'"),
            1,
        );

        let extraction = extract_detailed(&conflicting).unwrap();
        assert_eq!(extraction.entity_field, Some(red_face(5)));
        assert_eq!(extraction.comment_block, Some(red_face(2)));
        // Same fingerprint key, so the entity entry replaces the others.
        assert_eq!(extraction.merged(), red_face(5));
    }

    #[test]
    fn test_extract_survives_lost_strategies() {
        let text = embed(BLOCK_WITH_HOLE, &red_face(3)).unwrap();
        let start = text.find("/* ").unwrap();
        let end = text[start..].find("*/").unwrap() + start + 2;
        let no_comment = format!("{}{}", &text[..start], &text[end..]);
        assert_eq!(extract(&no_comment), red_face(3));
    }

    #[test]
    fn test_corrupt_payload_is_skipped() {
        let text = embed(BLOCK_WITH_HOLE, &red_face(3)).unwrap();
        let payload = encode_document(&red_face(3)).unwrap();
        let broken = text.replacen(&format!("'{payload}'"), "'not*base64'", 1);

        let extraction = extract_detailed(&broken).unwrap();
        assert_eq!(extraction.corrupt, vec![Strategy::EntityField]);
        assert_eq!(extraction.merged(), red_face(3));
    }

    #[test]
    fn test_extract_without_metadata_is_empty() {
        assert!(extract(BLOCK_WITH_HOLE).is_empty());
        assert!(extract("not a step file ' at all").is_empty());
    }

    #[test]
    fn test_strip_removes_everything() {
        let text = embed(BLOCK_WITH_HOLE, &red_face(3)).unwrap();
        let stripped = strip(&text).unwrap();

        assert!(extract(&stripped.text).is_empty());
        assert_eq!(stripped.report.entity_fields, 1);
        assert_eq!(stripped.report.description_tags, 1);
        assert_eq!(stripped.report.comment_blocks, 1);
        assert!(stripped.report.bytes_removed > 0);
        assert!(stripped
            .text
            .contains("#212=DESCRIPTIVE_REPRESENTATION_ITEM('FACETAG_META','');"));
        assert!(stripped.text.contains("'machined block, rev ''A'''"));
        assert!(!stripped.text.contains(COMMENT_START));
        assert_eq!(read_faces(&stripped.text).unwrap().len(), 6);

        let again = strip(&stripped.text).unwrap();
        assert!(!again.report.touched());
        assert_eq!(again.text, stripped.text);
    }

    #[test]
    fn test_strip_then_embed_reuses_blank_entity() {
        let text = embed(BLOCK_WITH_HOLE, &red_face(3)).unwrap();
        let stripped = strip(&text).unwrap().text;
        let reembedded = embed(&stripped, &red_face(3)).unwrap();
        assert_eq!(reembedded.matches(ANNOTATION_ENTITY).count(), 1);
        assert_eq!(reembedded, text);
    }

    #[test]
    fn test_embed_empty_metadata_strips() {
        let text = embed(BLOCK_WITH_HOLE, &red_face(3)).unwrap();
        let cleared = embed(&text, &EmbeddedMetadata::default()).unwrap();
        assert!(extract(&cleared).is_empty());
    }

    #[test]
    fn test_strip_leaves_lookalike_strings_alone() {
        let lookalike = format!(
            "#300=DOCUMENT('notes','/* {COMMENT_START} x {COMMENT_END} */ [FACETAG:x]');"
        );
        let input = BLOCK_WITH_HOLE.replacen(
            "ENDSEC;\nEND-ISO",
            &format!("{lookalike}\nENDSEC;\nEND-ISO"),
            1,
        );
        let text = embed(&input, &red_face(1)).unwrap();
        let stripped = strip(&text).unwrap();

        assert!(stripped.text.contains(&lookalike));
        assert!(extract(&stripped.text).is_empty());
        assert_eq!(stripped.report.comment_blocks, 1);
    }

    #[test]
    fn test_embed_requires_data_section() {
        let err = embed("ISO-10303-21;\nHEADER;\nENDSEC;\n", &red_face(0)).unwrap_err();
        assert!(matches!(err, StepError::Annotation(_)));
    }

    #[test]
    fn test_find_tags_ignores_unterminated() {
        assert!(find_tags("text [FACETAG:abc").is_empty());
        assert_eq!(without_tags("text [FACETAG:abc] more"), "text more");
        assert_eq!(without_tags("[FACETAG:abc]"), "");
        assert_eq!(
            without_tags("see [FACETAG: rev B note] and [FACETAG:abc]"),
            "see [FACETAG: rev B note] and"
        );
    }

    #[test]
    fn test_overlapping_edits_rejected() {
        let edits = vec![
            Edit::replace(0..4, "x".into()),
            Edit::replace(2..6, "y".into()),
        ];
        assert!(matches!(apply("abcdefg", edits), Err(StepError::Annotation(_))));
    }

    fn arb_metadata() -> impl proptest::strategy::Strategy<Value = EmbeddedMetadata> {
        prop::collection::btree_map(
            0usize..6,
            (any::<(u8, u8, u8)>(), prop::option::of("[A-Za-z0-9 .-]{0,8}")),
            1..6,
        )
        .prop_map(|entries| EmbeddedMetadata {
            faces: entries
                .into_iter()
                .map(|(index, ((r, g, b), size))| {
                    let mut meta = FaceMetadata::default();
                    meta.set(Attribute::Color(Color::new(r, g, b)));
                    if let Some(size) = size {
                        meta.set(Attribute::Thread(ThreadSpec {
                            size,
                            ..ThreadSpec::default()
                        }));
                    }
                    EmbeddedFace {
                        index,
                        fingerprint: None,
                        meta,
                    }
                })
                .collect(),
        })
    }

    proptest! {
        #[test]
        fn prop_embed_extract_strip(meta in arb_metadata()) {
            let text = embed(BLOCK_WITH_HOLE, &meta).unwrap();
            prop_assert_eq!(extract(&text), meta);
            let stripped = strip(&text).unwrap();
            prop_assert!(extract(&stripped.text).is_empty());
        }
    }
}
