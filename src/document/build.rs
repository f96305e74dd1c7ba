//! Document to markdown rendering.
//!
//! Rendering is canonical: declared fields in declaration order, nested
//! containers emitted once, unmapped sections sorted by title, one blank
//! line between blocks, and a trailing `## Metadata` section. Because
//! parsing trims exactly what rendering normalizes, one parse/build cycle
//! canonicalizes any input and further cycles reproduce it byte for byte.

use super::kind::DocumentKind;
use super::parse::METADATA_HEADER;
use super::{Document, FieldValue, NONE_IDENTIFIED};

/// Render a document as markdown.
pub fn build(kind: &DocumentKind, doc: &Document) -> String {
    let mut blocks: Vec<String> = Vec::new();
    blocks.push(format!("{}{}", kind.title_prefix, doc.title));

    let mut open_container: Option<&str> = None;
    for spec in kind.fields {
        match spec.path.h3 {
            None => {
                blocks.push(format!("## {}", spec.path.h2));
                open_container = None;
            }
            Some(h3) => {
                if open_container != Some(spec.path.h2) {
                    blocks.push(format!("## {}", spec.path.h2));
                    open_container = Some(spec.path.h2);
                }
                blocks.push(format!("### {h3}"));
            }
        }
        if let Some(body) = field_body(doc.fields.get(spec.name), spec.list) {
            blocks.push(body);
        }
    }

    for (title, content) in &doc.additional_sections {
        blocks.push(format!("## {title}"));
        let content = content.trim();
        if !content.is_empty() {
            blocks.push(content.to_string());
        }
    }

    blocks.push(format!("## {METADATA_HEADER}"));
    blocks.push(format!(
        "- Kind: {}\n- Status: {}\n- Version: {}\n- Iteration: {}",
        doc.kind, doc.status, doc.version, doc.iteration
    ));

    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

fn field_body(value: Option<&FieldValue>, list: bool) -> Option<String> {
    match value {
        Some(FieldValue::Text(text)) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Some(FieldValue::Items(items)) if !items.is_empty() => {
            let rendered: Vec<String> = items.iter().map(|i| format!("- {}", i.trim())).collect();
            Some(rendered.join("\n"))
        }
        // Empty or absent: lists render their sentinel, text renders nothing.
        Some(FieldValue::Items(_)) | None => list.then(|| NONE_IDENTIFIED.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{kind, parse, DocumentStatus};
    use super::*;

    fn phase_doc() -> (&'static DocumentKind, Document) {
        let phase = kind::lookup("phase").unwrap();
        let mut doc = Document::new(phase, "phase-1-foundation");
        doc.fields.insert(
            "objective".to_string(),
            FieldValue::Text("Stand up the storage layer.".to_string()),
        );
        doc.fields.insert(
            "deliverables".to_string(),
            FieldValue::Items(vec![
                "Schema with cascade rules".to_string(),
                "Contract test suite".to_string(),
            ]),
        );
        doc.additional_sections.insert(
            "Rollback Plan".to_string(),
            "Revert and restore the snapshot.".to_string(),
        );
        (phase, doc)
    }

    #[test]
    fn test_build_renders_declared_order_and_metadata() {
        let (phase, doc) = phase_doc();
        let markdown = build(phase, &doc);
        let expected = "\
# Phase: phase-1-foundation

## Objective

Stand up the storage layer.

## Scope

## Deliverables

- Schema with cascade rules
- Contract test suite

## Acceptance Criteria

None identified

## Risks

None identified

## Dependencies

None identified

## Rollback Plan

Revert and restore the snapshot.

## Metadata

- Kind: phase
- Status: draft
- Version: 1
- Iteration: 0
";
        assert_eq!(markdown, expected);
    }

    #[test]
    fn test_parse_build_round_trip_preserves_document() {
        let (phase, doc) = phase_doc();
        let markdown = build(phase, &doc);
        let reparsed = parse(&markdown, phase).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_build_is_byte_stable_after_one_canonicalizing_pass() {
        // Messy but recognizable input: odd spacing, a bulleted sentinel,
        // sections out of order.
        let messy = "\
# Phase: phase-1-foundation


## Deliverables

-   Schema with cascade rules
- Contract test suite

## Objective

Stand up the storage layer.

## Risks

- None identified
";
        let phase = kind::lookup("phase").unwrap();
        let first = build(phase, &parse(messy, phase).unwrap());
        let second = build(phase, &parse(&first, phase).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_nested_container_emitted_once() {
        let design = kind::lookup("design").unwrap();
        let mut doc = Document::new(design, "cache-layer");
        doc.fields.insert(
            "decision".to_string(),
            FieldValue::Text("Write-through.".to_string()),
        );
        doc.fields.insert(
            "rollout".to_string(),
            FieldValue::Text("Dark launch.".to_string()),
        );
        let markdown = build(design, &doc);
        assert_eq!(markdown.matches("## Approach").count(), 1);
        assert!(markdown.contains("### Decision\n\nWrite-through."));
        assert!(markdown.contains("### Rollout\n\nDark launch."));

        let reparsed = parse(&markdown, design).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_additional_sections_render_sorted() {
        let (phase, mut doc) = phase_doc();
        doc.additional_sections
            .insert("Alpha Notes".to_string(), "first".to_string());
        let markdown = build(phase, &doc);
        let alpha = markdown.find("## Alpha Notes").unwrap();
        let rollback = markdown.find("## Rollback Plan").unwrap();
        let metadata = markdown.find("## Metadata").unwrap();
        assert!(alpha < rollback && rollback < metadata);
    }

    #[test]
    fn test_metadata_round_trips_through_build() {
        let (phase, mut doc) = phase_doc();
        doc.status = DocumentStatus::Approved;
        doc.version = 7;
        doc.iteration = 6;
        let markdown = build(phase, &doc);
        let reparsed = parse(&markdown, phase).unwrap();
        assert_eq!(reparsed.status, DocumentStatus::Approved);
        assert_eq!(reparsed.version, 7);
        assert_eq!(reparsed.iteration, 6);
    }

    #[test]
    fn test_charter_round_trip_with_display_title() {
        let charter = kind::lookup("charter").unwrap();
        let mut doc = Document::new(charter, "Collaborative Editor");
        doc.fields.insert(
            "vision".to_string(),
            FieldValue::Text("Real-time editing for small teams.".to_string()),
        );
        doc.fields.insert(
            "goals".to_string(),
            FieldValue::Items(vec!["Sub-second sync".to_string()]),
        );
        let markdown = build(charter, &doc);
        assert!(markdown.starts_with("# Charter: Collaborative Editor\n"));
        let reparsed = parse(&markdown, charter).unwrap();
        assert_eq!(reparsed, doc);
    }
}
