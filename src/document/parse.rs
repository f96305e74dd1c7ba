//! Markdown to document parsing.
//!
//! Parsing is line oriented and forgiving: the only hard failures are a
//! missing or malformed title. Declared fields that have no section come
//! back empty, unknown `##` sections are carried verbatim, and a reserved
//! `## Metadata` section restores bookkeeping fields. Unrecognized `###`
//! headers inside a mapped container section are not preserved.

use std::collections::BTreeMap;

use super::kind::{DocumentKind, KINDS};
use super::normalize::is_kebab_case;
use super::{
    Document, DocumentStatus, FieldValue, FormatError, NONE_IDENTIFIED, NONE_PROVIDED,
};

/// Reserved section title recovered into bookkeeping fields.
pub(crate) const METADATA_HEADER: &str = "Metadata";

struct Heading<'a> {
    level: usize,
    title: &'a str,
    line: usize,
}

/// Identify the kind of a markdown document from its title line.
pub fn detect_kind(markdown: &str) -> Result<&'static DocumentKind, FormatError> {
    let (_, line) = title_line(markdown).ok_or(FormatError::MissingTitle)?;
    let raw = line.trim();
    KINDS
        .iter()
        .find(|k| strip_title(k, raw).is_some())
        .ok_or_else(|| FormatError::UnknownKind {
            line: raw.to_string(),
        })
}

/// Parse markdown into a document of the given kind.
pub fn parse(markdown: &str, kind: &DocumentKind) -> Result<Document, FormatError> {
    let (title_idx, line) = title_line(markdown).ok_or(FormatError::MissingTitle)?;
    let raw = line.trim();
    let title = strip_title(kind, raw).ok_or_else(|| FormatError::TitleMismatch {
        expected: kind.title_prefix.trim_end().to_string(),
        found: raw.to_string(),
    })?;
    if kind.kebab_title && !is_kebab_case(title) {
        return Err(FormatError::TitleNotKebab {
            title: title.to_string(),
        });
    }

    let lines: Vec<&str> = markdown.lines().collect();
    let heads: Vec<Heading> = scan_headings(&lines)
        .into_iter()
        .filter(|h| h.line > title_idx && (h.level == 2 || h.level == 3))
        .collect();

    let mut fields = BTreeMap::new();
    for spec in kind.fields {
        let body = match spec.path.h3 {
            None => section_body(&lines, &heads, spec.path.h2),
            Some(h3) => nested_body(&lines, &heads, spec.path.h2, h3),
        };
        let value = if spec.list {
            FieldValue::Items(parse_items(body.as_deref().unwrap_or_default()))
        } else {
            FieldValue::Text(body.unwrap_or_default())
        };
        fields.insert(spec.name.to_string(), value);
    }

    let mut additional_sections = BTreeMap::new();
    for (idx, head) in heads.iter().enumerate() {
        if head.level != 2 || head.title == METADATA_HEADER || kind.maps_header(head.title) {
            continue;
        }
        let end = section_end(&heads, idx, 2, lines.len());
        let body = body_text(&lines, head.line + 1, end);
        additional_sections.insert(head.title.to_string(), body);
    }

    let mut doc = Document::new(kind, title);
    doc.fields = fields;
    doc.additional_sections = additional_sections;
    apply_metadata(&mut doc, &lines, &heads);
    Ok(doc)
}

fn title_line(markdown: &str) -> Option<(usize, &str)> {
    markdown
        .lines()
        .enumerate()
        .find(|(_, l)| !l.trim().is_empty())
}

fn strip_title<'a>(kind: &DocumentKind, raw: &'a str) -> Option<&'a str> {
    raw.strip_prefix(kind.title_prefix)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn scan_headings<'a>(lines: &[&'a str]) -> Vec<Heading<'a>> {
    let mut out = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_end();
        let hashes = trimmed.bytes().take_while(|&b| b == b'#').count();
        if hashes == 0 || hashes > 6 {
            continue;
        }
        if let Some(title) = trimmed[hashes..].strip_prefix(' ') {
            let title = title.trim();
            if !title.is_empty() {
                out.push(Heading {
                    level: hashes,
                    title,
                    line: idx,
                });
            }
        }
    }
    out
}

/// Line index where the section starting at `heads[idx]` ends.
fn section_end(heads: &[Heading], idx: usize, max_level: usize, total_lines: usize) -> usize {
    heads[idx + 1..]
        .iter()
        .find(|h| h.level <= max_level)
        .map(|h| h.line)
        .unwrap_or(total_lines)
}

fn body_text(lines: &[&str], start: usize, end: usize) -> String {
    lines[start..end].join("\n").trim().to_string()
}

fn section_body(lines: &[&str], heads: &[Heading], h2: &str) -> Option<String> {
    let idx = heads.iter().position(|h| h.level == 2 && h.title == h2)?;
    let end = section_end(heads, idx, 2, lines.len());
    Some(body_text(lines, heads[idx].line + 1, end))
}

fn nested_body(lines: &[&str], heads: &[Heading], h2: &str, h3: &str) -> Option<String> {
    let container = heads.iter().position(|h| h.level == 2 && h.title == h2)?;
    let container_end = section_end(heads, container, 2, lines.len());
    let idx = heads
        .iter()
        .enumerate()
        .skip(container + 1)
        .find(|(_, h)| h.level == 3 && h.title == h3 && h.line < container_end)
        .map(|(i, _)| i)?;
    let end = section_end(heads, idx, 3, lines.len());
    Some(body_text(lines, heads[idx].line + 1, end))
}

fn parse_items(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        else {
            continue;
        };
        let item = item.trim();
        if !item.is_empty() && !is_sentinel(item) {
            items.push(item.to_string());
        }
    }
    items
}

fn is_sentinel(text: &str) -> bool {
    text.eq_ignore_ascii_case(NONE_IDENTIFIED) || text.eq_ignore_ascii_case(NONE_PROVIDED)
}

fn apply_metadata(doc: &mut Document, lines: &[&str], heads: &[Heading]) {
    let Some(idx) = heads
        .iter()
        .position(|h| h.level == 2 && h.title == METADATA_HEADER)
    else {
        return;
    };
    let end = section_end(heads, idx, 2, lines.len());
    for line in &lines[heads[idx].line + 1..end] {
        let Some(rest) = line.trim().strip_prefix("- ") else {
            continue;
        };
        let Some((key, value)) = rest.split_once(':') else {
            continue;
        };
        let value = value.trim();
        // Malformed values fall back to the defaults; "Kind" is
        // informational since the caller already chose the kind.
        match key.trim() {
            "Status" => {
                if let Some(status) = DocumentStatus::parse(value) {
                    doc.status = status;
                }
            }
            "Version" => {
                if let Ok(version) = value.parse::<u32>() {
                    if version >= 1 {
                        doc.version = version;
                    }
                }
            }
            "Iteration" => {
                if let Ok(iteration) = value.parse::<u32>() {
                    doc.iteration = iteration;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::kind;
    use super::*;

    const PHASE_DOC: &str = "\
# Phase: phase-1-foundation

## Objective

Stand up the storage layer.

## Scope

Durable backend only.

## Deliverables

- Schema with cascade rules
- Contract test suite

## Acceptance Criteria

- Both backends pass the shared suite

## Risks

None identified

## Dependencies

None identified
";

    #[test]
    fn test_detect_kind_by_title_prefix() {
        assert_eq!(detect_kind(PHASE_DOC).unwrap().id, "phase");
        assert_eq!(
            detect_kind("# Charter: Collaborative Editor\n").unwrap().id,
            "charter"
        );
        assert!(matches!(
            detect_kind("# Retrospective: q3\n"),
            Err(FormatError::UnknownKind { .. })
        ));
        assert!(matches!(
            detect_kind("\n\n  \n"),
            Err(FormatError::MissingTitle)
        ));
    }

    #[test]
    fn test_parse_extracts_text_and_list_fields() {
        let phase = kind::lookup("phase").unwrap();
        let doc = parse(PHASE_DOC, phase).unwrap();
        assert_eq!(doc.title, "phase-1-foundation");
        assert_eq!(doc.field_text("objective"), Some("Stand up the storage layer."));
        assert_eq!(doc.field_text("scope"), Some("Durable backend only."));
        assert_eq!(
            doc.field_items("deliverables").unwrap(),
            ["Schema with cascade rules", "Contract test suite"]
        );
        assert_eq!(
            doc.field_items("acceptance_criteria").unwrap(),
            ["Both backends pass the shared suite"]
        );
    }

    #[test]
    fn test_sentinels_parse_to_empty_lists() {
        let phase = kind::lookup("phase").unwrap();
        let doc = parse(PHASE_DOC, phase).unwrap();
        assert_eq!(doc.field_items("risks"), Some(&[][..]));
        assert_eq!(doc.field_items("dependencies"), Some(&[][..]));

        let bulleted = PHASE_DOC.replace("None identified", "- None provided");
        let doc = parse(&bulleted, phase).unwrap();
        assert_eq!(doc.field_items("risks"), Some(&[][..]));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let phase = kind::lookup("phase").unwrap();
        let doc = parse("# Phase: bare\n", phase).unwrap();
        assert_eq!(doc.fields.len(), phase.fields.len());
        assert!(doc.fields.values().all(FieldValue::is_empty));
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.iteration, 0);
    }

    #[test]
    fn test_unmapped_sections_are_preserved_verbatim() {
        let markdown = "\
# Phase: phase-2-rollout

## Objective

Ship it.

## Rollback Plan

Revert the deploy and restore the previous
snapshot.

- keep the bullet shape
";
        let phase = kind::lookup("phase").unwrap();
        let doc = parse(markdown, phase).unwrap();
        assert_eq!(
            doc.additional_sections.get("Rollback Plan").map(String::as_str),
            Some("Revert the deploy and restore the previous\nsnapshot.\n\n- keep the bullet shape")
        );
    }

    #[test]
    fn test_nested_fields_resolve_under_container() {
        let markdown = "\
# Design: cache-layer

## Summary

One write path.

## Approach

### Decision

Write-through with bounded queue.

### Rollout

Dark launch first.

## Open Questions

None identified
";
        let design = kind::lookup("design").unwrap();
        let doc = parse(markdown, design).unwrap();
        assert_eq!(
            doc.field_text("decision"),
            Some("Write-through with bounded queue.")
        );
        assert_eq!(doc.field_text("rollout"), Some("Dark launch first."));
        // The container itself is mapped, so it must not leak into
        // additional sections.
        assert!(doc.additional_sections.is_empty());
    }

    #[test]
    fn test_metadata_section_restores_bookkeeping() {
        let markdown = "\
# Phase: phase-1-foundation

## Objective

Stand up the storage layer.

## Metadata

- Kind: phase
- Status: in_review
- Version: 4
- Iteration: 3
";
        let phase = kind::lookup("phase").unwrap();
        let doc = parse(markdown, phase).unwrap();
        assert_eq!(doc.status, DocumentStatus::InReview);
        assert_eq!(doc.version, 4);
        assert_eq!(doc.iteration, 3);
        assert!(doc.additional_sections.is_empty());
    }

    #[test]
    fn test_malformed_metadata_falls_back_to_defaults() {
        let markdown = "\
# Phase: phase-1-foundation

## Metadata

- Status: published
- Version: zero
- Iteration: -2
";
        let phase = kind::lookup("phase").unwrap();
        let doc = parse(markdown, phase).unwrap();
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.iteration, 0);
    }

    #[test]
    fn test_kebab_title_enforced_per_kind() {
        let phase = kind::lookup("phase").unwrap();
        assert!(matches!(
            parse("# Phase: Phase One\n", phase),
            Err(FormatError::TitleNotKebab { .. })
        ));
        // Charter titles are display names, so any non-empty text works.
        let charter = kind::lookup("charter").unwrap();
        let doc = parse("# Charter: Collaborative Editor\n", charter).unwrap();
        assert_eq!(doc.title, "Collaborative Editor");
    }

    #[test]
    fn test_title_mismatch_and_empty_title() {
        let phase = kind::lookup("phase").unwrap();
        assert!(matches!(
            parse("# Design: cache-layer\n", phase),
            Err(FormatError::TitleMismatch { .. })
        ));
        assert!(matches!(
            parse("# Phase: \n", phase),
            Err(FormatError::TitleMismatch { .. })
        ));
        assert!(matches!(parse("", phase), Err(FormatError::MissingTitle)));
    }

    #[test]
    fn test_subheaders_inside_plain_sections_stay_in_the_field() {
        let markdown = "\
# Phase: phase-3

## Scope

Core loop.

### Details

Line-oriented only.

## Objective

Ship.
";
        let phase = kind::lookup("phase").unwrap();
        let doc = parse(markdown, phase).unwrap();
        assert_eq!(
            doc.field_text("scope"),
            Some("Core loop.\n\n### Details\n\nLine-oriented only.")
        );
        assert_eq!(doc.field_text("objective"), Some("Ship."));
    }
}
