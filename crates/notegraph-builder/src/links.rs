//! Link and tag extraction from document text.
//!
//! Three syntaxes are recognized: bracket-style `[[target]]` /
//! `[[target|alias]]`, inline `[text](target)`, and reference-style
//! `[text][ref]` backed by `[ref]: target` definitions.

use std::collections::HashMap;

use notegraph_core::EdgeKind;

/// A single link occurrence found in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    /// Raw link target, before resolution.
    pub target: String,
    /// Display alias, when the syntax carries one.
    pub alias: Option<String>,
    /// Which syntax produced the link.
    pub kind: EdgeKind,
    /// Byte offset of the link in the document.
    pub position: usize,
}

/// Check whether a target points outside the workspace.
pub fn is_external_target(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with("data:")
}

/// Extract every link occurrence from `content`, in document order.
pub fn extract_links(content: &str) -> Vec<LinkRecord> {
    let definitions = collect_definitions(content);
    let bytes = content.as_bytes();
    let mut records = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }

        // Image embeds are not graph links.
        let is_image = i > 0 && bytes[i - 1] == b'!';

        if content[i..].starts_with("[[") {
            match scan_until(content, i + 2, "]]") {
                Some(end) => {
                    let inner = &content[i + 2..end];
                    if !inner.is_empty() && !inner.contains('\n') && !is_image {
                        let (target, alias) = match inner.split_once('|') {
                            Some((t, a)) => (t.trim(), Some(a.trim().to_string())),
                            None => (inner.trim(), None),
                        };
                        if !target.is_empty() {
                            records.push(LinkRecord {
                                target: target.to_string(),
                                alias,
                                kind: EdgeKind::Wiki,
                                position: i,
                            });
                        }
                    }
                    i = end + 2;
                }
                None => i += 2,
            }
            continue;
        }

        let Some(text_end) = scan_until(content, i + 1, "]") else {
            i += 1;
            continue;
        };
        let text = &content[i + 1..text_end];
        if text.contains('\n') {
            i = text_end + 1;
            continue;
        }

        let after = text_end + 1;
        if content[after..].starts_with('(') {
            if let Some(close) = scan_until(content, after + 1, ")") {
                let target = content[after + 1..close].trim();
                if !target.is_empty() && !target.contains('\n') && !is_image {
                    records.push(LinkRecord {
                        target: target.to_string(),
                        alias: non_empty(text),
                        kind: EdgeKind::Markdown,
                        position: i,
                    });
                }
                i = close + 1;
                continue;
            }
        } else if content[after..].starts_with('[') {
            if let Some(close) = scan_until(content, after + 1, "]") {
                let label = content[after + 1..close].trim();
                if !label.is_empty() && !is_image {
                    // An undefined ref falls back to the label itself.
                    let target = definitions
                        .get(&label.to_ascii_lowercase())
                        .cloned()
                        .unwrap_or_else(|| label.to_string());
                    records.push(LinkRecord {
                        target,
                        alias: non_empty(text),
                        kind: EdgeKind::Reference,
                        position: i,
                    });
                }
                i = close + 1;
                continue;
            }
        }

        i = text_end + 1;
    }

    records
}

/// Extract inline `#tag` occurrences (lowercased) with byte offsets.
pub fn extract_tags(content: &str) -> Vec<(String, usize)> {
    let bytes = content.as_bytes();
    let mut tags = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'#'
            && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric() && bytes[i - 1] != b'#')
        {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && is_tag_byte(bytes[end]) {
                end += 1;
            }
            // Headings ("# Title") have no tag characters after the hash.
            if end > start {
                tags.push((content[start..end].to_ascii_lowercase(), i));
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }

    tags
}

fn is_tag_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'/'
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Byte offset of `pat` at or after `from`, within the current line context.
fn scan_until(content: &str, from: usize, pat: &str) -> Option<usize> {
    content.get(from..)?.find(pat).map(|off| from + off)
}

/// Collect `[ref]: target` definitions, keyed by lowercased label.
fn collect_definitions(content: &str) -> HashMap<String, String> {
    let mut defs = HashMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('[') {
            continue;
        }
        let Some(close) = trimmed.find("]:") else {
            continue;
        };
        let label = trimmed[1..close].trim();
        let target = trimmed[close + 2..]
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .split_whitespace()
            .next()
            .unwrap_or("");
        if !label.is_empty() && !target.is_empty() {
            defs.insert(label.to_ascii_lowercase(), target.to_string());
        }
    }
    defs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiki_links_with_and_without_alias() {
        let records = extract_links("[[Home]], [[Projects/README]], [[Home|Go to Home]]");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].target, "Home");
        assert_eq!(records[0].alias, None);
        assert_eq!(records[1].target, "Projects/README");
        assert_eq!(records[1].alias, None);
        assert_eq!(records[2].target, "Home");
        assert_eq!(records[2].alias.as_deref(), Some("Go to Home"));
        assert!(records.iter().all(|r| r.kind == EdgeKind::Wiki));
    }

    #[test]
    fn inline_markdown_link() {
        let records = extract_links("see [the readme](projects/readme.md) for details");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "projects/readme.md");
        assert_eq!(records[0].alias.as_deref(), Some("the readme"));
        assert_eq!(records[0].kind, EdgeKind::Markdown);
    }

    #[test]
    fn reference_link_resolves_definition() {
        let content = "read [the guide][guide]\n\n[guide]: docs/guide.md\n";
        let records = extract_links(content);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "docs/guide.md");
        assert_eq!(records[0].kind, EdgeKind::Reference);
    }

    #[test]
    fn undefined_reference_falls_back_to_label() {
        let records = extract_links("read [the guide][guide]");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "guide");
    }

    #[test]
    fn image_embeds_are_skipped() {
        let records = extract_links("![diagram](assets/diagram.png) and [[Home]]");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "Home");
    }

    #[test]
    fn external_targets_detected() {
        assert!(is_external_target("https://example.com"));
        assert!(is_external_target("mailto:me@example.com"));
        assert!(!is_external_target("projects/readme.md"));
    }

    #[test]
    fn unterminated_links_do_not_loop() {
        let records = extract_links("[[broken and [also](broken");
        assert!(records.is_empty());
    }

    #[test]
    fn tags_extracted_headings_ignored() {
        let tags = extract_tags("# Heading\nbody with #Rust and #graph-viz\n");
        let names: Vec<&str> = tags.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(names, vec!["rust", "graph-viz"]);
    }
}
