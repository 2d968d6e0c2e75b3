use std::collections::HashSet;

use delver_core::{Origin, SourceHit};

/// Renders the Markdown citation block appended to the finalized report.
/// Hits are grouped by origin (web first), deduplicated by canonical
/// citation, and numbered in first-appearance order. Empty sources yield an
/// empty block.
pub fn build_citation_block(sources: &[SourceHit]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut web: Vec<&SourceHit> = Vec::new();
    let mut rag: Vec<&SourceHit> = Vec::new();
    for hit in sources {
        if !seen.insert(hit.dedup_key()) {
            continue;
        }
        match hit.origin {
            Origin::Web => web.push(hit),
            Origin::Rag => rag.push(hit),
        }
    }

    let mut block = String::from("## Sources\n");
    let mut number = 0usize;
    if !web.is_empty() {
        block.push_str("\n### Web\n");
        for hit in &web {
            number += 1;
            block.push_str(&format!("{number}. {}\n", hit.citation));
        }
    }
    if !rag.is_empty() {
        block.push_str("\n### Documents\n");
        for hit in &rag {
            number += 1;
            block.push_str(&format!("{number}. {}\n", hit.citation));
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use delver_core::Citation;

    #[test]
    fn empty_sources_yield_empty_block() {
        assert_eq!(build_citation_block(&[]), "");
    }

    #[test]
    fn groups_dedups_and_numbers_in_first_appearance_order() {
        let sources = vec![
            SourceHit::new("a", Origin::Web, Citation::url("https://example.com/a")),
            SourceHit::new("d", Origin::Rag, Citation::document("hts.pdf", 2, Some(7))),
            SourceHit::new("a2", Origin::Web, Citation::url("https://example.com/a/")),
            SourceHit::new("b", Origin::Web, Citation::url("https://example.com/b")),
        ];
        let block = build_citation_block(&sources);
        assert!(block.starts_with("## Sources"));
        assert!(block.contains("1. https://example.com/a\n"));
        assert!(block.contains("2. https://example.com/b\n"));
        assert!(block.contains("3. hts.pdf, chunk 2, p. 7\n"));
        // the duplicate of /a was dropped
        assert_eq!(block.matches("example.com/a").count(), 1);
    }
}
