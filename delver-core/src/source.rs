use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Upper bound on the snippet carried by a [`SourceHit`].
pub const SNIPPET_CHAR_LIMIT: usize = 2000;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Web,
    Rag,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Web => write!(f, "web"),
            Origin::Rag => write!(f, "rag"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Citation {
    Url { url: String },
    Document {
        name: String,
        chunk_index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
    },
}

impl Citation {
    pub fn url(url: impl Into<String>) -> Self {
        Citation::Url { url: url.into() }
    }

    pub fn document(name: impl Into<String>, chunk_index: usize, page: Option<u32>) -> Self {
        Citation::Document {
            name: name.into(),
            chunk_index,
            page,
        }
    }

    /// Canonical identity used for deduplication. URLs are normalized
    /// (lowercased scheme/host, default port elided, trailing slash and
    /// fragment dropped); document refs key on name+chunk+page.
    pub fn canonical(&self) -> String {
        match self {
            Citation::Url { url } => match Url::parse(url.trim()) {
                Ok(parsed) => {
                    let mut out = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or(""));
                    if let Some(port) = parsed.port() {
                        out.push_str(&format!(":{port}"));
                    }
                    out.push_str(parsed.path().trim_end_matches('/'));
                    if let Some(query) = parsed.query() {
                        out.push('?');
                        out.push_str(query);
                    }
                    out
                }
                Err(_) => url.trim().to_string(),
            },
            Citation::Document {
                name,
                chunk_index,
                page,
            } => match page {
                Some(page) => format!("{name}#{chunk_index}@{page}"),
                None => format!("{name}#{chunk_index}"),
            },
        }
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Citation::Url { url } => write!(f, "{url}"),
            Citation::Document {
                name,
                chunk_index,
                page,
            } => {
                write!(f, "{name}, chunk {chunk_index}")?;
                if let Some(page) = page {
                    write!(f, ", p. {page}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SourceHit {
    pub text: String,
    pub origin: Origin,
    pub citation: Citation,
}

impl SourceHit {
    /// Builds a hit, truncating the snippet to [`SNIPPET_CHAR_LIMIT`] on a
    /// char boundary.
    pub fn new(text: impl Into<String>, origin: Origin, citation: Citation) -> Self {
        let mut text: String = text.into();
        if text.chars().count() > SNIPPET_CHAR_LIMIT {
            text = text.chars().take(SNIPPET_CHAR_LIMIT).collect();
        }
        Self {
            text,
            origin,
            citation,
        }
    }

    /// Dedup identity: origin plus canonical citation.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.origin, self.citation.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_canonicalization_ignores_fragment_and_trailing_slash() {
        let a = Citation::url("https://Example.com/tariffs/");
        let b = Citation::url("https://example.com/tariffs#section-2");
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn url_canonicalization_keeps_query() {
        let a = Citation::url("https://example.com/search?q=1");
        let b = Citation::url("https://example.com/search?q=2");
        assert_ne!(a.canonical(), b.canonical());
    }

    #[test]
    fn document_canonical_includes_page() {
        let a = Citation::document("report.pdf", 3, Some(12));
        let b = Citation::document("report.pdf", 3, None);
        assert_ne!(a.canonical(), b.canonical());
    }

    #[test]
    fn snippet_is_truncated_on_char_boundary() {
        let long = "é".repeat(SNIPPET_CHAR_LIMIT + 10);
        let hit = SourceHit::new(long, Origin::Web, Citation::url("https://example.com"));
        assert_eq!(hit.text.chars().count(), SNIPPET_CHAR_LIMIT);
    }

    #[test]
    fn dedup_key_distinguishes_origin() {
        let web = SourceHit::new("t", Origin::Web, Citation::url("https://example.com/a"));
        let rag = SourceHit::new("t", Origin::Rag, Citation::url("https://example.com/a"));
        assert_ne!(web.dedup_key(), rag.dedup_key());
    }
}
