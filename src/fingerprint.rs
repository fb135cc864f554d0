// src/fingerprint.rs
//! Content fingerprinting: derives a stable identity key so re-fetches of
//! unchanged or trivially-reformatted content collapse to the same record.
//!
//! The key is intentionally lossy toward "same logical item": full-body
//! hashing would break on trivial re-renders (ads, embedded timestamps),
//! so we hash kind + canonical URL + normalized title + a fixed prefix of
//! the normalized body. Pure functions, no I/O.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// How many normalized body characters participate in the fingerprint.
pub const BODY_PREFIX_CHARS: usize = 256;

/// The five kinds of content the system tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Event,
    JobPosting,
    BlogPost,
    InvestorReport,
    VideoTranscript,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Event => "event",
            ContentKind::JobPosting => "job-posting",
            ContentKind::BlogPost => "blog-post",
            ContentKind::InvestorReport => "investor-report",
            ContentKind::VideoTranscript => "video-transcript",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "event" => Some(ContentKind::Event),
            "job-posting" => Some(ContentKind::JobPosting),
            "blog-post" => Some(ContentKind::BlogPost),
            "investor-report" => Some(ContentKind::InvestorReport),
            "video-transcript" => Some(ContentKind::VideoTranscript),
            _ => None,
        }
    }

    /// Directory name inside the file area for this kind's bodies.
    pub fn dir(&self) -> &'static str {
        match self {
            ContentKind::Event => "events",
            ContentKind::JobPosting => "job_postings",
            ContentKind::BlogPost => "blog_posts",
            ContentKind::InvestorReport => "reports",
            ContentKind::VideoTranscript => "transcripts",
        }
    }

    /// Query parameters that survive URL canonicalization for this kind.
    /// Job portals commonly address individual postings via an id param on
    /// an otherwise shared listing URL; everything else drops its query.
    fn query_whitelist(&self) -> &'static [&'static str] {
        match self {
            ContentKind::JobPosting => &["gh_jid", "jobid", "job_id", "jid", "id"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize free text: decode HTML entities, strip tags, lower-case,
/// collapse whitespace, trim, strip trailing sentence punctuation.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out = out.to_lowercase();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',' | ':' | ';') {
            out.pop();
        } else {
            break;
        }
    }

    out
}

fn body_prefix(body: &str) -> String {
    normalize_text(body).chars().take(BODY_PREFIX_CHARS).collect()
}

/// Canonicalize a source URL to scheme + lowercased host + path (trailing
/// slash trimmed). The query is stripped unless the kind whitelists an
/// identifying parameter, in which case surviving params are re-appended
/// in sorted order. Unparseable input falls back to the trimmed raw string
/// so fingerprinting stays total.
pub fn canonical_url(kind: ContentKind, raw: &str) -> String {
    let parsed = match Url::parse(raw.trim()) {
        Ok(u) => u,
        Err(_) => return raw.trim().to_string(),
    };

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let path = parsed.path().trim_end_matches('/');
    let mut out = format!("{}://{}{}", parsed.scheme(), host, path);

    let whitelist = kind.query_whitelist();
    if !whitelist.is_empty() {
        let mut kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| whitelist.contains(&k.to_ascii_lowercase().as_str()))
            .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
            .collect();
        kept.sort();
        if !kept.is_empty() {
            let q: Vec<String> = kept.iter().map(|(k, v)| format!("{k}={v}")).collect();
            out.push('?');
            out.push_str(&q.join("&"));
        }
    }

    out
}

/// Derive the stable identity key for a content item. Two fetches of
/// logically identical content yield the same fingerprint even if
/// incidental whitespace or markup differs.
pub fn fingerprint(kind: ContentKind, source_url: &str, title: &str, body_excerpt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_url(kind, source_url).as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize_text(title).as_bytes());
    hasher.update(b"\n");
    hasher.update(body_prefix(body_excerpt).as_bytes());
    hex::encode(hasher.finalize())
}
