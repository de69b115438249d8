//! URL entry kinds and the slug arithmetic behind wildcard resolution and
//! subtree rewrites.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;
use crate::slug::PATH_SEPARATOR;

/// Upper bound on wildcard → wildcard hops followed when resolving a moved
/// slug. Each rename adds one hop, so this is far above anything real.
pub const MAX_WILDCARD_HOPS: usize = 32;

/// What a URL entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlKind {
    /// A page; `target_id` is the page id.
    Page,
    /// A standalone redirect; `target_id` is the redirect id.
    RedirectUrl,
    /// A soft reservation left behind by a rename; `target_id` is the id of
    /// the URL entry it now points through.
    Wildcard,
}

impl UrlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::RedirectUrl => "redirecturl",
            Self::Wildcard => "wildcard",
        }
    }
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(Self::Page),
            "redirecturl" => Ok(Self::RedirectUrl),
            "wildcard" => Ok(Self::Wildcard),
            other => Err(UnknownVariant {
                kind: "url kind",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for UrlKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// HTTP flavour of a standalone redirect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectKind {
    #[default]
    Temporary,
    Permanent,
}

impl RedirectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporary => "temporary",
            Self::Permanent => "permanent",
        }
    }

    /// HTTP status code a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Temporary => 302,
            Self::Permanent => 301,
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedirectKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "temporary" | "temp" => Ok(Self::Temporary),
            "permanent" | "perm" => Ok(Self::Permanent),
            _ => Err(UnknownVariant {
                kind: "redirect kind",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for RedirectKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Proper prefixes of `slug`, most specific first.
///
/// `a/b/c` yields `["a/b", "a"]`. A single-segment slug has none.
pub fn wildcard_candidates(slug: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut end = slug.len();
    while let Some(idx) = slug[..end].rfind(PATH_SEPARATOR) {
        if idx == 0 {
            break;
        }
        candidates.push(&slug[..idx]);
        end = idx;
    }
    candidates
}

/// Whether `slug` lies strictly below `ancestor` in the path tree.
pub fn is_descendant(slug: &str, ancestor: &str) -> bool {
    slug.len() > ancestor.len() + 1
        && slug.starts_with(ancestor)
        && slug.as_bytes()[ancestor.len()] == b'/'
}

/// Replace the `old_prefix` of a descendant slug with `new_prefix`.
///
/// Returns `None` when `slug` is not a descendant of `old_prefix`.
pub fn rewrite_prefix(slug: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if !is_descendant(slug, old_prefix) {
        return None;
    }
    Some(format!("{new_prefix}{}", &slug[old_prefix.len()..]))
}

/// `LIKE` pattern matching every descendant of `slug`.
///
/// Valid slugs never contain `%`, `_` or `\`, so no escaping is needed.
pub fn descendant_pattern(slug: &str) -> String {
    format!("{slug}/%")
}

/// The part of `requested` below the matched wildcard prefix, including the
/// leading `/`. Empty when the request hit the prefix itself.
pub fn remainder<'a>(requested: &'a str, matched_prefix: &str) -> &'a str {
    if is_descendant(requested, matched_prefix) {
        &requested[matched_prefix.len()..]
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_kind_round_trips_through_strings() {
        for kind in [UrlKind::Page, UrlKind::RedirectUrl, UrlKind::Wildcard] {
            assert_eq!(kind.as_str().parse::<UrlKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_url_kind_is_rejected() {
        let err = "folder".parse::<UrlKind>().unwrap_err();
        assert_eq!(err.to_string(), "invalid url kind: folder");
    }

    #[test]
    fn redirect_kind_accepts_short_aliases() {
        assert_eq!("temp".parse::<RedirectKind>().unwrap(), RedirectKind::Temporary);
        assert_eq!("Permanent".parse::<RedirectKind>().unwrap(), RedirectKind::Permanent);
    }

    #[test]
    fn redirect_kind_status_codes() {
        assert_eq!(RedirectKind::Temporary.status_code(), 302);
        assert_eq!(RedirectKind::Permanent.status_code(), 301);
    }

    #[test]
    fn candidates_are_most_specific_first() {
        assert_eq!(wildcard_candidates("a/b/c/d"), vec!["a/b/c", "a/b", "a"]);
    }

    #[test]
    fn single_segment_has_no_candidates() {
        assert!(wildcard_candidates("about").is_empty());
    }

    #[test]
    fn descendant_requires_segment_boundary() {
        assert!(is_descendant("news/2024", "news"));
        assert!(!is_descendant("newsletter", "news"));
        assert!(!is_descendant("news", "news"));
        assert!(!is_descendant("news/", "news"));
    }

    #[test]
    fn rewrite_prefix_replaces_only_the_prefix() {
        assert_eq!(
            rewrite_prefix("a/b/x/y", "a/b", "c/d").as_deref(),
            Some("c/d/x/y")
        );
        assert_eq!(rewrite_prefix("a/bx", "a/b", "c/d"), None);
    }

    #[test]
    fn descendant_pattern_appends_separator() {
        assert_eq!(descendant_pattern("a/b"), "a/b/%");
    }

    #[test]
    fn remainder_below_prefix() {
        assert_eq!(remainder("old/deep/child", "old"), "/deep/child");
        assert_eq!(remainder("old", "old"), "");
    }
}
