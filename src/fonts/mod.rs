//! Recursive `@font-face` discovery across inline style blocks, linked
//! stylesheets, and chained `@import`s.
//!
//! Every fetched URL is recorded in a per-pass visited set *before* the
//! fetch, so cyclic imports terminate and duplicate hrefs are fetched once.
//! Fetch failures are skipped silently (logged at debug level); fonts are
//! best-effort by contract.

mod sink;

pub use sink::{inject_font_faces, sink_text, DEFAULT_FONT_SINK_ID};

use crate::css;
use crate::dom::ParsedDocument;
use crate::env::Environment;
use futures::future::{join_all, BoxFuture};
use std::collections::HashSet;
use std::sync::Mutex;
use url::Url;

/// Deduplicated set of rebased `@font-face` rule blocks. Insertion-ordered;
/// byte-identical blocks collapse to one entry no matter how many sources
/// produced them.
#[derive(Debug, Default)]
pub struct FontFaceRuleSet {
    rules: Vec<String>,
    seen: HashSet<String>,
}

impl FontFaceRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the rule was not already present.
    pub fn insert(&mut self, rule: String) -> bool {
        if self.seen.contains(&rule) {
            return false;
        }
        self.seen.insert(rule.clone());
        self.rules.push(rule);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(String::as_str)
    }
}

/// Walk the document's style sources and collect every reachable
/// `@font-face` block, rebased to absolute URLs. Read-only with respect to
/// the document; network fetches are the only side effect.
pub async fn resolve_font_faces(parsed: &ParsedDocument, env: &Environment) -> FontFaceRuleSet {
    let resolver = Resolver {
        env,
        visited: Mutex::new(HashSet::new()),
        rules: Mutex::new(FontFaceRuleSet::new()),
    };

    let base = parsed.base_url().clone();
    let mut pending: Vec<BoxFuture<'_, ()>> = Vec::new();

    for block in parsed.style_blocks() {
        pending.push(resolver.process_source(block, base.clone()));
    }

    let doc = parsed.doc();
    for link in parsed.links() {
        if !link_is_eligible(parsed, link, env) {
            continue;
        }
        let href = match doc.attr(link, "href") {
            Some(h) if !h.trim().is_empty() => h,
            _ => continue,
        };
        let abs = match css::resolve_href(href, &base) {
            Some(u) => u,
            None => continue,
        };
        if !resolver.mark_visited(&abs) {
            continue;
        }
        pending.push(resolver.fetch_and_process(abs));
    }

    join_all(pending).await;

    resolver
        .rules
        .into_inner()
        .expect("font rule set lock poisoned")
}

/// Eligibility per stylesheet-link semantics: `rel` containing "stylesheet",
/// or a `rel="preload"` with `as="style"`. Alternate and disabled sheets are
/// skipped, as are sheets whose `media` attribute does not match.
fn link_is_eligible(parsed: &ParsedDocument, link: crate::dom::NodeId, env: &Environment) -> bool {
    let doc = parsed.doc();
    let rel = doc.attr(link, "rel").unwrap_or("").to_ascii_lowercase();
    let is_stylesheet = rel.split_whitespace().any(|r| r == "stylesheet");
    let is_style_preload = rel.split_whitespace().any(|r| r == "preload")
        && doc
            .attr(link, "as")
            .is_some_and(|a| a.eq_ignore_ascii_case("style"));
    if !is_stylesheet && !is_style_preload {
        return false;
    }
    if rel.split_whitespace().any(|r| r == "alternate") {
        return false;
    }
    if doc.has_attr(link, "disabled") {
        return false;
    }
    if let Some(media) = doc.attr(link, "media") {
        if !media.trim().is_empty() && !env.media.matches(media) {
            return false;
        }
    }
    true
}

struct Resolver<'e> {
    env: &'e Environment,
    visited: Mutex<HashSet<Url>>,
    rules: Mutex<FontFaceRuleSet>,
}

impl<'e> Resolver<'e> {
    /// Record `url` in the visited set; false if it was already there. Must
    /// happen before the fetch so cycles cannot recurse.
    fn mark_visited(&self, url: &Url) -> bool {
        self.visited
            .lock()
            .expect("visited set lock poisoned")
            .insert(url.clone())
    }

    /// Process one CSS source rooted at `base`: extract and rebase its
    /// `@font-face` blocks, then follow its `@import`s, awaiting all of them
    /// together. Boxed because the import chain recurses through here.
    fn process_source<'s>(&'s self, source: String, base: Url) -> BoxFuture<'s, ()> {
        Box::pin(async move {
            let source = css::strip_comments(&source);
            {
                let mut rules = self.rules.lock().expect("font rule set lock poisoned");
                for block in css::extract_font_face_blocks(&source) {
                    rules.insert(css::rebase_urls(&block, &base));
                }
            }

            let mut pending = Vec::new();
            for target in css::find_imports(&source) {
                let abs = match css::resolve_href(&target, &base) {
                    Some(u) => u,
                    None => continue,
                };
                if !self.mark_visited(&abs) {
                    continue;
                }
                pending.push(self.fetch_and_process(abs));
            }
            join_all(pending).await;
        })
    }

    /// Fetch `url` and process the result rooted at that URL. Failures are
    /// skipped silently.
    fn fetch_and_process<'s>(&'s self, url: Url) -> BoxFuture<'s, ()> {
        Box::pin(async move {
            match self.env.fetcher.fetch_text(&url).await {
                Ok(text) => self.process_source(text, url).await,
                Err(e) => log::debug!("skipping stylesheet {url}: {e}"),
            }
        })
    }
}
