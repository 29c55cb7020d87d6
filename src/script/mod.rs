//! Script extraction and replay.
//!
//! Markup inserted programmatically never auto-executes its scripts, so the
//! engine pulls them out of the parsed tree at extraction time (leaving a
//! comment marker in each one's place) and re-creates them inside the
//! isolation target at replay time, honoring native scheduling: sequential
//! scripts run in order and block each other, async scripts are
//! fire-and-forget, defer (and module) scripts run in order after the
//! imported tree has settled.

pub mod placeholder;

use crate::dom::{Document, NodeId, Page};
use crate::env::{Environment, ScriptHost};
use std::sync::Arc;
use url::Url;

/// Execution-ordering class derived from a script's declared attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptClass {
    Sequential,
    Async,
    Defer,
}

/// Everything needed to re-create one extracted script. Created at
/// extraction, consumed exactly once at replay.
#[derive(Debug, Clone)]
pub struct ScriptDescriptor {
    /// Opaque token tying the descriptor to its placeholder marker.
    pub id: String,
    /// Source-ordered attributes, values verbatim.
    pub attrs: Vec<(String, String)>,
    /// Inline code; `None` when the script has an external source.
    pub inline_code: Option<String>,
    pub has_external_source: bool,
    pub is_async: bool,
    pub is_defer: bool,
    pub is_module: bool,
}

impl ScriptDescriptor {
    /// Classification priority: module scripts always defer, regardless of
    /// explicit async/defer attributes; then async; then defer; else
    /// sequential.
    pub fn class(&self) -> ScriptClass {
        if self.is_module {
            ScriptClass::Defer
        } else if self.is_async {
            ScriptClass::Async
        } else if self.is_defer {
            ScriptClass::Defer
        } else {
            ScriptClass::Sequential
        }
    }

    fn src(&self) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("src"))
            .map(|(_, v)| v.as_str())
    }
}

/// Scan `scope` for script elements and replace each with a placeholder
/// marker, returning descriptors in source order. No execution happens here.
///
/// Targets are collected before any mutation so the walk never observes its
/// own replacements.
pub fn extract_scripts(doc: &mut Document, scope: NodeId) -> Vec<ScriptDescriptor> {
    let targets = doc.find_by_tag(scope, "script");
    let mut out = Vec::with_capacity(targets.len());
    for node in targets {
        let attrs = doc.attrs(node).to_vec();
        let has_external_source = doc
            .attr(node, "src")
            .is_some_and(|s| !s.trim().is_empty());
        let inline_code = if has_external_source {
            None
        } else {
            Some(doc.text_content(node))
        };
        let is_module = doc
            .attr(node, "type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("module"));
        let is_async = doc.has_attr(node, "async");
        let is_defer = doc.has_attr(node, "defer");

        let id = placeholder::new_token();
        let marker = doc.create_comment(&placeholder::marker_text(&id));
        doc.replace(node, marker);

        out.push(ScriptDescriptor {
            id,
            attrs,
            inline_code,
            has_external_source,
            is_async,
            is_defer,
            is_module,
        });
    }
    out
}

/// Replay an ordered descriptor list against the populated target subtree,
/// per the bucket protocol: sequential scripts awaited one at a time (a
/// failure blocks the rest of the bucket), async scripts spawned detached
/// with errors logged, defer scripts awaited in order after a settle point.
pub async fn replay_scripts(
    page: &Page,
    scope: NodeId,
    descriptors: Vec<ScriptDescriptor>,
    env: &Environment,
    base: &Url,
) {
    let mut deferred = Vec::new();
    let mut sequential_failed = false;

    for descriptor in descriptors {
        match descriptor.class() {
            ScriptClass::Sequential => {
                if sequential_failed {
                    log::warn!(
                        "skipping sequential script {} after an earlier failure",
                        descriptor.id
                    );
                    continue;
                }
                if let Err(e) = replay_one(
                    page.clone(),
                    scope,
                    env.scripts.clone(),
                    base.clone(),
                    descriptor,
                )
                .await
                {
                    log::warn!("sequential script failed: {e}");
                    sequential_failed = true;
                }
            }
            ScriptClass::Async => {
                let fut = replay_one(
                    page.clone(),
                    scope,
                    env.scripts.clone(),
                    base.clone(),
                    descriptor,
                );
                // Detached: the orchestrator never joins async scripts.
                tokio::spawn(async move {
                    if let Err(e) = fut.await {
                        log::warn!("async script failed: {e}");
                    }
                });
            }
            ScriptClass::Defer => deferred.push(descriptor),
        }
    }

    // Let the structural import settle before the defer bucket starts.
    tokio::task::yield_now().await;

    for descriptor in deferred {
        if let Err(e) = replay_one(
            page.clone(),
            scope,
            env.scripts.clone(),
            base.clone(),
            descriptor,
        )
        .await
        {
            log::warn!("defer script failed: {e}");
            break;
        }
    }
}

/// Replay one descriptor: rebuild the script element at its marker inside
/// the target, then hand it to the script host, synchronously for inline
/// code, awaited for external sources.
async fn replay_one(
    page: Page,
    scope: NodeId,
    scripts: Arc<dyn ScriptHost>,
    base: Url,
    descriptor: ScriptDescriptor,
) -> Result<(), ScriptError> {
    {
        let mut doc = page.lock();
        let marker = placeholder::find_marker(&doc, scope, &descriptor.id)
            .ok_or_else(|| ScriptError::MissingMarker(descriptor.id.clone()))?;
        let el = doc.create_element("script");
        for (name, value) in &descriptor.attrs {
            doc.push_attr(el, name, value);
        }
        if let Some(code) = descriptor.inline_code.as_deref() {
            if !code.is_empty() {
                let text = doc.create_text(code);
                doc.append(el, text);
            }
        }
        doc.replace(marker, el);
    }

    if descriptor.has_external_source {
        let src = descriptor.src().unwrap_or_default();
        let abs = match base.join(src.trim()) {
            Ok(u) => u.to_string(),
            Err(_) => src.to_string(),
        };
        scripts.load_external(&abs).await
    } else {
        scripts.run_inline(descriptor.inline_code.as_deref().unwrap_or_default())
    }
}

#[derive(Debug)]
pub enum ScriptError {
    /// Inline code threw.
    Execution(String),
    /// External source failed to load.
    Load(String),
    /// The placeholder marker was not found in the target.
    MissingMarker(String),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::Execution(e) => write!(f, "Script execution error: {}", e),
            ScriptError::Load(e) => write!(f, "Script load error: {}", e),
            ScriptError::MissingMarker(id) => write!(f, "No placeholder marker for script {}", id),
        }
    }
}

impl std::error::Error for ScriptError {}
