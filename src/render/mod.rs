//! Render orchestration: clear → parse → resolve fonts → (extract scripts) →
//! import → (replay scripts).

use crate::dom::{NodeId, Page, ParsedDocument, ShadowRoot};
use crate::env::Environment;
use crate::fonts::{self, DEFAULT_FONT_SINK_ID};
use crate::script;

/// Sequences one render pass end to end. Holds the environment collaborators
/// and the font-sink id; cheap to clone per render site.
#[derive(Clone)]
pub struct Renderer {
    env: Environment,
    sink_id: String,
}

impl Renderer {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            sink_id: DEFAULT_FONT_SINK_ID.to_string(),
        }
    }

    /// Override the global font-sink id for renders through this renderer.
    pub fn with_sink_id(env: Environment, sink_id: &str) -> Self {
        Self {
            env,
            sink_id: sink_id.to_string(),
        }
    }

    /// Script-enabled render into an isolation target. Prior content is
    /// replaced entirely; fonts are injected best-effort into the global
    /// sink; embedded scripts are extracted and replayed with native
    /// ordering.
    ///
    /// Only an unavailable target rejects the call. Font fetch failures and
    /// individual script failures are absorbed per their own policies.
    pub async fn render(&self, target: &ShadowRoot, html: &str) -> Result<(), RenderError> {
        self.run(target.page(), target.id(), html, true).await
    }

    /// Script-disabled sibling of [`render`](Self::render): embedded scripts
    /// remain inert text and are never instantiated. Intended for untrusted
    /// content.
    pub async fn render_static(&self, target: &ShadowRoot, html: &str) -> Result<(), RenderError> {
        self.run(target.page(), target.id(), html, false).await
    }

    /// Render into a plain element container instead of an isolation
    /// boundary. No style isolation, but script extraction/replay still
    /// applies.
    pub async fn render_into(
        &self,
        page: &Page,
        container: NodeId,
        html: &str,
    ) -> Result<(), RenderError> {
        {
            let doc = page.lock();
            if !doc.is_attached(container) || doc.tag(container).is_none() {
                return Err(RenderError::TargetUnavailable);
            }
        }
        self.run(page, container, html, true).await
    }

    /// Resolve a parsed document's font faces and merge them into this
    /// renderer's sink on `page`. No-op when nothing is found.
    pub async fn extract_and_inject_fonts(&self, parsed: &ParsedDocument, page: &Page) {
        let rules = fonts::resolve_font_faces(parsed, &self.env).await;
        if !rules.is_empty() {
            fonts::inject_font_faces(page, &self.sink_id, &rules);
        }
    }

    async fn run(
        &self,
        page: &Page,
        target: NodeId,
        html: &str,
        scripts_enabled: bool,
    ) -> Result<(), RenderError> {
        // Clearing happens before any new content, so a later failure leaves
        // the target empty rather than half-populated.
        {
            let mut doc = page.lock();
            if !doc.is_attached(target) {
                return Err(RenderError::TargetUnavailable);
            }
            doc.clear_children(target);
        }

        let mut parsed = ParsedDocument::parse(html, &self.env.base_url)?;

        let rules = fonts::resolve_font_faces(&parsed, &self.env).await;
        if !rules.is_empty() {
            fonts::inject_font_faces(page, &self.sink_id, &rules);
        }

        let descriptors = if scripts_enabled {
            let root = parsed.doc().root();
            script::extract_scripts(parsed.doc_mut(), root)
        } else {
            Vec::new()
        };

        {
            let mut doc = page.lock();
            if !doc.is_attached(target) {
                return Err(RenderError::TargetUnavailable);
            }
            // Head children (styles, links) first, then body content,
            // the order the parser distributed the fragment into.
            let sections: Vec<NodeId> = [parsed.head(), parsed.body()]
                .into_iter()
                .flatten()
                .flat_map(|section| parsed.doc().children(section).to_vec())
                .collect();
            for child in sections {
                doc.import(target, parsed.doc(), child);
            }
        }

        if scripts_enabled && !descriptors.is_empty() {
            script::replay_scripts(page, target, descriptors, &self.env, parsed.base_url()).await;
        }

        Ok(())
    }
}

/// Remove an isolation target's children, leaving the boundary and its
/// identity untouched. Safe when the target is already empty.
pub fn clear(target: &ShadowRoot) {
    target.clear();
}

#[derive(Debug)]
pub enum RenderError {
    /// The isolation boundary could not be established or its node is gone.
    TargetUnavailable,
    /// The HTML input could not be read into a tree.
    Parse(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::TargetUnavailable => write!(f, "Isolation target unavailable"),
            RenderError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}
