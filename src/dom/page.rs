//! Host page and isolation targets.

use super::{Document, NodeData, NodeId};
use crate::render::RenderError;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to the host document. Clones refer to the same page; all
/// tree mutation goes through the page lock, and the lock is never held
/// across an await point.
#[derive(Clone)]
pub struct Page {
    doc: Arc<Mutex<Document>>,
    head: NodeId,
    body: NodeId,
}

impl Page {
    /// A fresh host page with an `html/head/body` skeleton.
    pub fn new() -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        let html = doc.create_element("html");
        doc.append(root, html);
        let head = doc.create_element("head");
        doc.append(html, head);
        let body = doc.create_element("body");
        doc.append(html, body);
        Self {
            doc: Arc::new(Mutex::new(doc)),
            head,
            body,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Document> {
        self.doc.lock().expect("page lock poisoned")
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Run a closure against the locked document. The embedder-facing way to
    /// inspect page state without taking a dependency on the lock type.
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.lock())
    }

    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.lock())
    }

    /// Append a new element to `<body>` to serve as a shadow host or a plain
    /// render container.
    pub fn create_host(&self, tag: &str) -> NodeId {
        let mut doc = self.lock();
        let host = doc.create_element(tag);
        doc.append(self.body, host);
        host
    }

    /// Attach an isolation boundary to `host`. Fails if the host node is
    /// detached, not an element, or already carries a shadow root.
    pub fn attach_shadow(&self, host: NodeId) -> Result<ShadowRoot, RenderError> {
        let mut doc = self.lock();
        if !doc.is_attached(host) || doc.tag(host).is_none() {
            return Err(RenderError::TargetUnavailable);
        }
        let has_shadow = doc
            .children(host)
            .iter()
            .any(|&c| matches!(doc.data(c), NodeData::ShadowRoot));
        if has_shadow {
            return Err(RenderError::TargetUnavailable);
        }
        let root = doc.create(NodeData::ShadowRoot);
        doc.append(host, root);
        Ok(ShadowRoot {
            page: self.clone(),
            root,
        })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

/// An isolation target: the root of a shadow tree inside a [`Page`].
#[derive(Clone)]
pub struct ShadowRoot {
    page: Page,
    root: NodeId,
}

impl ShadowRoot {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn id(&self) -> NodeId {
        self.root
    }

    /// Remove all children, leaving the boundary itself untouched. Safe when
    /// already empty or when the host has since been detached.
    pub fn clear(&self) {
        let mut doc = self.page.lock();
        doc.clear_children(self.root);
    }

    pub fn child_count(&self) -> usize {
        self.page.lock().children(self.root).len()
    }

    /// Number of descendant elements with the given tag.
    pub fn count_of(&self, tag: &str) -> usize {
        self.page.lock().find_by_tag(self.root, tag).len()
    }

    /// Text content of the first descendant element with the given tag.
    pub fn first_text_of(&self, tag: &str) -> Option<String> {
        let doc = self.page.lock();
        let id = doc.find_by_tag(self.root, tag).into_iter().next()?;
        Some(doc.text_content(id))
    }

    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.page.lock())
    }
}
