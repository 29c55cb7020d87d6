//! Arena-backed DOM tree plus html5ever parsing.
//!
//! Parsed HTML lands in a [`Document`]: a flat arena of nodes addressed by
//! [`NodeId`], with parent/child links stored as indices. The arena shape is
//! what lets script replay mutate the tree from detached tasks: a `Document`
//! is plain owned data, `Send`, and shared behind the page mutex.

mod page;

pub use page::{Page, ShadowRoot};

use crate::render::RenderError;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData as RcData, RcDom};
use url::Url;

/// Handle to a node within its owning [`Document`]: an arena index plus the
/// slot's generation at creation time. The generation lets a reclaimed and
/// reused slot reject ids that predate the reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize, u32);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    /// Isolation boundary root attached to a host element.
    ShadowRoot,
    Element {
        tag: String,
        /// Source-ordered attributes, values verbatim. An ordered `Vec`
        /// rather than a map: replayed scripts must carry their attributes
        /// in the order the markup declared them.
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// An owned DOM tree. Node 0 is always the document root and is never
/// reclaimed. Subtrees discarded by [`Document::clear_children`] or
/// [`Document::replace`] return their slots to a free list for reuse;
/// freeing bumps the slot generation, so a stale `NodeId` can be detected
/// via [`Document::is_attached`] even after its slot is reassigned.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    gens: Vec<u32>,
    free: Vec<usize>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            gens: vec![0],
            free: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0, 0)
    }

    pub fn create(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            data,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                NodeId(index, self.gens[index])
            }
            None => {
                self.nodes.push(node);
                self.gens.push(0);
                NodeId(self.nodes.len() - 1, 0)
            }
        }
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create(NodeData::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.create(NodeData::Comment(text.to_string()))
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn push_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Put `new` in `old`'s position under `old`'s parent and discard `old`
    /// together with its subtree; `old` and its descendants are invalid
    /// afterwards. No-op if `old` has no parent.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.nodes[old.0].parent else {
            return;
        };
        self.detach(new);
        let children = &mut self.nodes[parent.0].children;
        if let Some(slot) = children.iter().position(|&c| c == old) {
            children[slot] = new;
            self.nodes[new.0].parent = Some(parent);
            self.nodes[old.0].parent = None;
            self.free_subtree(old);
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Discard every child of `parent`, reclaiming their subtrees' arena
    /// slots. Safe to call when there are none.
    pub fn clear_children(&mut self, parent: NodeId) {
        let children = std::mem::take(&mut self.nodes[parent.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.free_subtree(child);
        }
    }

    /// Return `id` and every node below it to the free list. Each freed
    /// slot's generation is bumped so outstanding ids for it go stale.
    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id.0];
        while let Some(index) = stack.pop() {
            let node = std::mem::replace(
                &mut self.nodes[index],
                Node {
                    data: NodeData::Document,
                    parent: None,
                    children: Vec::new(),
                },
            );
            stack.extend(node.children.iter().map(|c| c.0));
            self.gens[index] = self.gens[index].wrapping_add(1);
            self.free.push(index);
        }
    }

    /// True if `id` is a live node reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        if id.0 >= self.nodes.len() || self.gens[id.0] != id.1 {
            return false;
        }
        let mut cur = id;
        loop {
            if cur == self.root() {
                return true;
            }
            match self.nodes[cur.0].parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// Preorder walk of the subtree rooted at `scope`, excluding `scope`.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[scope.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    pub fn find_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| self.tag(id) == Some(tag))
            .collect()
    }

    pub fn find_by_id_attr(&self, scope: NodeId, value: &str) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&id| self.attr(id, "id") == Some(value))
    }

    /// Concatenated text of all `Text` descendants, verbatim. No trimming
    /// or whitespace collapsing, since script bodies and stylesheet text
    /// must round-trip unchanged.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeData::Text(t) = &self.nodes[id.0].data {
            out.push_str(t);
        }
        for desc in self.descendants(id) {
            if let NodeData::Text(t) = &self.nodes[desc.0].data {
                out.push_str(t);
            }
        }
        out
    }

    /// Replace `id`'s children with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.clear_children(id);
        let t = self.create_text(text);
        self.append(id, t);
    }

    /// Deep structural copy of `node` (from `src`) as a new child of
    /// `parent` in this document. The source tree is untouched.
    pub fn import(&mut self, parent: NodeId, src: &Document, node: NodeId) -> NodeId {
        let copy = self.create(src.nodes[node.0].data.clone());
        self.append(parent, copy);
        for &child in &src.nodes[node.0].children {
            self.import(copy, src, child);
        }
        copy
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an HTML string into a [`Document`]. The parser supplies missing
/// `html/head/body` wrappers; text, comments, and script/style contents are
/// all preserved.
pub fn parse_html(html: &str) -> Result<Document, RenderError> {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let rcdom = parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| RenderError::Parse(e.to_string()))?;

    let mut doc = Document::new();
    let root = doc.root();
    for child in rcdom.document.children.borrow().iter() {
        convert_node(&mut doc, root, child);
    }
    Ok(doc)
}

fn convert_node(doc: &mut Document, parent: NodeId, handle: &Handle) {
    match &handle.data {
        RcData::Element { name, attrs, .. } => {
            let el = doc.create_element(&name.local.to_string());
            for attr in attrs.borrow().iter() {
                doc.push_attr(el, &attr.name.local.to_string(), &attr.value.to_string());
            }
            doc.append(parent, el);
            for child in handle.children.borrow().iter() {
                convert_node(doc, el, child);
            }
        }
        RcData::Text { contents } => {
            let t = doc.create_text(&contents.borrow());
            doc.append(parent, t);
        }
        RcData::Comment { contents } => {
            let c = doc.create_comment(contents);
            doc.append(parent, c);
        }
        // Doctypes and PIs carry nothing we render.
        _ => {}
    }
}

/// A freshly parsed HTML document plus its computed base URL. Private to one
/// render call: its structure is copied into the isolation target, then the
/// object is dropped.
pub struct ParsedDocument {
    doc: Document,
    base_url: Url,
}

impl ParsedDocument {
    /// Parse `html` and compute the document base: the first `<base href>`
    /// resolved against the environment's own base, falling back to the
    /// environment base.
    pub fn parse(html: &str, env_base: &Url) -> Result<Self, RenderError> {
        let doc = parse_html(html)?;
        let base_url = doc
            .find_by_tag(doc.root(), "base")
            .into_iter()
            .find_map(|id| doc.attr(id, "href").map(str::to_string))
            .and_then(|href| env_base.join(href.trim()).ok())
            .unwrap_or_else(|| env_base.clone());
        Ok(Self { doc, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Text of every inline `<style>` block, in document order.
    pub fn style_blocks(&self) -> Vec<String> {
        self.doc
            .find_by_tag(self.doc.root(), "style")
            .into_iter()
            .map(|id| self.doc.text_content(id))
            .collect()
    }

    /// Every `<link>` element, in document order. Eligibility filtering
    /// (rel/media/disabled) is the font resolver's job.
    pub fn links(&self) -> Vec<NodeId> {
        self.doc.find_by_tag(self.doc.root(), "link")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.doc.find_by_tag(self.doc.root(), "head").into_iter().next()
    }

    pub fn body(&self) -> Option<NodeId> {
        self.doc.find_by_tag(self.doc.root(), "body").into_iter().next()
    }
}
