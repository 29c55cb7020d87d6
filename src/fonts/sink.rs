//! The global font sink: one identified `<style>` element in the host page
//! head, shared by every render and persisted for the page's lifetime.

use super::FontFaceRuleSet;
use crate::dom::{NodeId, Page};

/// Well-known sink id used when the caller does not override it.
pub const DEFAULT_FONT_SINK_ID: &str = "shadow-dom-fonts";

/// Merge `rules` into the sink identified by `sink_id`, creating the sink on
/// first use. A rule already present as a substring of the sink's text is
/// never re-appended; appended rules are joined with single newlines; when
/// nothing is new the sink is left untouched.
///
/// The containment check and the append happen under one page lock with no
/// await in between, so interleaved renders cannot double-append a rule.
pub fn inject_font_faces(page: &Page, sink_id: &str, rules: &FontFaceRuleSet) {
    if rules.is_empty() {
        return;
    }
    let mut doc = page.lock();
    let sink = match find_sink(&doc, page.head(), sink_id) {
        Some(id) => id,
        None => {
            let el = doc.create_element("style");
            doc.push_attr(el, "id", sink_id);
            doc.append(page.head(), el);
            el
        }
    };

    let current = doc.text_content(sink);
    let additions: Vec<&str> = rules
        .iter()
        .filter(|rule| !current.contains(*rule))
        .collect();
    if additions.is_empty() {
        return;
    }

    let joined = additions.join("\n");
    let next = if current.is_empty() {
        joined
    } else {
        format!("{current}\n{joined}")
    };
    doc.set_text(sink, &next);
}

/// Current text of the sink, if it has been created.
pub fn sink_text(page: &Page, sink_id: &str) -> Option<String> {
    let doc = page.lock();
    find_sink(&doc, page.head(), sink_id).map(|id| doc.text_content(id))
}

fn find_sink(doc: &crate::dom::Document, head: NodeId, sink_id: &str) -> Option<NodeId> {
    doc.children(head)
        .iter()
        .copied()
        .find(|&c| doc.tag(c) == Some("style") && doc.attr(c, "id") == Some(sink_id))
}
