//! Isolated HTML rendering with browser-like script and font semantics.
//!
//! Rendering an arbitrary HTML string into an isolation boundary (a shadow
//! tree) trips over two things browsers normally handle for free:
//! programmatically inserted scripts never execute, and `@font-face` rules
//! inside the boundary never load. umbra reproduces both: scripts are
//! extracted at parse time and replayed with native ordering (sequential /
//! async / defer), and font-face rules are discovered recursively across
//! inline styles, linked sheets, and `@import` chains, then hoisted into one
//! deduplicated global style sink outside the boundary.

pub mod css;
pub mod dom;
pub mod env;
pub mod fonts;
pub mod render;
pub mod script;

pub use dom::{Document, NodeData, NodeId, Page, ParsedDocument, ShadowRoot};
#[cfg(feature = "fetch")]
pub use env::{HttpConfig, HttpFetcher};
pub use env::{Environment, Fetch, FetchError, InertScriptHost, MatchAllMedia, MediaMatcher, ScriptHost};
pub use fonts::{inject_font_faces, resolve_font_faces, FontFaceRuleSet, DEFAULT_FONT_SINK_ID};
pub use render::{clear, RenderError, Renderer};
pub use script::{extract_scripts, replay_scripts, ScriptClass, ScriptDescriptor, ScriptError};
