mod common;

use common::{env, RecordingHost, BASE};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use umbra::{
    Environment, Page, ParsedDocument, Renderer, ScriptClass, ScriptError, ScriptHost, ShadowRoot,
};
use url::Url;

fn parse(html: &str) -> ParsedDocument {
    ParsedDocument::parse(html, &Url::parse(BASE).unwrap()).expect("parse failed")
}

fn shadow(page: &Page) -> ShadowRoot {
    page.attach_shadow(page.create_host("div")).expect("attach shadow")
}

#[test]
fn extraction_replaces_scripts_with_markers() {
    let mut parsed = parse(
        r#"<p>text</p>
           <script data-x="1" src="a.js" async></script>
           <script>inline()</script>
           <script type="module">import 'm'</script>
           <script defer src="d.js"></script>"#,
    );
    let root = parsed.doc().root();
    let descriptors = umbra::extract_scripts(parsed.doc_mut(), root);

    assert_eq!(descriptors.len(), 4);
    assert_eq!(
        parsed.doc().find_by_tag(root, "script").len(),
        0,
        "every script node should be replaced in place"
    );

    let classes: Vec<ScriptClass> = descriptors.iter().map(|d| d.class()).collect();
    assert_eq!(
        classes,
        vec![
            ScriptClass::Async,
            ScriptClass::Sequential,
            ScriptClass::Defer,
            ScriptClass::Defer,
        ]
    );

    // Attribute order and values survive verbatim.
    assert_eq!(
        descriptors[0].attrs,
        vec![
            ("data-x".to_string(), "1".to_string()),
            ("src".to_string(), "a.js".to_string()),
            ("async".to_string(), String::new()),
        ]
    );
    assert!(descriptors[0].has_external_source);
    assert_eq!(descriptors[0].inline_code, None);
    assert_eq!(descriptors[1].inline_code.as_deref(), Some("inline()"));
    assert!(descriptors[2].is_module);
}

#[test]
fn module_scripts_defer_even_when_marked_async() {
    let mut parsed = parse(r#"<script type="module" async src="m.js"></script>"#);
    let root = parsed.doc().root();
    let descriptors = umbra::extract_scripts(parsed.doc_mut(), root);
    assert_eq!(descriptors[0].class(), ScriptClass::Defer);
}

#[tokio::test]
async fn sequential_scripts_replay_in_source_order() {
    // The first script is the slowest; order must still match the source.
    let (host, log) = RecordingHost::with_delays(&[
        ("https://example.com/page/one.js", 30),
        ("https://example.com/page/two.js", 10),
        ("https://example.com/page/three.js", 0),
    ]);
    let env = env(BASE).with_scripts(host);
    let page = Page::new();
    let target = shadow(&page);

    Renderer::new(env)
        .render(
            &target,
            r#"<script src="one.js"></script>
               <script src="two.js"></script>
               <script src="three.js"></script>"#,
        )
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "load:https://example.com/page/one.js",
            "load:https://example.com/page/two.js",
            "load:https://example.com/page/three.js",
        ],
        "each sequential script must complete before the next starts"
    );
}

#[tokio::test]
async fn async_scripts_are_fire_and_forget() {
    let (host, log) = RecordingHost::with_delays(&[("https://example.com/page/slow.js", 40)]);
    let env = env(BASE).with_scripts(host);
    let page = Page::new();
    let target = shadow(&page);

    Renderer::new(env)
        .render(
            &target,
            r#"<script async src="slow.js"></script><script>fast()</script>"#,
        )
        .await
        .unwrap();

    // The render future resolved without joining the async script.
    assert_eq!(*log.lock().unwrap(), vec!["inline:fast()"]);

    tokio::time::sleep(Duration::from_millis(80)).await;
    let log = log.lock().unwrap();
    assert!(
        log.contains(&"load:https://example.com/page/slow.js".to_string()),
        "the detached async script should still finish eventually: {log:?}"
    );
}

#[tokio::test]
async fn defer_scripts_run_after_sequential_in_source_order() {
    let (host, log) = RecordingHost::new();
    let env = env(BASE).with_scripts(host);
    let page = Page::new();
    let target = shadow(&page);

    Renderer::new(env)
        .render(
            &target,
            r#"<script defer src="d1.js"></script>
               <script>first()</script>
               <script defer src="d2.js"></script>"#,
        )
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "inline:first()",
            "load:https://example.com/page/d1.js",
            "load:https://example.com/page/d2.js",
        ]
    );
}

/// Script host that, when run, reads a sibling element out of the target.
struct SnoopingHost {
    target: Mutex<Option<ShadowRoot>>,
    seen: Arc<Mutex<Option<String>>>,
}

impl ScriptHost for SnoopingHost {
    fn run_inline(&self, _code: &str) -> Result<(), ScriptError> {
        let guard = self.target.lock().unwrap();
        let target = guard.as_ref().expect("target registered");
        *self.seen.lock().unwrap() = target.first_text_of("p");
        Ok(())
    }

    fn load_external<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<(), ScriptError>> {
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test]
async fn defer_scripts_see_the_fully_imported_tree() {
    let seen = Arc::new(Mutex::new(None));
    let host = Arc::new(SnoopingHost {
        target: Mutex::new(None),
        seen: seen.clone(),
    });
    let env = Environment::new(Url::parse(BASE).unwrap()).with_scripts(host.clone());
    let page = Page::new();
    let target = shadow(&page);
    *host.target.lock().unwrap() = Some(target.clone());

    Renderer::new(env)
        .render(
            &target,
            r#"<script defer>read()</script><p>late sibling</p>"#,
        )
        .await
        .unwrap();

    assert_eq!(
        seen.lock().unwrap().as_deref(),
        Some("late sibling"),
        "a defer script must observe content that follows it in the source"
    );
}

#[tokio::test]
async fn sequential_failure_blocks_only_the_sequential_bucket() {
    let (host, log) = RecordingHost::with_failing(&["boom()"]);
    let env = env(BASE).with_scripts(host);
    let page = Page::new();
    let target = shadow(&page);

    Renderer::new(env)
        .render(
            &target,
            r#"<script>ok()</script>
               <script>boom()</script>
               <script>never()</script>
               <script defer src="d.js"></script>"#,
        )
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["inline:ok()", "load:https://example.com/page/d.js"],
        "scripts after a sequential failure are skipped, but defer still runs"
    );
}

#[tokio::test]
async fn a_failing_async_script_blocks_no_other_bucket() {
    let (host, log) = RecordingHost::with_failing(&["https://example.com/page/bad.js"]);
    let env = env(BASE).with_scripts(host);
    let page = Page::new();
    let target = shadow(&page);

    Renderer::new(env)
        .render(
            &target,
            r#"<script>before()</script>
               <script async src="bad.js"></script>
               <script async src="good.js"></script>
               <script>after()</script>
               <script defer src="d.js"></script>"#,
        )
        .await
        .unwrap();

    // Give the detached async tasks time to settle.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let log = log.lock().unwrap();
    let ordered: Vec<&str> = log
        .iter()
        .map(|e| e.as_str())
        .filter(|e| !e.contains("good.js"))
        .collect();
    assert_eq!(
        ordered,
        vec![
            "inline:before()",
            "inline:after()",
            "load:https://example.com/page/d.js",
        ],
        "a failed async load must not skip sequential or defer scripts"
    );
    assert!(
        log.contains(&"load:https://example.com/page/good.js".to_string()),
        "the sibling async script still completes: {log:?}"
    );
}

#[tokio::test]
async fn defer_failure_blocks_only_later_defer_scripts() {
    let (host, log) = RecordingHost::with_failing(&["https://example.com/page/bad.js"]);
    let env = env(BASE).with_scripts(host);
    let page = Page::new();
    let target = shadow(&page);

    Renderer::new(env)
        .render(
            &target,
            r#"<script>eager()</script>
               <script defer src="d1.js"></script>
               <script defer src="bad.js"></script>
               <script defer src="d2.js"></script>"#,
        )
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["inline:eager()", "load:https://example.com/page/d1.js"],
        "defer scripts after a defer failure are skipped, earlier work stands"
    );
}

#[tokio::test]
async fn replay_recreates_script_elements_at_their_markers() {
    let (host, _log) = RecordingHost::new();
    let env = env(BASE).with_scripts(host);
    let page = Page::new();
    let target = shadow(&page);

    Renderer::new(env)
        .render(&target, r#"<div><script id="s1">x()</script></div>"#)
        .await
        .unwrap();

    target.with_document(|doc| {
        let scripts = doc.find_by_tag(target.id(), "script");
        assert_eq!(scripts.len(), 1, "the marker should be swapped back to a script");
        assert_eq!(doc.attr(scripts[0], "id"), Some("s1"));
        assert_eq!(doc.text_content(scripts[0]), "x()");
        assert_eq!(
            doc.tag(doc.parent(scripts[0]).unwrap()),
            Some("div"),
            "the recreated script sits where the original stood"
        );
    });
}
