//! Integration tests for gilt-cssom.
//!
//! These tests exercise the public API from outside the crate: sheets built
//! through the arena, mutated through the CSSOM entry points, and observed
//! through the recording collaborators in `gilt_cssom::testing`.

use gilt_cssom::css::{CssParser, ParseContext, RuleParser};
use gilt_cssom::media::{Device, MediaQueryResultCacheKey};
use gilt_cssom::sheet::{Caller, CorsMode, Cssom, MediaTarget, Principal, SheetId};
use gilt_cssom::testing::{CountingProcessor, DocEvent, RecordingDocument, RecordingLoader};
use gilt_cssom::CssomError;
use pretty_assertions::assert_eq;
use url::Url;

/// Routes crate logs to the test output; filter with `RUST_LOG=gilt_cssom=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn complete_sheet(cssom: &mut Cssom, text: &str) -> SheetId {
    init_tracing();
    let sheet = cssom.create_sheet();
    cssom.load_text(sheet, text).expect("load");
    cssom.set_complete(sheet).expect("complete");
    sheet
}

fn serialize(cssom: &mut Cssom, sheet: SheetId) -> String {
    let rules = cssom.css_rules(sheet, &Caller::chrome()).expect("rules");
    (0..rules.len())
        .filter_map(|i| rules.css_text(i))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_insert_into_empty_sheet() {
    let mut cssom = Cssom::new();
    let sheet = complete_sheet(&mut cssom, "");
    let index = cssom
        .insert_rule_internal(sheet, "div { color: red; }", 0)
        .expect("insert");
    assert_eq!(index, 0);
    assert_eq!(cssom.style_rule_count(sheet), Ok(1));
    let rule = cssom.style_rule_at(sheet, 0).expect("rule");
    assert_eq!(rule.css_text(None), "div { color: red; }");
}

#[test]
fn test_ordering_after_charset_and_import() {
    let mut cssom = Cssom::new();
    let sheet = complete_sheet(&mut cssom, "@charset \"UTF-8\"; @import url(a.css); p {}");
    assert_eq!(cssom.style_rule_count(sheet), Ok(3));

    // A style rule sits before the insertion point.
    assert!(matches!(
        cssom.insert_rule_internal(sheet, "@import url(x.css);", 3),
        Err(CssomError::HierarchyViolation(_))
    ));
    // Right after the existing import is fine.
    assert_eq!(cssom.insert_rule_internal(sheet, "@import url(x.css);", 2), Ok(2));

    // A namespace may not precede an import.
    assert!(matches!(
        cssom.insert_rule_internal(sheet, "@namespace x url(y);", 1),
        Err(CssomError::HierarchyViolation(_))
    ));
    // Nor follow a style rule.
    assert!(matches!(
        cssom.insert_rule_internal(sheet, "@namespace x url(y);", 4),
        Err(CssomError::HierarchyViolation(_))
    ));
    assert_eq!(cssom.insert_rule_internal(sheet, "@namespace x url(y);", 3), Ok(3));

    for index in 1..=cssom.style_rule_count(sheet).expect("count") {
        assert!(matches!(
            cssom.insert_rule_internal(sheet, "@charset \"UTF-8\";", index),
            Err(CssomError::HierarchyViolation(_))
        ));
    }
    insta::assert_snapshot!(serialize(&mut cssom, sheet), @r###"
    @charset "UTF-8";
    @import url("a.css");
    @import url("x.css");
    @namespace x url("y");
    p { }
    "###);
}

#[test]
fn test_min_width_boundary_is_inclusive() {
    let list = CssParser.parse_media_list("(min-width: 500px)");
    let narrow = Device::new("screen").with_viewport(400.0, 300.0);
    let exact = Device::new("screen").with_viewport(500.0, 300.0);
    assert!(!list.matches(&narrow, None));
    assert!(list.matches(&exact, None));
}

#[test]
fn test_shared_sheets_diverge_after_append() {
    let mut cssom = Cssom::new();
    let a = complete_sheet(&mut cssom, "a {} b {} c {}");
    let b = cssom.clone_sheet(a, None, None, None, None).expect("clone");
    cssom.ensure_unique_inner(b).expect("unique");
    assert_eq!(cssom.style_rule_count(a), cssom.style_rule_count(b));

    let principal = Principal::System;
    let rule = CssParser
        .parse_rule("d {}", &ParseContext::new(&principal))
        .expect("parse")
        .remove(0);
    cssom.append_style_rule(b, rule).expect("append");
    assert_eq!(cssom.style_rule_count(a), Ok(3));
    assert_eq!(cssom.style_rule_count(b), Ok(4));
}

#[test]
fn test_delete_past_end_leaves_rules() {
    let mut cssom = Cssom::new();
    let sheet = complete_sheet(&mut cssom, "a {} b {} c {}");
    assert_eq!(
        cssom.delete_rule(sheet, 5, &Caller::chrome()),
        Err(CssomError::IndexOutOfRange { index: 5, len: 3 })
    );
    assert_eq!(cssom.style_rule_count(sheet), Ok(3));
}

// ---------------------------------------------------------------------------
// Copy-on-write
// ---------------------------------------------------------------------------

#[test]
fn test_every_mutation_leaves_the_sibling_untouched() {
    type Edit = fn(&mut Cssom, SheetId);
    let edits: [(&str, Edit); 6] = [
        ("insert", |c, s| {
            c.insert_rule_internal(s, "z {}", 0).expect("insert");
        }),
        ("delete", |c, s| {
            c.delete_rule(s, 0, &Caller::chrome()).expect("delete");
        }),
        ("reparse", |c, s| {
            c.parse_sheet(s, "q {}").expect("parse");
        }),
        ("group insert", |c, s| {
            let group = c.style_rule_at(s, 1).expect("media").id();
            c.insert_rule_into_group(s, group, "y {}", 0).expect("group insert");
        }),
        ("media", |c, s| {
            let group = c.style_rule_at(s, 1).expect("media").id();
            c.append_medium(s, MediaTarget::Rule(group), "print").expect("media");
        }),
        ("selector", |c, s| {
            let rule = c.style_rule_at(s, 0).expect("style").id();
            c.set_selector_text(s, rule, "em").expect("selector");
        }),
    ];

    for (name, edit) in edits {
        let mut cssom = Cssom::new();
        let a = complete_sheet(&mut cssom, "a { color: red } @media screen { b {} }");
        let b = cssom.clone_sheet(a, None, None, None, None).expect("clone");
        let before = serialize(&mut cssom, a);
        edit(&mut cssom, b);
        assert!(!cssom.shares_inner_with(a, b), "{name}");
        assert_eq!(serialize(&mut cssom, a), before, "{name}");
        assert_ne!(serialize(&mut cssom, b), before, "{name}");
    }
}

#[test]
fn test_building_sheets_share_freely() {
    let mut cssom = Cssom::new();
    let a = cssom.create_sheet();
    let b = cssom.clone_sheet(a, None, None, None, None).expect("clone");
    cssom.load_text(a, "a {}").expect("load");
    assert!(cssom.shares_inner_with(a, b));
    assert_eq!(cssom.style_rule_count(b), Ok(1));
}

// ---------------------------------------------------------------------------
// Notifications and invalidation
// ---------------------------------------------------------------------------

#[test]
fn test_notification_pairing() {
    let mut cssom = Cssom::new();
    let doc = RecordingDocument::new();
    let sheet = complete_sheet(&mut cssom, "");
    cssom.set_owning_document(sheet, Some(&doc.as_observer())).expect("doc");

    for (i, text) in ["a {}", "b {}", "@media print { c {} }", "@font-face { src: url(x) }"]
        .iter()
        .enumerate()
    {
        cssom.insert_rule_internal(sheet, text, i).expect("insert");
        assert_eq!(doc.added().len(), i + 1);
    }
    for remaining in (0..4).rev() {
        cssom.delete_rule(sheet, 0, &Caller::chrome()).expect("delete");
        assert_eq!(cssom.style_rule_count(sheet), Ok(remaining));
    }
    assert_eq!(doc.added().len(), 4);
    assert_eq!(doc.removed().len(), 4);
    assert_eq!(doc.added(), doc.removed());
    assert!(doc.batches_balanced());
}

#[test]
fn test_failed_insert_produces_no_notification() {
    let mut cssom = Cssom::new();
    let doc = RecordingDocument::new();
    let sheet = complete_sheet(&mut cssom, "a {}");
    cssom.set_owning_document(sheet, Some(&doc.as_observer())).expect("doc");
    assert!(cssom.insert_rule_internal(sheet, "@charset \"x\";", 1).is_err());
    assert!(cssom.insert_rule_internal(sheet, "}", 0).is_err());
    assert!(doc.added().is_empty());
    assert!(doc.batches_balanced());
}

#[test]
fn test_child_edits_invalidate_the_root_cascade() {
    let loader = RecordingLoader::new();
    let mut cssom = Cssom::new().with_loader(loader.as_loader());
    let root = cssom.create_sheet();
    cssom.load_text(root, "@import url(http://x/child.css);").expect("load");
    let child = loader.requests()[0].child;
    cssom.load_text(child, "a {}").expect("child");
    cssom.set_complete(child).expect("child complete");
    cssom.set_complete(root).expect("root complete");

    let root_counter = CountingProcessor::new();
    let child_counter = CountingProcessor::new();
    cssom.add_rule_processor(root, &root_counter.as_processor()).expect("add");
    cssom.add_rule_processor(child, &child_counter.as_processor()).expect("add");

    cssom.insert_rule_internal(child, "b {}", 1).expect("insert");
    assert_eq!(child_counter.clears(), 1);
    assert_eq!(root_counter.clears(), 1);
}

#[test]
fn test_disabling_is_announced() {
    let mut cssom = Cssom::new();
    let doc = RecordingDocument::new();
    let sheet = cssom.create_sheet();
    cssom.set_owning_document(sheet, Some(&doc.as_observer())).expect("doc");
    cssom.set_complete(sheet).expect("complete");
    doc.clear();

    cssom.set_disabled(sheet, true).expect("disable");
    cssom.set_disabled(sheet, false).expect("enable");
    let states: Vec<_> = doc
        .events()
        .into_iter()
        .filter_map(|e| match e {
            DocEvent::ApplicableState { applicable, .. } => Some(applicable),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![false, true]);
    assert!(cssom.is_applicable(sheet));
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[test]
fn test_weight_counts_ids_classes_and_tag() {
    for ids in 0..4 {
        for classes in 0..4 {
            for tag in [false, true] {
                let mut text = String::new();
                if tag {
                    text.push_str("div");
                }
                for i in 0..ids {
                    text.push_str(&format!("#i{i}"));
                }
                for c in 0..classes {
                    text.push_str(&format!(".c{c}"));
                }
                if text.is_empty() {
                    text.push('*');
                }
                let list = CssParser.parse_selector_list(&text, None).expect("selector");
                let expected = ids * 0x010000 + classes * 0x000100 + i32::from(tag);
                assert_eq!(list.selectors[0].weight(), expected, "{text}");
            }
        }
    }
}

#[test]
fn test_weight_ignores_chain_shape() {
    let compact = CssParser.parse_selector_list("div#a.b.c", None).expect("compact");
    let spread = CssParser.parse_selector_list(".c #a > .b div", None).expect("spread");
    assert_eq!(compact.selectors[0].weight(), spread.selectors[0].weight());
    assert_eq!(compact.selectors[0].weight(), 0x010201);
}

#[test]
fn test_selector_serialization_is_idempotent() {
    let samples = [
        "div > p",
        "ul li + li ~ span",
        "a#top.ext[href^='http']:hover",
        "a:not(.b):not([disabled])",
        "li:nth-child(2n+1)",
        "p:lang(en), h1::selection",
        "[data-x~=\"a b\"]",
    ];
    for sample in samples {
        let once = CssParser
            .parse_selector_list(sample, None)
            .expect("first parse")
            .to_css(None);
        let twice = CssParser
            .parse_selector_list(&once, None)
            .expect("second parse")
            .to_css(None);
        assert_eq!(twice, once, "{sample}");
    }
}

// ---------------------------------------------------------------------------
// Media cache keys
// ---------------------------------------------------------------------------

#[test]
fn test_cache_key_is_sound() {
    let list = CssParser.parse_media_list(
        "screen and (min-width: 600px), print, (max-height: 400px) and (color)",
    );
    let original = Device::new("screen").with_viewport(800.0, 600.0);
    let mut key = MediaQueryResultCacheKey::for_context(&original);
    list.matches(&original, Some(&mut key));

    let candidates = [
        Device::new("screen").with_viewport(700.0, 600.0),
        Device::new("screen").with_viewport(500.0, 600.0),
        Device::new("screen").with_viewport(800.0, 300.0),
        Device::new("screen").with_viewport(800.0, 600.0).with_color_bits(0),
        Device::new("print").with_viewport(800.0, 600.0),
    ];
    for ctx in &candidates {
        if key.matches(ctx) {
            for query in list.queries() {
                assert_eq!(query.matches(ctx, None), query.matches(&original, None), "{ctx:?}");
            }
        }
    }
    assert!(key.matches(&candidates[0]));
    assert!(!key.matches(&candidates[1]));
    assert!(!key.matches(&candidates[4]));
}

#[test]
fn test_presentation_uses_sheet_media() {
    let mut cssom = Cssom::new();
    let sheet = complete_sheet(&mut cssom, "a {}");
    cssom
        .set_media(sheet, CssParser.parse_media_list("print"))
        .expect("media");
    let screen = Device::new("screen");
    assert_eq!(cssom.use_for_presentation(sheet, &screen, None), Ok(false));
    cssom
        .set_media_text(sheet, MediaTarget::Sheet, "screen, print")
        .expect("media text");
    assert_eq!(cssom.use_for_presentation(sheet, &screen, None), Ok(true));
}

// ---------------------------------------------------------------------------
// Security
// ---------------------------------------------------------------------------

#[test]
fn test_cross_origin_reads_need_cors() {
    let url = Url::parse("https://cdn.example/site.css").expect("url");
    let page = Caller::content(Principal::from_url(
        &Url::parse("https://page.example/").expect("url"),
    ));
    let same = Caller::content(Principal::from_url(&url));

    let mut cssom = Cssom::new();
    let sheet = cssom.create_sheet();
    cssom.set_principal(sheet, Principal::from_url(&url)).expect("principal");
    cssom.set_complete(sheet).expect("complete");
    assert_eq!(cssom.css_rules(sheet, &page).err(), Some(CssomError::Security));
    assert!(cssom.css_rules(sheet, &same).is_ok());

    let shared = cssom.create_sheet();
    cssom.set_principal(shared, Principal::from_url(&url)).expect("principal");
    cssom.set_cors_mode(shared, CorsMode::Anonymous).expect("cors");
    cssom.set_complete(shared).expect("complete");
    assert!(cssom.css_rules(shared, &page).is_ok());
    assert_eq!(cssom.principal(shared), Some(&page.principal));
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

#[test]
fn test_import_lifecycle() {
    let loader = RecordingLoader::new();
    let mut cssom = Cssom::new().with_loader(loader.as_loader());
    let doc = RecordingDocument::new();
    let root = cssom.create_sheet();
    let base = Url::parse("https://site.example/css/main.css").expect("url");
    cssom
        .set_uris(root, Some(base.clone()), Some(base.clone()), Some(base))
        .expect("uris");
    cssom.set_owning_document(root, Some(&doc.as_observer())).expect("doc");
    cssom.load_text(root, "a {}").expect("load");
    cssom.set_complete(root).expect("complete");
    doc.clear();

    cssom
        .insert_rule(root, "@import url(../theme/dark.css) screen;", 0, &Caller::chrome())
        .expect("insert import");
    assert!(doc.added().is_empty());

    let request = loader.take_requests().remove(0);
    assert_eq!(
        request.url.as_ref().map(Url::as_str),
        Some("https://site.example/theme/dark.css")
    );
    let child = request.child;
    assert_eq!(cssom.parent(child), Some(root));
    assert_eq!(
        cssom.href(child).map(Url::as_str),
        Some("https://site.example/theme/dark.css")
    );
    assert!(cssom.owning_document(child).is_some());

    cssom.load_text(child, "body { background: black }").expect("child text");
    cssom.set_complete(child).expect("child complete");
    doc.clear();
    cssom.style_sheet_loaded(child, false, Ok(())).expect("loaded");
    assert_eq!(doc.added(), vec!["@import url(\"../theme/dark.css\") screen;"]);

    // Cloning the root shares the child's rules through a new child sheet.
    let copy = cssom.clone_sheet(root, None, None, None, None).expect("clone");
    cssom.insert_rule_internal(copy, "b {}", 2).expect("insert");
    let copy_child = cssom.child_sheets(copy).expect("children")[0];
    assert_ne!(copy_child, child);
    assert!(cssom.shares_inner_with(copy_child, child));

    cssom.delete_rule(root, 0, &Caller::chrome()).expect("delete import");
    assert!(!cssom.contains(child));
    assert!(cssom.contains(copy_child));
    assert_eq!(cssom.style_rule_count(copy_child), Ok(1));
}

#[test]
fn test_refused_loads_keep_the_rule() {
    let loader = RecordingLoader::new();
    loader.set_refuse(true);
    let mut cssom = Cssom::new().with_loader(loader.as_loader());
    let sheet = complete_sheet(&mut cssom, "@import url(http://x/a.css); a {}");
    assert_eq!(cssom.style_rule_count(sheet), Ok(2));
    assert_eq!(loader.requests().len(), 1);
}
