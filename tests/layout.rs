mod common;

use compliance_pdf::{Assets, DrawOp, Engine, FontBytes, LayoutConfig, load_tables};
use serde_json::json;

const REVISION_HEADERS: [&str; 5] = ["#", "Version", "Date", "Author", "Change summary"];

#[test]
fn empty_revision_history_has_one_blank_row() {
    let engine = common::engine_with_only(&["revision_history"]);
    for revisions in [json!([]), json!(null)] {
        let mut payload = common::payload();
        payload["revisions"] = revisions;
        let doc = engine.lay_out(&payload, &Assets::new(), None);

        assert_eq!(doc.page_count(), 1);
        let page = &doc.pages()[0];
        let mut expected = vec!["Revision History"];
        expected.extend(REVISION_HEADERS);
        assert_eq!(common::page_texts(page), expected);
        // Title box, header row (5 tops, 5 bottoms, 6 verticals) and one body
        // row sharing the header's bottom edges.
        assert_eq!(page.line_count(), 4 + 16 + 11);
    }
}

#[test]
fn long_revision_history_repeats_title_and_header_per_page() {
    let engine = common::engine();
    let payload = common::payload_with_revisions(50);
    let doc = engine.lay_out(&payload, &common::logo_assets(), Some(&common::stamp()));
    assert!(doc.page_count() > 2, "only {} pages", doc.page_count());

    let first = doc
        .pages()
        .iter()
        .position(|p| p.texts().any(|t| t == "Revision History"))
        .expect("revision history rendered");
    for (i, page) in doc.pages().iter().enumerate().skip(first) {
        let texts = common::page_texts(page);
        let titles: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == "Revision History")
            .map(|(j, _)| j)
            .collect();
        assert_eq!(titles.len(), 1, "page {} has {} titles", i + 1, titles.len());
        assert_eq!(&texts[titles[0] + 1..titles[0] + 6], &REVISION_HEADERS, "page {}", i + 1);
    }

    let versions: Vec<&str> = doc
        .pages()
        .iter()
        .flat_map(|p| p.texts())
        .filter(|t| t.starts_with("rev-"))
        .collect();
    let expected: Vec<String> = (0..50).map(|i| format!("rev-{i:02}")).collect();
    assert_eq!(versions, expected);
}

#[test]
fn three_reviewers_merge_under_one_label() {
    let names = ["A. Lindqvist", "R. Ferreira", "J. Tanaka"];
    let engine = common::engine();
    let payload = common::payload_with_reviewers(&names);
    let doc = engine.lay_out(&payload, &Assets::new(), None);

    let page = &doc.pages()[0];
    let texts = common::page_texts(page);
    assert_eq!(texts.iter().filter(|t| **t == "Reviewer").count(), 1);
    for name in names {
        assert!(texts.contains(&name), "{name} missing");
    }

    // The review block sits 265pt right of the 40pt margin; its label's left
    // edge is one stroke over the three 18pt participant rows.
    let spans = common::verticals_at(page, 305.0);
    assert!(
        spans.iter().any(|(top, bottom)| (top - bottom - 54.0).abs() < 1e-3),
        "{spans:?}"
    );
    // The label/participant boundary is one stroke, not one per row on top
    // of the label's own edge.
    let boundary = common::verticals_at(page, 375.0);
    assert_eq!(boundary.len(), 1, "{boundary:?}");
    assert!((boundary[0].0 - boundary[0].1 - 54.0).abs() < 1e-3);
}

#[test]
fn no_reviewers_keeps_the_label_row() {
    let engine = common::engine();
    let payload = common::payload_with_reviewers(&[]);
    let doc = engine.lay_out(&payload, &Assets::new(), None);
    let texts = common::page_texts(&doc.pages()[0]);
    assert_eq!(texts.iter().filter(|t| **t == "Reviewer").count(), 1);
    assert!(texts.contains(&"Reviewed"));
}

#[test]
fn footer_numbers_every_page() {
    let engine = common::engine();
    let doc = engine.lay_out(
        &common::payload_with_revisions(50),
        &Assets::new(),
        Some(&common::stamp()),
    );
    let n = doc.page_count();
    for (i, page) in doc.pages().iter().enumerate() {
        let texts = common::page_texts(page);
        let expected = format!("Page {} of {}", i + 1, n);
        assert!(texts.contains(&expected.as_str()), "page {}: {texts:?}", i + 1);
        assert!(texts.contains(&"SHA-256: 9f86d081884c7d659a2feaa0c55ad015"));
        assert!(texts.contains(&"Timestamp 2024-02-21T09:30:00Z (serial 0x5A17)"));
    }
}

#[test]
fn body_never_enters_the_footer_area() {
    // 36pt margin, two 14.4pt footer rows and 8pt spacing.
    let footer_top = 36.0 + 14.4 + 14.4 + 8.0;
    let engine = common::engine();
    let doc = engine.lay_out(&common::payload_with_revisions(50), &Assets::new(), None);
    for page in doc.pages() {
        for op in page.ops() {
            if let DrawOp::Text { y, font_size, text, .. } = op
                && *font_size != 7.0
            {
                assert!(*y > footer_top - 1e-3, "{text:?} at {y}");
            }
        }
    }
}

#[test]
fn page_header_repeats_with_logo() {
    let engine = common::engine();
    let doc = engine.lay_out(
        &common::payload_with_revisions(30),
        &common::logo_assets(),
        None,
    );
    assert!(doc.page_count() > 1);
    for page in doc.pages() {
        let texts = common::page_texts(page);
        assert_eq!(texts[0], "Cleaning Validation of Filling Line 3");
        assert_eq!(&texts[1..3], &["SOP-QA-0142", "Version 4.0"]);
        assert_eq!(common::image_ops(page), 1);
    }
}

#[test]
fn tables_follow_configured_order() {
    let engine = common::engine();
    let doc = engine.lay_out(&common::payload(), &Assets::new(), None);
    assert_eq!(doc.page_count(), 1);
    let texts = common::page_texts(&doc.pages()[0]);
    let at = |s: &str| texts.iter().position(|t| *t == s).expect(s);
    assert!(at("Document Approval") < at("Signatures"));
    assert!(at("Signatures") < at("Revision History"));
    assert_eq!(doc.title(), Some("Cleaning Validation of Filling Line 3"));
}

#[test]
fn missing_payload_fields_render_blank() {
    let engine = common::engine();
    let doc = engine.lay_out(&json!({}), &Assets::new(), None);
    let texts = common::page_texts(&doc.pages()[0]);
    assert!(texts.contains(&"Document code"));
    assert!(!texts.iter().any(|t| t.contains("{{")));
    assert_eq!(doc.title(), None);
}

#[test]
fn oversized_row_is_placed_once() {
    common::init_logging();
    let tables = load_tables(
        r#"[{"type": "fixed", "id": "huge", "columns": [{"header": "A"}],
             "rows": [{"height": 2000, "cells": [{"text": "tall"}]},
                      {"height": 20, "cells": [{"text": "after"}]}]}]"#,
    )
    .unwrap();
    let engine = Engine::new(LayoutConfig::default(), tables, &FontBytes::new()).unwrap();
    let doc = engine.lay_out(&json!({}), &Assets::new(), None);
    assert_eq!(doc.page_count(), 2);
    assert!(doc.pages()[0].texts().any(|t| t == "tall"));
    let second = common::page_texts(&doc.pages()[1]);
    assert_eq!(second, vec!["A", "after"]);
}
