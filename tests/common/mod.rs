#![allow(dead_code)]

use std::path::Path;

use compliance_pdf::{Assets, DrawOp, Engine, FontBytes, LayoutConfig, Page, Stamp, load_tables};
use serde_json::{Value, json};

pub const LAYOUT: &str = include_str!("../fixtures/layout.json");
pub const TABLES: &str = include_str!("../fixtures/tables.json");
pub const PAYLOAD: &str = include_str!("../fixtures/payload.json");

pub const DEJAVU_SANS: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
pub const DEJAVU_SANS_BOLD: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The full compliance document template with built-in fonts.
pub fn engine() -> Engine {
    init_logging();
    Engine::from_json(LAYOUT, TABLES, &FontBytes::new()).expect("fixture engine")
}

/// A bare A4 layout rendering only the tables with the given ids.
pub fn engine_with_only(ids: &[&str]) -> Engine {
    init_logging();
    let tables = load_tables(TABLES)
        .expect("fixture tables")
        .into_iter()
        .filter(|t| ids.contains(&t.id()))
        .collect();
    Engine::new(LayoutConfig::default(), tables, &FontBytes::new()).expect("fixture engine")
}

pub fn payload() -> Value {
    serde_json::from_str(PAYLOAD).expect("fixture payload")
}

pub fn stamp() -> Stamp {
    Stamp {
        hash: "9f86d081884c7d659a2feaa0c55ad015".into(),
        timestamp: "2024-02-21T09:30:00Z".into(),
        serial: "0x5A17".into(),
    }
}

/// Payload with `n` revision entries, each with a distinct `rev-NN` version
/// and a summary long enough to wrap over several lines.
pub fn payload_with_revisions(n: usize) -> Value {
    let summary = "Reworded the sampling procedure, moved the rinse-water limits into \
                   an appendix and aligned terminology with the site glossary. "
        .repeat(3);
    let mut payload = payload();
    payload["revisions"] = (0..n)
        .map(|i| {
            json!({
                "version": format!("rev-{i:02}"),
                "date": "2024-01-01",
                "author": "M. Okafor",
                "summary": summary,
            })
        })
        .collect();
    payload
}

pub fn payload_with_reviewers(names: &[&str]) -> Value {
    let mut payload = payload();
    payload["participants"]["reviewers"] = names
        .iter()
        .map(|n| json!({"name": n, "signed_at": "2024-02-14"}))
        .collect();
    payload
}

pub fn page_texts(page: &Page) -> Vec<&str> {
    page.texts().collect()
}

pub fn image_ops(page: &Page) -> usize {
    page.ops()
        .iter()
        .filter(|op| matches!(op, DrawOp::Image { .. }))
        .count()
}

/// Vertical segments at `x`, as (top, bottom).
pub fn verticals_at(page: &Page, x: f32) -> Vec<(f32, f32)> {
    page.lines()
        .filter(|(x1, _, x2, _)| (x1 - x).abs() < 0.01 && (x2 - x).abs() < 0.01)
        .map(|(_, y1, _, y2)| (y1.max(y2), y1.min(y2)))
        .collect()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 40]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

pub fn logo_assets() -> Assets {
    let mut assets = Assets::new();
    assets.insert("logo".into(), png(120, 40));
    assets
}

/// Number of page objects in a PDF written by this crate.
pub fn pdf_page_count(bytes: &[u8]) -> usize {
    let needle = b"/Type /Page";
    bytes
        .windows(needle.len() + 1)
        .filter(|w| w.starts_with(needle) && w[needle.len()] != b's')
        .count()
}

/// Font bytes for DejaVu Sans, when the system has it.
pub fn dejavu_fonts() -> Option<FontBytes> {
    let mut fonts = FontBytes::new();
    for path in [DEJAVU_SANS, DEJAVU_SANS_BOLD] {
        let data = std::fs::read(Path::new(path)).ok()?;
        fonts.insert(path.to_string(), data);
    }
    Some(fonts)
}
