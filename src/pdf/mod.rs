mod cell;
mod flow;
mod image;
mod page;
mod signature;
mod table;
mod text;

use std::collections::{HashMap, HashSet};

use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, Str, TextStr};
use serde_json::{Value, json};

use crate::error::Error;
use crate::fonts::{EmbeddedFont, Fonts, embed_font, pdf_font_name};
use crate::model::{FontStyle, LayoutConfig, RowConfig, Stamp, TableConfig};
use crate::template::path::{Scope, lookup, value_text};

use cell::{draw_row, resolve_widths, row_height};
use flow::{Canvas, Env, PageFlow};

use self::image::{PreparedImage, embed_image};

pub use self::image::Assets;
pub use page::{DrawOp, Page};

/// Stroke width of every table border.
const LINE_WIDTH: f32 = 0.5;

/// The display list of a rendered document, before PDF serialization.
#[derive(Debug)]
pub struct LaidOutDocument {
    /// Page width and height in points.
    size: (f32, f32),
    pages: Vec<Page>,
    images: Vec<(String, PreparedImage)>,
    title: Option<String>,
}

impl LaidOutDocument {
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_size(&self) -> (f32, f32) {
        self.size
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// Rows of a page region, each laid out across the content width.
fn draw_region(env: &Env, canvas: &mut Canvas, rows: &[RowConfig], scope: &Scope, mut y: f32) -> f32 {
    let page = &env.layout.page;
    for row in rows {
        let widths = resolve_widths(row.cells.iter().map(|c| c.width), page.content_width());
        let h = row_height(env, &row.cells, &widths, scope, row.height.min_or_zero());
        draw_row(env, canvas, &row.cells, &widths, scope, page.margins.left, y, h);
        y -= h;
    }
    y
}

fn region_height(env: &Env, rows: &[RowConfig], scope: &Scope) -> f32 {
    let width = env.layout.page.content_width();
    rows.iter()
        .map(|row| {
            let widths = resolve_widths(row.cells.iter().map(|c| c.width), width);
            row_height(env, &row.cells, &widths, scope, row.height.min_or_zero())
        })
        .sum()
}

/// Draw the recurring page header at `y`; returns the body cursor below it.
pub(crate) fn draw_page_header(env: &Env, flow: &mut PageFlow, y: f32) -> f32 {
    let Some(header) = &env.layout.header else {
        return y;
    };
    if header.rows.is_empty() {
        return y;
    }
    let scope = Scope::new(env.payload);
    draw_region(env, &mut flow.canvas(), &header.rows, &scope, y) - header.spacing
}

fn footer_vars(stamp: Option<&Stamp>, number: usize, count: usize) -> Value {
    json!({
        "page": {"number": number, "count": count},
        "stamp": stamp.cloned().unwrap_or_default(),
    })
}

/// Lay out every table in `tables`, in order, then stamp footers on every
/// page once the page count is known.
pub(crate) fn lay_out(
    layout: &LayoutConfig,
    tables: &[&TableConfig],
    fonts: &Fonts,
    payload: &Value,
    assets: &Assets,
    stamp: Option<&Stamp>,
) -> LaidOutDocument {
    let env = Env {
        layout,
        fonts,
        payload,
        assets,
    };
    let page = &layout.page;

    // Footer height is reserved up front with single-page variables.
    let estimate_vars = footer_vars(stamp, 1, 1);
    let estimate_scope = Scope::new(payload).with_layer(&estimate_vars);
    let min_y = page.margins.bottom
        + layout.footer.as_ref().map_or(0.0, |f| {
            region_height(&env, &f.rows, &estimate_scope) + f.spacing
        });

    let mut flow = PageFlow::new(page.top_y(), min_y);
    let mut y = flow.begin(&env);

    for (i, table) in tables.iter().enumerate() {
        if i > 0 && !flow.at_body_top(y) {
            y -= layout.table_spacing;
        }
        log::debug!(
            "table `{}` ({}) starts at y={:.2} on page {}",
            table.id(),
            table.title().unwrap_or("untitled"),
            y,
            flow.page_number()
        );
        y = match table {
            TableConfig::Fixed(t) => table::render_fixed(&env, &mut flow, t, y),
            TableConfig::Dynamic(t) => table::render_dynamic(&env, &mut flow, t, y),
            TableConfig::SignatureGroup(t) => signature::render_signature_group(&env, &mut flow, t, y),
        };
    }

    let (mut pages, mut images) = flow.finish();

    if let Some(footer) = &layout.footer {
        let count = pages.len();
        for (i, page_ops) in pages.iter_mut().enumerate() {
            let vars = footer_vars(stamp, i + 1, count);
            let scope = Scope::new(payload).with_layer(&vars);
            let top = page.margins.bottom + region_height(&env, &footer.rows, &scope);
            let mut canvas = Canvas {
                page: page_ops,
                images: &mut images,
            };
            draw_region(&env, &mut canvas, &footer.rows, &scope, top);
        }
    }

    let mut images: Vec<(String, PreparedImage)> = images.into_decoded().collect();
    images.sort_by(|a, b| a.0.cmp(&b.0));

    let title = lookup(payload, "document.title")
        .map(value_text)
        .filter(|t| !t.is_empty());

    LaidOutDocument {
        size: (page.width, page.height),
        pages,
        images,
        title,
    }
}

/// Serialize a laid-out document: fonts subsetted to the characters drawn,
/// each image once, one Flate-compressed content stream per page.
pub(crate) fn write_pdf(doc: &LaidOutDocument, fonts: &Fonts) -> Result<Vec<u8>, Error> {
    let t0 = std::time::Instant::now();
    if doc.pages.is_empty() {
        return Err(Error::Pdf("document has no pages".into()));
    }
    let page_count = i32::try_from(doc.pages.len())
        .map_err(|_| Error::Pdf(format!("{} pages exceed the page tree limit", doc.pages.len())))?;
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();

    // Phase 1: fonts, only the styles that actually appear
    let mut used_chars: HashMap<FontStyle, HashSet<char>> = HashMap::new();
    for op in doc.pages.iter().flat_map(|p| p.ops()) {
        if let DrawOp::Text { style, text, .. } = op {
            used_chars.entry(*style).or_default().extend(text.chars());
        }
    }
    let mut embedded: Vec<(FontStyle, EmbeddedFont)> = Vec::new();
    for style in [FontStyle::Regular, FontStyle::Bold] {
        if let Some(chars) = used_chars.get(&style) {
            embedded.push((style, embed_font(&mut pdf, fonts.face(style), chars, &mut alloc)?));
        }
    }
    let t_fonts = t0.elapsed();

    // Phase 2: image XObjects
    let mut image_names: HashMap<&str, String> = HashMap::new();
    let mut image_xobjects: Vec<(String, Ref)> = Vec::new();
    for (i, (key, img)) in doc.images.iter().enumerate() {
        let name = format!("Im{}", i + 1);
        let xobj_ref = embed_image(&mut pdf, img, &mut alloc);
        image_names.insert(key.as_str(), name.clone());
        image_xobjects.push((name, xobj_ref));
    }
    let t_images = t0.elapsed();

    // Phase 3: content streams
    let n = doc.pages.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    for (page, content_id) in doc.pages.iter().zip(&content_ids) {
        let mut content = Content::new();
        content.set_line_width(LINE_WIDTH);
        for op in page.ops() {
            match op {
                DrawOp::Line { x1, y1, x2, y2 } => {
                    content.move_to(*x1, *y1).line_to(*x2, *y2).stroke();
                }
                DrawOp::Text {
                    x,
                    y,
                    font_size,
                    style,
                    text,
                } => {
                    let Some((_, font)) = embedded.iter().find(|(s, _)| s == style) else {
                        continue;
                    };
                    content
                        .begin_text()
                        .set_font(Name(pdf_font_name(*style).as_bytes()), *font_size)
                        .next_line(*x, *y)
                        .show(Str(&font.encode(text)))
                        .end_text();
                }
                DrawOp::Image {
                    key,
                    x,
                    y,
                    width,
                    height,
                } => {
                    let Some(name) = image_names.get(key.as_str()) else {
                        continue;
                    };
                    content.save_state();
                    content.transform([*width, 0.0, 0.0, *height, *x, *y]);
                    content.x_object(Name(name.as_bytes()));
                    content.restore_state();
                }
            }
        }
        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(*content_id, &compressed).filter(Filter::FlateDecode);
    }
    let t_content = t0.elapsed();

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(page_count);

    let (width, height) = doc.size;
    for (page_id, content_id) in page_ids.iter().zip(&content_ids) {
        let mut page = pdf.page(*page_id);
        page.media_box(Rect::new(0.0, 0.0, width, height))
            .parent(pages_id)
            .contents(*content_id);
        let mut resources = page.resources();
        {
            let mut fonts = resources.fonts();
            for (style, font) in &embedded {
                fonts.pair(Name(pdf_font_name(*style).as_bytes()), font.font_ref);
            }
        }
        if !image_xobjects.is_empty() {
            let mut xobjects = resources.x_objects();
            for (name, xobj_ref) in &image_xobjects {
                xobjects.pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
    }

    {
        let mut info = pdf.document_info(alloc());
        info.producer(TextStr(concat!("compliance-pdf ", env!("CARGO_PKG_VERSION"))));
        if let Some(title) = &doc.title {
            info.title(TextStr(title.as_str()));
        }
    }

    let t_assembly = t0.elapsed();
    log::info!(
        "Write phases: fonts={:.1}ms, images={:.1}ms, content={:.1}ms, assembly={:.1}ms ({} pages)",
        t_fonts.as_secs_f64() * 1000.0,
        (t_images - t_fonts).as_secs_f64() * 1000.0,
        (t_content - t_images).as_secs_f64() * 1000.0,
        (t_assembly - t_content).as_secs_f64() * 1000.0,
        n,
    );

    Ok(pdf.finish())
}
