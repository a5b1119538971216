mod error;
mod fonts;
pub mod model;
mod pdf;
pub mod template;

pub use error::Error;
pub use fonts::{FontBytes, FontFace, Fonts, Measure};
pub use model::{LayoutConfig, Stamp, TableConfig};
pub use pdf::{Assets, DrawOp, LaidOutDocument, Page};
pub use template::{load_layout, load_tables};

use std::time::Instant;

use serde_json::Value;

/// A loaded layout, table set and font pair. Built once, then shared
/// read-only by any number of renders.
pub struct Engine {
    layout: LayoutConfig,
    tables: Vec<TableConfig>,
    /// Indices into `tables` in rendering order.
    order: Vec<usize>,
    fonts: Fonts,
}

impl Engine {
    pub fn new(layout: LayoutConfig, tables: Vec<TableConfig>, font_bytes: &FontBytes) -> Result<Self, Error> {
        let t0 = Instant::now();
        template::validate_layout(&layout)?;
        template::validate_table_set(&tables)?;
        let order = template::ordered_tables(&layout, &tables)?
            .into_iter()
            .filter_map(|t| tables.iter().position(|c| c.id() == t.id()))
            .collect();
        let fonts = Fonts::load(&layout.fonts, font_bytes)?;
        log::info!(
            "Engine ready: {} tables, fonts {} / {} ({:.1}ms)",
            tables.len(),
            fonts.face(model::FontStyle::Regular).name(),
            fonts.face(model::FontStyle::Bold).name(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(Self {
            layout,
            tables,
            order,
            fonts,
        })
    }

    /// Parse the layout and table set JSON, then build the engine.
    pub fn from_json(layout_json: &str, tables_json: &str, font_bytes: &FontBytes) -> Result<Self, Error> {
        let layout = load_layout(layout_json)?;
        let tables = load_tables(tables_json)?;
        Self::new(layout, tables, font_bytes)
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Tables in rendering order.
    pub fn tables(&self) -> impl Iterator<Item = &TableConfig> {
        self.order.iter().map(|&i| &self.tables[i])
    }

    /// Compute every page of the document without writing PDF bytes.
    pub fn lay_out(&self, payload: &Value, assets: &Assets, stamp: Option<&Stamp>) -> LaidOutDocument {
        let tables: Vec<&TableConfig> = self.tables().collect();
        pdf::lay_out(&self.layout, &tables, &self.fonts, payload, assets, stamp)
    }

    pub fn render(&self, payload: &Value, assets: &Assets, stamp: Option<&Stamp>) -> Result<Vec<u8>, Error> {
        let t0 = Instant::now();

        let doc = self.lay_out(payload, assets, stamp);
        let t_layout = t0.elapsed();

        let bytes = pdf::write_pdf(&doc, &self.fonts)?;
        let t_total = t0.elapsed();

        log::info!(
            "Timing: layout={:.1}ms, write={:.1}ms, total={:.1}ms ({} pages, output {} bytes)",
            t_layout.as_secs_f64() * 1000.0,
            (t_total - t_layout).as_secs_f64() * 1000.0,
            t_total.as_secs_f64() * 1000.0,
            doc.page_count(),
            bytes.len(),
        );

        Ok(bytes)
    }

    /// Render from payload JSON text.
    pub fn render_json(&self, payload_json: &str, assets: &Assets, stamp: Option<&Stamp>) -> Result<Vec<u8>, Error> {
        let payload: Value = serde_json::from_str(payload_json)?;
        self.render(&payload, assets, stamp)
    }
}
