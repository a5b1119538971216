use crate::fonts::Measure;
use crate::model::{Alignment, CellConfig, Dimension};
use crate::template::path::{Scope, has_placeholder};

use super::flow::{Canvas, Env};
use super::text::{line_height, required_height, wrap};

/// Gap kept between an image and its cell border, per side.
const IMAGE_MARGIN: f32 = 2.0;

/// The text a cell shows under `scope`. Never fails: anything unresolved
/// renders as empty.
pub(crate) fn cell_text(cell: &CellConfig, scope: &Scope) -> String {
    match (&cell.text, &cell.source) {
        (Some(text), _) if !has_placeholder(text) => text.clone(),
        (Some(text), _) => scope.interpolate(text),
        (None, Some(source)) => scope.text(source),
        (None, None) => String::new(),
    }
}

fn image_key(cell: &CellConfig, scope: &Scope) -> Option<String> {
    let raw = cell.image.as_deref()?;
    let key = if has_placeholder(raw) {
        scope.interpolate(raw)
    } else {
        raw.to_string()
    };
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_string())
}

pub(crate) fn font_size(env: &Env, cell: &CellConfig) -> f32 {
    cell.font_size.unwrap_or(env.layout.text.font_size)
}

/// Height the cell needs at `width`, never less than `min_height`.
pub(crate) fn cell_height(env: &Env, cell: &CellConfig, scope: &Scope, width: f32, min_height: f32) -> f32 {
    let text = &env.layout.text;
    if cell.image.is_some() {
        return min_height.max(text.padding);
    }
    let face = env.fonts.face(cell.font_style());
    required_height(face, &cell_text(cell, scope), width, font_size(env, cell), text, min_height)
}

/// Draw borders, then either the cell's image or its wrapped text centered
/// vertically in the box whose top-left corner is `(x, y_top)`.
pub(crate) fn draw_cell(
    env: &Env,
    canvas: &mut Canvas,
    cell: &CellConfig,
    scope: &Scope,
    x: f32,
    y_top: f32,
    width: f32,
    height: f32,
) {
    canvas
        .page
        .draw_cell_borders(x, y_top, width, height, &cell.borders);

    if cell.image.is_some() {
        draw_image(env, canvas, cell, scope, x, y_top, width, height);
        return;
    }

    let text = &env.layout.text;
    let size = font_size(env, cell);
    let style = cell.font_style();
    let face = env.fonts.face(style);
    let lines = wrap(face, &cell_text(cell, scope), width, size, text.margin);
    if lines.is_empty() {
        return;
    }

    let line_h = line_height(size, text);
    let block_h = lines.len() as f32 * line_h;
    let block_top = y_top - (height - block_h) / 2.0;
    let align = cell.align.unwrap_or_default();

    for (i, line) in lines.into_iter().enumerate() {
        let line_top = block_top - i as f32 * line_h;
        let baseline = line_top - (line_h - size) / 2.0 - size * face.ascender_ratio();
        let line_w = face.text_width(&line, size);
        let line_x = match align {
            Alignment::Left => x + text.margin,
            Alignment::Center => x + (width - line_w) / 2.0,
            Alignment::Right => x + width - text.margin - line_w,
        };
        canvas.page.text(line_x, baseline, size, style, line);
    }
}

fn draw_image(
    env: &Env,
    canvas: &mut Canvas,
    cell: &CellConfig,
    scope: &Scope,
    x: f32,
    y_top: f32,
    width: f32,
    height: f32,
) {
    let Some(key) = image_key(cell, scope) else {
        return;
    };
    let Some(img) = canvas.images.get(env.assets, &key) else {
        return;
    };
    let (w, h) = img.fit(width - 2.0 * IMAGE_MARGIN, height - 2.0 * IMAGE_MARGIN);
    if w <= 0.0 || h <= 0.0 {
        return;
    }
    let img_x = x + (width - w) / 2.0;
    let img_y = y_top - height + (height - h) / 2.0;
    canvas.page.image(&key, img_x, img_y, w, h);
}

/// Split `total` between cells: fixed widths are kept, the remainder is
/// shared equally by `auto` cells.
pub(crate) fn resolve_widths(dims: impl IntoIterator<Item = Dimension>, total: f32) -> Vec<f32> {
    let dims: Vec<Dimension> = dims.into_iter().collect();
    let fixed: f32 = dims.iter().filter_map(|d| d.points()).sum();
    let autos = dims.iter().filter(|d| d.points().is_none()).count();
    let share = if autos > 0 {
        (total - fixed).max(0.0) / autos as f32
    } else {
        0.0
    };
    dims.iter().map(|d| d.points().unwrap_or(share)).collect()
}

/// Height of a row of cells: the configured minimum, or the tallest cell.
pub(crate) fn row_height(
    env: &Env,
    cells: &[CellConfig],
    widths: &[f32],
    scope: &Scope,
    min_height: f32,
) -> f32 {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| cell_height(env, cell, scope, w, min_height))
        .fold(min_height, f32::max)
}

pub(crate) fn draw_row(
    env: &Env,
    canvas: &mut Canvas,
    cells: &[CellConfig],
    widths: &[f32],
    scope: &Scope,
    x: f32,
    y_top: f32,
    height: f32,
) {
    let mut cell_x = x;
    for (cell, &w) in cells.iter().zip(widths) {
        draw_cell(env, canvas, cell, scope, cell_x, y_top, w, height);
        cell_x += w;
    }
}
