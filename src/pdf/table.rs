use serde_json::Value;

use crate::model::{Alignment, CellConfig, ColumnConfig, DynamicTable, FixedTable};
use crate::template::path::{Scope, lookup};

use super::cell::{draw_row, resolve_widths, row_height};
use super::flow::{Env, PageFlow, no_repeat};

/// Full-width bold centered title cell.
pub(crate) fn title_cell(env: &Env, title: &str) -> CellConfig {
    CellConfig {
        text: Some(title.to_string()),
        align: Some(Alignment::Center),
        font_size: Some(env.layout.text.title_font_size),
        bold: true,
        ..Default::default()
    }
}

/// Title and header rows of a table. Drawn once above the first body row
/// and again at the top of every continuation page.
struct TableFrame<'a> {
    x: f32,
    widths: Vec<f32>,
    scope: Scope<'a>,
    title: Option<(CellConfig, f32)>,
    headers: Option<(Vec<CellConfig>, f32)>,
}

impl<'a> TableFrame<'a> {
    fn new(env: &Env<'a>, title: Option<&str>, columns: &[ColumnConfig]) -> Self {
        let page = &env.layout.page;
        let widths = resolve_widths(columns.iter().map(|c| c.width), page.content_width());
        let scope = Scope::new(env.payload);
        let total: f32 = widths.iter().sum();

        let title = title.filter(|t| !t.trim().is_empty()).map(|t| {
            let cell = title_cell(env, t);
            let height = row_height(env, std::slice::from_ref(&cell), &[total], &scope, 0.0);
            (cell, height)
        });

        let headers = columns
            .iter()
            .any(|c| !c.header.trim().is_empty())
            .then(|| {
                let cells: Vec<CellConfig> = columns
                    .iter()
                    .map(|c| CellConfig {
                        text: Some(c.header.clone()),
                        align: Some(Alignment::Center),
                        font_size: c.font_size,
                        bold: true,
                        ..Default::default()
                    })
                    .collect();
                let height = row_height(env, &cells, &widths, &scope, 0.0);
                (cells, height)
            });

        Self {
            x: page.margins.left,
            widths,
            scope,
            title,
            headers,
        }
    }

    fn height(&self) -> f32 {
        self.title.as_ref().map_or(0.0, |(_, h)| *h) + self.headers.as_ref().map_or(0.0, |(_, h)| *h)
    }

    fn total_width(&self) -> f32 {
        self.widths.iter().sum()
    }

    fn draw(&self, env: &Env, flow: &mut PageFlow, mut y: f32) -> f32 {
        let mut canvas = flow.canvas();
        if let Some((cell, h)) = &self.title {
            draw_row(env, &mut canvas, std::slice::from_ref(cell), &[self.total_width()], &self.scope, self.x, y, *h);
            y -= h;
        }
        if let Some((cells, h)) = &self.headers {
            draw_row(env, &mut canvas, cells, &self.widths, &self.scope, self.x, y, *h);
            y -= h;
        }
        y
    }
}

struct BodyRow<'r, 'a> {
    cells: &'r [CellConfig],
    scope: Scope<'a>,
    height: f32,
}

/// Cells with their column's alignment and font size filled in where the
/// cell leaves them unset.
fn with_column_defaults(cells: &[CellConfig], columns: &[ColumnConfig]) -> Vec<CellConfig> {
    cells
        .iter()
        .zip(columns)
        .map(|(cell, col)| CellConfig {
            align: cell.align.or(Some(col.align)),
            font_size: cell.font_size.or(col.font_size),
            ..cell.clone()
        })
        .collect()
}

fn render_rows(env: &Env, flow: &mut PageFlow, frame: &TableFrame, rows: &[BodyRow], mut y: f32) -> f32 {
    let Some(first) = rows.first() else {
        y = flow.fit(env, y, frame.height(), &no_repeat);
        return frame.draw(env, flow, y);
    };

    // Title and header stay with the first body row.
    y = flow.fit(env, y, frame.height() + first.height, &no_repeat);
    y = frame.draw(env, flow, y);

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            y = flow.fit(env, y, row.height, &|env, flow, y| frame.draw(env, flow, y));
        }
        log::debug!(
            "table row={} h={:.2} y={:.2} page={}",
            i,
            row.height,
            y,
            flow.page_number()
        );
        draw_row(env, &mut flow.canvas(), row.cells, &frame.widths, &row.scope, frame.x, y, row.height);
        y -= row.height;
    }
    y
}

/// Static rows, each as tall as its tallest cell or its configured minimum.
pub(crate) fn render_fixed<'a>(env: &Env<'a>, flow: &mut PageFlow, table: &'a FixedTable, y: f32) -> f32 {
    let frame = TableFrame::new(env, table.title.as_deref(), &table.columns);
    let cells: Vec<Vec<CellConfig>> = table
        .rows
        .iter()
        .map(|r| with_column_defaults(&r.cells, &table.columns))
        .collect();
    let rows: Vec<BodyRow> = table
        .rows
        .iter()
        .zip(&cells)
        .map(|(row, cells)| BodyRow {
            cells,
            scope: frame.scope.clone(),
            height: row_height(env, cells, &frame.widths, &frame.scope, row.height.min_or_zero()),
        })
        .collect();
    render_rows(env, flow, &frame, &rows, y)
}

/// Entries of the array at `data_source`. A missing path or a value that is
/// not an array counts as no entries.
pub(crate) fn entries<'a>(payload: &'a Value, data_source: &str) -> &'a [Value] {
    match lookup(payload, data_source) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            log::warn!("data source `{data_source}` is {other}, not an array; rendering no entries");
            &[]
        }
        None => &[],
    }
}

/// One row per entry of the `data_source` array, or one empty row when
/// there are none.
pub(crate) fn render_dynamic<'a>(env: &Env<'a>, flow: &mut PageFlow, table: &'a DynamicTable, y: f32) -> f32 {
    let frame = TableFrame::new(env, table.title.as_deref(), &table.columns);
    let cells = with_column_defaults(&table.row.cells, &table.columns);
    let min_height = table.row.height.min_or_zero();

    let items = entries(env.payload, &table.data_source);
    let scopes: Vec<Scope> = if items.is_empty() {
        vec![Scope::empty()]
    } else {
        items
            .iter()
            .enumerate()
            .map(|(i, entry)| frame.scope.with_layer(entry).with_index(i + 1))
            .collect()
    };
    log::debug!("dynamic table `{}`: {} entries", table.id, items.len());

    let rows: Vec<BodyRow> = scopes
        .into_iter()
        .map(|scope| {
            let height = row_height(env, &cells, &frame.widths, &scope, min_height);
            BodyRow {
                cells: &cells,
                scope,
                height,
            }
        })
        .collect();
    render_rows(env, flow, &frame, &rows, y)
}
