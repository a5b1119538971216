use crate::model::{Alignment, BlockRow, CellConfig, SignatureBlock, SignatureGroup};
use crate::template::path::Scope;

use super::cell::{cell_height, draw_cell, draw_row, resolve_widths, row_height};
use super::flow::{Canvas, Env, PageFlow, Repeat, no_repeat};
use super::table::{entries, title_cell};

/// Vertical gap between stacked row-groups.
const GROUP_SPACING: f32 = 12.0;

/// Blocks whose `y` offsets differ by less than this share a row-group.
const SAME_ROW: f32 = 0.01;

enum RowPlan<'a> {
    Single {
        cells: &'a [CellConfig],
        widths: Vec<f32>,
        scope: Scope<'a>,
        height: f32,
    },
    /// One participant row per entry under a single label cell.
    Merged {
        label: &'a CellConfig,
        label_width: f32,
        /// Participant cells; the first one's left edge is the label's
        /// right border and is not stroked again.
        cells: Vec<CellConfig>,
        widths: Vec<f32>,
        entries: Vec<(Scope<'a>, f32)>,
    },
}

impl RowPlan<'_> {
    fn height(&self) -> f32 {
        match self {
            RowPlan::Single { height, .. } => *height,
            RowPlan::Merged { entries, .. } => entries.iter().map(|(_, h)| h).sum(),
        }
    }
}

struct BlockPlan<'a> {
    x: f32,
    width: f32,
    title: Option<(CellConfig, f32)>,
    rows: Vec<RowPlan<'a>>,
}

impl BlockPlan<'_> {
    fn height(&self) -> f32 {
        self.title.as_ref().map_or(0.0, |(_, h)| *h) + self.rows.iter().map(RowPlan::height).sum::<f32>()
    }
}

struct GroupPlan<'a> {
    y: f32,
    extent: f32,
    blocks: Vec<BlockPlan<'a>>,
}

fn plan_row<'a>(env: &Env<'a>, row: &'a BlockRow, width: f32) -> RowPlan<'a> {
    let payload = Scope::new(env.payload);
    let widths = resolve_widths(row.cells.iter().map(|c| c.width), width);
    let min_height = row.height.min_or_zero();

    let Some(source) = &row.data_source else {
        let height = row_height(env, &row.cells, &widths, &payload, min_height);
        return RowPlan::Single {
            cells: &row.cells,
            widths,
            scope: payload,
            height,
        };
    };
    let Some((label, cells)) = row.cells.split_first() else {
        return RowPlan::Single {
            cells: &[],
            widths,
            scope: payload,
            height: min_height,
        };
    };

    let label_width = widths[0];
    let widths = widths[1..].to_vec();
    let mut cells = cells.to_vec();
    if let Some(first) = cells.first_mut() {
        first.borders.left = false;
    }
    let items = entries(env.payload, source);
    let scopes: Vec<Scope> = if items.is_empty() {
        vec![Scope::empty()]
    } else {
        items
            .iter()
            .enumerate()
            .map(|(i, entry)| payload.with_layer(entry).with_index(i + 1))
            .collect()
    };
    let mut entries: Vec<(Scope, f32)> = scopes
        .into_iter()
        .map(|scope| {
            let h = row_height(env, &cells, &widths, &scope, min_height);
            (scope, h)
        })
        .collect();

    // The label spans every entry; if it needs more room the last row grows.
    let label_height = cell_height(env, label, &payload, label_width, min_height);
    let merged: f32 = entries.iter().map(|(_, h)| h).sum();
    if label_height > merged
        && let Some((_, last)) = entries.last_mut()
    {
        *last += label_height - merged;
    }
    log::debug!(
        "merged row `{source}`: {} entries, {:.2}pt",
        entries.len(),
        merged.max(label_height)
    );

    RowPlan::Merged {
        label,
        label_width,
        cells,
        widths,
        entries,
    }
}

fn plan_block<'a>(env: &Env<'a>, block: &'a SignatureBlock, table_width: f32) -> BlockPlan<'a> {
    let width = block
        .width
        .points()
        .unwrap_or((table_width - block.x).max(0.0));
    let title = block.title.as_deref().filter(|t| !t.trim().is_empty()).map(|t| {
        let cell = CellConfig {
            text: Some(t.to_string()),
            align: Some(Alignment::Center),
            bold: true,
            ..Default::default()
        };
        let h = cell_height(env, &cell, &Scope::new(env.payload), width, 0.0);
        (cell, h)
    });
    let rows = block.rows.iter().map(|r| plan_row(env, r, width)).collect();
    BlockPlan {
        x: block.x,
        width,
        title,
        rows,
    }
}

/// Blocks grouped by `y`, groups ordered top to bottom.
fn plan_groups<'a>(env: &Env<'a>, group: &'a SignatureGroup, table_width: f32) -> Vec<GroupPlan<'a>> {
    let mut blocks: Vec<&SignatureBlock> = group.blocks.iter().collect();
    blocks.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut groups: Vec<GroupPlan> = Vec::new();
    for block in blocks {
        let plan = plan_block(env, block, table_width);
        if let Some(g) = groups
            .last_mut()
            .filter(|g| (block.y - g.y).abs() < SAME_ROW)
        {
            g.extent = g.extent.max(plan.height());
            g.blocks.push(plan);
            continue;
        }
        groups.push(GroupPlan {
            y: block.y,
            extent: plan.height(),
            blocks: vec![plan],
        });
    }
    groups
}

fn draw_block(env: &Env, canvas: &mut Canvas, block: &BlockPlan, x: f32, mut y: f32) {
    let payload = Scope::new(env.payload);
    if let Some((cell, h)) = &block.title {
        draw_cell(env, canvas, cell, &payload, x, y, block.width, *h);
        y -= h;
    }
    for row in &block.rows {
        match row {
            RowPlan::Single {
                cells,
                widths,
                scope,
                height,
            } => {
                draw_row(env, canvas, cells, widths, scope, x, y, *height);
            }
            RowPlan::Merged {
                label,
                label_width,
                cells,
                widths,
                entries,
            } => {
                draw_cell(env, canvas, label, &payload, x, y, *label_width, row.height());
                let mut entry_y = y;
                for (scope, h) in entries {
                    draw_row(env, canvas, cells, widths, scope, x + label_width, entry_y, *h);
                    entry_y -= h;
                }
            }
        }
        y -= row.height();
    }
}

/// Row-groups of signature blocks. Each group is kept on one page; the
/// table title is kept with the first group and repeated after a break.
pub(crate) fn render_signature_group<'a>(
    env: &Env<'a>,
    flow: &mut PageFlow,
    table: &'a SignatureGroup,
    mut y: f32,
) -> f32 {
    let page = &env.layout.page;
    let x = page.margins.left;
    let width = page.content_width();
    let groups = plan_groups(env, table, width);

    let title = table.title.as_deref().filter(|t| !t.trim().is_empty()).map(|t| {
        let cell = title_cell(env, t);
        let h = cell_height(env, &cell, &Scope::new(env.payload), width, 0.0);
        (cell, h)
    });
    let draw_title: Repeat = &|env, flow, y| match &title {
        Some((cell, h)) => {
            draw_cell(env, &mut flow.canvas(), cell, &Scope::new(env.payload), x, y, width, *h);
            y - h
        }
        None => y,
    };

    if let Some((_, h)) = &title {
        let first = groups.first().map_or(0.0, |g| g.y.max(0.0) + g.extent);
        y = flow.fit(env, y, h + first, &no_repeat);
        y = draw_title(env, flow, y);
    }

    let anchor = y;
    let anchor_page = flow.page_number();
    for (i, group) in groups.iter().enumerate() {
        let mut top = if i == 0 { y } else { y - GROUP_SPACING };
        if flow.page_number() == anchor_page {
            top = top.min(anchor - group.y.max(0.0));
        }

        let before = flow.page_number();
        let fitted = flow.fit(env, y, (y - top) + group.extent, draw_title);
        if flow.page_number() != before {
            top = fitted;
        }

        log::debug!(
            "signature group y={:.1}: {} blocks, extent={:.2}, top={:.2}, page={}",
            group.y,
            group.blocks.len(),
            group.extent,
            top,
            flow.page_number()
        );
        let mut canvas = flow.canvas();
        for block in &group.blocks {
            draw_block(env, &mut canvas, block, x + block.x, top);
        }
        y = top - group.extent;
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::Fonts;
    use crate::model::{Dimension, LayoutConfig};
    use crate::pdf::image::Assets;
    use crate::pdf::page::{DrawOp, Page};
    use serde_json::{Value, json};

    fn reviewer_block() -> SignatureBlock {
        SignatureBlock {
            name: "review".into(),
            title: Some("Review".into()),
            x: 0.0,
            y: 0.0,
            width: Dimension::Points(300.0),
            rows: vec![BlockRow {
                height: Dimension::Points(20.0),
                cells: vec![
                    CellConfig {
                        width: Dimension::Points(80.0),
                        ..CellConfig::text("Reviewer")
                    },
                    CellConfig::source("name"),
                    CellConfig::source("date"),
                ],
                data_source: Some("participants.reviewers".into()),
            }],
        }
    }

    fn render(payload: Value, table: &SignatureGroup) -> (Vec<Page>, f32, f32) {
        let layout = LayoutConfig::default();
        let fonts = Fonts::builtin();
        let assets = Assets::new();
        let env = Env {
            layout: &layout,
            fonts: &fonts,
            payload: &payload,
            assets: &assets,
        };
        let mut flow = PageFlow::new(layout.page.top_y(), layout.page.margins.bottom);
        let top = flow.begin(&env);
        let bottom = render_signature_group(&env, &mut flow, table, top);
        (flow.finish().0, top, bottom)
    }

    fn vertical_spans_at(page: &Page, x: f32) -> Vec<f32> {
        page.lines()
            .filter(|(x1, _, x2, _)| (x1 - x).abs() < 0.01 && (x2 - x).abs() < 0.01)
            .map(|(_, y1, _, y2)| (y1 - y2).abs())
            .collect()
    }

    #[test]
    fn three_reviewers_share_one_label() {
        let payload = json!({"participants": {"reviewers": [
            {"name": "Ada", "date": "2024-01-02"},
            {"name": "Lin", "date": "2024-01-03"},
            {"name": "Sam", "date": "2024-01-04"},
        ]}});
        let table = SignatureGroup {
            id: "signatures".into(),
            title: None,
            blocks: vec![reviewer_block()],
        };
        let (pages, top, bottom) = render(payload, &table);
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!(page.texts().filter(|t| *t == "Reviewer").count(), 1);
        assert_eq!(page.texts().filter(|t| t.starts_with("2024")).count(), 3);

        // Block title + three 20pt rows.
        let title_h = top - bottom - 60.0;
        assert!(title_h > 0.0);

        // The label's left border runs the full merged height in one stroke.
        let spans = vertical_spans_at(page, 40.0);
        assert!(spans.iter().any(|h| (h - 60.0).abs() < 1e-3), "{spans:?}");

        // The edge between label and participants is a single stroke too.
        let label_right = vertical_spans_at(page, 120.0);
        assert_eq!(label_right.len(), 1, "{label_right:?}");
        assert!((label_right[0] - 60.0).abs() < 1e-3);
    }

    #[test]
    fn no_participants_leaves_one_empty_row() {
        let table = SignatureGroup {
            id: "signatures".into(),
            title: None,
            blocks: vec![reviewer_block()],
        };
        let (pages, top, bottom) = render(json!({}), &table);
        let texts: Vec<&str> = pages[0].texts().collect();
        assert_eq!(texts, vec!["Review", "Reviewer"]);
        let title_h = cell_height_of_title();
        assert!((top - bottom - title_h - 20.0).abs() < 1e-3);
    }

    fn cell_height_of_title() -> f32 {
        let layout = LayoutConfig::default();
        let t = &layout.text;
        t.font_size * t.line_spacing + t.padding
    }

    #[test]
    fn tall_label_grows_last_row() {
        let mut block = reviewer_block();
        block.rows[0].cells[0] = CellConfig {
            width: Dimension::Points(30.0),
            ..CellConfig::text("Quality assurance reviewer on behalf of the site")
        };
        let layout = LayoutConfig::default();
        let fonts = Fonts::builtin();
        let assets = Assets::new();
        let payload = json!({"participants": {"reviewers": [{"name": "Ada"}]}});
        let env = Env {
            layout: &layout,
            fonts: &fonts,
            payload: &payload,
            assets: &assets,
        };
        let plan = plan_row(&env, &block.rows[0], 300.0);
        let label_h = cell_height(&env, &block.rows[0].cells[0], &Scope::new(&payload), 30.0, 20.0);
        assert!(label_h > 20.0);
        assert!((plan.height() - label_h).abs() < 1e-3);
    }

    #[test]
    fn blocks_on_one_row_use_the_tallest_extent() {
        let mut left = reviewer_block();
        left.width = Dimension::Points(250.0);
        let right = SignatureBlock {
            name: "approve".into(),
            title: None,
            x: 260.0,
            y: 0.0,
            width: Dimension::Auto(crate::model::Auto::Auto),
            rows: vec![BlockRow {
                height: Dimension::Points(20.0),
                cells: vec![CellConfig::text("Approver"), CellConfig::source("approver")],
                data_source: None,
            }],
        };
        let below = SignatureBlock {
            name: "release".into(),
            title: None,
            x: 0.0,
            y: 200.0,
            width: Dimension::default(),
            rows: vec![BlockRow {
                height: Dimension::Points(20.0),
                cells: vec![CellConfig::text("Released")],
                data_source: None,
            }],
        };
        let table = SignatureGroup {
            id: "signatures".into(),
            title: Some("Signatures".into()),
            blocks: vec![below, right, left],
        };
        let payload = json!({
            "approver": "Kim",
            "participants": {"reviewers": [{"name": "Ada"}, {"name": "Lin"}]}
        });
        let (pages, top, bottom) = render(payload, &table);
        let page = &pages[0];
        let texts: Vec<&str> = page.texts().collect();
        assert_eq!(texts[0], "Signatures");
        assert!(texts.contains(&"Kim"));

        // The approver block starts at the table anchor, right of the reviewers.
        let approver_x = page
            .ops()
            .iter()
            .find_map(|op| match op {
                DrawOp::Text { x, text, .. } if text == "Approver" => Some(*x),
                _ => None,
            })
            .unwrap();
        assert!(approver_x > 300.0);

        // The released block honors its 200pt offset below the anchor.
        let title_h = top - bottom - 200.0 - 20.0;
        assert!(title_h > 0.0 && title_h < 30.0, "{title_h}");
    }

    #[test]
    fn group_that_does_not_fit_moves_with_repeated_title() {
        let rows: Vec<BlockRow> = (0..6)
            .map(|_| BlockRow {
                height: Dimension::Points(100.0),
                cells: vec![CellConfig::text("Sign")],
                data_source: None,
            })
            .collect();
        let block = |y: f32| SignatureBlock {
            name: String::new(),
            title: None,
            x: 0.0,
            y,
            width: Dimension::default(),
            rows: rows.clone(),
        };
        let table = SignatureGroup {
            id: "signatures".into(),
            title: Some("Signatures".into()),
            blocks: vec![block(0.0), block(700.0)],
        };
        let (pages, _, _) = render(json!({}), &table);
        assert_eq!(pages.len(), 2);
        for page in &pages {
            let texts: Vec<&str> = page.texts().collect();
            assert_eq!(texts[0], "Signatures");
            assert_eq!(texts.iter().filter(|t| **t == "Sign").count(), 6);
        }
    }
}
