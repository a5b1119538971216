use std::collections::HashSet;

use crate::model::{Borders, FontStyle};

/// One drawing primitive, in PDF user space (origin bottom-left, points).
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Text {
        x: f32,
        /// Baseline.
        y: f32,
        font_size: f32,
        style: FontStyle,
        text: String,
    },
    Image {
        key: String,
        x: f32,
        /// Bottom edge.
        y: f32,
        width: f32,
        height: f32,
    },
}

/// Endpoints in hundredths of a point, smaller point first.
type EdgeKey = ((i64, i64), (i64, i64));

fn edge_key(x1: f32, y1: f32, x2: f32, y2: f32) -> EdgeKey {
    let round = |v: f32| (v as f64 * 100.0).round() as i64;
    let a = (round(x1), round(y1));
    let b = (round(x2), round(y2));
    if a <= b { (a, b) } else { (b, a) }
}

/// A laid-out page: its draw operations plus the set of edges already
/// stroked on it. The edge set lives and dies with the page.
#[derive(Debug, Default)]
pub struct Page {
    ops: Vec<DrawOp>,
    strokes: HashSet<EdgeKey>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn lines(&self) -> impl Iterator<Item = (f32, f32, f32, f32)> + '_ {
        self.ops.iter().filter_map(|op| match *op {
            DrawOp::Line { x1, y1, x2, y2 } => Some((x1, y1, x2, y2)),
            _ => None,
        })
    }

    /// Text runs on this page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn line_count(&self) -> usize {
        self.lines().count()
    }

    /// Stroke a segment unless the same segment, in either direction, was
    /// already stroked on this page. Returns whether a line was emitted.
    pub fn stroke(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        if !self.strokes.insert(edge_key(x1, y1, x2, y2)) {
            return false;
        }
        self.ops.push(DrawOp::Line { x1, y1, x2, y2 });
        true
    }

    pub fn stroke_rect(&mut self, x: f32, y_top: f32, width: f32, height: f32) {
        self.draw_cell_borders(x, y_top, width, height, &Borders::all());
    }

    /// Stroke the edges of a cell whose top-left corner is `(x, y_top)`.
    pub fn draw_cell_borders(&mut self, x: f32, y_top: f32, width: f32, height: f32, b: &Borders) {
        let right = x + width;
        let bottom = y_top - height;
        if b.top {
            self.stroke(x, y_top, right, y_top);
        }
        if b.bottom {
            self.stroke(x, bottom, right, bottom);
        }
        if b.left {
            self.stroke(x, y_top, x, bottom);
        }
        if b.right {
            self.stroke(right, y_top, right, bottom);
        }
    }

    pub fn text(&mut self, x: f32, y: f32, font_size: f32, style: FontStyle, text: String) {
        if text.is_empty() {
            return;
        }
        self.ops.push(DrawOp::Text {
            x,
            y,
            font_size,
            style,
            text,
        });
    }

    pub fn image(&mut self, key: &str, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(DrawOp::Image {
            key: key.to_string(),
            x,
            y,
            width,
            height,
        });
    }
}
