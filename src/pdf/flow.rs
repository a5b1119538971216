use std::collections::HashMap;

use serde_json::Value;

use crate::fonts::Fonts;
use crate::model::LayoutConfig;

use super::image::{Assets, PreparedImage};
use super::page::Page;

/// Read-only inputs of one render.
pub(crate) struct Env<'a> {
    pub(crate) layout: &'a LayoutConfig,
    pub(crate) fonts: &'a Fonts,
    pub(crate) payload: &'a Value,
    pub(crate) assets: &'a Assets,
}

/// Assets decoded so far in this render. Failures are remembered so each
/// bad asset is reported once.
#[derive(Default)]
pub(crate) struct ImageCache {
    entries: HashMap<String, Option<PreparedImage>>,
}

impl ImageCache {
    pub(crate) fn get(&mut self, assets: &Assets, key: &str) -> Option<&PreparedImage> {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| {
                let Some(data) = assets.get(key) else {
                    log::warn!("Image asset `{key}` not supplied; skipping");
                    return None;
                };
                match PreparedImage::decode(data) {
                    Ok(img) => Some(img),
                    Err(e) => {
                        log::warn!("Image asset `{key}` could not be decoded: {e}; skipping");
                        None
                    }
                }
            })
            .as_ref()
    }

    pub(crate) fn into_decoded(self) -> impl Iterator<Item = (String, PreparedImage)> {
        self.entries.into_iter().filter_map(|(k, v)| Some((k, v?)))
    }
}

/// Where cells draw: one page plus the render's image cache.
pub(crate) struct Canvas<'p> {
    pub(crate) page: &'p mut Page,
    pub(crate) images: &'p mut ImageCache,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FlowState {
    Flowing,
    /// Switching pages: recurring structure is being redrawn and is never
    /// itself checked for overflow.
    Paginating,
}

/// Redraws whatever must open a continuation page below the page header
/// (a table's title and header row). Takes and returns the cursor.
pub(crate) type Repeat<'r> = &'r dyn Fn(&Env, &mut PageFlow, f32) -> f32;

/// Owns the pages of one render and decides when the body moves to a new one.
pub(crate) struct PageFlow {
    done: Vec<Page>,
    current: Page,
    images: ImageCache,
    state: FlowState,
    top_y: f32,
    min_y: f32,
    /// Cursor just below the recurring structure of the current page.
    body_top: f32,
}

impl PageFlow {
    pub(crate) fn new(top_y: f32, min_y: f32) -> Self {
        Self {
            done: Vec::new(),
            current: Page::new(),
            images: ImageCache::default(),
            state: FlowState::Flowing,
            top_y,
            min_y,
            body_top: top_y,
        }
    }

    /// Draw the page header on the first page; returns the body cursor.
    pub(crate) fn begin(&mut self, env: &Env) -> f32 {
        self.state = FlowState::Paginating;
        let y = super::draw_page_header(env, self, self.top_y);
        self.state = FlowState::Flowing;
        self.body_top = y;
        y
    }

    pub(crate) fn canvas(&mut self) -> Canvas<'_> {
        Canvas {
            page: &mut self.current,
            images: &mut self.images,
        }
    }

    /// 1-based number of the page being drawn.
    pub(crate) fn page_number(&self) -> usize {
        self.done.len() + 1
    }

    /// Nothing has been drawn below the recurring structure yet.
    pub(crate) fn at_body_top(&self, y: f32) -> bool {
        (y - self.body_top).abs() < 0.01
    }

    /// Make room for a unit `height` tall at cursor `y`. Returns the cursor to
    /// draw it at: `y` itself when it fits (touching `min_y` exactly still
    /// fits), otherwise the body cursor of a fresh page.
    pub(crate) fn fit(&mut self, env: &Env, y: f32, height: f32, repeat: Repeat) -> f32 {
        if self.state == FlowState::Paginating || y - height >= self.min_y {
            return y;
        }
        if self.at_body_top(y) {
            log::warn!(
                "Unit of {height:.1}pt does not fit the usable page height ({:.1}pt) on page {}; drawing past the bottom limit",
                y - self.min_y,
                self.page_number()
            );
            return y;
        }
        self.break_page(env, repeat)
    }

    fn break_page(&mut self, env: &Env, repeat: Repeat) -> f32 {
        self.state = FlowState::Paginating;
        self.done.push(std::mem::take(&mut self.current));
        log::debug!("Page break → page {}", self.page_number());

        let mut y = super::draw_page_header(env, self, self.top_y);
        y = repeat(env, self, y);

        self.body_top = y;
        self.state = FlowState::Flowing;
        y
    }

    pub(crate) fn finish(mut self) -> (Vec<Page>, ImageCache) {
        self.done.push(self.current);
        (self.done, self.images)
    }
}

/// Repeat nothing but the page header.
pub(crate) fn no_repeat(_: &Env, _: &mut PageFlow, y: f32) -> f32 {
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LayoutConfig;

    fn env_parts() -> (LayoutConfig, Fonts, Value, Assets) {
        (LayoutConfig::default(), Fonts::builtin(), Value::Null, Assets::new())
    }

    #[test]
    fn row_touching_limit_does_not_break() {
        let (layout, fonts, payload, assets) = env_parts();
        let env = Env { layout: &layout, fonts: &fonts, payload: &payload, assets: &assets };
        let mut flow = PageFlow::new(800.0, 100.0);
        let y = flow.begin(&env);
        assert_eq!(y, 800.0);

        let y = 300.0;
        assert_eq!(flow.fit(&env, y, 200.0, &no_repeat), 300.0);
        assert_eq!(flow.page_number(), 1);

        let next = flow.fit(&env, y, 201.0, &no_repeat);
        assert_eq!(flow.page_number(), 2);
        assert_eq!(next, 800.0);
    }

    #[test]
    fn repeat_runs_once_per_break_without_recursing() {
        let (layout, fonts, payload, assets) = env_parts();
        let env = Env { layout: &layout, fonts: &fonts, payload: &payload, assets: &assets };
        let mut flow = PageFlow::new(800.0, 100.0);
        flow.begin(&env);

        let repeat: Repeat = &|env, flow, y| {
            assert_eq!(flow.state, FlowState::Paginating);
            // Asking for room while paginating never breaks again.
            let y = flow.fit(env, y, 10_000.0, &no_repeat);
            flow.canvas().page.stroke(0.0, y, 10.0, y);
            y - 20.0
        };
        let y = flow.fit(&env, 150.0, 100.0, repeat);
        assert_eq!(y, 780.0);
        assert_eq!(flow.state, FlowState::Flowing);
        assert!(flow.at_body_top(y));

        let (pages, _) = flow.finish();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].line_count(), 0);
        assert_eq!(pages[1].line_count(), 1);
    }

    #[test]
    fn oversized_unit_on_fresh_page_is_placed() {
        let (layout, fonts, payload, assets) = env_parts();
        let env = Env { layout: &layout, fonts: &fonts, payload: &payload, assets: &assets };
        let mut flow = PageFlow::new(800.0, 100.0);
        let y = flow.begin(&env);
        assert_eq!(flow.fit(&env, y, 5_000.0, &no_repeat), y);
        assert_eq!(flow.page_number(), 1);
    }

    #[test]
    fn missing_and_broken_images_are_skipped() {
        let mut assets = Assets::new();
        assets.insert("logo".into(), b"nope".to_vec());
        let mut cache = ImageCache::default();
        assert!(cache.get(&assets, "logo").is_none());
        assert!(cache.get(&assets, "absent").is_none());
        assert_eq!(cache.into_decoded().count(), 0);
    }
}
