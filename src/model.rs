use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Auto {
    Auto,
}

/// A width or height: a fixed number of points, or `"auto"`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Dimension {
    Points(f32),
    Auto(Auto),
}

impl Default for Dimension {
    fn default() -> Self {
        Dimension::Auto(Auto::Auto)
    }
}

impl Dimension {
    pub fn points(self) -> Option<f32> {
        match self {
            Dimension::Points(p) => Some(p),
            Dimension::Auto(_) => None,
        }
    }

    /// Minimum height contributed by a row setting; `auto` has no minimum.
    pub fn min_or_zero(self) -> f32 {
        self.points().unwrap_or(0.0)
    }
}

fn yes() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Borders {
    #[serde(default = "yes")]
    pub top: bool,
    #[serde(default = "yes")]
    pub bottom: bool,
    #[serde(default = "yes")]
    pub left: bool,
    #[serde(default = "yes")]
    pub right: bool,
}

impl Default for Borders {
    fn default() -> Self {
        Self::all()
    }
}

impl Borders {
    pub const fn all() -> Self {
        Self {
            top: true,
            bottom: true,
            left: true,
            right: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            top: false,
            bottom: false,
            left: false,
            right: false,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CellConfig {
    /// Only used where a row lays out its own sub-columns (header/footer
    /// regions, signature blocks). Table body cells take the column width.
    #[serde(default)]
    pub width: Dimension,
    /// Literal text, or text containing `{{path}}` placeholders.
    #[serde(default)]
    pub text: Option<String>,
    /// Template path resolved against the current scope.
    #[serde(default)]
    pub source: Option<String>,
    /// Asset key (literal or placeholder) of an image to draw instead of text.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub align: Option<Alignment>,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub borders: Borders,
}

impl CellConfig {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn source(path: impl Into<String>) -> Self {
        Self {
            source: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn font_style(&self) -> FontStyle {
        if self.bold {
            FontStyle::Bold
        } else {
            FontStyle::Regular
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RowConfig {
    #[serde(default)]
    pub height: Dimension,
    #[serde(default)]
    pub cells: Vec<CellConfig>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ColumnConfig {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub width: Dimension,
    #[serde(default)]
    pub align: Alignment,
    #[serde(default)]
    pub font_size: Option<f32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FixedTable {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub rows: Vec<RowConfig>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DynamicTable {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub columns: Vec<ColumnConfig>,
    /// Template row repeated once per entry of the `data_source` array.
    pub row: RowConfig,
    pub data_source: String,
}

/// A row inside a signature block. With `data_source` set it fans out into
/// one physical row per participant, sharing a merged first cell.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BlockRow {
    #[serde(default)]
    pub height: Dimension,
    #[serde(default)]
    pub cells: Vec<CellConfig>,
    #[serde(default)]
    pub data_source: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignatureBlock {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Offsets relative to the table's top-left anchor.
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub width: Dimension,
    #[serde(default)]
    pub rows: Vec<BlockRow>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignatureGroup {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub blocks: Vec<SignatureBlock>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableConfig {
    Fixed(FixedTable),
    Dynamic(DynamicTable),
    SignatureGroup(SignatureGroup),
}

impl TableConfig {
    pub fn id(&self) -> &str {
        match self {
            TableConfig::Fixed(t) => &t.id,
            TableConfig::Dynamic(t) => &t.id,
            TableConfig::SignatureGroup(t) => &t.id,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            TableConfig::Fixed(t) => t.title.as_deref(),
            TableConfig::Dynamic(t) => t.title.as_deref(),
            TableConfig::SignatureGroup(t) => t.title.as_deref(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 40.0,
            bottom: 40.0,
            left: 40.0,
            right: 40.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct PageConfig {
    #[serde(default = "PageConfig::a4_width")]
    pub width: f32,
    #[serde(default = "PageConfig::a4_height")]
    pub height: f32,
    #[serde(default)]
    pub margins: Margins,
}

impl PageConfig {
    fn a4_width() -> f32 {
        595.28
    }

    fn a4_height() -> f32 {
        841.89
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margins.left - self.margins.right
    }

    /// Cursor position at the top of every page.
    pub fn top_y(&self) -> f32 {
        self.height - self.margins.top
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            width: Self::a4_width(),
            height: Self::a4_height(),
            margins: Margins::default(),
        }
    }
}

/// References (file names or paths) of TrueType/OpenType faces. The caller
/// supplies the bytes for each reference; when both are absent the built-in
/// Helvetica faces are used.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FontRefs {
    #[serde(default)]
    pub regular: Option<String>,
    #[serde(default)]
    pub bold: Option<String>,
}

impl FontRefs {
    pub fn references(&self) -> impl Iterator<Item = &str> {
        [self.regular.as_deref(), self.bold.as_deref()]
            .into_iter()
            .flatten()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TextConfig {
    pub font_size: f32,
    pub title_font_size: f32,
    pub line_spacing: f32,
    /// Horizontal gap between a cell border and its text, per side.
    pub margin: f32,
    /// Total vertical padding added to wrapped text height.
    pub padding: f32,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font_size: 9.0,
            title_font_size: 10.0,
            line_spacing: 1.2,
            margin: 4.0,
            padding: 6.0,
        }
    }
}

/// Recurring page region (header at the top, footer at the bottom).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RegionConfig {
    #[serde(default)]
    pub rows: Vec<RowConfig>,
    /// Gap between the region and the page body.
    #[serde(default)]
    pub spacing: f32,
}

fn default_table_spacing() -> f32 {
    12.0
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub fonts: FontRefs,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub header: Option<RegionConfig>,
    #[serde(default)]
    pub footer: Option<RegionConfig>,
    #[serde(default = "default_table_spacing")]
    pub table_spacing: f32,
    /// Table ids in rendering order; empty means table-set order.
    #[serde(default)]
    pub table_order: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page: PageConfig::default(),
            fonts: FontRefs::default(),
            text: TextConfig::default(),
            header: None,
            footer: None,
            table_spacing: default_table_spacing(),
            table_order: Vec::new(),
        }
    }
}

/// Pre-computed trusted-timestamp data printed in footers.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Stamp {
    pub hash: String,
    pub timestamp: String,
    pub serial: String,
}
