//! Typed chart, export and page settings.
//!
//! Settings are plain serde types that round-trip through camelCase JSON so
//! a host page can hand them over as a profile:
//!
//! ```
//! use table_charts::{ChartSettings, ChartType, PageSettings};
//!
//! let page = PageSettings {
//!     table_chart_selectors: vec!["table.chart".into()],
//!     chart_defaults: ChartSettings {
//!         chart_type: ChartType::Bar,
//!         ..ChartSettings::default()
//!     },
//!     ..PageSettings::default()
//! };
//!
//! let json = page.to_json().unwrap();
//! let restored = PageSettings::from_json(&json).unwrap();
//! assert_eq!(restored.chart_defaults.chart_type, ChartType::Bar);
//! ```
//!
//! Per-table overrides come from `data-*` attributes on the table element,
//! read by [`ChartSettings::from_element`]. Every recognised option is
//! validated; a value that fails keeps the default and is reported as a
//! [`SettingError`].

use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::Element;

// ============================================================================
// Enumerations
// ============================================================================

/// The shape of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChartType {
    #[default]
    Line,
    Spline,
    Bar,
    /// Stacked bars.
    Stacked,
    Area,
    AreaSpline,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Spline => "spline",
            Self::Bar => "bar",
            Self::Stacked => "stacked",
            Self::Area => "area",
            Self::AreaSpline => "area-spline",
        }
    }
}

impl FromStr for ChartType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "spline" => Ok(Self::Spline),
            "bar" => Ok(Self::Bar),
            "stacked" => Ok(Self::Stacked),
            "area" => Ok(Self::Area),
            "area-spline" => Ok(Self::AreaSpline),
            _ => Err(()),
        }
    }
}

/// Which side of a chart/table pair is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Chart,
    Table,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::Table => "table",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Chart => Self::Table,
            Self::Table => Self::Chart,
        }
    }
}

impl FromStr for View {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chart" => Ok(Self::Chart),
            "table" => Ok(Self::Table),
            _ => Err(()),
        }
    }
}

/// Gridlines to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Grid {
    #[default]
    None,
    X,
    Y,
    Xy,
}

impl FromStr for Grid {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "xy" | "yx" => Ok(Self::Xy),
            _ => Err(()),
        }
    }
}

/// The file format produced by an export trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Svg,
    Png,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
        }
    }

    /// The browser menu wording for saving this kind of file.
    pub fn save_type(&self) -> &'static str {
        match self {
            Self::Svg => "Page",
            Self::Png => "Image",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            _ => Err(()),
        }
    }
}

// ============================================================================
// ChartSettings
// ============================================================================

/// Tick shaping for one axis. Unset fields leave the renderer default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TickOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    /// Maximum number of tick labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cull_max: Option<u32>,
}

/// Chart-level configuration for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartSettings {
    #[serde(rename = "type")]
    pub chart_type: ChartType,

    /// Name of the renderer strategy that draws the chart.
    #[serde(rename = "chart")]
    pub renderer: String,

    /// Swap the X and Y axes.
    pub rotated: bool,

    /// Show a label at each data point.
    pub labels: bool,

    pub default_view: View,
    pub grid: Grid,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,

    pub x_tick: TickOptions,
    pub y_tick: TickOptions,

    /// Decimal places kept in Y axis tick labels.
    pub y_round: u32,

    /// Bar thickness as a ratio of the category width, in (0, 1].
    pub bar_width: f64,

    pub palette: Vec<String>,
    pub stacked: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_height: Option<u32>,

    /// Toggle button caption; `{view}` is replaced by the target view.
    pub toggle_text: String,

    /// Prefix for generated class names and ids.
    pub component: String,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            chart_type: ChartType::Line,
            renderer: "c3js".into(),
            rotated: false,
            labels: false,
            default_view: View::Chart,
            grid: Grid::None,
            x_label: None,
            y_label: None,
            x_tick: TickOptions::default(),
            y_tick: TickOptions::default(),
            y_round: 4,
            bar_width: 0.5,
            palette: Vec::new(),
            stacked: false,
            export_width: None,
            export_height: None,
            toggle_text: "Show {view}".into(),
            component: "table-chart".into(),
        }
    }
}

/// Largest accepted `yRound`; beyond this `f64` has no digits left to keep.
const MAX_Y_ROUND: u32 = 15;

impl ChartSettings {
    /// Reads settings from `data-*` attributes on a table, starting from defaults.
    pub fn from_element(table: &Element) -> ParsedSettings {
        Self::default().with_element(table)
    }

    /// Applies `data-*` attribute overrides on top of `self`.
    ///
    /// Empty attribute values are ignored. Values that fail validation keep
    /// the current setting and are reported in [`ParsedSettings::issues`].
    pub fn with_element(mut self, table: &Element) -> ParsedSettings {
        let mut issues = Vec::new();
        let read = |option: &'static str| data_attr(table, option).map(|v| (option, v));

        if let Some((opt, v)) = read("type") {
            match v.parse() {
                Ok(t) => self.chart_type = t,
                Err(()) => issues.push(SettingError::invalid(opt, v, "a chart type")),
            }
        }
        if let Some((_, v)) = read("chart") {
            self.renderer = v.to_string();
        }
        if let Some((opt, v)) = read("rotated") {
            apply(&mut self.rotated, parse_bool(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("labels") {
            apply(&mut self.labels, parse_bool(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("defaultView") {
            match v.parse() {
                Ok(view) => self.default_view = view,
                Err(()) => issues.push(SettingError::invalid(opt, v, "`chart` or `table`")),
            }
        }
        if let Some((opt, v)) = read("grid") {
            match v.parse() {
                Ok(grid) => self.grid = grid,
                Err(()) => issues.push(SettingError::invalid(opt, v, "`none`, `x`, `y` or `xy`")),
            }
        }
        if let Some((_, v)) = read("xLabel") {
            self.x_label = Some(v.to_string());
        }
        if let Some((_, v)) = read("yLabel") {
            self.y_label = Some(v.to_string());
        }
        if let Some((opt, v)) = read("xTickRotate") {
            match v.parse::<i32>() {
                Ok(0) => self.x_tick.rotate = None,
                Ok(deg) => self.x_tick.rotate = Some(deg),
                Err(_) => issues.push(SettingError::invalid(opt, v, "an integer angle")),
            }
        }
        if let Some((opt, v)) = read("xTickCount") {
            apply(&mut self.x_tick.count, parse_optional_count(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("yTickCount") {
            apply(&mut self.y_tick.count, parse_optional_count(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("xTickCull") {
            apply(&mut self.x_tick.cull_max, parse_optional_count(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("yTickCull") {
            apply(&mut self.y_tick.cull_max, parse_optional_count(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("stacked") {
            apply(&mut self.stacked, parse_bool(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("exportWidth") {
            apply(&mut self.export_width, parse_size(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("exportHeight") {
            apply(&mut self.export_height, parse_size(opt, v), &mut issues);
        }
        if let Some((opt, v)) = read("barWidth") {
            match v.parse::<f64>() {
                Ok(ratio) if ratio > 0.0 && ratio <= 1.0 => self.bar_width = ratio,
                Ok(_) => issues.push(SettingError::out_of_range(opt, v, "0 < barWidth <= 1")),
                Err(_) => issues.push(SettingError::invalid(opt, v, "a number")),
            }
        }
        if let Some((opt, v)) = read("yRound") {
            match v.parse::<u32>() {
                Ok(places) if places <= MAX_Y_ROUND => self.y_round = places,
                Ok(_) => issues.push(SettingError::out_of_range(opt, v, "0..=15")),
                Err(_) => issues.push(SettingError::invalid(opt, v, "a whole number")),
            }
        }
        if let Some((opt, v)) = read("palette") {
            self.palette = split_palette(v);
            for color in &self.palette {
                if !is_valid_color(color) {
                    issues.push(SettingError::InvalidColor {
                        option: opt.to_string(),
                        value: color.clone(),
                    });
                }
            }
        }

        for issue in &issues {
            tracing::warn!(%issue, "ignoring invalid chart option");
        }

        ParsedSettings {
            settings: self,
            issues,
        }
    }
}

/// The result of reading settings from a table element.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSettings {
    pub settings: ChartSettings,
    pub issues: Vec<SettingError>,
}

impl ParsedSettings {
    /// Rejects the settings if any option failed validation.
    pub fn strict(self) -> Result<ChartSettings, Vec<SettingError>> {
        if self.issues.is_empty() {
            Ok(self.settings)
        } else {
            Err(self.issues)
        }
    }
}

/// A chart option whose value could not be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingError {
    #[error("option `{option}` expects {expected}, got {value:?}")]
    InvalidValue {
        option: String,
        value: String,
        expected: &'static str,
    },

    #[error("option `{option}` value {value:?} is out of range ({range})")]
    OutOfRange {
        option: String,
        value: String,
        range: &'static str,
    },

    #[error("{value:?} in `{option}` is not a recognised colour")]
    InvalidColor { option: String, value: String },
}

impl SettingError {
    fn invalid(option: &str, value: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            option: option.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    fn out_of_range(option: &str, value: &str, range: &'static str) -> Self {
        Self::OutOfRange {
            option: option.to_string(),
            value: value.to_string(),
            range,
        }
    }
}

fn apply<T>(slot: &mut T, parsed: Result<T, SettingError>, issues: &mut Vec<SettingError>) {
    match parsed {
        Ok(value) => *slot = value,
        Err(issue) => issues.push(issue),
    }
}

fn parse_bool(option: &str, value: &str) -> Result<bool, SettingError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(SettingError::invalid(option, value, "`true` or `false`")),
    }
}

/// Counts of zero mean "renderer default".
fn parse_optional_count(option: &str, value: &str) -> Result<Option<u32>, SettingError> {
    match value.parse::<u32>() {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(SettingError::invalid(option, value, "a whole number")),
    }
}

fn parse_size(option: &str, value: &str) -> Result<Option<u32>, SettingError> {
    match value.parse::<u32>() {
        Ok(0) => Err(SettingError::out_of_range(option, value, "at least 1 pixel")),
        Ok(px) => Ok(Some(px)),
        Err(_) => Err(SettingError::invalid(option, value, "a size in pixels")),
    }
}

/// Finds a `data-*` attribute for `option`, ignoring case and dashes, so
/// `data-xLabel`, `data-xlabel` and `data-x-label` all name `xLabel`.
/// Empty values count as absent.
pub(crate) fn data_attr<'a>(el: &'a Element, option: &str) -> Option<&'a str> {
    let wanted = option.to_ascii_lowercase();
    el.attrs
        .iter()
        .find(|(key, _)| {
            key.get(..5).is_some_and(|prefix| prefix.eq_ignore_ascii_case("data-"))
                && key.len() > 5
                && key[5..].replace('-', "").to_ascii_lowercase() == wanted
        })
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Splits a comma-separated colour list, trimming every entry.
pub fn split_palette(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts hex colours, CSS colour names and CSS colour functions.
pub fn is_valid_color(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    if ["rgb(", "rgba(", "hsl(", "hsla("]
        .iter()
        .any(|f| lower.starts_with(f) && lower.ends_with(')'))
    {
        return true;
    }
    (lower.starts_with('#') && lower.parse::<Srgb<u8>>().is_ok())
        || palette::named::from_str(&lower).is_some()
}

// ============================================================================
// ExportSettings
// ============================================================================

/// Options for one export trigger. All fields have defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportSettings {
    pub format: ExportFormat,

    /// File name without extension.
    pub filename: String,

    /// Raster width; the height follows the aspect ratio when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Inject [`compat_styles`](Self::compat_styles) into the graphic's `defs`.
    pub include_compat_styles: bool,
    pub compat_styles: String,

    /// Shown when the trigger is clicked but export is not possible.
    pub error_msg: String,

    /// Shown before saving on hosts without programmatic downloads.
    /// `{saveType}` and `{filename}` are substituted.
    pub manual_download_message: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Svg,
            filename: "chart".into(),
            width: None,
            height: None,
            include_compat_styles: true,
            compat_styles: "svg{font:10px sans-serif}line,path{fill:none;stroke:#000}".into(),
            error_msg: "Sorry, your browser does not support this function.".into(),
            manual_download_message: "Your browser requires manual saving of this file, when \
                redirected to the image, right click and \"Save {saveType} As...\" to save it to \
                your computer with the filename \"{filename}\""
                .into(),
        }
    }
}

impl ExportSettings {
    /// Settings for `format` with everything else defaulted.
    pub fn for_format(format: ExportFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// The file name including extension.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.filename, self.format.extension())
    }
}

// ============================================================================
// PageSettings
// ============================================================================

/// Page-wide settings: which tables become charts and their shared defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSettings {
    /// Selectors for the tables to chart.
    pub table_chart_selectors: Vec<String>,

    /// Settings every table starts from before its own attributes apply.
    pub chart_defaults: ChartSettings,

    /// Add "Download as" buttons next to each chart.
    pub export_buttons: bool,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            table_chart_selectors: Vec::new(),
            chart_defaults: ChartSettings::default(),
            export_buttons: true,
        }
    }
}

macro_rules! json_profile {
    ($($ty:ty),+) => {$(
        impl $ty {
            /// Serializes to a JSON string.
            pub fn to_json(&self) -> Result<String, serde_json::Error> {
                serde_json::to_string(self)
            }

            /// Serializes to a pretty-printed JSON string.
            pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
                serde_json::to_string_pretty(self)
            }

            /// Deserializes from a JSON string; missing fields take defaults.
            pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
                serde_json::from_str(json)
            }
        }
    )+};
}

json_profile!(ChartSettings, ExportSettings, PageSettings);

// ============================================================================
// Tests
// ============================================================================
