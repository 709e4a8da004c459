//! The C3.js renderer: builds the options document passed to `c3.generate`.

use serde_json::{json, Map, Value};

use super::{ChartHandle, ChartRenderer, RenderRequest};
use crate::error::Result;
use crate::settings::{ChartType, Grid, TickOptions};

/// Id of the column carrying category labels.
const CATEGORY_COLUMN: &str = "x";

/// Rounding rule named in the Y tick format, matching [`format_y_tick`].
const Y_TICK_ROUNDING: &str = "halfAwayFromZero";

/// Builds C3.js options documents. Registered as `c3js`.
#[derive(Debug, Clone, Copy, Default)]
pub struct C3Renderer;

impl ChartRenderer for C3Renderer {
    fn name(&self) -> &str {
        "c3js"
    }

    fn render(&self, request: &RenderRequest<'_>) -> Result<ChartHandle> {
        Ok(ChartHandle {
            renderer: self.name().to_string(),
            container_id: request.container_id.to_string(),
            options: build_options(request),
        })
    }
}

/// Builds the options document for one chart.
///
/// Only settings that are set appear in the document; anything absent is
/// left to the library's defaults. NaN values become `null`.
///
/// A Y rounding setting becomes a tick format descriptor naming the decimal
/// places and the rounding rule, half away from zero as in [`format_y_tick`].
pub fn build_options(request: &RenderRequest<'_>) -> Value {
    let settings = request.settings;
    let table = request.data;
    let has_categories = !table.category_labels.is_empty();
    let stacked = settings.stacked || settings.chart_type == ChartType::Stacked;

    let mut columns = Vec::with_capacity(table.series.len() + 1);
    if has_categories {
        let mut labels = vec![Value::from(CATEGORY_COLUMN)];
        labels.extend(table.category_labels.iter().map(|l| Value::from(l.as_str())));
        columns.push(Value::Array(labels));
    }
    for series in &table.series {
        let mut column = vec![Value::from(series.label.as_str())];
        column.extend(series.values.iter().map(|&v| Value::from(v)));
        columns.push(Value::Array(column));
    }

    let mut data = Map::new();
    data.insert("type".into(), json!(c3_type(settings.chart_type)));
    if has_categories {
        data.insert("x".into(), json!(CATEGORY_COLUMN));
    }
    data.insert("columns".into(), Value::Array(columns));
    if stacked {
        data.insert("groups".into(), json!([table.groups]));
    }

    let regions: Map<String, Value> = table
        .dashed()
        .map(|s| (s.label.clone(), json!([{ "style": "dashed" }])))
        .collect();
    if !regions.is_empty() {
        data.insert("regions".into(), Value::Object(regions));
    }

    let colors: Map<String, Value> = table
        .series
        .iter()
        .filter_map(|s| Some((s.label.clone(), json!(s.color.as_deref()?))))
        .collect();
    if !colors.is_empty() {
        data.insert("colors".into(), Value::Object(colors));
    }
    data.insert("labels".into(), json!(settings.labels));

    let mut x_axis = axis_options(settings.x_label.as_deref(), &settings.x_tick);
    if has_categories {
        x_axis.insert("type".into(), json!("category"));
    }
    let mut y_axis = axis_options(settings.y_label.as_deref(), &settings.y_tick);
    if let Some(tick) = y_axis.get_mut("tick").and_then(Value::as_object_mut) {
        tick.insert("format".into(), json!({ "decimalPlaces": settings.y_round, "rounding": Y_TICK_ROUNDING }));
    }

    let mut options = Map::new();
    options.insert("bindto".into(), json!(format!("#{}", request.container_id)));
    options.insert("data".into(), Value::Object(data));
    options.insert(
        "axis".into(),
        json!({
            "rotated": settings.rotated,
            "x": x_axis,
            "y": y_axis,
        }),
    );
    options.insert("color".into(), json!({ "pattern": settings.palette }));

    let grid = match settings.grid {
        Grid::None => None,
        Grid::X => Some(json!({ "x": { "show": true } })),
        Grid::Y => Some(json!({ "y": { "show": true } })),
        Grid::Xy => Some(json!({ "x": { "show": true }, "y": { "show": true } })),
    };
    if let Some(grid) = grid {
        options.insert("grid".into(), grid);
    }

    if settings.chart_type == ChartType::Bar {
        options.insert("bar".into(), json!({ "width": { "ratio": settings.bar_width } }));
    }

    Value::Object(options)
}

/// The C3 chart type name. Stacked charts are bars with a stacking group.
fn c3_type(chart_type: ChartType) -> &'static str {
    match chart_type {
        ChartType::Stacked => "bar",
        other => other.as_str(),
    }
}

fn axis_options(label: Option<&str>, tick: &TickOptions) -> Map<String, Value> {
    let mut tick_options = Map::new();
    if let Some(rotate) = tick.rotate {
        tick_options.insert("rotate".into(), json!(rotate));
    }
    if let Some(count) = tick.count {
        tick_options.insert("count".into(), json!(count));
    }
    if let Some(max) = tick.cull_max {
        tick_options.insert("culling".into(), json!({ "max": max }));
    }

    let mut axis = Map::new();
    if let Some(label) = label {
        axis.insert("label".into(), json!(label));
    }
    axis.insert("tick".into(), Value::Object(tick_options));
    axis
}

/// Rounds a Y tick value to `places` decimals, half away from zero.
///
/// `format_y_tick(3.14159, 2)` is `3.14`; `format_y_tick(-0.005, 2)` is
/// `-0.01`, since `-0.005 * 100` is exactly `-0.5` in binary floating point.
/// Values whose scaled form is not finite are returned unchanged.
pub fn format_y_tick(value: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / scale
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ChartSettings;
    use crate::table::{DashStyle, Series, TableData};

    fn series(label: &str, values: &[f64]) -> Series {
        Series {
            label: label.into(),
            values: values.to_vec(),
            color: None,
            dash: DashStyle::Solid,
        }
    }

    fn two_series() -> TableData {
        TableData {
            series: vec![series("A", &[1.0, 2.0, 3.0]), series("B", &[4.0, 5.0, 6.0])],
            category_labels: Vec::new(),
            groups: vec!["A".into(), "B".into()],
            row_count: 3,
        }
    }

    fn options(settings: &ChartSettings, data: &TableData) -> Value {
        build_options(&RenderRequest {
            container_id: "table-chart-1",
            settings,
            data,
        })
    }

    #[test]
    fn basic_line_chart() {
        let opts = options(&ChartSettings::default(), &two_series());
        assert_eq!(opts["bindto"], "#table-chart-1");
        assert_eq!(opts["data"]["type"], "line");
        assert_eq!(opts["data"]["columns"], json!([["A", 1.0, 2.0, 3.0], ["B", 4.0, 5.0, 6.0]]));
        assert_eq!(opts["data"]["labels"], false);
        assert!(opts["data"].get("x").is_none());
        assert!(opts["data"].get("groups").is_none());
        assert!(opts.get("grid").is_none());
        assert!(opts.get("bar").is_none());
        assert_eq!(opts["axis"]["rotated"], false);
        assert_eq!(opts["axis"]["x"], json!({ "tick": {} }));
        assert_eq!(opts["axis"]["y"]["tick"]["format"], json!({ "decimalPlaces": 4, "rounding": "halfAwayFromZero" }));
        assert_eq!(opts["color"]["pattern"], json!([]));
    }

    #[test]
    fn category_labels_switch_to_category_axis() {
        let mut data = two_series();
        data.category_labels = vec!["Jan".into(), "Feb".into(), "Mar".into()];
        let opts = options(&ChartSettings::default(), &data);
        assert_eq!(opts["data"]["x"], "x");
        assert_eq!(opts["data"]["columns"][0], json!(["x", "Jan", "Feb", "Mar"]));
        assert_eq!(opts["data"]["columns"][1][0], "A");
        assert_eq!(opts["axis"]["x"]["type"], "category");
    }

    #[test]
    fn nan_values_become_null() {
        let data = TableData {
            series: vec![series("A", &[1.0, f64::NAN])],
            row_count: 2,
            ..TableData::default()
        };
        let opts = options(&ChartSettings::default(), &data);
        assert_eq!(opts["data"]["columns"], json!([["A", 1.0, null]]));
    }

    #[test]
    fn axis_settings_only_when_set() {
        let settings = ChartSettings {
            rotated: true,
            x_label: Some("Year".into()),
            x_tick: TickOptions {
                rotate: Some(45),
                count: None,
                cull_max: Some(5),
            },
            y_tick: TickOptions {
                rotate: None,
                count: Some(4),
                cull_max: None,
            },
            y_round: 2,
            ..ChartSettings::default()
        };
        let opts = options(&settings, &two_series());
        assert_eq!(opts["axis"]["rotated"], true);
        assert_eq!(opts["axis"]["x"]["label"], "Year");
        assert_eq!(opts["axis"]["x"]["tick"], json!({ "rotate": 45, "culling": { "max": 5 } }));
        assert!(opts["axis"]["y"].get("label").is_none());
        assert_eq!(
            opts["axis"]["y"]["tick"],
            json!({ "count": 4, "format": { "decimalPlaces": 2, "rounding": "halfAwayFromZero" } })
        );
    }

    #[test]
    fn stacked_bars_group_series_in_header_order() {
        let settings = ChartSettings {
            chart_type: ChartType::Stacked,
            ..ChartSettings::default()
        };
        let opts = options(&settings, &two_series());
        assert_eq!(opts["data"]["type"], "bar");
        assert_eq!(opts["data"]["groups"], json!([["A", "B"]]));
        assert!(opts.get("bar").is_none());

        let settings = ChartSettings {
            chart_type: ChartType::Area,
            stacked: true,
            ..ChartSettings::default()
        };
        let opts = options(&settings, &two_series());
        assert_eq!(opts["data"]["type"], "area");
        assert_eq!(opts["data"]["groups"], json!([["A", "B"]]));
    }

    #[test]
    fn bar_width_only_for_bars() {
        let settings = ChartSettings {
            chart_type: ChartType::Bar,
            bar_width: 0.8,
            ..ChartSettings::default()
        };
        let opts = options(&settings, &two_series());
        assert_eq!(opts["bar"], json!({ "width": { "ratio": 0.8 } }));
    }

    #[test]
    fn grid_variants() {
        for (grid, expected) in [
            (Grid::X, json!({ "x": { "show": true } })),
            (Grid::Y, json!({ "y": { "show": true } })),
            (Grid::Xy, json!({ "x": { "show": true }, "y": { "show": true } })),
        ] {
            let settings = ChartSettings {
                grid,
                ..ChartSettings::default()
            };
            assert_eq!(options(&settings, &two_series())["grid"], expected);
        }
    }

    #[test]
    fn dashed_regions_and_colours_keyed_by_label() {
        let mut data = two_series();
        data.series[0].color = Some("#ff0000".into());
        data.series[1].dash = DashStyle::Dashed;
        let settings = ChartSettings {
            palette: vec!["#111111".into(), "#222222".into()],
            ..ChartSettings::default()
        };
        let opts = options(&settings, &data);
        assert_eq!(opts["data"]["regions"], json!({ "B": [{ "style": "dashed" }] }));
        assert_eq!(opts["data"]["colors"], json!({ "A": "#ff0000" }));
        assert_eq!(opts["color"]["pattern"], json!(["#111111", "#222222"]));
    }

    #[test]
    fn y_tick_rounding_half_away_from_zero() {
        assert_eq!(format_y_tick(3.14159, 2), 3.14);
        assert_eq!(format_y_tick(-0.005, 2), -0.01);
        assert_eq!(format_y_tick(0.125, 2), 0.13);
        assert_eq!(format_y_tick(2.5, 0), 3.0);
        assert_eq!(format_y_tick(-2.5, 0), -3.0);
        assert_eq!(format_y_tick(1234.5678, 4), 1234.5678);
        assert_eq!(format_y_tick(f64::MAX, 2), f64::MAX);
        assert!(format_y_tick(f64::NAN, 2).is_nan());
    }

    #[test]
    fn renderer_wraps_options_in_handle() {
        let settings = ChartSettings::default();
        let data = two_series();
        let handle = C3Renderer
            .render(&RenderRequest {
                container_id: "table-chart-7",
                settings: &settings,
                data: &data,
            })
            .unwrap();
        assert_eq!(handle.renderer, "c3js");
        assert_eq!(handle.container_id, "table-chart-7");
        assert_eq!(handle.options["bindto"], "#table-chart-7");
    }
}
