//! Extraction of chart data from an HTML table.
//!
//! Each table column forms one data set. Header cells (`th` inside `thead`)
//! name the sets and may carry per-set styling:
//!
//! - `data-placeholder="true"` skips the cell (e.g. the corner above a
//!   row-header column),
//! - `data-color` overrides the set's colour,
//! - `data-style="dashed"` draws the set dashed.
//!
//! In body rows a `th` cell is a row header: its text becomes a category
//! label for the X axis instead of a value. Every other cell is read as a
//! number and belongs to the set at the same position, counting only value
//! cells.

use serde::{Deserialize, Serialize};

use crate::dom::Element;

/// Line style for a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DashStyle {
    #[default]
    Solid,
    Dashed,
}

/// One data set read from a table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub label: String,

    /// One value per body row; unreadable or missing cells are NaN.
    pub values: Vec<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    pub dash: DashStyle,
}

impl Series {
    fn new(label: String) -> Self {
        Self {
            label,
            values: Vec::new(),
            color: None,
            dash: DashStyle::Solid,
        }
    }
}

/// Everything a renderer needs from one table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    /// Data sets in header order (left to right).
    pub series: Vec<Series>,

    /// Row-header texts in row order. Empty means a numeric X axis.
    pub category_labels: Vec<String>,

    /// Series labels in header order, used as the stacking group.
    pub groups: Vec<String>,

    /// Number of body rows that contributed cells.
    pub row_count: usize,
}

impl TableData {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Series drawn dashed.
    pub fn dashed(&self) -> impl Iterator<Item = &Series> {
        self.series.iter().filter(|s| s.dash == DashStyle::Dashed)
    }
}

/// Reads the data sets, category labels and stacking group from a table.
///
/// Rows are taken in document order. A table with no usable rows yields an
/// empty [`TableData`]; short rows are padded with NaN so every series has
/// one value per body row.
pub fn parse_table(table: &Element) -> TableData {
    let mut data = TableData::default();
    // Header texts per position, joined when there are several header rows.
    let mut headers: Vec<Series> = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for (row, is_header) in rows(table) {
        if is_header {
            read_header_row(row, &mut headers);
        } else if read_body_row(row, &mut columns, &mut data.category_labels) {
            data.row_count += 1;
        }
    }

    let width = headers.len().max(columns.len());
    for position in 0..width {
        let mut series = headers
            .get(position)
            .cloned()
            .unwrap_or_else(|| Series::new(format!("data{}", position + 1)));
        let mut values = columns.get_mut(position).map(std::mem::take).unwrap_or_default();
        values.resize(data.row_count, f64::NAN);
        series.values = values;
        data.groups.push(series.label.clone());
        data.series.push(series);
    }

    tracing::debug!(
        series = data.series.len(),
        rows = data.row_count,
        categories = data.category_labels.len(),
        "parsed table"
    );
    data
}

/// All `tr` descendants paired with whether they sit in `thead`.
fn rows(table: &Element) -> Vec<(&Element, bool)> {
    let mut found = Vec::new();
    collect_rows(table, false, &mut found);
    found
}

fn collect_rows<'a>(el: &'a Element, in_head: bool, out: &mut Vec<(&'a Element, bool)>) {
    for child in el.child_elements() {
        if child.is("tr") {
            out.push((child, in_head));
        }
        collect_rows(child, child.is("thead"), out);
    }
}

fn cells(row: &Element) -> impl Iterator<Item = &Element> {
    row.child_elements().filter(|c| c.is("th") || c.is("td"))
}

fn read_header_row(row: &Element, headers: &mut Vec<Series>) {
    let labelled = cells(row).filter(|c| c.attr("data-placeholder") != Some("true"));
    for (position, cell) in labelled.enumerate() {
        let text = cell.text_content().trim().to_string();
        match headers.get_mut(position) {
            Some(series) => {
                if !text.is_empty() {
                    if !series.label.is_empty() {
                        series.label.push(' ');
                    }
                    series.label.push_str(&text);
                }
            }
            None => headers.push(Series::new(text)),
        }

        let series = &mut headers[position];
        if let Some(color) = cell.attr("data-color").map(str::trim).filter(|c| !c.is_empty()) {
            if !crate::settings::is_valid_color(color) {
                tracing::warn!(column = position, color, "unrecognised series colour");
            }
            series.color = Some(color.to_string());
        }
        if cell.attr("data-style") == Some("dashed") {
            series.dash = DashStyle::Dashed;
        }
    }
}

/// Returns true if the row contained any cell.
fn read_body_row(row: &Element, columns: &mut Vec<Vec<f64>>, labels: &mut Vec<String>) -> bool {
    let mut position = 0;
    let mut any = false;
    for cell in cells(row) {
        any = true;
        if cell.is("th") {
            labels.push(cell.text_content().trim().to_string());
            continue;
        }
        if columns.len() <= position {
            columns.resize_with(position + 1, Vec::new);
        }
        columns[position].push(parse_float(&cell.text_content()));
        position += 1;
    }
    any
}

/// Reads the longest leading decimal number, like JavaScript's `parseFloat`.
///
/// Leading whitespace is skipped, trailing garbage is ignored, and text with
/// no numeric prefix is NaN: `"12px"` is 12, `" -3.5e2kg"` is -350, `"n/a"`
/// is NaN.
pub fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(markup: &str) -> TableData {
        parse_table(&Element::parse(markup).unwrap())
    }

    const TWO_COLUMNS: &str = "<table>\
        <thead><tr><th>A</th><th>B</th></tr></thead>\
        <tbody><tr><td>1</td><td>4</td></tr><tr><td>2</td><td>5</td></tr><tr><td>3</td><td>6</td></tr></tbody>\
        </table>";

    #[test]
    fn columns_become_series() {
        let data = parse(TWO_COLUMNS);
        assert!(data.category_labels.is_empty());
        assert_eq!(data.row_count, 3);
        assert_eq!(data.series.len(), 2);
        assert_eq!(data.series[0].label, "A");
        assert_eq!(data.series[0].values, [1.0, 2.0, 3.0]);
        assert_eq!(data.series[1].label, "B");
        assert_eq!(data.series[1].values, [4.0, 5.0, 6.0]);
        assert_eq!(data.groups, ["A", "B"]);
    }

    #[test]
    fn row_headers_become_category_labels() {
        let data = parse(
            "<table>\
             <thead><tr><th data-placeholder=\"true\"></th><th>Sales</th><th>Costs</th></tr></thead>\
             <tbody>\
             <tr><th scope=\"row\">2019</th><td>10</td><td>7</td></tr>\
             <tr><th scope=\"row\">2020</th><td>12</td><td>8</td></tr>\
             </tbody></table>",
        );
        assert_eq!(data.category_labels, ["2019", "2020"]);
        assert_eq!(data.series.len(), 2);
        assert_eq!(data.series[0].label, "Sales");
        assert_eq!(data.series[0].values, [10.0, 12.0]);
        assert_eq!(data.series[1].values, [7.0, 8.0]);
    }

    #[test]
    fn entities_in_cells_are_decoded() {
        let data = parse(
            "<table><thead><tr><th data-placeholder=\"true\"></th><th>R&amp;D</th><th>Q&lt;1&gt;</th></tr></thead>\
             <tbody><tr><th>Jan&nbsp;2020</th><td>1</td><td>2</td></tr></tbody></table>",
        );
        assert_eq!(data.series[0].label, "R&D");
        assert_eq!(data.series[1].label, "Q<1>");
        assert_eq!(data.category_labels, ["Jan\u{a0}2020"]);
    }

    #[test]
    fn interleaved_row_header_does_not_shift_columns() {
        let data = parse(
            "<table><thead><tr><th>A</th><th>B</th></tr></thead>\
             <tbody><tr><td>1</td><th>mid</th><td>2</td></tr></tbody></table>",
        );
        assert_eq!(data.series[0].values, [1.0]);
        assert_eq!(data.series[1].values, [2.0]);
        assert_eq!(data.category_labels, ["mid"]);
    }

    #[test]
    fn header_styling_is_collected() {
        let data = parse(
            "<table><thead><tr>\
             <th data-color=\"#ff0000\">Actual</th><th data-style=\"dashed\">Forecast</th>\
             </tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>",
        );
        assert_eq!(data.series[0].color.as_deref(), Some("#ff0000"));
        assert_eq!(data.series[0].dash, DashStyle::Solid);
        assert_eq!(data.series[1].color, None);
        assert_eq!(data.series[1].dash, DashStyle::Dashed);
        let dashed: Vec<_> = data.dashed().map(|s| s.label.as_str()).collect();
        assert_eq!(dashed, ["Forecast"]);
    }

    #[test]
    fn malformed_cells_are_nan_and_short_rows_are_padded() {
        let data = parse(
            "<table><thead><tr><th>A</th><th>B</th></tr></thead>\
             <tbody><tr><td>n/a</td><td>2</td></tr><tr><td>3</td></tr></tbody></table>",
        );
        assert!(data.series[0].values[0].is_nan());
        assert_eq!(data.series[0].values[1], 3.0);
        assert_eq!(data.series[1].values[0], 2.0);
        assert!(data.series[1].values[1].is_nan());
    }

    #[test]
    fn multiple_header_rows_join_labels() {
        let data = parse(
            "<table><thead><tr><th>Revenue</th><th>Revenue</th></tr>\
             <tr><th>2019</th><th>2020</th></tr></thead>\
             <tbody><tr><td>1</td><td>2</td></tr></tbody></table>",
        );
        assert_eq!(data.series[0].label, "Revenue 2019");
        assert_eq!(data.series[1].label, "Revenue 2020");
    }

    #[test]
    fn columns_without_headers_get_generated_labels() {
        let data = parse("<table><tr><td>1</td><td>2</td></tr></table>");
        let labels: Vec<_> = data.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["data1", "data2"]);
    }

    #[test]
    fn empty_table_yields_empty_data() {
        let data = parse("<table><thead></thead><tbody></tbody></table>");
        assert!(data.is_empty());
        assert!(data.category_labels.is_empty());
        assert_eq!(data.row_count, 0);
    }

    #[test]
    fn parse_float_follows_javascript() {
        assert_eq!(parse_float("42"), 42.0);
        assert_eq!(parse_float("  3.5 "), 3.5);
        assert_eq!(parse_float("12px"), 12.0);
        assert_eq!(parse_float("-3.5e2kg"), -350.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("5."), 5.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float("1,000"), 1.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("").is_nan());
        assert!(parse_float("n/a").is_nan());
        assert!(parse_float("-").is_nan());
        assert!(parse_float(".").is_nan());
    }

    proptest! {
        #[test]
        fn series_count_excludes_placeholders(
            headers in 1usize..6,
            placeholders in 0usize..3,
            rows in 0usize..8,
        ) {
            let mut markup = String::from("<table><thead><tr>");
            for _ in 0..placeholders {
                markup.push_str("<th data-placeholder=\"true\"></th>");
            }
            for h in 0..headers {
                markup.push_str(&format!("<th>S{h}</th>"));
            }
            markup.push_str("</tr></thead><tbody>");
            for r in 0..rows {
                markup.push_str(&format!("<tr><th>R{r}</th>"));
                for h in 0..headers {
                    markup.push_str(&format!("<td>{}</td>", r * h));
                }
                markup.push_str("</tr>");
            }
            markup.push_str("</tbody></table>");

            let data = parse(&markup);
            prop_assert_eq!(data.series.len(), headers);
            prop_assert_eq!(data.category_labels.len(), rows);
            for series in &data.series {
                prop_assert_eq!(series.values.len(), rows);
            }
        }
    }
}
