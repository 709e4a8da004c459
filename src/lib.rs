//! table-charts: chart data from HTML tables, and chart export to SVG/PNG
//!
//! The crate reads the `data-*` options and cells of an HTML table into
//! typed chart settings and series, builds the options document a charting
//! library draws from, and exports a rendered chart graphic to a standalone
//! SVG or a PNG file.
//!
//! # Example
//!
//! ```
//! use table_charts::dom::Element;
//! use table_charts::{parse_table, ChartSettings};
//!
//! let table = Element::parse(
//!     "<table data-type=\"bar\"><thead><tr><th>A</th><th>B</th></tr></thead>\
//!      <tbody><tr><td>1</td><td>4</td></tr><tr><td>2</td><td>5</td></tr></tbody></table>",
//! )
//! .unwrap();
//!
//! let settings = ChartSettings::from_element(&table).strict().unwrap();
//! let data = parse_table(&table);
//! assert_eq!(data.series.len(), 2);
//! assert_eq!(data.series[1].values, [4.0, 5.0]);
//! assert_eq!(settings.chart_type.as_str(), "bar");
//! ```
//!
//! # Pages
//!
//! [`PageController`] applies all of this to a whole page: every selected
//! table gets a chart container, a chart/table toggle and download buttons.
//!
//! ```
//! use table_charts::dom::Document;
//! use table_charts::export::MemoryHost;
//! use table_charts::{PageController, PageSettings};
//!
//! let mut page = Document::parse(
//!     "<body><table class=\"chart\"><tr><th>A</th></tr><tr><td>1</td></tr></table></body>",
//! )
//! .unwrap();
//! let mut controller = PageController::new(PageSettings {
//!     table_chart_selectors: vec!["table.chart".into()],
//!     ..PageSettings::default()
//! });
//!
//! let ids = controller.attach(&mut page, &MemoryHost::new()).unwrap();
//! assert_eq!(ids, [1]);
//! assert!(page.to_markup().contains("id=\"table-chart-1\""));
//! ```

pub mod dom;
pub mod error;
pub mod export;
pub mod page;
pub mod renderer;
pub mod settings;
pub mod table;
pub mod telemetry;
pub mod view;

pub use error::{Error, ExportError, Result};
pub use export::{ChartExporter, DirectoryHost, DownloadFile, HostEnvironment, MemoryHost, UserAgent};
pub use page::{ChartInstance, ChartRegistry, PageController};
pub use renderer::{format_y_tick, C3Renderer, ChartHandle, ChartRenderer, RenderOutcome, RendererRegistry};
pub use settings::{
    ChartSettings, ChartType, ExportFormat, ExportSettings, Grid, PageSettings, ParsedSettings,
    SettingError, TickOptions, View,
};
pub use table::{parse_table, DashStyle, Series, TableData};
pub use telemetry::init_default_tracing;
pub use view::ViewToggle;
