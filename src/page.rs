//! Attaching charts to the tables of a page.
//!
//! [`PageController::attach`] finds the tables selected by
//! [`PageSettings::table_chart_selectors`], reads each table's settings and
//! data, renders it and rewrites the page around it:
//!
//! ```text
//! <div class="table-chart--table-wrapper"> <table class="table-chart--table …"> </div>
//! <div id="table-chart-1" class="table-chart--chart"> <script type="application/json" …> </div>
//! <button class="table-chart--toggle">Show table</button>
//! <button class="table-chart--download">Download as png</button>
//! <button class="table-chart--download">Download as svg</button>
//! ```
//!
//! Every chart is recorded in the controller's [`ChartRegistry`].

use crate::dom::{Document, Element, Node, Selector};
use crate::error::Result;
use crate::export::{ChartExporter, HostEnvironment};
use crate::renderer::{RenderOutcome, RenderRequest, RendererRegistry};
use crate::settings::{ChartSettings, ExportFormat, ExportSettings, PageSettings, SettingError, View};
use crate::table::{parse_table, TableData};
use crate::view::ViewToggle;

/// Class marking tables that already carry a chart.
pub const PROCESSED_MARKER: &str = "table-charts-processed";

/// Attribute linking the generated wrapper and toggle to their chart id.
const CHART_ID_ATTR: &str = "data-chart-id";

// ============================================================================
// ChartInstance / ChartRegistry
// ============================================================================

/// One table turned into a chart.
#[derive(Debug, Clone)]
pub struct ChartInstance {
    pub id: u32,
    /// The `id` of the chart container element.
    pub container_id: String,
    pub settings: ChartSettings,
    pub table: TableData,
    pub view: ViewToggle,
    pub outcome: RenderOutcome,
    /// PNG then SVG, when download buttons are enabled.
    pub exporters: Vec<ChartExporter>,
    /// Options on the table that could not be applied.
    pub issues: Vec<SettingError>,
}

/// The charts of a page in creation order.
///
/// Entries are only ever appended; ids count up from 1 and are never
/// reused.
#[derive(Debug, Clone, Default)]
pub struct ChartRegistry {
    instances: Vec<ChartInstance>,
}

impl ChartRegistry {
    /// The id the next pushed instance will get.
    pub fn next_id(&self) -> u32 {
        self.instances.len() as u32 + 1
    }

    fn push(&mut self, instance: ChartInstance) {
        debug_assert_eq!(instance.id, self.next_id());
        self.instances.push(instance);
    }

    pub fn get(&self, id: u32) -> Option<&ChartInstance> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.instances.get(index)
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut ChartInstance> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.instances.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChartInstance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

// ============================================================================
// PageController
// ============================================================================

/// Turns the selected tables of pages into charts.
pub struct PageController {
    settings: PageSettings,
    renderers: RendererRegistry,
    charts: ChartRegistry,
}

impl PageController {
    /// A controller with the built-in renderers.
    pub fn new(settings: PageSettings) -> Self {
        Self::with_renderers(settings, RendererRegistry::default())
    }

    pub fn with_renderers(settings: PageSettings, renderers: RendererRegistry) -> Self {
        Self {
            settings,
            renderers,
            charts: ChartRegistry::default(),
        }
    }

    pub fn settings(&self) -> &PageSettings {
        &self.settings
    }

    pub fn renderers_mut(&mut self) -> &mut RendererRegistry {
        &mut self.renderers
    }

    pub fn charts(&self) -> &ChartRegistry {
        &self.charts
    }

    /// Adds a chart to every selected table not processed before.
    ///
    /// Returns the ids of the charts created by this call.
    pub fn attach(&mut self, document: &mut Document, env: &dyn HostEnvironment) -> Result<Vec<u32>> {
        let selectors = self
            .settings
            .table_chart_selectors
            .iter()
            .map(|s| Selector::parse(s))
            .collect::<Result<Vec<_>>>()?;
        if selectors.is_empty() {
            tracing::debug!("no table chart selectors configured");
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        self.attach_nodes(&mut document.nodes, &selectors, env, &mut created)?;
        tracing::info!(charts = created.len(), "attached table charts");
        Ok(created)
    }

    fn attach_nodes(
        &mut self,
        nodes: &mut Vec<Node>,
        selectors: &[Selector],
        env: &dyn HostEnvironment,
        created: &mut Vec<u32>,
    ) -> Result<()> {
        let mut i = 0;
        while i < nodes.len() {
            let selected = nodes[i].as_element().is_some_and(|el| {
                el.is("table") && selectors.iter().any(|s| s.matches(el))
            });
            let processed = nodes[i].as_element().is_some_and(|el| el.has_class(PROCESSED_MARKER));

            if selected && processed {
                tracing::debug!("table already has a chart");
            } else if selected {
                // The table stays in the page until its chart markup is built.
                let table = nodes[i].as_element().cloned();
                match table.map(|table| self.build_chart(table, env)) {
                    Some(Ok((id, markup))) => {
                        let inserted = markup.len();
                        let tail = nodes.split_off(i + 1);
                        nodes.truncate(i);
                        nodes.extend(markup);
                        nodes.extend(tail);
                        created.push(id);
                        i += inserted;
                        continue;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "could not build table chart, leaving table as is");
                    }
                    None => {}
                }
            }

            if let Some(el) = nodes[i].as_element_mut() {
                self.attach_nodes(&mut el.children, selectors, env, created)?;
            }
            i += 1;
        }
        Ok(())
    }

    /// Registers one table and returns the markup replacing it.
    fn build_chart(&mut self, mut table: Element, env: &dyn HostEnvironment) -> Result<(u32, Vec<Node>)> {
        let parsed = self.settings.chart_defaults.clone().with_element(&table);
        let settings = parsed.settings;
        let data = parse_table(&table);
        let id = self.charts.next_id();
        let component = settings.component.clone();
        let container_id = format!("{component}-{id}");
        let view = ViewToggle::new(settings.default_view, settings.toggle_text.clone());

        table.add_class(&format!("{component}--table"));
        table.add_class(PROCESSED_MARKER);
        let mut wrapper = Element::new("div")
            .with_attr("class", format!("{component}--table-wrapper"))
            .with_attr(CHART_ID_ATTR, id.to_string())
            .with_child(table);
        wrapper.set_hidden(!view.table_visible());

        let mut chart = Element::new("div")
            .with_attr("id", container_id.as_str())
            .with_attr("class", format!("{component}--chart"));
        chart.set_hidden(!view.chart_visible());

        let request = RenderRequest {
            container_id: &container_id,
            settings: &settings,
            data: &data,
        };
        let outcome = self.renderers.render(&settings.renderer, &request);
        match &outcome {
            RenderOutcome::Rendered(handle) => {
                // Keeps the JSON inert inside the page markup.
                let json = serde_json::to_string(&handle.options)?
                    .replace('<', "\\u003c")
                    .replace('&', "\\u0026");
                chart.children.push(
                    Element::new("script")
                        .with_attr("type", "application/json")
                        .with_attr("data-chart-options", container_id.as_str())
                        .with_child(Node::Raw(json))
                        .into(),
                );
            }
            RenderOutcome::NotFound { message, .. } | RenderOutcome::Failed { message, .. } => {
                chart.set_text(message.as_str())
            }
        }

        let toggle = Element::new("button")
            .with_attr("type", "button")
            .with_attr("class", format!("{component}--toggle"))
            .with_attr(CHART_ID_ATTR, id.to_string())
            .with_text(view.caption());

        let mut buttons = Vec::new();
        let mut exporters = Vec::new();
        if self.settings.export_buttons {
            for format in [ExportFormat::Png, ExportFormat::Svg] {
                let mut button = Element::new("button")
                    .with_attr("type", "button")
                    .with_attr("class", format!("{component}--download"))
                    .with_text(format!("Download as {}", format.extension()));
                let export_settings = ExportSettings {
                    format,
                    width: settings.export_width,
                    height: settings.export_height,
                    ..ExportSettings::default()
                };
                if let Some(exporter) = ChartExporter::bind(&mut button, &mut chart, export_settings, env) {
                    exporters.push(exporter);
                }
                buttons.push(button);
            }
        }

        tracing::debug!(
            id,
            container = %container_id,
            series = data.series.len(),
            issues = parsed.issues.len(),
            "built table chart"
        );

        let mut markup: Vec<Node> = vec![wrapper.into(), chart.into(), toggle.into()];
        markup.extend(buttons.into_iter().map(Node::from));

        self.charts.push(ChartInstance {
            id,
            container_id,
            settings,
            table: data,
            view,
            outcome,
            exporters,
            issues: parsed.issues,
        });
        Ok((id, markup))
    }

    /// Switches chart `id` between chart and table and updates the page.
    ///
    /// Returns the new view, or `None` for an unknown id.
    pub fn toggle_view(&mut self, document: &mut Document, id: u32) -> Option<View> {
        let instance = self.charts.get_mut(id)?;
        let view = instance.view.toggle();
        let caption = instance.view.caption();
        let chart_visible = instance.view.chart_visible();
        let container_id = instance.container_id.as_str();
        let component = instance.settings.component.as_str();
        let wrapper_class = format!("{component}--table-wrapper");
        let toggle_class = format!("{component}--toggle");
        let id_attr = id.to_string();

        document.visit_mut(&mut |el| {
            if el.attr("id") == Some(container_id) {
                el.set_hidden(!chart_visible);
            } else if el.attr(CHART_ID_ATTR) == Some(id_attr.as_str()) {
                if el.has_class(&wrapper_class) {
                    el.set_hidden(chart_visible);
                } else if el.has_class(&toggle_class) {
                    el.set_text(caption.as_str());
                }
            }
        });
        Some(view)
    }
}

// ============================================================================
// Tests
// ============================================================================
