//! Chart renderer strategies.
//!
//! Drawing is left to an external charting library. A [`ChartRenderer`]
//! turns parsed settings and data into whatever that library consumes and
//! returns an opaque [`ChartHandle`]. Renderers are registered by name in a
//! [`RendererRegistry`] and looked up when a chart is built. Asking for a
//! name nobody registered yields [`RenderOutcome::NotFound`], and a renderer
//! that fails yields [`RenderOutcome::Failed`]. Neither is an error, so one
//! misconfigured table never breaks the rest of the page.

pub mod c3;

pub use c3::{format_y_tick, C3Renderer};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;
use crate::settings::ChartSettings;
use crate::table::TableData;

// ============================================================================
// Render requests and handles
// ============================================================================

/// Everything a renderer gets for one chart.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// The `id` of the element the chart is drawn into.
    pub container_id: &'a str,
    pub settings: &'a ChartSettings,
    pub data: &'a TableData,
}

/// A rendered chart as seen by the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartHandle {
    /// Name of the renderer that produced the handle.
    pub renderer: String,
    pub container_id: String,
    /// The document handed to the charting library.
    pub options: serde_json::Value,
}

/// The result of asking the registry to render a chart.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered(ChartHandle),
    /// No renderer is registered under the requested name.
    NotFound {
        renderer: String,
        /// Text shown in place of the chart.
        message: String,
    },
    /// The renderer exists but returned an error.
    Failed {
        renderer: String,
        /// Text shown in place of the chart.
        message: String,
    },
}

impl RenderOutcome {
    pub fn handle(&self) -> Option<&ChartHandle> {
        match self {
            Self::Rendered(handle) => Some(handle),
            Self::NotFound { .. } | Self::Failed { .. } => None,
        }
    }

    /// The text shown in place of a chart that was not rendered.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Rendered(_) => None,
            Self::NotFound { message, .. } | Self::Failed { message, .. } => Some(message.as_str()),
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }
}

// ============================================================================
// ChartRenderer
// ============================================================================

/// A named strategy that turns table data into a chart.
pub trait ChartRenderer {
    /// The name tables select this renderer by (`data-chart`).
    fn name(&self) -> &str;

    /// Builds the chart for one table.
    fn render(&self, request: &RenderRequest<'_>) -> Result<ChartHandle>;
}

// ============================================================================
// RendererRegistry
// ============================================================================

/// Renderers available to a page, looked up by name at render time.
pub struct RendererRegistry {
    renderers: IndexMap<String, Box<dyn ChartRenderer>>,
}

impl Default for RendererRegistry {
    /// A registry with the built-in [`C3Renderer`].
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(C3Renderer);
        registry
    }
}

impl RendererRegistry {
    /// A registry with no renderers at all.
    pub fn empty() -> Self {
        Self {
            renderers: IndexMap::new(),
        }
    }

    /// Adds a renderer, replacing any registered under the same name.
    pub fn register(&mut self, renderer: impl ChartRenderer + 'static) {
        self.renderers
            .insert(renderer.name().to_string(), Box::new(renderer));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.renderers.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.renderers.keys().map(String::as_str)
    }

    /// Renders with the named renderer.
    ///
    /// An unknown name and a failing renderer are both outcomes, not errors.
    pub fn render(&self, name: &str, request: &RenderRequest<'_>) -> RenderOutcome {
        match self.renderers.get(name).map(|renderer| renderer.render(request)) {
            Some(Ok(handle)) => {
                tracing::debug!(renderer = name, container = request.container_id, "rendered chart");
                RenderOutcome::Rendered(handle)
            }
            Some(Err(e)) => {
                tracing::warn!(renderer = name, container = request.container_id, error = %e, "chart renderer failed");
                RenderOutcome::Failed {
                    renderer: name.to_string(),
                    message: format!("Chart could not be rendered: {e}"),
                }
            }
            None => {
                tracing::warn!(renderer = name, container = request.container_id, "no chart renderer registered");
                RenderOutcome::NotFound {
                    renderer: name.to_string(),
                    message: format!("No chart implementation found for {name}"),
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Echo;

    impl ChartRenderer for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn render(&self, request: &RenderRequest<'_>) -> Result<ChartHandle> {
            Ok(ChartHandle {
                renderer: "echo".into(),
                container_id: request.container_id.into(),
                options: serde_json::json!({ "series": request.data.series.len() }),
            })
        }
    }

    struct Broken;

    impl ChartRenderer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn render(&self, _request: &RenderRequest<'_>) -> Result<ChartHandle> {
            Err(Error::Markup("no axis".into()))
        }
    }

    fn request<'a>(settings: &'a ChartSettings, data: &'a TableData) -> RenderRequest<'a> {
        RenderRequest {
            container_id: "table-chart-1",
            settings,
            data,
        }
    }

    #[test]
    fn default_registry_has_c3() {
        let registry = RendererRegistry::default();
        assert!(registry.contains("c3js"));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["c3js"]);
    }

    #[test]
    fn unknown_renderer_is_not_found() {
        let registry = RendererRegistry::default();
        let settings = ChartSettings::default();
        let data = TableData::default();
        let outcome = registry.render("highcharts", &request(&settings, &data));
        assert_eq!(
            outcome,
            RenderOutcome::NotFound {
                renderer: "highcharts".into(),
                message: "No chart implementation found for highcharts".into(),
            }
        );
        assert!(outcome.handle().is_none());
        assert_eq!(outcome.message(), Some("No chart implementation found for highcharts"));
    }

    #[test]
    fn failing_renderer_is_an_outcome() {
        let mut registry = RendererRegistry::empty();
        registry.register(Broken);
        let settings = ChartSettings::default();
        let data = TableData::default();
        let outcome = registry.render("broken", &request(&settings, &data));
        assert_eq!(
            outcome,
            RenderOutcome::Failed {
                renderer: "broken".into(),
                message: "Chart could not be rendered: markup error: no axis".into(),
            }
        );
        assert!(!outcome.is_rendered());
    }

    #[test]
    fn registered_renderer_is_used_by_name() {
        let mut registry = RendererRegistry::empty();
        registry.register(Echo);
        let settings = ChartSettings::default();
        let data = TableData::default();
        let outcome = registry.render("echo", &request(&settings, &data));
        let handle = outcome.handle().unwrap();
        assert_eq!(handle.renderer, "echo");
        assert_eq!(handle.options["series"], 0);
        assert!(!registry.render("c3js", &request(&settings, &data)).is_rendered());
    }
}
