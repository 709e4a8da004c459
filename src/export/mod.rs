//! Chart export to standalone SVG and PNG files.
//!
//! An export trigger (a button) is bound once to a source element holding
//! the chart graphic. Binding validates the environment and the source,
//! normalizes the graphic so it stands alone outside the page, and keeps a
//! snapshot of it. Clicking the trigger then serializes or rasterizes that
//! snapshot and hands the file to the [`HostEnvironment`].
//!
//! ```
//! use table_charts::dom::Element;
//! use table_charts::export::{ChartExporter, MemoryHost};
//! use table_charts::settings::ExportSettings;
//!
//! let mut source = Element::parse(r#"<div><svg width="10" height="10"/></div>"#).unwrap();
//! let mut button = Element::new("button");
//! let mut host = MemoryHost::new();
//!
//! let exporter = ChartExporter::bind(&mut button, &mut source, ExportSettings::default(), &host)
//!     .unwrap();
//! let file = exporter.click(&mut host).unwrap();
//! assert_eq!(file.filename, "chart.svg");
//! ```

mod host;
mod raster;

pub use host::{DirectoryHost, DownloadFile, HostEnvironment, MemoryHost, UserAgent};
pub use raster::{encode_png, target_dimensions, AwaitingDecode, Decoded, RasterJob};

use crate::dom::{Element, Node};
use crate::error::ExportError;
use crate::settings::{ExportFormat, ExportSettings};

/// Class marking processed triggers and normalized graphics.
pub const EXPORT_MARKER: &str = "chart-export-processed";

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
const EXPORT_FONT: &str = "'arial'";

// ============================================================================
// ChartExporter
// ============================================================================

/// Why a bound exporter cannot export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    UnsupportedEnvironment,
    MissingSource,
}

impl From<Unavailable> for ExportError {
    fn from(reason: Unavailable) -> Self {
        match reason {
            Unavailable::UnsupportedEnvironment => ExportError::UnsupportedEnvironment,
            Unavailable::MissingSource => ExportError::MissingSource,
        }
    }
}

/// One export trigger bound to one format.
#[derive(Debug, Clone)]
pub struct ChartExporter {
    settings: ExportSettings,
    graphic: Result<String, Unavailable>,
}

impl ChartExporter {
    /// Binds `trigger` to the graphic in `source`.
    ///
    /// Returns `None` when the trigger was bound before. Otherwise the
    /// trigger is marked and an exporter is returned, valid or not; an
    /// invalid one reports its error when clicked.
    pub fn bind(
        trigger: &mut Element,
        source: &mut Element,
        settings: ExportSettings,
        env: &dyn HostEnvironment,
    ) -> Option<Self> {
        if trigger.has_class(EXPORT_MARKER) {
            tracing::debug!(format = settings.format.extension(), "export trigger already bound");
            return None;
        }
        trigger.add_class(EXPORT_MARKER);

        let graphic = if !env.supports_blob() {
            Err(Unavailable::UnsupportedEnvironment)
        } else {
            match resolve_source(source) {
                Some(svg) => {
                    if !svg.has_class(EXPORT_MARKER) {
                        normalize_svg(svg, &settings);
                        svg.add_class(EXPORT_MARKER);
                    }
                    Ok(svg.to_markup())
                }
                None => Err(Unavailable::MissingSource),
            }
        };
        if let Err(reason) = &graphic {
            tracing::warn!(format = settings.format.extension(), ?reason, "export trigger bound without a usable graphic");
        }

        Some(Self { settings, graphic })
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn is_valid(&self) -> bool {
        self.graphic.is_ok()
    }

    /// The normalized graphic captured at bind time.
    pub fn graphic(&self) -> Option<&str> {
        self.graphic.as_deref().ok()
    }

    /// Runs the export and saves the file through `env`.
    ///
    /// The file holds the graphic as it was at bind time. A chart redrawn
    /// after binding is still exported as that snapshot.
    pub fn click(&self, env: &mut dyn HostEnvironment) -> Result<DownloadFile, ExportError> {
        let svg = match &self.graphic {
            Ok(svg) => svg,
            Err(reason) => {
                env.notify(&self.settings.error_msg);
                return Err((*reason).into());
            }
        };

        if env.requires_manual_save() {
            env.notify(&self.manual_save_message());
        }

        let bytes = match self.settings.format {
            ExportFormat::Svg => svg.clone().into_bytes(),
            ExportFormat::Png => self.rasterize(svg)?,
        };
        let file = DownloadFile {
            filename: self.settings.file_name(),
            mime_type: self.settings.format.mime_type(),
            bytes,
        };
        env.save(&file)?;
        tracing::info!(filename = %file.filename, bytes = file.bytes.len(), "exported chart");
        Ok(file)
    }

    fn rasterize(&self, svg: &str) -> Result<Vec<u8>, ExportError> {
        let job = RasterJob::new(svg).decode()?;
        let (width, height) = target_dimensions(job.natural_size(), self.settings.width, self.settings.height);
        tracing::debug!(width, height, "drawing chart");
        let image = job.draw(width, height)?;
        encode_png(&image)
    }

    /// The instructions shown on hosts that need manual saving.
    pub fn manual_save_message(&self) -> String {
        self.settings
            .manual_download_message
            .replace("{saveType}", self.settings.format.save_type())
            .replace("{filename}", &self.settings.file_name())
    }
}

/// Exports a standalone graphic, for callers without a page.
pub fn export_graphic(
    markup: &str,
    settings: ExportSettings,
    env: &mut dyn HostEnvironment,
) -> crate::Result<DownloadFile> {
    let mut source = Element::parse(markup)?;
    let mut trigger = Element::new("button");
    let exporter = ChartExporter::bind(&mut trigger, &mut source, settings, &*env)
        .ok_or(ExportError::MissingSource)?;
    Ok(exporter.click(env)?)
}

// ============================================================================
// Source resolution and normalization
// ============================================================================

/// The element itself when it is an `svg`, else its only direct `svg` child.
fn resolve_source(source: &mut Element) -> Option<&mut Element> {
    if source.is("svg") {
        return Some(source);
    }
    let mut svgs = source.child_elements_mut().filter(|el| el.is("svg"));
    let svg = svgs.next()?;
    if svgs.next().is_some() {
        return None;
    }
    Some(svg)
}

/// Makes a graphic valid as a standalone file.
pub fn normalize_svg(svg: &mut Element, settings: &ExportSettings) {
    svg.set_attr("version", "1.1");
    svg.set_attr("xmlns", SVG_NAMESPACE);

    svg.visit_descendants_mut(&mut |el| {
        if el.is("g") {
            el.remove_attr("clip-path");
        } else if el.is("text") {
            el.set_attr("font-family", EXPORT_FONT);
        }
    });

    if settings.include_compat_styles {
        let style = Element::new("style")
            .with_attr("type", "text/css")
            .with_child(Node::CData(settings.compat_styles.clone()));
        let defs = svg
            .children
            .iter()
            .position(|node| node.as_element().is_some_and(|el| el.is("defs")));
        let defs = match defs {
            Some(index) => index,
            None => {
                svg.children.insert(0, Element::new("defs").into());
                0
            }
        };
        if let Some(defs) = svg.children[defs].as_element_mut() {
            defs.children.push(style.into());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
