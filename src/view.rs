//! Chart/table visibility toggle.

use crate::settings::View;

/// Which of chart and table is shown, and the caption of the button that
/// switches between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewToggle {
    current: View,
    toggle_text: String,
}

impl ViewToggle {
    /// `toggle_text` may contain `{view}`, replaced by the view the button
    /// switches to.
    pub fn new(default_view: View, toggle_text: impl Into<String>) -> Self {
        Self {
            current: default_view,
            toggle_text: toggle_text.into(),
        }
    }

    /// Switches to the other view and returns it.
    pub fn toggle(&mut self) -> View {
        self.current = self.current.opposite();
        tracing::debug!(view = self.current.as_str(), "toggled view");
        self.current
    }

    pub fn current(&self) -> View {
        self.current
    }

    pub fn chart_visible(&self) -> bool {
        self.current == View::Chart
    }

    pub fn table_visible(&self) -> bool {
        self.current == View::Table
    }

    pub fn caption(&self) -> String {
        self.toggle_text
            .replace("{view}", self.current.opposite().as_str())
    }
}
