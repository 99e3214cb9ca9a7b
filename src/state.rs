use std::path::Path;

use anyhow::Result;

use crate::figure::Figure;

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// The viewer's state, independent of rendering.
pub struct ViewerState {
    /// Figures in page order.
    pub figures: Vec<Figure>,

    /// Index of the figure shown in the central panel.
    pub selected: usize,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl ViewerState {
    pub fn new(figures: Vec<Figure>) -> Self {
        Self {
            figures,
            selected: 0,
            status_message: None,
        }
    }

    pub fn current(&self) -> Option<&Figure> {
        self.figures.get(self.selected)
    }

    /// Select a figure; out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.figures.len() {
            self.selected = index;
        }
    }

    /// Name shown in the figure list.
    pub fn label(&self, index: usize) -> String {
        match self.figures.get(index).and_then(|f| f.title.as_deref()) {
            Some(title) => title.to_string(),
            None => format!("Figure {}", index + 1),
        }
    }

    /// Save every figure into one PDF, recording the outcome as status.
    pub fn save_pdf(&mut self, path: &Path) -> Result<()> {
        match crate::pdf::write_pdf(&self.figures, path) {
            Ok(()) => {
                self.status_message = Some(format!("Saved {}", path.display()));
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to save figures: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::Axis;

    fn state() -> ViewerState {
        ViewerState::new(vec![
            Figure::new(Axis::linear("x"), Axis::linear("y")).with_title("first"),
            Figure::new(Axis::linear("x"), Axis::linear("y")),
        ])
    }

    #[test]
    fn selection_stays_in_range() {
        let mut s = state();
        s.select(1);
        assert_eq!(s.selected, 1);
        s.select(7);
        assert_eq!(s.selected, 1);
        assert!(s.current().unwrap().title.is_none());
    }

    #[test]
    fn untitled_figures_are_numbered() {
        let s = state();
        assert_eq!(s.label(0), "first");
        assert_eq!(s.label(1), "Figure 2");
    }

    #[test]
    fn save_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = state();
        s.save_pdf(&dir.path().join("out.pdf")).unwrap();
        assert!(s.status_message.as_deref().unwrap().starts_with("Saved"));

        assert!(s.save_pdf(&dir.path().join("no/such/dir.pdf")).is_err());
        assert!(s.status_message.as_deref().unwrap().starts_with("Error"));
    }
}
