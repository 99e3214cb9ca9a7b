use anyhow::{anyhow, Result};
use eframe::egui;

use crate::figure::Figure;
use crate::state::ViewerState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct FigureViewerApp {
    pub state: ViewerState,
}

impl FigureViewerApp {
    pub fn new(figures: Vec<Figure>) -> Self {
        Self {
            state: ViewerState::new(figures),
        }
    }
}

impl eframe::App for FigureViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: figure list ----
        egui::SidePanel::left("figure_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::figure_plot(ui, &self.state);
        });
    }
}

/// Show the figures in a window; returns when it is closed.
pub fn show(figures: Vec<Figure>) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Separator performance",
        options,
        Box::new(|_cc| Ok(Box::new(FigureViewerApp::new(figures)))),
    )
    .map_err(|e| anyhow!("{e}"))
}
