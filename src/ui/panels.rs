use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::state::ViewerState;

// ---------------------------------------------------------------------------
// Left side panel – figure list
// ---------------------------------------------------------------------------

/// Render the figure list.
pub fn side_panel(ui: &mut Ui, state: &mut ViewerState) {
    ui.heading("Figures");
    ui.separator();

    if state.figures.is_empty() {
        ui.label("No figures.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for i in 0..state.figures.len() {
                let label = state.label(i);
                if ui.selectable_label(state.selected == i, label).clicked() {
                    state.select(i);
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut ViewerState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Save as PDF…").clicked() {
                save_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();
        ui.label(format!(
            "Figure {} of {}",
            (state.selected + 1).min(state.figures.len()),
            state.figures.len()
        ));

        if let Some(msg) = &state.status_message {
            ui.separator();
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                Color32::GRAY
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn save_file_dialog(state: &mut ViewerState) {
    let file = rfd::FileDialog::new()
        .set_title("Save figures")
        .add_filter("PDF", &["pdf"])
        .set_file_name("performance.pdf")
        .save_file();

    if let Some(path) = file {
        // Failures are reported through the status message.
        let _ = state.save_pdf(&path);
    }
}
