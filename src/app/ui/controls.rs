use eframe::egui::{self, Key, Ui};

use crate::concept::MergePolicy;

use super::super::ViewModel;
use super::super::sunburst::{ClickPolicy, Partition};

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Explore");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Concept")
            .on_hover_text("The root concept to break down into components.");
        let loading = self.session.is_loading();
        let concept_response = ui.add_enabled(
            !loading,
            egui::TextEdit::singleline(&mut self.concept_input).hint_text("e.g. Coffee"),
        );
        let submitted =
            concept_response.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter));

        let generate_label = if loading { "Generating..." } else { "Generate" };
        let generate = ui
            .add_enabled(!loading, egui::Button::new(generate_label))
            .on_hover_text("Replace the current tree with a fresh breakdown of the concept.");
        if (generate.clicked() || submitted) && !loading {
            self.generate_from_input();
        }

        ui.add_space(6.0);
        ui.label("API key")
            .on_hover_text("Kept in memory for this session only.");
        ui.add(egui::TextEdit::singleline(self.session.credential_mut()).password(true));

        ui.separator();

        ui.label("Clicking a wedge");
        ui.horizontal_wrapped(|ui| {
            for policy in [ClickPolicy::ExpandLeaves, ClickPolicy::DrillOnly] {
                ui.selectable_value(&mut self.click_policy, policy, policy.label());
            }
        })
        .response
        .on_hover_text("Expand leaves through the model, or only drill into wedges.");

        ui.label("Merging new children");
        let mut merge_policy = self.session.merge_policy();
        ui.horizontal_wrapped(|ui| {
            for policy in [MergePolicy::Replace, MergePolicy::Append] {
                ui.selectable_value(&mut merge_policy, policy, policy.label());
            }
        })
        .response
        .on_hover_text("Replace a node's children or append the new ones alongside.");
        if merge_policy != self.session.merge_policy() {
            self.session.set_merge_policy(merge_policy);
        }

        ui.separator();

        ui.label("Search")
            .on_hover_text("Fuzzy-highlight matching wedges without changing the layout.");
        ui.text_edit_singleline(&mut self.search);

        ui.separator();

        ui.horizontal(|ui| {
            let can_zoom_out = self.focus != Partition::ROOT;
            if ui
                .add_enabled(can_zoom_out, egui::Button::new("Zoom out"))
                .clicked()
            {
                let now = ui.input(|input| input.time);
                self.zoom_out(now);
            }
            if ui
                .button("Reset view")
                .on_hover_text("Return to the root with the default pan and zoom.")
                .clicked()
            {
                self.reset_view();
            }
        });

        ui.add_space(8.0);
        ui.small("Scroll or pinch to zoom, drag the background to pan.");
        ui.small("Click the centre to go up a level.");
    }
}
