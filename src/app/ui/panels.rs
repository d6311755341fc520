use eframe::egui::{self, Align, Color32, Context, Layout};

use super::super::ViewModel;
use super::super::sunburst::Partition;

const ERROR_COLOR: Color32 = Color32::from_rgb(235, 94, 94);
const WARNING_COLOR: Color32 = Color32::from_rgb(235, 196, 84);

impl ViewModel {
    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        self.poll_session(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Concept Sunburst");
                    ui.separator();
                    ui.label(format!("root: {}", self.session.tree().name));
                    ui.label(format!("nodes: {}", self.session.tree().node_count()));
                    ui.label(format!("depth: {}", self.partition.height()));
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(concept) = self.session.pending_concept() {
                            ui.label(format!("expanding {concept}"));
                            ui.spinner();
                        }
                    });
                });
            });

        if self.notice.is_some() {
            egui::TopBottomPanel::top("notice")
                .resizable(false)
                .show(ctx, |ui| self.draw_notice(ui));
        }

        egui::TopBottomPanel::bottom("status_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(self.focus_text());
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(format!("zoom: {:.0}%", self.view.scale * 100.0));
                        ui.label(format!("click: {}", self.click_policy.label()));
                        ui.label(format!("merge: {}", self.session.merge_policy().label()));
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_sunburst(ui));
    }

    fn draw_notice(&mut self, ui: &mut egui::Ui) {
        let Some(notice) = &self.notice else {
            return;
        };

        let color = if notice.warning {
            WARNING_COLOR
        } else {
            ERROR_COLOR
        };
        let text = notice.text.clone();

        let mut dismissed = false;
        ui.horizontal(|ui| {
            ui.colored_label(color, text);
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                dismissed = ui.small_button("Dismiss").clicked();
            });
        });
        if dismissed {
            self.notice = None;
        }
    }

    fn focus_text(&self) -> String {
        if self.focus == Partition::ROOT {
            return "focus: root".to_owned();
        }
        format!("focus: {}", self.partition.path_to(self.focus).join(" › "))
    }
}
