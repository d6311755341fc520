use eframe::egui::emath::Rot2;
use eframe::egui::epaint::TextShape;
use eframe::egui::{
    Align2, Color32, CursorIcon, FontId, Painter, PointerButton, Pos2, Sense, Shape, Stroke,
    Ui, vec2,
};

use crate::util::{short_name, wrap_label};

use super::super::ViewModel;
use super::super::highlight::cached_search_matches;
use super::super::render_utils::{
    blend_color, draw_background, fill_opacity, label_placement, label_visible, to_polar,
    wedge_arcs, wedge_mesh, with_opacity,
};
use super::super::session::ExpansionRequest;
use super::interaction::{ClickAction, ClickPolicy, read_gestures};
use super::layout::{ArcExtent, Partition, radius_per_level};

const MATCH_COLOR: Color32 = Color32::from_rgb(103, 196, 255);
const LABEL_COLOR: Color32 = Color32::from_gray(238);
const LABEL_MAX_CHARS: usize = 28;

/// Draws `text` centred on `center`, rotated clockwise by `angle` radians.
/// Lines are stacked along the rotated vertical axis.
fn rotated_label(
    painter: &Painter,
    center: Pos2,
    text: &str,
    font_id: FontId,
    color: Color32,
    angle: f32,
) {
    let rotation = Rot2::from_angle(angle);
    let galleys = text
        .lines()
        .map(|line| painter.layout_no_wrap(line.to_owned(), font_id.clone(), color))
        .collect::<Vec<_>>();
    let total_height = galleys.iter().map(|galley| galley.size().y).sum::<f32>();

    let mut offset_y = -total_height / 2.0;
    for galley in galleys {
        let size = galley.size();
        let line_center = center + rotation * vec2(0.0, offset_y + size.y / 2.0);
        let top_left = line_center - rotation * (size / 2.0);
        painter.add(TextShape::new(top_left, galley, color).with_angle(angle));
        offset_y += size.y;
    }
}

impl ViewModel {
    /// Wedge under a screen position and the ring level it falls on.
    fn locate(&self, center: Pos2, ring: f32, screen: Pos2) -> (Option<usize>, f32) {
        let (angle, distance) = to_polar(self.view.to_diagram(center, screen));
        let level = if ring > 0.0 { distance / ring } else { 0.0 };
        (self.partition.hit_test(angle, level), level)
    }

    /// Opacity of a wedge, interpolated across a running focus transition.
    fn blended_opacity(&self, index: usize, now: f64, opacity: impl Fn(&ArcExtent) -> f32) -> f32 {
        let Some(node) = self.partition.node(index) else {
            return 0.0;
        };

        match &self.transition {
            Some(transition) => {
                let from = transition.origin(index).unwrap_or(node.current);
                let t = transition.eased(now);
                let start = opacity(&from);
                start + (opacity(&node.target) - start) * t
            }
            None => opacity(&node.current),
        }
    }

    fn hover_text(&self, index: usize) -> Option<String> {
        let node = self.partition.node(index)?;
        let action = match self.click_policy {
            ClickPolicy::ExpandLeaves if node.is_leaf() && self.session.is_loading() => {
                "expansion in progress"
            }
            ClickPolicy::ExpandLeaves if node.is_leaf() => "click to expand",
            _ if node.is_leaf() => "click to focus",
            _ => "click to drill in",
        };
        Some(format!(
            "{}  |  depth {}  |  weight {}  |  {action}",
            node.name, node.depth, node.weight
        ))
    }

    pub(in crate::app) fn draw_sunburst(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        let center = rect.center();
        let now = ui.input(|input| input.time);

        if let Some(transition) = &self.transition {
            if transition.advance(&mut self.partition, now) {
                self.transition = None;
            } else {
                ui.ctx().request_repaint();
            }
        }

        let gesture = read_gestures(ui, response.hovered());
        if self.view.apply(center, &gesture) {
            ui.ctx().request_repaint();
        }

        draw_background(&painter, rect, center + self.view.translation, self.view.scale);

        if !self.partition.has_wedges() {
            let hint = match self.session.pending_concept() {
                Some(concept) => format!("Breaking down \"{concept}\"..."),
                None => "Enter a concept above and press Generate.".to_owned(),
            };
            painter.text(
                center,
                Align2::CENTER_CENTER,
                hint,
                FontId::proportional(16.0),
                Color32::from_gray(200),
            );
            return;
        }

        let ring = radius_per_level(rect.width().min(rect.height()), self.partition.height());

        let primary_started = response.drag_started_by(PointerButton::Primary);
        let other_started = response.drag_started_by(PointerButton::Secondary)
            || response.drag_started_by(PointerButton::Middle);
        let started_on_wedge = primary_started
            && ui
                .input(|input| input.pointer.press_origin())
                .is_some_and(|origin| self.locate(center, ring, origin).0.is_some());
        let panning = self.pan.update(
            primary_started || other_started,
            started_on_wedge,
            response.dragged(),
            response.contains_pointer(),
        );
        if panning && self.view.pan_by(response.drag_delta()) {
            ui.ctx().request_repaint();
        }

        let (hovered, hovered_level) = response
            .hover_pos()
            .map(|pointer| self.locate(center, ring, pointer))
            .unwrap_or((None, f32::INFINITY));
        let over_centre = self.focus != Partition::ROOT && hovered_level < 1.0;
        if self.pan.is_active() {
            ui.output_mut(|output| output.cursor_icon = CursorIcon::Grabbing);
        } else if hovered.is_some() || over_centre {
            let leaf_busy = self.click_policy == ClickPolicy::ExpandLeaves
                && self.session.is_loading()
                && hovered
                    .and_then(|index| self.partition.node(index))
                    .is_some_and(|node| node.is_leaf());
            ui.output_mut(|output| {
                output.cursor_icon = if leaf_busy {
                    CursorIcon::Progress
                } else {
                    CursorIcon::PointingHand
                };
            });
        }

        let matches = cached_search_matches(
            &mut self.search_cache,
            &self.partition,
            self.layout_revision,
            &self.search,
        );
        let search_active = matches.as_ref().is_some_and(|found| !found.is_empty());

        for index in self.partition.wedge_indices() {
            let node = &self.partition.nodes()[index];
            let interior = !node.is_leaf();
            let opacity = self.blended_opacity(index, now, |extent| fill_opacity(extent, interior));
            if opacity <= 0.0 {
                continue;
            }

            let Some((outer, inner)) = wedge_arcs(&node.current, ring) else {
                continue;
            };
            let outer = outer
                .into_iter()
                .map(|offset| self.view.to_screen(center, offset))
                .collect::<Vec<_>>();
            let inner = inner
                .into_iter()
                .map(|offset| self.view.to_screen(center, offset))
                .collect::<Vec<_>>();

            let is_match = matches.as_ref().is_some_and(|found| found.contains(&index));
            let is_hovered = hovered == Some(index);
            let base = node
                .branch
                .and_then(|branch| self.palette.get(branch))
                .copied()
                .unwrap_or(Color32::GRAY);
            let (color, opacity) = if is_match {
                (blend_color(base, MATCH_COLOR, 0.35), opacity.max(0.75))
            } else if search_active {
                (base, opacity * 0.35)
            } else {
                (base, opacity)
            };
            let color = if is_hovered {
                blend_color(color, Color32::WHITE, 0.25)
            } else {
                color
            };

            painter.add(Shape::mesh(wedge_mesh(&outer, &inner, with_opacity(color, opacity))));

            if is_match || is_hovered {
                let mut outline = outer;
                outline.extend(inner.into_iter().rev());
                let stroke = if is_match {
                    Stroke::new(1.8, MATCH_COLOR)
                } else {
                    Stroke::new(1.2, Color32::from_gray(240))
                };
                painter.add(Shape::closed_line(outline, stroke));
            }
        }

        let font_id = FontId::proportional((ring * 0.14 * self.view.scale).clamp(9.0, 18.0));
        for index in self.partition.wedge_indices() {
            let alpha = self.blended_opacity(index, now, |extent| {
                if label_visible(extent) { 1.0 } else { 0.0 }
            });
            if alpha <= 0.0 {
                continue;
            }

            let node = &self.partition.nodes()[index];
            let placement = label_placement(&node.current, ring);
            let text = wrap_label(&short_name(&node.name, LABEL_MAX_CHARS));
            rotated_label(
                &painter,
                self.view.to_screen(center, placement.anchor),
                &text,
                font_id.clone(),
                with_opacity(LABEL_COLOR, alpha),
                placement.angle,
            );
        }

        let status = match (hovered, self.session.pending_concept()) {
            (Some(index), _) => self.hover_text(index),
            (None, Some(concept)) => Some(format!("Expanding \"{concept}\"...")),
            (None, None) if over_centre => Some("click centre to zoom out".to_owned()),
            (None, None) => None,
        };
        if let Some(status) = status {
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                status,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        if response.clicked_by(PointerButton::Primary)
            && let Some(pointer) = response.interact_pointer_pos()
        {
            let (hit, level) = self.locate(center, ring, pointer);
            match self
                .click_policy
                .resolve(&self.partition, self.focus, hit, level)
            {
                ClickAction::RequestExpansion {
                    concept,
                    parent_context,
                } => self.start_expansion(ExpansionRequest::child(concept, parent_context)),
                ClickAction::Drill(index) => self.drill(index, now),
                ClickAction::ZoomOut => self.zoom_out(now),
                ClickAction::Ignore => {}
            }
            ui.ctx().request_repaint();
        }

    }
}
