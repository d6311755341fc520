use eframe::egui::{self, MouseWheelUnit, Pos2, Ui, Vec2};

use super::layout::Partition;

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;

/// Pan/zoom applied on top of the diagram, which is laid out around the
/// canvas centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub translation: Vec2,
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn to_screen(&self, center: Pos2, offset: Vec2) -> Pos2 {
        center + self.translation + offset * self.scale
    }

    pub fn to_diagram(&self, center: Pos2, screen: Pos2) -> Vec2 {
        (screen - center - self.translation) / self.scale
    }

    /// Scales by `factor` (clamped to the allowed range) keeping the diagram
    /// point under `anchor` fixed on screen.
    pub fn zoom_about(&mut self, center: Pos2, anchor: Pos2, factor: f32) -> bool {
        let before = self.to_diagram(center, anchor);
        let scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if (scale - self.scale).abs() <= f32::EPSILON {
            return false;
        }

        self.scale = scale;
        self.translation = anchor - center - before * scale;
        true
    }

    pub fn pan_by(&mut self, delta: Vec2) -> bool {
        if delta == Vec2::ZERO {
            return false;
        }
        self.translation += delta;
        true
    }

    pub fn apply(&mut self, center: Pos2, gesture: &GestureFrame) -> bool {
        let mut changed = self.pan_by(gesture.pan);
        if (gesture.zoom_factor - 1.0).abs() > f32::EPSILON {
            let anchor = gesture.anchor.unwrap_or(center);
            changed |= self.zoom_about(center, anchor, gesture.zoom_factor);
        }
        changed
    }
}

/// Wheel, pinch and touch input gathered for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureFrame {
    pub zoom_factor: f32,
    pub pan: Vec2,
    pub anchor: Option<Pos2>,
}

impl Default for GestureFrame {
    fn default() -> Self {
        Self {
            zoom_factor: 1.0,
            pan: Vec2::ZERO,
            anchor: None,
        }
    }
}

/// Notched wheels zoom; pixel-precise scrolling (trackpads) pans instead.
pub fn wheel_zoom_factor(unit: MouseWheelUnit, delta_y: f32) -> f32 {
    let exponent = match unit {
        MouseWheelUnit::Line => delta_y * 0.15,
        MouseWheelUnit::Page => delta_y,
        MouseWheelUnit::Point => 0.0,
    };
    2f32.powf(exponent)
}

pub fn read_gestures(ui: &Ui, hovered: bool) -> GestureFrame {
    if !hovered {
        return GestureFrame::default();
    }

    ui.input(|input| {
        let mut frame = GestureFrame {
            anchor: input.pointer.hover_pos(),
            ..GestureFrame::default()
        };

        for event in &input.events {
            let egui::Event::MouseWheel {
                unit,
                delta,
                modifiers,
                ..
            } = event
            else {
                continue;
            };

            // ctrl/cmd + wheel is pinch-zoom and already folded into `zoom_delta`.
            if modifiers.ctrl || modifiers.command {
                continue;
            }

            match unit {
                MouseWheelUnit::Point => frame.pan += *delta,
                _ => frame.zoom_factor *= wheel_zoom_factor(*unit, delta.y),
            }
        }

        frame.zoom_factor *= input.zoom_delta();
        if let Some(touch) = input.multi_touch() {
            frame.pan += touch.translation_delta;
            frame.anchor = Some(touch.center_pos);
        }

        frame
    })
}

/// Tracks whether the current drag is panning the view. Drags that begin on a
/// wedge with the primary button are left to the click handling.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanGesture {
    active: bool,
}

impl PanGesture {
    pub fn update(
        &mut self,
        drag_started: bool,
        started_on_wedge: bool,
        dragging: bool,
        pointer_inside: bool,
    ) -> bool {
        if drag_started {
            self.active = !started_on_wedge;
        }
        if !dragging || !pointer_inside {
            self.active = false;
        }
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// What clicking a wedge does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ClickPolicy {
    /// Leaves request an expansion, interior wedges drill in.
    #[default]
    ExpandLeaves,
    /// Every wedge drills in; nothing is requested from the model.
    DrillOnly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickAction {
    RequestExpansion {
        concept: String,
        parent_context: String,
    },
    Drill(usize),
    ZoomOut,
    Ignore,
}

impl ClickPolicy {
    pub fn label(self) -> &'static str {
        match self {
            Self::ExpandLeaves => "expand leaves",
            Self::DrillOnly => "drill only",
        }
    }

    /// `level` is the clicked ring (distance / ring width); `hit` the wedge
    /// under the pointer, if any.
    pub fn resolve(
        self,
        partition: &Partition,
        focus: usize,
        hit: Option<usize>,
        level: f32,
    ) -> ClickAction {
        if focus != Partition::ROOT && level < 1.0 {
            return ClickAction::ZoomOut;
        }

        let Some(index) = hit else {
            return ClickAction::Ignore;
        };
        let Some(node) = partition.node(index) else {
            return ClickAction::Ignore;
        };

        match self {
            Self::ExpandLeaves if node.is_leaf() => ClickAction::RequestExpansion {
                concept: node.name.clone(),
                parent_context: partition.parent_name(index).unwrap_or_default().to_owned(),
            },
            Self::ExpandLeaves | Self::DrillOnly => ClickAction::Drill(index),
        }
    }
}
