use std::f32::consts::{PI, TAU};

use eframe::egui::{Color32, Mesh, Painter, Pos2, Rect, Stroke, Vec2, vec2};

use super::sunburst::ArcExtent;

const PAD_ANGLE: f32 = 0.005;
const ARC_STEP: f32 = TAU / 180.0;
const LABEL_MIN_AREA: f32 = 0.03;

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, origin: Pos2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

/// d3's `interpolateRainbow`: a cyclical cubehelix sweep.
pub(super) fn rainbow(t: f32) -> Color32 {
    let t = t - t.floor();
    let ts = (t - 0.5).abs();
    let hue = 360.0 * t - 100.0;
    let saturation = 1.5 - 1.5 * ts;
    let lightness = 0.8 - 0.9 * ts;

    let angle = (hue + 120.0).to_radians();
    let amplitude = saturation * lightness * (1.0 - lightness);
    let (sin, cos) = angle.sin_cos();
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;

    Color32::from_rgb(
        channel(lightness + amplitude * (-0.14861 * cos + 1.78277 * sin)),
        channel(lightness + amplitude * (-0.29227 * cos - 0.90649 * sin)),
        channel(lightness + amplitude * (1.97294 * cos)),
    )
}

/// One hue per top-level branch. The sweep is cyclical, so it is sampled at
/// `count + 1` points and the last (a repeat of the first) is dropped.
pub(super) fn branch_palette(count: usize) -> Vec<Color32> {
    (0..count)
        .map(|index| rainbow(index as f32 / count as f32))
        .collect()
}

pub(super) fn arc_visible(extent: &ArcExtent) -> bool {
    extent.y1 >= 1.0 && extent.x1 > extent.x0
}

pub(super) fn label_visible(extent: &ArcExtent) -> bool {
    extent.y1 >= 1.0 && extent.normalized_area() > LABEL_MIN_AREA
}

/// Interior wedges are drawn more opaque than leaves so expandable nodes stand out.
pub(super) fn fill_opacity(extent: &ArcExtent, interior: bool) -> f32 {
    match (arc_visible(extent), interior) {
        (false, _) => 0.0,
        (true, true) => 0.6,
        (true, false) => 0.4,
    }
}

/// Offset from the diagram centre for a point at `angle` (clockwise from
/// 12 o'clock) and `radius`.
pub(super) fn polar_point(angle: f32, radius: f32) -> Vec2 {
    vec2(radius * angle.sin(), -radius * angle.cos())
}

/// Inverse of [`polar_point`]: `(angle in 0..TAU, distance)`.
pub(super) fn to_polar(offset: Vec2) -> (f32, f32) {
    let angle = offset.x.atan2(-offset.y).rem_euclid(TAU);
    (angle, offset.length())
}

pub(super) fn label_rotation_degrees(mid_angle: f32) -> f32 {
    let degrees = mid_angle * 180.0 / PI;
    let flip = if degrees >= 180.0 { 180.0 } else { 0.0 };
    degrees - 90.0 + flip
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct LabelPlacement {
    pub(super) anchor: Vec2,
    pub(super) angle: f32,
}

pub(super) fn label_placement(extent: &ArcExtent, ring: f32) -> LabelPlacement {
    LabelPlacement {
        anchor: polar_point(extent.mid_angle(), extent.mid_level() * ring),
        angle: label_rotation_degrees(extent.mid_angle()).to_radians(),
    }
}

/// Outer and inner arc polylines (diagram space, centre at origin) for one
/// wedge; `None` when there is nothing to draw.
pub(super) fn wedge_arcs(extent: &ArcExtent, ring: f32) -> Option<(Vec<Vec2>, Vec<Vec2>)> {
    let pad = (extent.angular_span() / 2.0).min(PAD_ANGLE);
    let start = extent.x0 + pad / 2.0;
    let end = extent.x1 - pad / 2.0;
    let inner_radius = extent.y0 * ring;
    let outer_radius = (extent.y1 * ring - 1.0).max(inner_radius);

    if end <= start || outer_radius <= inner_radius {
        return None;
    }

    let segments = ((end - start) / ARC_STEP).ceil().max(1.0) as usize;
    let angles = (0..=segments).map(|step| start + (end - start) * step as f32 / segments as f32);

    let outer = angles
        .clone()
        .map(|angle| polar_point(angle, outer_radius))
        .collect();
    let inner = angles.map(|angle| polar_point(angle, inner_radius)).collect();
    Some((outer, inner))
}

/// Triangle strip between two equally long arcs already in screen space.
pub(super) fn wedge_mesh(outer: &[Pos2], inner: &[Pos2], color: Color32) -> Mesh {
    let mut mesh = Mesh::default();
    for (outer_point, inner_point) in outer.iter().zip(inner) {
        mesh.colored_vertex(*outer_point, color);
        mesh.colored_vertex(*inner_point, color);
    }

    let pairs = outer.len().min(inner.len()) as u32;
    for step in 0..pairs.saturating_sub(1) {
        let base = step * 2;
        mesh.add_triangle(base, base + 1, base + 2);
        mesh.add_triangle(base + 1, base + 3, base + 2);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(x0: f32, x1: f32, y0: f32, y1: f32) -> ArcExtent {
        ArcExtent { x0, x1, y0, y1 }
    }

    fn close(color: Color32, rgb: (u8, u8, u8)) -> bool {
        let diff = |a: u8, b: u8| (a as i16 - b as i16).abs() <= 1;
        diff(color.r(), rgb.0) && diff(color.g(), rgb.1) && diff(color.b(), rgb.2)
    }

    #[test]
    fn rainbow_matches_reference_samples() {
        assert!(close(rainbow(0.0), (110, 64, 170)));
        assert!(close(rainbow(0.25), (255, 94, 99)));
        assert!(close(rainbow(0.5), (175, 240, 91)));
        assert!(close(rainbow(0.75), (26, 199, 194)));
    }

    #[test]
    fn palette_has_distinct_hue_per_branch() {
        let palette = branch_palette(4);
        assert_eq!(palette.len(), 4);
        assert_ne!(palette[0], palette[3]);
        assert!(branch_palette(0).is_empty());
    }

    #[test]
    fn visibility_predicates() {
        assert!(arc_visible(&extent(0.0, 1.0, 1.0, 2.0)));
        assert!(!arc_visible(&extent(0.0, 1.0, 0.0, 0.5)));
        assert!(!arc_visible(&extent(1.0, 1.0, 1.0, 2.0)));

        assert!(label_visible(&extent(0.0, 0.5, 1.0, 2.0)));
        assert!(!label_visible(&extent(0.0, 0.03, 1.0, 2.0)));
        assert!(!label_visible(&extent(0.0, 0.02, 1.0, 2.0)));
    }

    #[test]
    fn interior_wedges_are_more_opaque() {
        let visible = extent(0.0, 1.0, 1.0, 2.0);
        assert_eq!(fill_opacity(&visible, true), 0.6);
        assert_eq!(fill_opacity(&visible, false), 0.4);
        assert_eq!(fill_opacity(&extent(0.0, 0.0, 1.0, 2.0), true), 0.0);
    }

    #[test]
    fn labels_flip_past_half_turn() {
        assert!((label_rotation_degrees(PI / 2.0) - 0.0).abs() < 1e-4);
        assert!((label_rotation_degrees(0.0) + 90.0).abs() < 1e-4);
        let past_half = PI + 0.01;
        let expected = past_half.to_degrees() + 90.0;
        assert!((label_rotation_degrees(past_half) - expected).abs() < 1e-3);
        assert!((label_rotation_degrees(1.5 * PI) - 360.0).abs() < 1e-3);
    }

    #[test]
    fn label_sits_at_mid_angle_and_mid_radius() {
        let placement = label_placement(&extent(0.0, PI, 1.0, 2.0), 100.0);
        assert!((placement.anchor.x - 150.0).abs() < 1e-3);
        assert!(placement.anchor.y.abs() < 1e-3);
        assert!(placement.angle.abs() < 1e-5);
    }

    #[test]
    fn polar_round_trip() {
        for angle in [0.1_f32, 1.0, 3.0, 4.5, 6.0] {
            let (back, distance) = to_polar(polar_point(angle, 42.0));
            assert!((back - angle).abs() < 1e-4, "{angle} -> {back}");
            assert!((distance - 42.0).abs() < 1e-3);
        }
        let (twelve, _) = to_polar(vec2(0.0, -10.0));
        assert!(twelve.abs() < 1e-6);
    }

    #[test]
    fn wedge_arcs_respect_radii_and_skip_empty() {
        let (outer, inner) = wedge_arcs(&extent(0.0, PI, 1.0, 2.0), 50.0).expect("drawable");
        assert_eq!(outer.len(), inner.len());
        assert!(outer.iter().all(|point| (point.length() - 99.0).abs() < 1e-3));
        assert!(inner.iter().all(|point| (point.length() - 50.0).abs() < 1e-3));

        assert!(wedge_arcs(&extent(1.0, 1.0, 1.0, 2.0), 50.0).is_none());
        assert!(wedge_arcs(&extent(0.0, 1.0, 0.0, 0.0), 50.0).is_none());
    }

    #[test]
    fn wedge_mesh_is_a_triangle_strip() {
        let outer = [Pos2::new(0.0, 0.0), Pos2::new(1.0, 0.0), Pos2::new(2.0, 0.0)];
        let inner = [Pos2::new(0.0, 1.0), Pos2::new(1.0, 1.0), Pos2::new(2.0, 1.0)];
        let mesh = wedge_mesh(&outer, &inner, Color32::WHITE);
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices.len(), 12);
    }
}
