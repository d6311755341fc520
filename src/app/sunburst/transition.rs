use super::layout::{ArcExtent, Partition};

pub const FOCUS_DURATION_SECS: f64 = 0.75;

/// Cubic in-out easing, the curve drill transitions are played with.
pub fn ease_cubic_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - u * u * u / 2.0
    }
}

/// Extents sampled `fraction` of the way through a transition.
pub fn interpolate(from: ArcExtent, to: ArcExtent, fraction: f32) -> ArcExtent {
    from.lerp(to, ease_cubic_in_out(fraction))
}

/// In-flight re-partition after a focus change. Holds the extents that were on
/// screen when it started so that a drill issued mid-animation starts from
/// where the wedges currently are.
#[derive(Clone, Debug)]
pub struct FocusTransition {
    started_at: f64,
    duration: f64,
    from: Vec<ArcExtent>,
}

impl FocusTransition {
    pub fn start(partition: &Partition, now: f64) -> Self {
        Self {
            started_at: now,
            duration: FOCUS_DURATION_SECS,
            from: partition.currents(),
        }
    }

    pub fn fraction(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration).clamp(0.0, 1.0) as f32
    }

    pub fn eased(&self, now: f64) -> f32 {
        ease_cubic_in_out(self.fraction(now))
    }

    pub fn origin(&self, index: usize) -> Option<ArcExtent> {
        self.from.get(index).copied()
    }

    /// Updates the partition's `current` extents; returns `true` once finished,
    /// at which point every `current` equals its `target`.
    pub fn advance(&self, partition: &mut Partition, now: f64) -> bool {
        let fraction = self.fraction(now);
        if fraction >= 1.0 {
            partition.settle();
            return true;
        }

        partition.blend_from(&self.from, fraction);
        false
    }
}
