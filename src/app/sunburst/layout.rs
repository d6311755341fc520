use std::f32::consts::TAU;

use crate::concept::ConceptNode;

use super::transition::interpolate;

/// Angular (`x`, radians) and radial (`y`, ring levels) bounds of a wedge.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ArcExtent {
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
}

impl ArcExtent {
    pub fn mid_angle(&self) -> f32 {
        (self.x0 + self.x1) * 0.5
    }

    pub fn mid_level(&self) -> f32 {
        (self.y0 + self.y1) * 0.5
    }

    pub fn angular_span(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Area in normalized (radians x levels) units.
    pub fn normalized_area(&self) -> f32 {
        (self.y1 - self.y0) * (self.x1 - self.x0)
    }

    pub fn contains(&self, angle: f32, level: f32) -> bool {
        angle >= self.x0 && angle < self.x1 && level >= self.y0 && level < self.y1
    }

    pub fn lerp(self, other: ArcExtent, t: f32) -> ArcExtent {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        ArcExtent {
            x0: mix(self.x0, other.x0),
            x1: mix(self.x1, other.x1),
            y0: mix(self.y0, other.y0),
            y1: mix(self.y1, other.y1),
        }
    }

    /// Where this extent lands once `focus` fills the whole circle.
    pub fn refocused(&self, focus: &ArcExtent, focus_depth: usize) -> ArcExtent {
        let span = focus.angular_span();
        let rescale = |x: f32| {
            if span > 0.0 {
                ((x - focus.x0) / span).clamp(0.0, 1.0) * TAU
            } else {
                0.0
            }
        };
        let depth = focus_depth as f32;

        ArcExtent {
            x0: rescale(self.x0),
            x1: rescale(self.x1),
            y0: (self.y0 - depth).max(0.0),
            y1: (self.y1 - depth).max(0.0),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LayoutNode {
    pub name: String,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Ordinal of the depth-1 ancestor, used for colouring. `None` for the root.
    pub branch: Option<usize>,
    pub weight: f32,
    pub extent: ArcExtent,
    pub current: ArcExtent,
    pub target: ArcExtent,
}

impl LayoutNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Flattened sunburst partition. Index 0 is always the root.
#[derive(Clone, Debug)]
pub struct Partition {
    nodes: Vec<LayoutNode>,
    height: usize,
    branch_count: usize,
}

impl Partition {
    pub const ROOT: usize = 0;

    pub fn new(tree: &ConceptNode) -> Self {
        let mut nodes = Vec::with_capacity(tree.node_count());
        push_subtree(tree, None, 0, &mut nodes);

        let mut partition = Self {
            height: nodes.iter().map(|node| node.depth).max().unwrap_or(0),
            nodes,
            branch_count: 0,
        };
        partition.assign_extents();
        partition
    }

    fn assign_extents(&mut self) {
        let root_extent = ArcExtent {
            x0: 0.0,
            x1: TAU,
            y0: 0.0,
            y1: 1.0,
        };
        self.nodes[Self::ROOT].extent = root_extent;

        let mut branch_count = 0;
        let mut stack = vec![Self::ROOT];
        while let Some(index) = stack.pop() {
            let parent_extent = self.nodes[index].extent;
            let parent_weight = self.nodes[index].weight;
            let parent_branch = self.nodes[index].branch;
            let span = parent_extent.angular_span();
            let children = self.nodes[index].children.clone();

            let mut cursor = parent_extent.x0;
            for &child in &children {
                let share = if parent_weight > 0.0 {
                    self.nodes[child].weight / parent_weight
                } else {
                    0.0
                };
                let x1 = (cursor + span * share).min(parent_extent.x1);
                let depth = self.nodes[child].depth as f32;
                let node = &mut self.nodes[child];
                node.extent = ArcExtent {
                    x0: cursor,
                    x1,
                    y0: depth,
                    y1: depth + 1.0,
                };
                node.branch = match parent_branch {
                    Some(branch) => Some(branch),
                    None => {
                        branch_count += 1;
                        Some(branch_count - 1)
                    }
                };
                cursor = x1;
            }

            stack.extend(children.iter().rev());
        }

        for node in &mut self.nodes {
            node.current = node.extent;
            node.target = node.extent;
        }
        self.branch_count = branch_count;
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&LayoutNode> {
        self.nodes.get(index)
    }

    /// Deepest level below the root.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn branch_count(&self) -> usize {
        self.branch_count
    }

    pub fn has_wedges(&self) -> bool {
        self.nodes.len() > 1
    }

    /// Every index except the root, in pre-order.
    pub fn wedge_indices(&self) -> impl Iterator<Item = usize> + '_ {
        Self::ROOT + 1..self.nodes.len()
    }

    pub fn parent_name(&self, index: usize) -> Option<&str> {
        let parent = self.nodes.get(index)?.parent?;
        Some(self.nodes[parent].name.as_str())
    }

    /// Names from the first ring down to `index`; empty for the root.
    pub fn path_to(&self, index: usize) -> Vec<String> {
        let mut path = Vec::new();
        let mut cursor = Some(index);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(current) else {
                break;
            };
            if node.parent.is_some() {
                path.push(node.name.clone());
            }
            cursor = node.parent;
        }
        path.reverse();
        path
    }

    pub fn find_path(&self, path: &[String]) -> Option<usize> {
        path.iter().try_fold(Self::ROOT, |index, name| {
            self.nodes[index]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child].name == *name)
        })
    }

    /// Sets every node's `target` so that `focus` fills the circle.
    pub fn retarget(&mut self, focus: usize) {
        let Some(focus_node) = self.nodes.get(focus) else {
            return;
        };
        let focus_extent = focus_node.extent;
        let focus_depth = focus_node.depth;

        for node in &mut self.nodes {
            node.target = node.extent.refocused(&focus_extent, focus_depth);
        }
    }

    pub fn currents(&self) -> Vec<ArcExtent> {
        self.nodes.iter().map(|node| node.current).collect()
    }

    /// Moves every `current` `fraction` of the way (eased) from `from` to `target`.
    pub fn blend_from(&mut self, from: &[ArcExtent], fraction: f32) {
        for (node, start) in self.nodes.iter_mut().zip(from) {
            node.current = interpolate(*start, node.target, fraction);
        }
    }

    /// Jumps straight to the targets.
    pub fn settle(&mut self) {
        for node in &mut self.nodes {
            node.current = node.target;
        }
    }

    /// Wedge under a point given in angle (radians, clockwise from 12 o'clock)
    /// and ring level, using the currently displayed extents.
    pub fn hit_test(&self, angle: f32, level: f32) -> Option<usize> {
        self.wedge_indices().find(|&index| {
            let current = self.nodes[index].current;
            current.y1 >= 1.0 && current.contains(angle, level)
        })
    }
}

fn push_subtree(
    concept: &ConceptNode,
    parent: Option<usize>,
    depth: usize,
    nodes: &mut Vec<LayoutNode>,
) -> usize {
    let index = nodes.len();
    nodes.push(LayoutNode {
        name: concept.name.clone(),
        depth,
        parent,
        children: Vec::with_capacity(concept.children.len()),
        branch: None,
        weight: 0.0,
        extent: ArcExtent::default(),
        current: ArcExtent::default(),
        target: ArcExtent::default(),
    });

    let mut children = concept
        .children
        .iter()
        .map(|child| push_subtree(child, Some(index), depth + 1, nodes))
        .collect::<Vec<_>>();

    let weight = if concept.is_leaf() {
        concept
            .value
            .filter(|value| value.is_finite())
            .unwrap_or(1.0)
            .max(0.0)
    } else {
        children.iter().map(|&child| nodes[child].weight).sum()
    };

    // Stable sort: equal weights keep the model's ordering.
    children.sort_by(|a, b| nodes[*b].weight.total_cmp(&nodes[*a].weight));

    let node = &mut nodes[index];
    node.weight = weight;
    node.children = children;
    index
}

/// Pixel width of one ring for a viewport of `extent` pixels.
pub fn radius_per_level(extent: f32, height: usize) -> f32 {
    extent / (3.0 + height as f32)
}
