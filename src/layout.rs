//! PositionManager: the cached coordinate solver.
//!
//! Coordinates follow the rectangular phylogram convention: branches run
//! horizontally (x grows with cumulative branch length), external nodes are
//! stacked vertically in document order, each occupying a band of its
//! resolved y-scale. Every query is memoized per clade in an explicit
//! `Option<f64>` table keyed by arena index; any change to the tree's
//! topology, identity or style requires a full [PositionManager::reset].

use crate::geometry::{Point, Rect, Size};
use crate::style::CollapseTrianglePolicy;
use crate::text_metrics::measure_label;
use crate::tree::{CladeId, Tree};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
struct NodeMetrics {
    x1: Option<f64>,
    x2: Option<f64>,
    y1: Option<f64>,
    y2: Option<f64>,
    total_length: Option<f64>,
    y_scale: Option<f64>,
}

#[derive(Debug, Default)]
pub struct PositionManager {
    externals: Vec<CladeId>,
    external_index: HashMap<CladeId, usize>,
    metrics: Vec<NodeMetrics>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebinds the manager to `tree` and drops every cached coordinate.
    /// Required whenever tree identity, topology or style changes.
    pub fn reset(&mut self, tree: &Tree) {
        self.externals = tree.external_nodes();
        self.external_index = self
            .externals
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index))
            .collect();
        self.metrics = vec![NodeMetrics::default(); tree.arena_size()];
    }

    /// Drops cached coordinates while keeping the external ordering.
    pub fn clear_cache(&mut self) {
        for entry in &mut self.metrics {
            *entry = NodeMetrics::default();
        }
    }

    /// External nodes (leaves and collapsed clades) in document order.
    pub fn externals(&self) -> &[CladeId] {
        &self.externals
    }

    /// Length a branch is drawn with: unspecified lengths take the tree
    /// default, or 0. The root draws as a point.
    pub fn drawn_length(&self, tree: &Tree, id: CladeId) -> f64 {
        if id == tree.root() {
            return 0.0;
        }
        tree[id]
            .length
            .unwrap_or_else(|| tree.style.default_length.unwrap_or(0.0))
    }

    /// Cumulative drawn length from the root.
    pub fn total_branch_length(&mut self, tree: &Tree, id: CladeId) -> f64 {
        if let Some(value) = self.metrics[id].total_length {
            return value;
        }
        let value = match tree[id].parent() {
            Some(parent) => self.total_branch_length(tree, parent) + self.drawn_length(tree, id),
            None => 0.0,
        };
        self.metrics[id].total_length = Some(value);
        value
    }

    /// Right end of the branch.
    pub fn x2(&mut self, tree: &Tree, id: CladeId) -> f64 {
        if let Some(value) = self.metrics[id].x2 {
            return value;
        }
        let value =
            tree.style.margin as f64 + self.total_branch_length(tree, id) * tree.style.x_scale;
        self.metrics[id].x2 = Some(value);
        value
    }

    /// Left end of the branch; equals [PositionManager::x2] when the drawn
    /// length is 0, so zero-length edges draw as a point.
    pub fn x1(&mut self, tree: &Tree, id: CladeId) -> f64 {
        if let Some(value) = self.metrics[id].x1 {
            return value;
        }
        let value = self.x2(tree, id) - self.drawn_length(tree, id) * tree.style.x_scale;
        self.metrics[id].x1 = Some(value);
        value
    }

    /// Resolved vertical scale: the tree-level band height times the clade
    /// y-scale multipliers along the root path including the node itself.
    pub fn y_scale(&mut self, tree: &Tree, id: CladeId) -> f64 {
        if let Some(value) = self.metrics[id].y_scale {
            return value;
        }
        let value = match tree[id].parent() {
            Some(parent) => self.y_scale(tree, parent) * tree[id].style.y_scale,
            None => tree.style.y_scale * tree[id].style.y_scale,
        };
        self.metrics[id].y_scale = Some(value);
        value
    }

    /// The node's horizontal line. External nodes are banded in document
    /// order (collapsed clades occupy half their scale above and below the
    /// line); internal nodes take the mean of the first and last child's y2;
    /// hidden nodes collapse onto their collapsed ancestor's line.
    pub fn y1(&mut self, tree: &Tree, id: CladeId) -> f64 {
        if let Some(value) = self.metrics[id].y1 {
            return value;
        }
        let value = if let Some(&index) = self.external_index.get(&id) {
            let own_half = self.y_scale(tree, id) / 2.0;
            if index == 0 {
                tree.style.margin as f64 + own_half
            } else {
                let previous = self.externals[index - 1];
                self.y1(tree, previous) + self.y_scale(tree, previous) / 2.0 + own_half
            }
        } else if tree.is_hidden(id) {
            let mut cur = id;
            loop {
                cur = tree[cur].parent().expect("hidden nodes have ancestors");
                if self.external_index.contains_key(&cur) {
                    break self.y1(tree, cur);
                }
            }
        } else {
            let children = tree[id].children();
            let first = *children.first().expect("internal node has children");
            let last = *children.last().expect("internal node has children");
            (self.y2(tree, first) + self.y2(tree, last)) / 2.0
        };
        self.metrics[id].y1 = Some(value);
        value
    }

    /// Vertical offset the parent's connector targets. An odd sibling
    /// count's exact middle child aligns with the parent; every other child
    /// takes the midpoint towards its center-ward neighbour, so an even
    /// count's two central children share the halved midpoint between them.
    pub fn y2(&mut self, tree: &Tree, id: CladeId) -> f64 {
        if let Some(value) = self.metrics[id].y2 {
            return value;
        }
        let value = match tree[id].parent() {
            None => self.y1(tree, id),
            Some(parent) => {
                let siblings = tree[parent].children().to_vec();
                let n = siblings.len();
                let index = siblings
                    .iter()
                    .position(|&c| c == id)
                    .expect("parent lists every child");
                let center = (n as f64 - 1.0) / 2.0;
                if (index as f64) < center {
                    (self.y1(tree, siblings[index]) + self.y1(tree, siblings[index + 1])) / 2.0
                } else if (index as f64) > center {
                    (self.y1(tree, siblings[index - 1]) + self.y1(tree, siblings[index])) / 2.0
                } else {
                    self.y1(tree, id)
                }
            }
        };
        self.metrics[id].y2 = Some(value);
        value
    }

    /// Full document extent, including margins, label room and the scale
    /// bar. Valid (if trivial) even for a single-node tree.
    pub fn document_size(&mut self, tree: &Tree) -> Size {
        let margin = tree.style.margin as f64;
        let mut height = margin * 2.0;
        for index in 0..self.externals.len() {
            let id = self.externals[index];
            height += self.y_scale(tree, id);
        }
        if tree.style.show_scalebar && tree.style.scalebar_value > 0.0 {
            height += tree.style.scalebar_font_size as f64 + tree.style.label_padding as f64 * 3.0;
        }

        let mut max_x2 = margin;
        for index in 0..self.externals.len() {
            let id = self.externals[index];
            max_x2 = max_x2.max(self.x2(tree, id));
        }
        let mut width = max_x2 + margin;
        if tree.style.show_leaf_labels {
            let widest = self.widest_external_label(tree);
            if widest > 0.0 {
                width += tree.style.label_padding as f64 + widest;
            }
        }
        Size::new(width as f32, height as f32)
    }

    /// Background rectangle behind a clade's subtree.
    pub fn clade_shade_rect(&mut self, tree: &Tree, id: CladeId) -> Rect {
        let span = self.external_span(tree, id);
        let Some((first, last)) = span else {
            // Shading a hidden clade degenerates to its line.
            let x = self.x1(tree, id) as f32;
            let y = self.y1(tree, id) as f32;
            return Rect::new(x, y, 0.0, 0.0);
        };
        let top = self.y1(tree, first) - self.y_scale(tree, first) / 2.0;
        let bottom = self.y1(tree, last) + self.y_scale(tree, last) / 2.0;
        let x = self.x1(tree, id);
        let mut right = self.x2(tree, id);
        let mut index = self.external_index[&first];
        let end = self.external_index[&last];
        while index <= end {
            let external = self.externals[index];
            let mut edge = self.x2(tree, external);
            if tree.style.show_leaf_labels
                && let Some(label) = display_label(tree, external)
            {
                edge += tree.style.label_padding as f64
                    + measure_label(label, tree.style.leaf_font_size, &tree.style.font_family)
                        as f64;
            }
            right = right.max(edge);
            index += 1;
        }
        Rect::new(
            x as f32,
            top as f32,
            (right - x) as f32,
            (bottom - top) as f32,
        )
    }

    /// Apex and the two far corners of a collapsed clade's triangle. The
    /// policy picks which of the subtree's min/max leaf depths bounds each
    /// corner.
    pub fn collapse_triangle(&mut self, tree: &Tree, id: CladeId) -> [Point; 3] {
        let apex_x = self.x2(tree, id);
        let y = self.y1(tree, id);
        let half = self.y_scale(tree, id) / 2.0;
        let own_total = self.total_branch_length(tree, id);

        let mut min_extra = f64::INFINITY;
        let mut max_extra: f64 = 0.0;
        for descendant in tree.descendants(id) {
            if tree[descendant].is_leaf() {
                let extra = self.total_branch_length(tree, descendant) - own_total;
                min_extra = min_extra.min(extra);
                max_extra = max_extra.max(extra);
            }
        }
        if !min_extra.is_finite() {
            min_extra = 0.0;
        }

        let scale = tree.style.x_scale;
        let (top_x, bottom_x) = match tree.style.triangle_policy {
            CollapseTrianglePolicy::TopMax => {
                (apex_x + max_extra * scale, apex_x + min_extra * scale)
            }
            CollapseTrianglePolicy::BottomMax => {
                (apex_x + min_extra * scale, apex_x + max_extra * scale)
            }
            CollapseTrianglePolicy::AllMax => {
                (apex_x + max_extra * scale, apex_x + max_extra * scale)
            }
            CollapseTrianglePolicy::Constant => {
                let fixed = apex_x + tree.style.triangle_width as f64;
                (fixed, fixed)
            }
        };
        [
            Point::new(apex_x as f32, y as f32),
            Point::new(top_x as f32, (y - half) as f32),
            Point::new(bottom_x as f32, (y + half) as f32),
        ]
    }

    /// Anchor of a leaf (or collapsed clade) label, left-aligned after the
    /// branch tip. For collapsed clades the label clears the triangle.
    pub fn leaf_position(&mut self, tree: &Tree, id: CladeId) -> Point {
        let mut x = self.x2(tree, id);
        if tree[id].is_external() && !tree[id].is_leaf() {
            let triangle = self.collapse_triangle(tree, id);
            x = x.max(triangle[1].x as f64).max(triangle[2].x as f64);
        }
        Point::new(
            (x + tree.style.label_padding as f64) as f32,
            self.y1(tree, id) as f32,
        )
    }

    /// Anchor of an internal node's value text.
    pub fn node_value_position(&mut self, tree: &Tree, id: CladeId) -> Point {
        Point::new(
            (self.x2(tree, id) + tree.style.label_padding as f64) as f32,
            self.y1(tree, id) as f32,
        )
    }

    /// Anchor of a clade label, centered over the branch, above the line.
    pub fn clade_label_position(&mut self, tree: &Tree, id: CladeId) -> Point {
        let mid = (self.x1(tree, id) + self.x2(tree, id)) / 2.0;
        let y = self.y1(tree, id) - self.y_scale(tree, id) / 2.0;
        Point::new(mid as f32, y as f32)
    }

    /// Anchor of the branch value, just above the branch midpoint.
    pub fn branch_value_position(&mut self, tree: &Tree, id: CladeId) -> Point {
        let mid = (self.x1(tree, id) + self.x2(tree, id)) / 2.0;
        Point::new(mid as f32, (self.y1(tree, id) - 2.0) as f32)
    }

    /// Center of a branch decoration glyph.
    pub fn decoration_position(&mut self, tree: &Tree, id: CladeId) -> Point {
        let mid = (self.x1(tree, id) + self.x2(tree, id)) / 2.0;
        Point::new(mid as f32, self.y1(tree, id) as f32)
    }

    /// Scale bar geometry: start, end and label anchor. `None` unless the
    /// bar is enabled with a positive value.
    pub fn scalebar_geometry(&mut self, tree: &Tree) -> Option<(Point, Point, Point)> {
        if !tree.style.show_scalebar || tree.style.scalebar_value <= 0.0 {
            return None;
        }
        let size = self.document_size(tree);
        let margin = tree.style.margin;
        let length = (tree.style.scalebar_value * tree.style.x_scale) as f32;
        let y = size.height - margin;
        let start = Point::new(margin, y);
        let end = Point::new(margin + length, y);
        let label = Point::new(margin + length / 2.0, y - tree.style.label_padding);
        Some((start, end, label))
    }

    /// First and last external node (in document order) covered by `id`'s
    /// subtree, or `None` when the clade is hidden.
    fn external_span(&mut self, tree: &Tree, id: CladeId) -> Option<(CladeId, CladeId)> {
        let mut first: Option<usize> = None;
        let mut last: Option<usize> = None;
        for (index, &external) in self.externals.iter().enumerate() {
            if is_ancestor_or_self(tree, id, external) {
                if first.is_none() {
                    first = Some(index);
                }
                last = Some(index);
            }
        }
        Some((self.externals[first?], self.externals[last?]))
    }

    fn widest_external_label(&mut self, tree: &Tree) -> f64 {
        let mut widest = 0.0f64;
        for index in 0..self.externals.len() {
            let id = self.externals[index];
            if let Some(label) = display_label(tree, id) {
                widest = widest.max(measure_label(
                    label,
                    tree.style.leaf_font_size,
                    &tree.style.font_family,
                ) as f64);
            }
        }
        widest
    }
}

/// The text an external node is labelled with: its taxon, or the clade label
/// for collapsed clades without one.
pub fn display_label(tree: &Tree, id: CladeId) -> Option<&str> {
    tree[id]
        .taxon
        .as_deref()
        .or(tree[id].style.clade_label.as_deref())
}

fn is_ancestor_or_self(tree: &Tree, ancestor: CladeId, id: CladeId) -> bool {
    let mut cur = Some(id);
    while let Some(node) = cur {
        if node == ancestor {
            return true;
        }
        cur = tree[node].parent();
    }
    false
}
