//! The rendering contract: a pluggable primitive backend and the fixed,
//! format-independent traversal that drives it.
//!
//! The traversal visits clades in document pre-order and issues at most one
//! backend call per semantic element, in a deterministic order, which makes
//! backend call sequences snapshot-testable. Backends are pure sinks: they
//! never mutate the tree.

use crate::geometry::{Color, Point, Rect, Size};
use crate::layout::{PositionManager, display_label};
use crate::style::{BranchDecorationStyle, DecorationGlyph};
use crate::tree::Tree;
use anyhow::Result;
use regex::Regex;

/// Which branch axes take the per-clade branch color; the others use the
/// neutral tree color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchColoring {
    #[default]
    Both,
    Horizontal,
    Vertical,
    Neither,
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub branch_coloring: BranchColoring,
}

/// Primitive drawing contract implemented by every output format.
pub trait TreeBackend {
    fn init_document(&mut self, size: Size) -> Result<()>;
    fn begin_tree(&mut self, size: Size, tree: &Tree) -> Result<()>;
    fn draw_clade_shade(&mut self, rect: Rect, color: Color) -> Result<()>;
    fn draw_collapsed_triangle(&mut self, points: [Point; 3], color: Color) -> Result<()>;
    fn draw_leaf_label(&mut self, pos: Point, text: &str, font_size: f32, color: Color)
    -> Result<()>;
    fn draw_node_value(&mut self, pos: Point, text: &str, font_size: f32, color: Color)
    -> Result<()>;
    fn draw_branch_value(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()>;
    fn draw_clade_label(&mut self, pos: Point, text: &str, font_size: f32, color: Color)
    -> Result<()>;
    fn draw_horizontal_branch(&mut self, from: Point, to: Point, color: Color, width: f32)
    -> Result<()>;
    fn draw_vertical_branch(&mut self, from: Point, to: Point, color: Color, width: f32)
    -> Result<()>;
    fn draw_branch_decoration(
        &mut self,
        center: Point,
        glyph: DecorationGlyph,
        color: Color,
        size: f32,
    ) -> Result<()>;
    fn draw_scalebar(&mut self, start: Point, end: Point, label_pos: Point, label: &str)
    -> Result<()>;
    fn finish_tree(&mut self) -> Result<()>;
}

/// Walks the tree in document order and drives `backend`.
pub fn draw_tree<B: TreeBackend>(
    tree: &Tree,
    positions: &mut PositionManager,
    options: &ExportOptions,
    backend: &mut B,
) -> Result<()> {
    positions.reset(tree);
    let size = positions.document_size(tree);
    backend.init_document(size)?;
    backend.begin_tree(size, tree)?;

    let style = &tree.style;
    let neutral = Color::parse_or(&style.branch_color, Color::BLACK);
    let text_color = Color::parse_or(&style.text_color, Color::BLACK);
    // Invalid decoration patterns degrade by being skipped.
    let decorations: Vec<(Regex, &BranchDecorationStyle)> = style
        .decorations
        .iter()
        .filter_map(|deco| Regex::new(&deco.pattern).ok().map(|re| (re, deco)))
        .collect();

    for id in tree.clades() {
        if tree.is_hidden(id) {
            continue;
        }
        let clade = &tree[id];
        let branch_color = clade
            .style
            .branch_color
            .as_deref()
            .map(|c| Color::parse_or(c, neutral))
            .unwrap_or(neutral);

        if let Some(shade) = clade.style.shade_color.as_deref() {
            let rect = positions.clade_shade_rect(tree, id);
            backend.draw_clade_shade(rect, Color::parse_or(shade, neutral))?;
        }

        if clade.is_external() && !clade.is_leaf() {
            let points = positions.collapse_triangle(tree, id);
            backend.draw_collapsed_triangle(points, branch_color)?;
        }

        let mut label_consumed_clade_label = false;
        if clade.is_external() {
            if style.show_leaf_labels
                && let Some(label) = display_label(tree, id)
            {
                label_consumed_clade_label = clade.taxon.is_none();
                let color = clade
                    .style
                    .leaf_color
                    .as_deref()
                    .map(|c| Color::parse_or(c, text_color))
                    .unwrap_or(text_color);
                let pos = positions.leaf_position(tree, id);
                backend.draw_leaf_label(pos, label, style.leaf_font_size, color)?;
            }
        } else if style.show_node_values
            && let Some(value) = clade.supports.as_deref()
        {
            let pos = positions.node_value_position(tree, id);
            backend.draw_node_value(pos, value, style.value_font_size, text_color)?;
        }

        if style.show_clade_labels
            && !label_consumed_clade_label
            && let Some(label) = clade.style.clade_label.as_deref()
        {
            let pos = positions.clade_label_position(tree, id);
            backend.draw_clade_label(pos, label, style.clade_label_font_size, text_color)?;
        }

        let x1 = positions.x1(tree, id);
        let x2 = positions.x2(tree, id);
        let y1 = positions.y1(tree, id);
        let horizontal_color = match options.branch_coloring {
            BranchColoring::Both | BranchColoring::Horizontal => branch_color,
            _ => neutral,
        };
        backend.draw_horizontal_branch(
            Point::new(x1 as f32, y1 as f32),
            Point::new(x2 as f32, y1 as f32),
            horizontal_color,
            style.line_width,
        )?;

        if let Some(supports) = clade.supports.as_deref() {
            for (re, deco) in &decorations {
                if re.is_match(supports) {
                    let center = positions.decoration_position(tree, id);
                    let color = Color::parse_or(&deco.color, neutral);
                    backend.draw_branch_decoration(center, deco.glyph, color, deco.size)?;
                }
            }
            if style.show_branch_values {
                let pos = positions.branch_value_position(tree, id);
                backend.draw_branch_value(pos, supports, style.value_font_size, text_color)?;
            }
        }

        if let Some(parent) = clade.parent()
            && tree[parent].children().len() > 1
        {
            let y2 = positions.y2(tree, id);
            if (y1 - y2).abs() > f64::EPSILON {
                let vertical_color = match options.branch_coloring {
                    BranchColoring::Both | BranchColoring::Vertical => branch_color,
                    _ => neutral,
                };
                backend.draw_vertical_branch(
                    Point::new(x1 as f32, y1 as f32),
                    Point::new(x1 as f32, y2 as f32),
                    vertical_color,
                    style.line_width,
                )?;
            }
        }
    }

    if let Some((start, end, label_pos)) = positions.scalebar_geometry(tree) {
        let label = tree.style.scalebar_value.to_string();
        backend.draw_scalebar(start, end, label_pos, &label)?;
    }

    backend.finish_tree()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newick::parse_newick;
    use crate::style::BranchDecorationStyle;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Vec<String>,
    }

    impl TreeBackend for RecordingBackend {
        fn init_document(&mut self, _size: Size) -> Result<()> {
            self.calls.push("init".into());
            Ok(())
        }
        fn begin_tree(&mut self, _size: Size, _tree: &Tree) -> Result<()> {
            self.calls.push("begin".into());
            Ok(())
        }
        fn draw_clade_shade(&mut self, _rect: Rect, _color: Color) -> Result<()> {
            self.calls.push("shade".into());
            Ok(())
        }
        fn draw_collapsed_triangle(&mut self, _points: [Point; 3], _color: Color) -> Result<()> {
            self.calls.push("triangle".into());
            Ok(())
        }
        fn draw_leaf_label(&mut self, _p: Point, text: &str, _s: f32, _c: Color) -> Result<()> {
            self.calls.push(format!("leaf:{text}"));
            Ok(())
        }
        fn draw_node_value(&mut self, _p: Point, text: &str, _s: f32, _c: Color) -> Result<()> {
            self.calls.push(format!("value:{text}"));
            Ok(())
        }
        fn draw_branch_value(&mut self, _p: Point, text: &str, _s: f32, _c: Color) -> Result<()> {
            self.calls.push(format!("branch-value:{text}"));
            Ok(())
        }
        fn draw_clade_label(&mut self, _p: Point, text: &str, _s: f32, _c: Color) -> Result<()> {
            self.calls.push(format!("clade-label:{text}"));
            Ok(())
        }
        fn draw_horizontal_branch(
            &mut self,
            _f: Point,
            _t: Point,
            _c: Color,
            _w: f32,
        ) -> Result<()> {
            self.calls.push("h".into());
            Ok(())
        }
        fn draw_vertical_branch(&mut self, _f: Point, _t: Point, _c: Color, _w: f32) -> Result<()> {
            self.calls.push("v".into());
            Ok(())
        }
        fn draw_branch_decoration(
            &mut self,
            _c: Point,
            _g: DecorationGlyph,
            _col: Color,
            _s: f32,
        ) -> Result<()> {
            self.calls.push("decoration".into());
            Ok(())
        }
        fn draw_scalebar(&mut self, _s: Point, _e: Point, _l: Point, label: &str) -> Result<()> {
            self.calls.push(format!("scalebar:{label}"));
            Ok(())
        }
        fn finish_tree(&mut self) -> Result<()> {
            self.calls.push("finish".into());
            Ok(())
        }
    }

    fn record(tree: &Tree) -> Vec<String> {
        let mut pm = PositionManager::new();
        let mut backend = RecordingBackend::default();
        draw_tree(tree, &mut pm, &ExportOptions::default(), &mut backend).unwrap();
        backend.calls
    }

    #[test]
    fn call_order_is_deterministic() {
        let tree = parse_newick("(A:1,B:1);").unwrap();
        let calls = record(&tree);
        assert_eq!(
            calls,
            vec![
                "init", "begin", "h", // root: degenerate horizontal branch
                "leaf:A", "h", "v", // first leaf
                "leaf:B", "h", "v", // second leaf
                "finish",
            ]
        );
    }

    #[test]
    fn hidden_clades_are_skipped_and_collapsed_draw_triangles() {
        let mut tree = parse_newick("((A:1,B:1)x:1,C:1);").unwrap();
        let inner = tree[tree.root()].children()[0];
        tree[inner].style.collapsed = true;
        tree[inner].style.clade_label = Some("group".into());
        let calls = record(&tree);
        assert!(calls.contains(&"triangle".to_string()));
        assert!(calls.contains(&"leaf:group".to_string()));
        assert!(!calls.iter().any(|c| c == "leaf:A" || c == "leaf:B"));
    }

    #[test]
    fn decorations_match_supports_by_regex() {
        let mut tree = parse_newick("((A:1,B:1)95/100:1,C:1);").unwrap();
        tree.style.decorations.push(BranchDecorationStyle {
            pattern: "^9[0-9]/".into(),
            glyph: DecorationGlyph::Circle,
            color: "#ff0000".into(),
            size: 4.0,
        });
        tree.style.decorations.push(BranchDecorationStyle {
            pattern: "(unclosed".into(), // invalid, skipped
            glyph: DecorationGlyph::Square,
            color: "#00ff00".into(),
            size: 4.0,
        });
        let calls = record(&tree);
        assert_eq!(calls.iter().filter(|c| *c == "decoration").count(), 1);
    }

    #[test]
    fn scalebar_needs_a_positive_value() {
        let mut tree = parse_newick("(A:1,B:1);").unwrap();
        tree.style.show_scalebar = true;
        tree.style.scalebar_value = 0.0;
        assert!(!record(&tree).iter().any(|c| c.starts_with("scalebar")));
        tree.style.scalebar_value = 0.5;
        assert!(record(&tree).contains(&"scalebar:0.5".to_string()));
    }
}
