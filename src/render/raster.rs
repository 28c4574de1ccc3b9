//! Raster backend: records through the SVG backend and rasterizes the
//! finished document with resvg into a PNG file.

use super::svg::SvgBackend;
use crate::draw::{ExportOptions, TreeBackend, draw_tree};
use crate::geometry::{Color, Point, Rect, Size};
use crate::layout::PositionManager;
use crate::style::DecorationGlyph;
use crate::tree::Tree;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Renders `tree` to a PNG file at `output`.
pub fn render_png(tree: &Tree, options: &ExportOptions, output: &Path) -> Result<()> {
    let mut positions = PositionManager::new();
    let mut backend = PngBackend::new(output);
    draw_tree(tree, &mut positions, options, &mut backend)
}

pub struct PngBackend {
    inner: SvgBackend,
    output: PathBuf,
    size: Size,
    font_family: String,
}

impl PngBackend {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            inner: SvgBackend::new(),
            output: output.into(),
            size: Size::default(),
            font_family: String::new(),
        }
    }
}

impl TreeBackend for PngBackend {
    fn init_document(&mut self, size: Size) -> Result<()> {
        self.size = size;
        self.inner.init_document(size)
    }

    fn begin_tree(&mut self, size: Size, tree: &Tree) -> Result<()> {
        self.font_family = tree.style.font_family.clone();
        self.inner.begin_tree(size, tree)
    }

    fn draw_clade_shade(&mut self, rect: Rect, color: Color) -> Result<()> {
        self.inner.draw_clade_shade(rect, color)
    }

    fn draw_collapsed_triangle(&mut self, points: [Point; 3], color: Color) -> Result<()> {
        self.inner.draw_collapsed_triangle(points, color)
    }

    fn draw_leaf_label(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.inner.draw_leaf_label(pos, text, font_size, color)
    }

    fn draw_node_value(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.inner.draw_node_value(pos, text, font_size, color)
    }

    fn draw_branch_value(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.inner.draw_branch_value(pos, text, font_size, color)
    }

    fn draw_clade_label(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.inner.draw_clade_label(pos, text, font_size, color)
    }

    fn draw_horizontal_branch(
        &mut self,
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    ) -> Result<()> {
        self.inner.draw_horizontal_branch(from, to, color, width)
    }

    fn draw_vertical_branch(
        &mut self,
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    ) -> Result<()> {
        self.inner.draw_vertical_branch(from, to, color, width)
    }

    fn draw_branch_decoration(
        &mut self,
        center: Point,
        glyph: DecorationGlyph,
        color: Color,
        size: f32,
    ) -> Result<()> {
        self.inner.draw_branch_decoration(center, glyph, color, size)
    }

    fn draw_scalebar(&mut self, start: Point, end: Point, label_pos: Point, label: &str)
    -> Result<()> {
        self.inner.draw_scalebar(start, end, label_pos, label)
    }

    fn finish_tree(&mut self) -> Result<()> {
        self.inner.finish_tree()?;

        let mut opt = usvg::Options::default();
        opt.font_family = self.font_family.clone();
        opt.default_size = usvg::Size::from_wh(self.size.width.max(1.0), self.size.height.max(1.0))
            .unwrap_or(usvg::Size::from_wh(800.0, 600.0).unwrap());

        let svg_tree = usvg::Tree::from_str(self.inner.as_svg(), &opt)?;
        let size = svg_tree.size().to_int_size();
        let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
            .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

        let mut pixmap_mut = pixmap.as_mut();
        resvg::render(
            &svg_tree,
            resvg::tiny_skia::Transform::default(),
            &mut pixmap_mut,
        );
        pixmap.save_png(&self.output)?;
        Ok(())
    }
}
