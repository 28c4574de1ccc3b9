//! Vector backend: builds an SVG document string.

use super::escape_xml;
use crate::draw::{ExportOptions, TreeBackend, draw_tree};
use crate::geometry::{Color, Point, Rect, Size};
use crate::layout::PositionManager;
use crate::style::DecorationGlyph;
use crate::tree::Tree;
use anyhow::Result;

/// Renders `tree` to an SVG string.
pub fn render_svg(tree: &Tree, options: &ExportOptions) -> Result<String> {
    let mut positions = PositionManager::new();
    let mut backend = SvgBackend::new();
    draw_tree(tree, &mut positions, options, &mut backend)?;
    Ok(backend.into_svg())
}

#[derive(Debug, Default)]
pub struct SvgBackend {
    buf: String,
    font_family: String,
}

impl SvgBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished document. Meaningful after `finish_tree`.
    pub fn into_svg(self) -> String {
        self.buf
    }

    pub(crate) fn as_svg(&self) -> &str {
        &self.buf
    }

    fn text(&mut self, pos: Point, text: &str, font_size: f32, color: Color, anchor: &str) {
        self.buf.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" text-anchor=\"{}\" dominant-baseline=\"middle\">{}</text>",
            pos.x,
            pos.y,
            escape_xml(&self.font_family),
            font_size,
            color.to_css(),
            anchor,
            escape_xml(text)
        ));
    }

    fn line(&mut self, from: Point, to: Point, color: Color, width: f32) {
        self.buf.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{}\"/>",
            from.x,
            from.y,
            to.x,
            to.y,
            color.to_css(),
            width
        ));
    }
}

impl TreeBackend for SvgBackend {
    fn init_document(&mut self, size: Size) -> Result<()> {
        self.buf.clear();
        self.buf.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{:.0}\" height=\"{:.0}\" viewBox=\"0 0 {:.0} {:.0}\">",
            size.width, size.height, size.width, size.height
        ));
        Ok(())
    }

    fn begin_tree(&mut self, size: Size, tree: &Tree) -> Result<()> {
        self.font_family = tree.style.font_family.clone();
        let background = Color::parse_or(&tree.style.background, Color::rgb(255, 255, 255));
        self.buf.push_str(&format!(
            "<rect width=\"{:.0}\" height=\"{:.0}\" fill=\"{}\"/>",
            size.width,
            size.height,
            background.to_css()
        ));
        self.buf.push_str("<g>");
        Ok(())
    }

    fn draw_clade_shade(&mut self, rect: Rect, color: Color) -> Result<()> {
        self.buf.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            color.to_css()
        ));
        Ok(())
    }

    fn draw_collapsed_triangle(&mut self, points: [Point; 3], color: Color) -> Result<()> {
        self.buf.push_str(&format!(
            "<path d=\"M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} Z\" fill=\"none\" stroke=\"{}\" stroke-width=\"1\"/>",
            points[0].x,
            points[0].y,
            points[1].x,
            points[1].y,
            points[2].x,
            points[2].y,
            color.to_css()
        ));
        Ok(())
    }

    fn draw_leaf_label(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.text(pos, text, font_size, color, "start");
        Ok(())
    }

    fn draw_node_value(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.text(pos, text, font_size, color, "start");
        Ok(())
    }

    fn draw_branch_value(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.text(pos, text, font_size, color, "middle");
        Ok(())
    }

    fn draw_clade_label(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.text(pos, text, font_size, color, "middle");
        Ok(())
    }

    fn draw_horizontal_branch(
        &mut self,
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    ) -> Result<()> {
        self.line(from, to, color, width);
        Ok(())
    }

    fn draw_vertical_branch(
        &mut self,
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    ) -> Result<()> {
        self.line(from, to, color, width);
        Ok(())
    }

    fn draw_branch_decoration(
        &mut self,
        center: Point,
        glyph: DecorationGlyph,
        color: Color,
        size: f32,
    ) -> Result<()> {
        let half = size / 2.0;
        match glyph {
            DecorationGlyph::Circle => {
                self.buf.push_str(&format!(
                    "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\"/>",
                    center.x,
                    center.y,
                    half,
                    color.to_css()
                ));
            }
            DecorationGlyph::Square => {
                self.buf.push_str(&format!(
                    "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
                    center.x - half,
                    center.y - half,
                    size,
                    size,
                    color.to_css()
                ));
            }
            DecorationGlyph::Diamond => {
                self.buf.push_str(&format!(
                    "<path d=\"M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2} Z\" fill=\"{}\"/>",
                    center.x,
                    center.y - half,
                    center.x + half,
                    center.y,
                    center.x,
                    center.y + half,
                    center.x - half,
                    center.y,
                    color.to_css()
                ));
            }
        }
        Ok(())
    }

    fn draw_scalebar(&mut self, start: Point, end: Point, label_pos: Point, label: &str)
    -> Result<()> {
        let color = Color::rgb(0x33, 0x33, 0x33);
        self.line(start, end, color, 2.0);
        let tick = 4.0;
        self.line(
            Point::new(start.x, start.y - tick),
            Point::new(start.x, start.y + tick),
            color,
            1.0,
        );
        self.line(
            Point::new(end.x, end.y - tick),
            Point::new(end.x, end.y + tick),
            color,
            1.0,
        );
        self.text(label_pos, label, 10.0, color, "middle");
        Ok(())
    }

    fn finish_tree(&mut self) -> Result<()> {
        self.buf.push_str("</g></svg>");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::newick::parse_newick;

    #[test]
    fn render_svg_basic() {
        let tree = parse_newick("((A:1,B:2)90/100:1,C:3);").unwrap();
        let svg = render_svg(&tree, &ExportOptions::default()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</g></svg>"));
        assert!(svg.contains(">A</text>"));
        assert!(svg.contains(">C</text>"));
    }

    #[test]
    fn labels_are_xml_escaped() {
        let tree = parse_newick("(A&b:1,C:1);").unwrap();
        let svg = render_svg(&tree, &ExportOptions::default()).unwrap();
        assert!(svg.contains("A&amp;b"));
    }
}
