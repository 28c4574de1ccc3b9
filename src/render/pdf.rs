//! Paginated backend: one printpdf page per vertical tile of the document.
//!
//! Each element is routed to the page containing its representative y
//! coordinate; elements keep their horizontal position and are shifted into
//! the page-local frame. PDF pages have a bottom-left origin, so local y
//! coordinates are flipped.

use crate::draw::{ExportOptions, TreeBackend, draw_tree};
use crate::geometry::{Color, Point, Rect, Size};
use crate::layout::PositionManager;
use crate::style::DecorationGlyph;
use crate::tree::Tree;
use anyhow::Result;
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex,
    PdfLayerReference, PdfPageIndex, Rgb, TextRenderingMode,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const PX_TO_MM: f32 = 0.264583;

/// Renders `tree` to a paginated PDF at `output`. `page_height` is the tile
/// height in document pixels.
pub fn render_pdf(
    tree: &Tree,
    options: &ExportOptions,
    output: &Path,
    page_height: f32,
) -> Result<()> {
    let mut positions = PositionManager::new();
    let mut backend = PdfBackend::new(output, page_height);
    draw_tree(tree, &mut positions, options, &mut backend)
}

pub struct PdfBackend {
    output: PathBuf,
    page_height: f32,
    doc: Option<PdfDocumentReference>,
    font: Option<IndirectFontRef>,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    size: Size,
}

impl PdfBackend {
    pub fn new(output: impl Into<PathBuf>, page_height: f32) -> Self {
        Self {
            output: output.into(),
            page_height: page_height.max(1.0),
            doc: None,
            font: None,
            pages: Vec::new(),
            size: Size::default(),
        }
    }

    fn page_of(&self, y: f32) -> usize {
        let page = (y / self.page_height).floor() as isize;
        page.clamp(0, self.pages.len() as isize - 1) as usize
    }

    fn layer(&self, page: usize) -> PdfLayerReference {
        let doc = self.doc.as_ref().expect("document initialized");
        let (page_index, layer_index) = self.pages[page];
        doc.get_page(page_index).get_layer(layer_index)
    }

    /// Maps a document point into the page-local PDF frame (mm,
    /// bottom-left origin).
    fn to_page_mm(&self, page: usize, point: Point) -> (Mm, Mm) {
        let local_y = point.y - page as f32 * self.page_height;
        (
            Mm((point.x * PX_TO_MM) as f64),
            Mm(((self.page_height - local_y) * PX_TO_MM) as f64),
        )
    }

    fn to_page(&self, page: usize, point: Point) -> printpdf::Point {
        let (x, y) = self.to_page_mm(page, point);
        printpdf::Point::new(x, y)
    }

    fn stroke(&self, page: usize, points: Vec<Point>, closed: bool, color: Color, width: f32) {
        let layer = self.layer(page);
        let (r, g, b) = color.to_rgb_f64();
        layer.set_outline_color(printpdf::Color::Rgb(Rgb::new(r, g, b, None)));
        layer.set_outline_thickness((width * PX_TO_MM) as f64);
        layer.add_shape(Line {
            points: points
                .into_iter()
                .map(|p| (self.to_page(page, p), false))
                .collect(),
            is_closed: closed,
            has_fill: false,
            has_stroke: true,
            is_clipping_path: false,
        });
    }

    fn fill(&self, page: usize, points: Vec<Point>, color: Color) {
        let layer = self.layer(page);
        let (r, g, b) = color.to_rgb_f64();
        layer.set_fill_color(printpdf::Color::Rgb(Rgb::new(r, g, b, None)));
        layer.add_shape(Line {
            points: points
                .into_iter()
                .map(|p| (self.to_page(page, p), false))
                .collect(),
            is_closed: true,
            has_fill: true,
            has_stroke: false,
            is_clipping_path: false,
        });
    }

    fn text(&self, page: usize, pos: Point, text: &str, font_size: f32, color: Color) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let layer = self.layer(page);
        let (r, g, b) = color.to_rgb_f64();
        let (x, y) = self.to_page_mm(page, pos);
        layer.begin_text_section();
        layer.set_font(font, font_size as f64);
        layer.set_fill_color(printpdf::Color::Rgb(Rgb::new(r, g, b, None)));
        layer.set_text_rendering_mode(TextRenderingMode::Fill);
        layer.set_text_cursor(x, y);
        layer.write_text(text, font);
        layer.end_text_section();
    }

    fn rect_points(rect: Rect) -> Vec<Point> {
        vec![
            Point::new(rect.x, rect.y),
            Point::new(rect.right(), rect.y),
            Point::new(rect.right(), rect.bottom()),
            Point::new(rect.x, rect.bottom()),
        ]
    }
}

impl TreeBackend for PdfBackend {
    fn init_document(&mut self, size: Size) -> Result<()> {
        self.size = size;
        let doc = PdfDocument::empty("phylorender");
        self.font = doc.add_builtin_font(BuiltinFont::Helvetica).ok();
        let page_count = ((size.height / self.page_height).ceil() as usize).max(1);
        let width_mm = Mm((size.width.max(1.0) * PX_TO_MM) as f64);
        let height_mm = Mm((self.page_height * PX_TO_MM) as f64);
        self.pages = (0..page_count)
            .map(|index| doc.add_page(width_mm, height_mm, format!("page {}", index + 1)))
            .collect();
        self.doc = Some(doc);
        Ok(())
    }

    fn begin_tree(&mut self, _size: Size, _tree: &Tree) -> Result<()> {
        Ok(())
    }

    fn draw_clade_shade(&mut self, rect: Rect, color: Color) -> Result<()> {
        let page = self.page_of(rect.y + rect.height / 2.0);
        self.fill(page, Self::rect_points(rect), color);
        Ok(())
    }

    fn draw_collapsed_triangle(&mut self, points: [Point; 3], color: Color) -> Result<()> {
        let page = self.page_of(points[0].y);
        self.stroke(page, points.to_vec(), true, color, 1.0);
        Ok(())
    }

    fn draw_leaf_label(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.text(self.page_of(pos.y), pos, text, font_size, color);
        Ok(())
    }

    fn draw_node_value(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.text(self.page_of(pos.y), pos, text, font_size, color);
        Ok(())
    }

    fn draw_branch_value(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.text(self.page_of(pos.y), pos, text, font_size, color);
        Ok(())
    }

    fn draw_clade_label(
        &mut self,
        pos: Point,
        text: &str,
        font_size: f32,
        color: Color,
    ) -> Result<()> {
        self.text(self.page_of(pos.y), pos, text, font_size, color);
        Ok(())
    }

    fn draw_horizontal_branch(
        &mut self,
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    ) -> Result<()> {
        let page = self.page_of((from.y + to.y) / 2.0);
        self.stroke(page, vec![from, to], false, color, width);
        Ok(())
    }

    fn draw_vertical_branch(
        &mut self,
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    ) -> Result<()> {
        let page = self.page_of((from.y + to.y) / 2.0);
        self.stroke(page, vec![from, to], false, color, width);
        Ok(())
    }

    fn draw_branch_decoration(
        &mut self,
        center: Point,
        glyph: DecorationGlyph,
        color: Color,
        size: f32,
    ) -> Result<()> {
        let page = self.page_of(center.y);
        let half = size / 2.0;
        let points = match glyph {
            // Circles approximate as squares at glyph sizes.
            DecorationGlyph::Circle | DecorationGlyph::Square => Self::rect_points(Rect::new(
                center.x - half,
                center.y - half,
                size,
                size,
            )),
            DecorationGlyph::Diamond => vec![
                Point::new(center.x, center.y - half),
                Point::new(center.x + half, center.y),
                Point::new(center.x, center.y + half),
                Point::new(center.x - half, center.y),
            ],
        };
        self.fill(page, points, color);
        Ok(())
    }

    fn draw_scalebar(&mut self, start: Point, end: Point, label_pos: Point, label: &str)
    -> Result<()> {
        let color = Color::rgb(0x33, 0x33, 0x33);
        let page = self.page_of(start.y);
        self.stroke(page, vec![start, end], false, color, 2.0);
        let tick = 4.0;
        for x in [start.x, end.x] {
            self.stroke(
                page,
                vec![Point::new(x, start.y - tick), Point::new(x, start.y + tick)],
                false,
                color,
                1.0,
            );
        }
        self.text(page, label_pos, label, 10.0, color);
        Ok(())
    }

    fn finish_tree(&mut self) -> Result<()> {
        let doc = self.doc.take().expect("document initialized");
        let mut out = BufWriter::new(File::create(&self.output)?);
        doc.save(&mut out)?;
        Ok(())
    }
}
