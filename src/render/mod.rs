//! The three concrete backends: vector (SVG), paginated (PDF) and raster
//! (PNG). All consume identical PositionManager coordinates through the
//! [crate::draw::TreeBackend] contract.

#[cfg(feature = "pdf")]
mod pdf;
#[cfg(feature = "png")]
mod raster;
mod svg;

#[cfg(feature = "pdf")]
pub use pdf::{PdfBackend, render_pdf};
#[cfg(feature = "png")]
pub use raster::{PngBackend, render_png};
pub use svg::{SvgBackend, render_svg};

use anyhow::Result;
use std::path::Path;

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
