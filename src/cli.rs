//! Command-line interface: read a Newick tree, optionally reroot and
//! ladderize it, and render to SVG, PNG or PDF.

use crate::config::load_config;
use crate::draw::ExportOptions;
use crate::newick::parse_newick;
use crate::render::{render_svg, write_output_svg};
use crate::tree::{CladeId, Tree};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "phyr", version, about = "Phylogenetic tree renderer")]
pub struct Args {
    /// Input Newick file, or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (style and render settings)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Reroot at the parent of this taxon before rendering
    #[arg(long = "reroot")]
    pub reroot: Option<String>,

    /// Split the reroot edge to produce a rooted (binary) tree
    #[arg(long = "rooted", requires = "reroot")]
    pub rooted: bool,

    /// Sort children by subtree length before rendering
    #[arg(long = "ladderize")]
    pub ladderize: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
    Pdf,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let input = read_input(args.input.as_deref())?;
    let mut tree = parse_newick(input.trim())?;
    tree.style = config.style.clone();

    if let Some(taxon) = args.reroot.as_deref() {
        let anchor = find_anchor(&tree, taxon)?;
        tree.reroot(anchor, args.rooted)?;
    }
    if args.ladderize {
        tree.order_by_length(false);
    }

    let options = ExportOptions::default();
    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&tree, &options)?;
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            render_png_output(&tree, &options, &output)?;
        }
        OutputFormat::Pdf => {
            let output = ensure_output(&args.output, "pdf")?;
            render_pdf_output(&tree, &options, &output, config.render.page_height)?;
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
fn render_png_output(tree: &Tree, options: &ExportOptions, output: &Path) -> Result<()> {
    crate::render::render_png(tree, options, output)
}

#[cfg(not(feature = "png"))]
fn render_png_output(_tree: &Tree, _options: &ExportOptions, _output: &Path) -> Result<()> {
    Err(anyhow::anyhow!(
        "PNG output not enabled (compile with the 'png' feature)"
    ))
}

#[cfg(feature = "pdf")]
fn render_pdf_output(
    tree: &Tree,
    options: &ExportOptions,
    output: &Path,
    page_height: f32,
) -> Result<()> {
    crate::render::render_pdf(tree, options, output, page_height)
}

#[cfg(not(feature = "pdf"))]
fn render_pdf_output(
    _tree: &Tree,
    _options: &ExportOptions,
    _output: &Path,
    _page_height: f32,
) -> Result<()> {
    Err(anyhow::anyhow!(
        "PDF output not enabled (compile with the 'pdf' feature)"
    ))
}

/// Reroot anchors must be internal, so a named taxon resolves to its
/// parent.
fn find_anchor(tree: &Tree, taxon: &str) -> Result<CladeId> {
    let leaf = tree
        .leaves()
        .find(|&id| tree[id].taxon.as_deref() == Some(taxon))
        .ok_or_else(|| anyhow::anyhow!("No leaf named {taxon:?} in input"))?;
    tree[leaf]
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot reroot a single-node tree"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Clade;

    #[test]
    fn anchor_resolves_to_the_taxon_parent() {
        let tree = parse_newick("((A:1,B:1)x:1,C:1);").unwrap();
        let anchor = find_anchor(&tree, "A").unwrap();
        let a = tree.leaves().next().unwrap();
        assert_eq!(tree[a].parent(), Some(anchor));
        assert!(find_anchor(&tree, "missing").is_err());
    }

    #[test]
    fn single_node_tree_cannot_anchor() {
        let tree = Tree::new(Clade::named("only"));
        assert!(find_anchor(&tree, "only").is_err());
    }
}
