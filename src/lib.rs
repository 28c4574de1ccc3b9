pub mod config;
pub mod draw;
pub mod geometry;
pub mod layout;
pub mod newick;
pub mod render;
pub mod style;
pub mod text_metrics;
pub mod tree;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
pub use cli::run;

pub use draw::{BranchColoring, ExportOptions, TreeBackend, draw_tree};
pub use layout::PositionManager;
pub use newick::{NewickError, parse_newick, write_newick};
pub use style::{CladeStyle, TreeStyle};
pub use tree::{Clade, CladeId, Tree, TreeError};
