//! Style records for trees, clades and branch decorations.
//!
//! These are plain configuration structs: colors are kept as strings and
//! parsed at draw time, so malformed values degrade to defaults instead of
//! failing a render.

use serde::{Deserialize, Serialize};

/// How the far corners of a collapsed-clade triangle are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollapseTrianglePolicy {
    /// Top corner at the deepest leaf, bottom corner at the shallowest.
    TopMax,
    /// Bottom corner at the deepest leaf, top corner at the shallowest.
    BottomMax,
    /// Both corners at the deepest leaf.
    AllMax,
    /// Both corners at a fixed width from the node.
    Constant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeStyle {
    /// Horizontal pixels per branch-length unit.
    pub x_scale: f64,
    /// Vertical pixels per external node band.
    pub y_scale: f64,
    /// Drawn length substituted for unspecified branch lengths.
    pub default_length: Option<f64>,
    pub font_family: String,
    pub leaf_font_size: f32,
    pub value_font_size: f32,
    pub clade_label_font_size: f32,
    pub scalebar_font_size: f32,
    pub show_leaf_labels: bool,
    pub show_node_values: bool,
    pub show_branch_values: bool,
    pub show_clade_labels: bool,
    pub show_scalebar: bool,
    /// Branch-length units covered by the scale bar; drawn only when positive.
    pub scalebar_value: f64,
    /// Neutral branch color, also used where per-clade colors are absent.
    pub branch_color: String,
    pub text_color: String,
    pub background: String,
    pub line_width: f32,
    pub margin: f32,
    pub label_padding: f32,
    pub triangle_policy: CollapseTrianglePolicy,
    /// Pixel width of collapse triangles under the `Constant` policy.
    pub triangle_width: f32,
    pub decorations: Vec<BranchDecorationStyle>,
}

impl Default for TreeStyle {
    fn default() -> Self {
        Self {
            x_scale: 60.0,
            y_scale: 20.0,
            default_length: None,
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            leaf_font_size: 12.0,
            value_font_size: 9.0,
            clade_label_font_size: 11.0,
            scalebar_font_size: 10.0,
            show_leaf_labels: true,
            show_node_values: false,
            show_branch_values: false,
            show_clade_labels: true,
            show_scalebar: false,
            scalebar_value: 0.0,
            branch_color: "#333333".to_string(),
            text_color: "#1c2430".to_string(),
            background: "#ffffff".to_string(),
            line_width: 1.4,
            margin: 12.0,
            label_padding: 6.0,
            triangle_policy: CollapseTrianglePolicy::TopMax,
            triangle_width: 24.0,
            decorations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CladeStyle {
    pub branch_color: Option<String>,
    pub leaf_color: Option<String>,
    pub clade_label: Option<String>,
    pub shade_color: Option<String>,
    pub collapsed: bool,
    /// Multiplier applied to the band height of every node in this subtree.
    pub y_scale: f64,
}

impl Default for CladeStyle {
    fn default() -> Self {
        Self {
            branch_color: None,
            leaf_color: None,
            clade_label: None,
            shade_color: None,
            collapsed: false,
            y_scale: 1.0,
        }
    }
}

/// Glyph drawn on branches whose support string matches a decoration pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecorationGlyph {
    Circle,
    Square,
    Diamond,
}

/// A branch decoration rule. `pattern` is a regular expression matched
/// against a clade's support string; invalid patterns are skipped at draw
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchDecorationStyle {
    pub pattern: String,
    pub glyph: DecorationGlyph,
    pub color: String,
    pub size: f32,
}
