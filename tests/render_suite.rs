use phylorender::render::render_svg;
use phylorender::style::{BranchDecorationStyle, DecorationGlyph};
use phylorender::{BranchColoring, ExportOptions, Tree, parse_newick};

const FIXTURE: &str =
    "(A:2,((BAA:5,BAB:3)20/30:1,((BBAA:2,BBAB:1)85/95:1,BBB:3)100/100:2)30/45:2,C:1);";

fn fixture_tree() -> Tree {
    parse_newick(FIXTURE).unwrap()
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn svg_covers_every_visible_element() {
    let svg = render_svg(&fixture_tree(), &ExportOptions::default()).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.ends_with("</g></svg>"));
    for taxon in ["A", "BAA", "BAB", "BBAA", "BBAB", "BBB", "C"] {
        assert!(svg.contains(&format!(">{taxon}</text>")), "missing {taxon}");
    }
    // 12 horizontal branches (one per clade). Verticals: every clade with
    // sisters except the middle child of the root's three, which aligns
    // with its parent: 10.
    assert_eq!(count(&svg, "<line "), 22);
}

#[test]
fn collapsed_clades_render_triangles_not_leaves() {
    let mut tree = fixture_tree();
    let clade = tree
        .clades()
        .find(|&id| tree[id].supports.as_deref() == Some("100/100"))
        .unwrap();
    tree[clade].style.collapsed = true;
    let svg = render_svg(&tree, &ExportOptions::default()).unwrap();
    assert_eq!(count(&svg, "<path "), 1);
    for hidden in ["BBAA", "BBAB", "BBB"] {
        assert!(!svg.contains(&format!(">{hidden}</text>")));
    }
}

#[test]
fn branch_coloring_option_selects_axes() {
    let mut tree = fixture_tree();
    let a = tree
        .leaves()
        .find(|&id| tree[id].taxon.as_deref() == Some("A"))
        .unwrap();
    tree[a].style.branch_color = Some("#ff0000".to_string());

    let both = render_svg(
        &tree,
        &ExportOptions {
            branch_coloring: BranchColoring::Both,
        },
    )
    .unwrap();
    assert_eq!(count(&both, "stroke=\"#ff0000\""), 2);

    let horizontal = render_svg(
        &tree,
        &ExportOptions {
            branch_coloring: BranchColoring::Horizontal,
        },
    )
    .unwrap();
    assert_eq!(count(&horizontal, "stroke=\"#ff0000\""), 1);

    let neither = render_svg(
        &tree,
        &ExportOptions {
            branch_coloring: BranchColoring::Neither,
        },
    )
    .unwrap();
    assert_eq!(count(&neither, "stroke=\"#ff0000\""), 0);
}

#[test]
fn malformed_colors_degrade_to_defaults() {
    let mut tree = fixture_tree();
    tree.style.branch_color = "definitely-not-a-color".to_string();
    let root = tree.root();
    tree[root].style.shade_color = Some("also-broken".to_string());
    let svg = render_svg(&tree, &ExportOptions::default()).unwrap();
    // Neutral falls back to black; the render itself never fails.
    assert!(svg.contains("stroke=\"#000000\""));
}

#[test]
fn decorations_and_values_follow_supports() {
    let mut tree = fixture_tree();
    tree.style.show_branch_values = true;
    tree.style.decorations.push(BranchDecorationStyle {
        pattern: "^100/".to_string(),
        glyph: DecorationGlyph::Diamond,
        color: "#0000ff".to_string(),
        size: 5.0,
    });
    let svg = render_svg(&tree, &ExportOptions::default()).unwrap();
    assert_eq!(count(&svg, "fill=\"#0000ff\""), 1);
    for supports in ["20/30", "85/95", "100/100", "30/45"] {
        assert!(svg.contains(&format!(">{supports}</text>")));
    }
}

#[test]
fn scalebar_draws_when_positive() {
    let mut tree = fixture_tree();
    tree.style.show_scalebar = true;
    tree.style.scalebar_value = 2.0;
    let svg = render_svg(&tree, &ExportOptions::default()).unwrap();
    assert!(svg.contains(">2</text>"));
    // Bar, two ticks and the branches.
    assert_eq!(count(&svg, "<line "), 22 + 3);
}

#[test]
fn single_node_tree_renders() {
    let tree = Tree::new(phylorender::Clade::named("only"));
    let svg = render_svg(&tree, &ExportOptions::default()).unwrap();
    assert!(svg.contains(">only</text>"));
}

#[cfg(feature = "png")]
#[test]
fn png_backend_writes_a_file() {
    let path = std::env::temp_dir().join("phylorender_render_suite.png");
    phylorender::render::render_png(&fixture_tree(), &ExportOptions::default(), &path).unwrap();
    let metadata = std::fs::metadata(&path).unwrap();
    assert!(metadata.len() > 0);
    let _ = std::fs::remove_file(&path);
}

#[cfg(feature = "pdf")]
#[test]
fn pdf_backend_writes_pages() {
    let path = std::env::temp_dir().join("phylorender_render_suite.pdf");
    // A page height smaller than the document forces pagination.
    phylorender::render::render_pdf(&fixture_tree(), &ExportOptions::default(), &path, 60.0)
        .unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    let _ = std::fs::remove_file(&path);
}
