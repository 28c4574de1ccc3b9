//! Rooted n-ary phylogenetic tree model.
//!
//! Clades are stored in a per-tree arena (`Vec<Clade>`) and referenced by
//! [CladeId]. Ownership flows strictly parent to children: a clade holds the
//! ids of its children and a non-owning id of its parent (`None` iff root).
//! Membership is resolved by a root-ward walk, so detached subtrees simply
//! become unreachable; their slots are reclaimed when a tree is rebuilt by a
//! copying operation such as [Tree::rerooted] or [Tree::clone_subtree].

use crate::style::{CladeStyle, TreeStyle};
use thiserror::Error;

/// Index of a clade in a tree's arena.
pub type CladeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("clade {0} is not part of this tree")]
    NotInTree(CladeId),
    #[error("cannot anchor a reroot on leaf {0}")]
    LeafAnchor(CladeId),
    #[error("cannot split the branch above an unrooted root")]
    UnrootedRootAnchor,
    #[error("cannot detach the root")]
    DetachRoot,
    #[error("sister swap needs two distinct clades")]
    IdenticalSisters,
    #[error("the root has no sisters")]
    RootSister,
    #[error("sister swap needs clades sharing a parent")]
    NotSisters,
}

/// A node of the tree together with the subtree it roots.
///
/// `length` is the branch length to the parent; `None` means unspecified,
/// which is distinct from `Some(0.0)`. `supports` is a confidence label
/// (conventionally `"x/y"`) meaningful on bipartitions only; the root never
/// carries one.
#[derive(Debug, Clone, Default)]
pub struct Clade {
    pub taxon: Option<String>,
    pub supports: Option<String>,
    pub length: Option<f64>,
    pub style: CladeStyle,
    children: Vec<CladeId>,
    parent: Option<CladeId>,
}

impl Clade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(taxon: impl Into<String>) -> Self {
        Self {
            taxon: Some(taxon.into()),
            ..Self::default()
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_supports(mut self, supports: impl Into<String>) -> Self {
        self.supports = Some(supports.into());
        self
    }

    pub fn children(&self) -> &[CladeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<CladeId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// External clades terminate the drawn topology: leaves and collapsed
    /// internal clades.
    pub fn is_external(&self) -> bool {
        self.is_leaf() || self.style.collapsed
    }

    /// Copy of the node's own data without any topology links.
    fn shallow(&self) -> Clade {
        Clade {
            taxon: self.taxon.clone(),
            supports: self.supports.clone(),
            length: self.length,
            style: self.style.clone(),
            children: Vec::new(),
            parent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    arena: Vec<Clade>,
    root: CladeId,
    pub style: TreeStyle,
}

impl Tree {
    pub fn new(mut root: Clade) -> Self {
        root.parent = None;
        Self {
            arena: vec![root],
            root: 0,
            style: TreeStyle::default(),
        }
    }

    pub fn with_style(mut self, style: TreeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn root(&self) -> CladeId {
        self.root
    }

    /// Size of the backing arena, including slots of detached subtrees.
    /// Used to dimension caches keyed by arena index.
    pub(crate) fn arena_size(&self) -> usize {
        self.arena.len()
    }

    /// Root with exactly two children is a rooted tree; three or more is the
    /// unrooted convention.
    pub fn is_rooted(&self) -> bool {
        self.arena[self.root].children.len() == 2
    }

    /// Whether `id` is reachable from the root of this tree.
    pub fn contains(&self, id: CladeId) -> bool {
        id < self.arena.len() && self.find_root(id) == self.root
    }

    /// Walks parent links up to the topmost ancestor of `id`.
    pub fn find_root(&self, id: CladeId) -> CladeId {
        let mut cur = id;
        while let Some(parent) = self.arena[cur].parent {
            cur = parent;
        }
        cur
    }

    /// Some clade with a collapsed strict ancestor is hidden from rendering.
    pub fn is_hidden(&self, id: CladeId) -> bool {
        let mut cur = self.arena[id].parent;
        while let Some(ancestor) = cur {
            if self.arena[ancestor].style.collapsed {
                return true;
            }
            cur = self.arena[ancestor].parent;
        }
        false
    }

    /// Adds `clade` as the last child of `parent`.
    ///
    /// Taking the clade by value means it cannot be owned by another tree;
    /// the only reportable precondition is parent membership.
    pub fn attach(&mut self, parent: CladeId, clade: Clade) -> Result<CladeId, TreeError> {
        if !self.contains(parent) {
            return Err(TreeError::NotInTree(parent));
        }
        Ok(self.push_child(parent, clade))
    }

    /// Removes `child` from its parent and returns the subtree as a new,
    /// compacted tree carrying a copy of this tree's style.
    pub fn detach(&mut self, child: CladeId) -> Result<Tree, TreeError> {
        if !self.contains(child) {
            return Err(TreeError::NotInTree(child));
        }
        let Some(parent) = self.arena[child].parent else {
            return Err(TreeError::DetachRoot);
        };
        let mut out = Tree::new(self.arena[child].shallow()).with_style(self.style.clone());
        let root = out.root;
        for &grandchild in &self.arena[child].children.clone() {
            self.copy_subtree(grandchild, &mut out, root);
        }
        self.arena[parent].children.retain(|&c| c != child);
        self.arena[child].parent = None;
        Ok(out)
    }

    /// Deep copy of the subtree rooted at `id` (Clone with descendants only).
    pub fn clone_subtree(&self, id: CladeId) -> Result<Tree, TreeError> {
        if !self.contains(id) {
            return Err(TreeError::NotInTree(id));
        }
        let mut out = Tree::new(self.arena[id].shallow()).with_style(self.style.clone());
        let root = out.root;
        for &child in &self.arena[id].children {
            self.copy_subtree(child, &mut out, root);
        }
        Ok(out)
    }

    /// Deep copy of the entire containing tree, returning the id that
    /// corresponds to `id` in the clone. Arena ids are stable across the
    /// copy, so the corresponding id is `id` itself.
    pub fn clone_whole(&self, id: CladeId) -> Result<(Tree, CladeId), TreeError> {
        if !self.contains(id) {
            return Err(TreeError::NotInTree(id));
        }
        Ok((self.clone(), id))
    }

    /// Lazy pre-order walk over all clades, root first. Restartable by
    /// calling again.
    pub fn clades(&self) -> PreOrder<'_> {
        PreOrder::from_root(self)
    }

    /// Lazy pre-order walk over the strict descendants of `id`, fresh each
    /// call.
    pub fn descendants(&self, id: CladeId) -> PreOrder<'_> {
        PreOrder::below(self, id)
    }

    /// Every internal (non-leaf) clade in pre-order, root first.
    pub fn bipartitions(&self) -> impl Iterator<Item = CladeId> + '_ {
        self.clades().filter(|&id| !self.arena[id].is_leaf())
    }

    /// Every leaf in pre-order.
    pub fn leaves(&self) -> impl Iterator<Item = CladeId> + '_ {
        self.clades().filter(|&id| self.arena[id].is_leaf())
    }

    /// External nodes in document order: leaves and collapsed clades, with
    /// everything beneath a collapsed clade excluded.
    pub fn external_nodes(&self) -> Vec<CladeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if self.arena[id].is_external() {
                out.push(id);
            } else {
                for &child in self.arena[id].children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }

    pub fn leaves_count(&self, id: CladeId) -> usize {
        if self.arena[id].is_leaf() {
            return 1;
        }
        self.descendants(id)
            .filter(|&d| self.arena[d].is_leaf())
            .count()
    }

    /// Cumulative branch length from the root down to and including `id`.
    ///
    /// Returns `None` if any segment on the path is unspecified and no
    /// `fallback` is given; otherwise the fallback substitutes per segment.
    /// The root itself contributes nothing.
    pub fn total_branch_length(&self, id: CladeId, fallback: Option<f64>) -> Option<f64> {
        let mut total = 0.0;
        let mut cur = id;
        while self.arena[cur].parent.is_some() {
            total += self.arena[cur].length.or(fallback)?;
            cur = self.arena[cur].parent.expect("checked above");
        }
        Some(total)
    }

    /// Root-to-node child-index path, O(depth).
    pub fn path_indices(&self, id: CladeId) -> Result<Vec<usize>, TreeError> {
        if !self.contains(id) {
            return Err(TreeError::NotInTree(id));
        }
        let mut path = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.arena[cur].parent {
            let idx = self.arena[parent]
                .children
                .iter()
                .position(|&c| c == cur)
                .expect("parent lists every child");
            path.push(idx);
            cur = parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Swaps the positions of two sister clades in their parent's child
    /// list. Self-inverse.
    pub fn swap_sisters(&mut self, a: CladeId, b: CladeId) -> Result<(), TreeError> {
        if a == b {
            return Err(TreeError::IdenticalSisters);
        }
        for id in [a, b] {
            if !self.contains(id) {
                return Err(TreeError::NotInTree(id));
            }
        }
        let pa = self.arena[a].parent.ok_or(TreeError::RootSister)?;
        let pb = self.arena[b].parent.ok_or(TreeError::RootSister)?;
        if pa != pb {
            return Err(TreeError::NotSisters);
        }
        let children = &mut self.arena[pa].children;
        let ia = children.iter().position(|&c| c == a).expect("sister of a");
        let ib = children.iter().position(|&c| c == b).expect("sister of b");
        children.swap(ia, ib);
        Ok(())
    }

    /// Recursively, stably sorts every internal node's children by the
    /// maximum cumulative leaf length of the subtree (unspecified lengths
    /// count as 0), producing a canonical ladderized ordering. Idempotent.
    pub fn order_by_length(&mut self, descending: bool) {
        let ids: Vec<CladeId> = self.clades().collect();
        let mut depth = vec![0.0f64; self.arena.len()];
        // Reversed pre-order visits children before parents.
        for &id in ids.iter().rev() {
            let below = self.arena[id]
                .children
                .iter()
                .map(|&c| depth[c])
                .fold(0.0f64, f64::max);
            depth[id] = self.arena[id].length.unwrap_or(0.0) + below;
        }
        for &id in &ids {
            self.arena[id].children.sort_by(|&x, &y| {
                let ord = depth[x]
                    .partial_cmp(&depth[y])
                    .unwrap_or(std::cmp::Ordering::Equal);
                if descending { ord.reverse() } else { ord }
            });
        }
    }

    /// Copy-returning reroot. See [Tree::reroot] for the in-place variant.
    ///
    /// With `as_rooted` the edge above `anchor` is split in half and a fresh
    /// binary root placed on it; both halves keep the edge's support label.
    /// Without it the anchor's parent becomes the new root: the anchor keeps
    /// its own edge data as the first child, the parent's remaining children
    /// follow, and the ancestor chain is reversed edge by edge, each reversed
    /// edge keeping its length and support on its new child side. A rooted
    /// old root left with a single child is spliced out, the two half-edges
    /// merging by summing their specified lengths.
    pub fn rerooted(&self, anchor: CladeId, as_rooted: bool) -> Result<Tree, TreeError> {
        if !self.contains(anchor) {
            return Err(TreeError::NotInTree(anchor));
        }
        if self.arena[anchor].is_leaf() {
            return Err(TreeError::LeafAnchor(anchor));
        }
        if anchor == self.root {
            if as_rooted && self.arena[anchor].children.len() > 2 {
                return Err(TreeError::UnrootedRootAnchor);
            }
            return Ok(self.clone());
        }
        let parent = self.arena[anchor].parent.expect("non-root anchor");

        let mut out;
        if as_rooted {
            let half = self.arena[anchor].length.map(|l| l / 2.0);
            let supports = self.arena[anchor].supports.clone();
            out = Tree::new(Clade::new()).with_style(self.style.clone());
            let root = out.root;
            let top = self.copy_subtree(anchor, &mut out, root);
            out.arena[top].length = half;
            out.arena[top].supports = supports.clone();
            self.rehang(parent, anchor, half, supports, &mut out, root);
        } else {
            let mut root_clade = self.arena[parent].shallow();
            root_clade.length = None;
            root_clade.supports = None;
            out = Tree::new(root_clade).with_style(self.style.clone());
            let root = out.root;
            self.copy_subtree(anchor, &mut out, root);
            for &child in &self.arena[parent].children {
                if child != anchor {
                    self.copy_subtree(child, &mut out, root);
                }
            }
            if let Some(grand) = self.arena[parent].parent {
                self.rehang(
                    grand,
                    parent,
                    self.arena[parent].length,
                    self.arena[parent].supports.clone(),
                    &mut out,
                    root,
                );
            }
        }
        Ok(out)
    }

    /// In-place reroot: the whole tree is wholesale-replaced by the rerooted
    /// copy, never mutated node by node.
    pub fn reroot(&mut self, anchor: CladeId, as_rooted: bool) -> Result<(), TreeError> {
        *self = self.rerooted(anchor, as_rooted)?;
        Ok(())
    }

    fn push_child(&mut self, parent: CladeId, mut clade: Clade) -> CladeId {
        let id = self.arena.len();
        clade.parent = Some(parent);
        clade.children.clear();
        self.arena.push(clade);
        self.arena[parent].children.push(id);
        id
    }

    fn copy_subtree(&self, src: CladeId, out: &mut Tree, parent: CladeId) -> CladeId {
        let id = out.push_child(parent, self.arena[src].shallow());
        for &child in &self.arena[src].children {
            self.copy_subtree(child, out, id);
        }
        id
    }

    /// Re-hangs `node` beneath `attach_to` while reversing the edge towards
    /// `came_from`; `edge_length`/`edge_supports` are the reversed edge's
    /// data, which now lives on `node`'s new child side. Recurses up the old
    /// parent chain.
    fn rehang(
        &self,
        node: CladeId,
        came_from: CladeId,
        edge_length: Option<f64>,
        edge_supports: Option<String>,
        out: &mut Tree,
        attach_to: CladeId,
    ) {
        let others: Vec<CladeId> = self.arena[node]
            .children
            .iter()
            .copied()
            .filter(|&c| c != came_from)
            .collect();
        let parent = self.arena[node].parent;

        if parent.is_none() && others.len() == 1 {
            // Old rooted root: splice it out, merging the two half-edges of
            // the branch it used to subdivide.
            let child = others[0];
            let merged_length = match (edge_length, self.arena[child].length) {
                (Some(a), Some(b)) => Some(a + b),
                (a, b) => a.or(b),
            };
            let merged_supports = self.arena[child].supports.clone().or(edge_supports);
            let id = self.copy_subtree(child, out, attach_to);
            out.arena[id].length = merged_length;
            out.arena[id].supports = merged_supports;
            return;
        }

        let mut clade = self.arena[node].shallow();
        clade.length = edge_length;
        clade.supports = edge_supports;
        let id = out.push_child(attach_to, clade);
        for &c in &others {
            self.copy_subtree(c, out, id);
        }
        if let Some(p) = parent {
            self.rehang(
                p,
                node,
                self.arena[node].length,
                self.arena[node].supports.clone(),
                out,
                id,
            );
        }
    }
}

impl std::ops::Index<CladeId> for Tree {
    type Output = Clade;

    fn index(&self, id: CladeId) -> &Clade {
        &self.arena[id]
    }
}

impl std::ops::IndexMut<CladeId> for Tree {
    fn index_mut(&mut self, id: CladeId) -> &mut Clade {
        &mut self.arena[id]
    }
}

/// Stack-based lazy pre-order iterator.
pub struct PreOrder<'a> {
    tree: &'a Tree,
    stack: Vec<CladeId>,
}

impl<'a> PreOrder<'a> {
    fn from_root(tree: &'a Tree) -> Self {
        Self {
            tree,
            stack: vec![tree.root],
        }
    }

    fn below(tree: &'a Tree, id: CladeId) -> Self {
        let stack = tree.arena[id].children.iter().rev().copied().collect();
        Self { tree, stack }
    }
}

impl Iterator for PreOrder<'_> {
    type Item = CladeId;

    fn next(&mut self) -> Option<CladeId> {
        let id = self.stack.pop()?;
        for &child in self.tree.arena[id].children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caterpillar() -> (Tree, CladeId, CladeId, CladeId) {
        // ((A,B)X,C)
        let mut tree = Tree::new(Clade::new());
        let root = tree.root();
        let x = tree.attach(root, Clade::new().with_length(1.0)).unwrap();
        let a = tree.attach(x, Clade::named("A").with_length(2.0)).unwrap();
        let _b = tree.attach(x, Clade::named("B").with_length(3.0)).unwrap();
        let c = tree.attach(root, Clade::named("C").with_length(4.0)).unwrap();
        (tree, x, a, c)
    }

    #[test]
    fn attach_rejects_foreign_parent() {
        let mut tree = Tree::new(Clade::new());
        let err = tree.attach(99, Clade::named("X")).unwrap_err();
        assert_eq!(err, TreeError::NotInTree(99));
    }

    #[test]
    fn detach_extracts_subtree() {
        let (mut tree, x, _a, _c) = caterpillar();
        let sub = tree.detach(x).unwrap();
        assert_eq!(sub.leaves_count(sub.root()), 2);
        assert_eq!(tree.leaves_count(tree.root()), 1);
        assert!(!tree.contains(x));
    }

    #[test]
    fn detach_root_fails() {
        let (mut tree, ..) = caterpillar();
        let root = tree.root();
        assert_eq!(tree.detach(root).unwrap_err(), TreeError::DetachRoot);
    }

    #[test]
    fn path_indices_walks_from_root() {
        let (tree, _x, a, c) = caterpillar();
        assert_eq!(tree.path_indices(a).unwrap(), vec![0, 0]);
        assert_eq!(tree.path_indices(c).unwrap(), vec![1]);
        assert_eq!(tree.path_indices(tree.root()).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn total_branch_length_respects_fallback() {
        let mut tree = Tree::new(Clade::new());
        let root = tree.root();
        let inner = tree.attach(root, Clade::new()).unwrap(); // unspecified
        let leaf = tree.attach(inner, Clade::named("A").with_length(2.0)).unwrap();
        assert_eq!(tree.total_branch_length(leaf, None), None);
        assert_eq!(tree.total_branch_length(leaf, Some(0.5)), Some(2.5));
        assert_eq!(tree.total_branch_length(root, None), Some(0.0));
    }

    #[test]
    fn swap_sisters_preconditions() {
        let (mut tree, x, a, c) = caterpillar();
        assert_eq!(tree.swap_sisters(a, a).unwrap_err(), TreeError::IdenticalSisters);
        assert_eq!(tree.swap_sisters(a, c).unwrap_err(), TreeError::NotSisters);
        assert_eq!(
            tree.swap_sisters(tree.root(), c).unwrap_err(),
            TreeError::RootSister
        );
        tree.swap_sisters(x, c).unwrap();
        assert_eq!(tree[tree.root()].children(), &[c, x]);
    }

    #[test]
    fn descendants_exclude_self() {
        let (tree, x, ..) = caterpillar();
        let below: Vec<CladeId> = tree.descendants(x).collect();
        assert_eq!(below.len(), 2);
        assert!(!below.contains(&x));
    }

    #[test]
    fn order_by_length_ladderizes() {
        let (mut tree, x, _a, c) = caterpillar();
        // Depths below root: x -> 1 + max(2, 3) = 4, c -> 4; stable order kept.
        tree.order_by_length(false);
        assert_eq!(tree[tree.root()].children(), &[x, c]);
        tree.order_by_length(true);
        let first = tree[tree.root()].children().to_vec();
        tree.order_by_length(true);
        assert_eq!(tree[tree.root()].children(), &first[..]);
    }

    #[test]
    fn reroot_rejects_leaf_and_unrooted_root() {
        let (tree, _x, a, _c) = caterpillar();
        assert_eq!(tree.rerooted(a, false).unwrap_err(), TreeError::LeafAnchor(a));
        let mut unrooted = Tree::new(Clade::new());
        let root = unrooted.root();
        for name in ["A", "B", "C"] {
            unrooted.attach(root, Clade::named(name)).unwrap();
        }
        assert_eq!(
            unrooted.rerooted(root, true).unwrap_err(),
            TreeError::UnrootedRootAnchor
        );
        assert!(unrooted.rerooted(root, false).is_ok());
    }

    #[test]
    fn rooted_split_halves_the_edge() {
        let (tree, x, ..) = caterpillar();
        let rooted = tree.rerooted(x, true).unwrap();
        assert!(rooted.is_rooted());
        let root = rooted.root();
        let first = rooted[root].children()[0];
        assert_eq!(rooted[first].length, Some(0.5));
        // Old root was binary, so it spliced out: the far side merges the
        // other half with C's branch.
        let second = rooted[root].children()[1];
        assert_eq!(rooted[second].length, Some(0.5 + 4.0));
    }

    #[test]
    fn hidden_tracks_collapsed_ancestors() {
        let (mut tree, x, a, c) = caterpillar();
        assert!(!tree.is_hidden(a));
        tree[x].style.collapsed = true;
        assert!(tree.is_hidden(a));
        assert!(!tree.is_hidden(x));
        assert!(!tree.is_hidden(c));
        let externals = tree.external_nodes();
        assert_eq!(externals, vec![x, c]);
    }
}
