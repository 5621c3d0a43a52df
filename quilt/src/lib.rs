use slotmap::{new_key_type, HopSlotMap, SecondaryMap};

use crate::region::Range;

pub use crate::apply::{ApplyError, Processor, Style};
pub use crate::copy::TreeCopy;
pub use crate::document::{BadLocation, Document};
pub use crate::edit::{Edit, EditKind, SourceModifier};
pub use crate::visitor::Visitor;

mod apply;
mod copy;
mod document;
mod edit;
#[cfg(feature = "fixtures")]
pub mod fixtures;
pub mod region;
#[cfg(test)]
mod tests;
mod undo;
mod visitor;

new_key_type! {
    /// Handle to a single edit stored in an [`EditTree`].
    ///
    /// Ids are plain copyable keys; two edits are "the same edit" exactly
    /// when their ids are equal, which is what lets move/copy partner links
    /// and the copier's identity map work without reference cycles.
    pub struct EditId;
}

/// A tree of non-overlapping, hierarchically grouped text edits.
///
/// Every edit lives in an arena owned by the tree and is addressed by an
/// [`EditId`]; parent and child links are ids, never references. A tree is
/// assembled from [`Edit`] descriptions, then executed against a
/// [`Document`] in one atomic pass:
///
/// ```
/// use quilt::{Edit, EditTree};
///
/// let mut document = String::from("org");
/// let mut tree = EditTree::new();
/// let root = tree.root();
/// tree.add(root, Edit::insert(0, "www."))?;
/// tree.add(root, Edit::insert(0, "rust-lang."))?;
///
/// let mut undo = tree.apply(&mut document)?;
/// assert_eq!(document, "www.rust-lang.org");
///
/// undo.apply(&mut document)?;
/// assert_eq!(document, "org");
/// # Ok::<(), quilt::ApplyError>(())
/// ```
///
/// The container maintains three invariants at mutation time, and the
/// processor re-verifies them before touching a document:
///
/// * a parent's region contains each child's region
/// * siblings are disjoint; the one exception is multiple insertion points
///   at the same offset, which apply in arrival order
/// * zero-length edits have no children (groups are exempt, their region is
///   derived from their children)
///
/// Violations surface as [`MalformedTree`] and leave the tree untouched.
pub struct EditTree {
    pub(crate) edits: HopSlotMap<EditId, EditData>,
    pub(crate) root: EditId,
}

pub(crate) struct EditData {
    pub(crate) offset: usize,
    pub(crate) length: usize,
    pub(crate) deleted: bool,
    /// Signed length change of this edit's subtree, valid between the
    /// document-updating and region-updating passes of an apply.
    pub(crate) delta: isize,
    pub(crate) parent: Option<EditId>,
    pub(crate) children: Vec<EditId>,
    pub(crate) kind: EditKind,
}

impl EditData {
    pub(crate) fn detached(edit: Edit) -> EditData {
        EditData {
            offset: edit.offset,
            length: edit.length,
            deleted: false,
            delta: 0,
            parent: None,
            children: Vec::new(),
            kind: edit.kind,
        }
    }

    /// The edit's region regardless of its deleted flag.
    pub(crate) fn span(&self) -> Range {
        self.offset..self.offset + self.length
    }

    /// A childless group has no region yet; it is exempt from coverage and
    /// sibling-disjointness checks until a child defines one.
    pub(crate) fn region_defined(&self) -> bool {
        !(self.kind.has_computed_region() && self.children.is_empty())
    }
}

impl EditTree {
    /// An empty tree whose root is a [`Edit::group`].
    pub fn new() -> EditTree {
        EditTree::with_root(Edit::group())
    }

    /// A tree rooted at an arbitrary edit, for the single-edit case where a
    /// grouping root would be noise.
    pub fn with_root(root: Edit) -> EditTree {
        let mut edits = HopSlotMap::with_key();
        let root = edits.insert(EditData::detached(root));
        EditTree { edits, root }
    }

    pub fn root(&self) -> EditId {
        self.root
    }

    /// Place an edit into the arena without attaching it to the tree.
    pub fn alloc(&mut self, edit: Edit) -> EditId {
        self.edits.insert(EditData::detached(edit))
    }

    /// [`alloc`](Self::alloc) followed by [`add_child`](Self::add_child).
    pub fn add(&mut self, parent: EditId, edit: Edit) -> Result<EditId, MalformedTree> {
        let child = self.alloc(edit);
        self.add_child(parent, child)?;
        Ok(child)
    }

    /// Attach a previously allocated, unparented edit under `parent`,
    /// keeping the children sorted by offset.
    ///
    /// Group ancestors grow to cover the newcomer. Anything that would break
    /// the tree invariants (an overlapping sibling, a region the parent
    /// cannot cover, a deleted or already-parented child, a zero-length
    /// parent) fails with [`MalformedTree`] before any link is made.
    pub fn add_child(&mut self, parent: EditId, child: EditId) -> Result<(), MalformedTree> {
        assert_ne!(parent, child, "an edit cannot be its own parent");
        let fault = |kind| MalformedTree {
            parent: Some(parent),
            child: Some(child),
            kind,
        };
        if self.edits[child].parent.is_some() {
            return Err(fault(MalformedKind::HasParent));
        }
        if self.edits[child].deleted {
            return Err(fault(MalformedKind::Deleted));
        }
        let parent_data = &self.edits[parent];
        if parent_data.length == 0 && !parent_data.kind.has_computed_region() {
            return Err(fault(MalformedKind::ZeroLengthParent));
        }
        let grown = if self.edits[child].region_defined() {
            self.plan_growth(parent, child)?
        } else {
            Vec::new()
        };
        let index = self.insertion_index(parent, child)?;
        for (id, region) in grown {
            let data = &mut self.edits[id];
            data.offset = region.start;
            data.length = region.len();
        }
        self.edits[parent].children.insert(index, child);
        self.edits[child].parent = Some(parent);
        Ok(())
    }

    /// Attach several children in order, stopping at the first failure.
    /// Children attached before the failure stay attached.
    pub fn add_children(
        &mut self,
        parent: EditId,
        children: impl IntoIterator<Item = EditId>,
    ) -> Result<(), MalformedTree> {
        for child in children {
            self.add_child(parent, child)?;
        }
        Ok(())
    }

    /// Detach and return the child at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; passing a bad index is a caller
    /// bug, not a recoverable tree fault.
    pub fn remove_child_at(&mut self, parent: EditId, index: usize) -> EditId {
        let child = self.edits[parent].children.remove(index);
        self.edits[child].parent = None;
        child
    }

    /// Detach `child` from `parent` if it is currently a child of it.
    pub fn remove_child(&mut self, parent: EditId, child: EditId) -> bool {
        let Some(index) = self.edits[parent].children.iter().position(|&c| c == child) else {
            return false;
        };
        self.remove_child_at(parent, index);
        true
    }

    /// Detach and return all children of `parent`.
    pub fn remove_children(&mut self, parent: EditId) -> Vec<EditId> {
        let children = std::mem::take(&mut self.edits[parent].children);
        for &child in &children {
            self.edits[child].parent = None;
        }
        children
    }

    /// Wire a move or copy source to its target. Both edits must be of the
    /// matching pair kinds and not yet paired.
    pub fn pair(&mut self, source: EditId, target: EditId) -> Result<(), MalformedTree> {
        let fault = || MalformedTree {
            parent: Some(source),
            child: Some(target),
            kind: MalformedKind::InvalidPair,
        };
        match (&self.edits[source].kind, &self.edits[target].kind) {
            (EditKind::MoveSource(data), EditKind::MoveTarget { source: back })
            | (EditKind::CopySource(data), EditKind::CopyTarget { source: back }) => {
                if data.target.is_some() || back.is_some() {
                    return Err(fault());
                }
            }
            _ => return Err(fault()),
        }
        match &mut self.edits[source].kind {
            EditKind::MoveSource(data) | EditKind::CopySource(data) => data.target = Some(target),
            _ => unreachable!(),
        }
        match &mut self.edits[target].kind {
            EditKind::MoveTarget { source: back } | EditKind::CopyTarget { source: back } => {
                *back = Some(source)
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    pub fn offset(&self, id: EditId) -> usize {
        self.edits[id].offset
    }

    pub fn length(&self, id: EditId) -> usize {
        self.edits[id].length
    }

    pub fn exclusive_end(&self, id: EditId) -> usize {
        self.edits[id].span().end
    }

    /// The edit's current region, or `None` once an enclosing change has
    /// deleted it.
    pub fn region(&self, id: EditId) -> Option<Range> {
        let data = &self.edits[id];
        (!data.deleted).then(|| data.span())
    }

    pub fn is_deleted(&self, id: EditId) -> bool {
        self.edits[id].deleted
    }

    pub fn kind(&self, id: EditId) -> &EditKind {
        &self.edits[id].kind
    }

    pub fn parent(&self, id: EditId) -> Option<EditId> {
        self.edits[id].parent
    }

    pub fn children(&self, id: EditId) -> &[EditId] {
        &self.edits[id].children
    }

    pub fn has_children(&self, id: EditId) -> bool {
        !self.edits[id].children.is_empty()
    }

    pub fn child_count(&self, id: EditId) -> usize {
        self.edits[id].children.len()
    }

    /// Does `outer`'s region contain `inner`'s? Deleted edits cover nothing
    /// and are covered by nothing.
    pub fn covers(&self, outer: EditId, inner: EditId) -> bool {
        if self.edits[outer].deleted || self.edits[inner].deleted {
            return false;
        }
        region::covers(&self.edits[outer].span(), &self.edits[inner].span())
    }

    /// The smallest region spanning every non-deleted edit in `edits`, or
    /// `None` if all of them are deleted.
    ///
    /// # Panics
    ///
    /// Panics on an empty slice; coverage of nothing is a caller bug.
    pub fn coverage(&self, edits: &[EditId]) -> Option<Range> {
        assert!(!edits.is_empty(), "coverage of an empty edit list");
        region::coverage(
            edits
                .iter()
                .map(|&id| &self.edits[id])
                .filter(|data| !data.deleted)
                .map(EditData::span),
        )
    }

    /// Where a newcomer belongs among `parent`'s sorted children, or an
    /// overlap fault. Arrival order breaks ties between insertion points at
    /// the same offset: the newcomer goes after existing ones.
    fn insertion_index(&self, parent: EditId, child: EditId) -> Result<usize, MalformedTree> {
        let children = &self.edits[parent].children;
        if children.is_empty() {
            return Ok(0);
        }
        let overlap = || MalformedTree {
            parent: Some(parent),
            child: Some(child),
            kind: MalformedKind::Overlap,
        };
        let defined = self.edits[child].region_defined();
        let conflicts = |other: EditId| {
            defined
                && self.edits[other].region_defined()
                && region::conflicts(&self.edits[other].span(), &self.edits[child].span())
        };
        let span = self.edits[child].span();
        // appending is the common construction order
        let last = *children.last().unwrap();
        if self.edits[last].span().end <= span.start && !conflicts(last) {
            return Ok(children.len());
        }
        let mut lo = 0;
        let mut hi = children.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if conflicts(children[mid]) {
                return Err(overlap());
            }
            if self.edits[children[mid]].span().start <= span.start {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Compute the region changes attaching `child` forces on `parent` and
    /// its group ancestors, without mutating anything. Each group's region
    /// is recomputed as the minimal coverage of its children with the
    /// changed child substituted in; non-group ancestors must already cover
    /// the result, and a regrown group must stay clear of its own siblings.
    fn plan_growth(
        &self,
        parent: EditId,
        child: EditId,
    ) -> Result<Vec<(EditId, Range)>, MalformedTree> {
        let mut grown = Vec::new();
        // the node whose region is about to change, and its new region
        let mut changed = (child, self.edits[child].span());
        let mut cur = parent;
        loop {
            let data = &self.edits[cur];
            let span = data.span();
            if !data.kind.has_computed_region() {
                if !region::covers(&span, &changed.1) {
                    return Err(MalformedTree {
                        parent: Some(cur),
                        child: Some(child),
                        kind: MalformedKind::NotCovered,
                    });
                }
                break;
            }
            let mut covered = changed.1.clone();
            for &existing in &data.children {
                if existing != changed.0 && self.edits[existing].region_defined() {
                    covered = region::union(&covered, &self.edits[existing].span());
                }
            }
            if covered == span {
                break;
            }
            if let Some(grandparent) = data.parent {
                for &sibling in &self.edits[grandparent].children {
                    if sibling == cur || !self.edits[sibling].region_defined() {
                        continue;
                    }
                    if region::conflicts(&covered, &self.edits[sibling].span()) {
                        return Err(MalformedTree {
                            parent: Some(grandparent),
                            child: Some(cur),
                            kind: MalformedKind::Overlap,
                        });
                    }
                }
            }
            grown.push((cur, covered.clone()));
            changed = (cur, covered);
            match data.parent {
                Some(grandparent) => cur = grandparent,
                None => break,
            }
        }
        Ok(grown)
    }

    pub(crate) fn adjust_length(&mut self, id: EditId, delta: isize) {
        let data = &mut self.edits[id];
        debug_assert!(data.length as isize + delta >= 0, "edit length underflow");
        data.length = (data.length as isize + delta) as usize;
    }

    pub(crate) fn shift(&mut self, id: EditId, delta: isize) {
        let data = &mut self.edits[id];
        debug_assert!(data.offset as isize + delta >= 0, "edit offset underflow");
        data.offset = (data.offset as isize + delta) as usize;
    }

    pub(crate) fn mark_deleted(&mut self, id: EditId) {
        self.edits[id].deleted = true;
    }

    /// Raw attachment for internally built trees (undo roots); skips the
    /// sorted-insertion and well-formedness machinery on purpose.
    pub(crate) fn attach_unchecked(&mut self, parent: EditId, child: EditId) {
        self.edits[child].parent = Some(parent);
        self.edits[parent].children.push(child);
    }

    pub(crate) fn set_span(&mut self, id: EditId, region: Range) {
        let data = &mut self.edits[id];
        data.offset = region.start;
        data.length = region.len();
    }
}

impl Default for EditTree {
    fn default() -> EditTree {
        EditTree::new()
    }
}

impl std::fmt::Debug for EditTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn node(
            tree: &EditTree,
            id: EditId,
            depth: usize,
            f: &mut std::fmt::Formatter<'_>,
        ) -> std::fmt::Result {
            let data = &tree.edits[id];
            write!(f, "{:indent$}{}", "", data.kind.name(), indent = depth * 2)?;
            if data.deleted {
                writeln!(f, " deleted")?;
            } else {
                writeln!(f, " {:?}", data.span())?;
            }
            for &child in &data.children {
                node(tree, child, depth + 1, f)?;
            }
            Ok(())
        }
        node(self, self.root, 0, f)
    }
}

/// A structural invariant was violated while mutating or checking a tree.
///
/// Mutation faults leave the tree in its pre-attempt state; integrity-pass
/// faults leave the document untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("malformed edit tree: {kind}")]
pub struct MalformedTree {
    /// The parent (or would-be parent) edit involved, if any.
    pub parent: Option<EditId>,
    /// The offending child or partner edit, if any.
    pub child: Option<EditId>,
    pub kind: MalformedKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedKind {
    #[error("edit overlaps a sibling")]
    Overlap,
    #[error("parent region does not cover the child")]
    NotCovered,
    #[error("edit was deleted by a previous apply")]
    Deleted,
    #[error("zero-length edits cannot have children")]
    ZeroLengthParent,
    #[error("edit is already attached to a parent")]
    HasParent,
    #[error("move/copy edits must be paired source to target, exactly once")]
    InvalidPair,
    #[error("move/copy edit has no partner")]
    Unpaired,
    #[error("edit tree extends past the end of the document")]
    OutOfBounds,
}

// The copier needs an identity map keyed by the source tree's ids.
pub(crate) type IdMap = SecondaryMap<EditId, EditId>;
