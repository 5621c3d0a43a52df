use slotmap::HopSlotMap;

use crate::edit::EditKind;
use crate::region::{self, Range};
use crate::{Edit, EditData, EditId, EditTree, IdMap};

/// A deep copy of (part of) an edit tree, plus the identity map from
/// original ids to their copies.
pub struct TreeCopy {
    pub tree: EditTree,
    map: IdMap,
}

impl TreeCopy {
    /// The copy of `original`, or `None` if it was outside the copied
    /// subtree.
    pub fn copy_of(&self, original: EditId) -> Option<EditId> {
        self.map.get(original).copied()
    }
}

impl EditTree {
    /// Deep-copy the whole tree. Regions, text, and modifier handles are
    /// carried over; deltas are reset and lifted move/copy content is not.
    /// Move/copy partner links are rewired to point at the copied partner.
    pub fn copy(&self) -> TreeCopy {
        self.copy_subtree(self.root)
    }

    /// Deep-copy the subtree rooted at `root` into a fresh tree.
    ///
    /// A move/copy edit whose partner lies outside the subtree comes out
    /// unpaired: ids from this tree's arena mean nothing in the copy's, so
    /// there is no stale partner to carry. Applying such a copy fails the
    /// integrity pass until it is re-paired.
    pub fn copy_subtree(&self, root: EditId) -> TreeCopy {
        let mut edits = HopSlotMap::with_key();
        let mut map = IdMap::new();
        let root = clone_subtree(self, root, 0, &mut edits, &mut map);
        let mut tree = EditTree { edits, root };
        rewire_pairs(&mut tree, &map);
        TreeCopy { tree, map }
    }

    /// Copies of `parent`'s children with their regions rebased to the start
    /// of `parent`'s region, under a fresh group root. This is the scratch
    /// tree the source-computation pass runs against a lifted region.
    pub(crate) fn copy_children_shifted(&self, parent: EditId) -> EditTree {
        let base = self.edits[parent].offset;
        let mut edits = HopSlotMap::with_key();
        let root = edits.insert(EditData::detached(Edit::group()));
        let mut tree = EditTree { edits, root };
        let mut map = IdMap::new();
        for &child in &self.edits[parent].children {
            let copy = clone_subtree(self, child, base, &mut tree.edits, &mut map);
            tree.attach_unchecked(root, copy);
        }
        let spans: Vec<Range> = tree.edits[root]
            .children
            .iter()
            .map(|&child| tree.edits[child].span())
            .collect();
        if let Some(covered) = region::coverage(spans) {
            tree.set_span(root, covered);
        }
        rewire_pairs(&mut tree, &map);
        tree
    }
}

fn clone_subtree(
    source: &EditTree,
    id: EditId,
    shift: usize,
    arena: &mut HopSlotMap<EditId, EditData>,
    map: &mut IdMap,
) -> EditId {
    let data = &source.edits[id];
    let copy = arena.insert(EditData {
        offset: data.offset - shift,
        length: data.length,
        deleted: data.deleted,
        delta: 0,
        parent: None,
        children: Vec::with_capacity(data.children.len()),
        kind: data.kind.clone_for_copy(),
    });
    map.insert(id, copy);
    for &child in &data.children {
        let child_copy = clone_subtree(source, child, shift, arena, map);
        arena[child_copy].parent = Some(copy);
        arena[copy].children.push(child_copy);
    }
    copy
}

/// Post-processing pass: partner ids copied verbatim from the source tree
/// are remapped through the identity map; partners that were not copied are
/// dropped.
fn rewire_pairs(tree: &mut EditTree, map: &IdMap) {
    for data in tree.edits.values_mut() {
        match &mut data.kind {
            EditKind::MoveSource(source) | EditKind::CopySource(source) => {
                source.target = source.target.and_then(|old| map.get(old).copied());
            }
            EditKind::MoveTarget { source } | EditKind::CopyTarget { source } => {
                *source = source.and_then(|old| map.get(old).copied());
            }
            _ => {}
        }
    }
}
