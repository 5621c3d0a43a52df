use crate::edit::EditKind;
use crate::{EditId, EditTree};

/// External traversal over an edit tree.
///
/// [`EditTree::accept`] calls [`pre_visit`](Visitor::pre_visit), then the
/// variant-specific `visit_*` method, recurses into the children if that
/// returned `true`, and finishes with [`post_visit`](Visitor::post_visit).
/// The `visit_*` methods all fall back to [`visit`](Visitor::visit), so a
/// visitor that treats every edit alike overrides one method.
pub trait Visitor {
    fn pre_visit(&mut self, tree: &EditTree, edit: EditId) {
        let _ = (tree, edit);
    }

    fn post_visit(&mut self, tree: &EditTree, edit: EditId) {
        let _ = (tree, edit);
    }

    /// Fallback for every variant. Return `false` to skip the children.
    fn visit(&mut self, tree: &EditTree, edit: EditId) -> bool {
        let _ = (tree, edit);
        true
    }

    fn visit_insert(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_delete(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_replace(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_group(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_range_marker(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_move_source(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_move_target(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_copy_source(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_copy_target(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }

    fn visit_undo(&mut self, tree: &EditTree, edit: EditId) -> bool {
        self.visit(tree, edit)
    }
}

impl EditTree {
    /// Walk the whole tree.
    pub fn accept(&self, visitor: &mut impl Visitor) {
        self.accept_from(self.root, visitor);
    }

    /// Walk the subtree rooted at `edit`.
    pub fn accept_from(&self, edit: EditId, visitor: &mut impl Visitor) {
        visitor.pre_visit(self, edit);
        let descend = match &self.edits[edit].kind {
            EditKind::Insert { .. } => visitor.visit_insert(self, edit),
            EditKind::Delete => visitor.visit_delete(self, edit),
            EditKind::Replace { .. } => visitor.visit_replace(self, edit),
            EditKind::Group => visitor.visit_group(self, edit),
            EditKind::RangeMarker => visitor.visit_range_marker(self, edit),
            EditKind::MoveSource(_) => visitor.visit_move_source(self, edit),
            EditKind::MoveTarget { .. } => visitor.visit_move_target(self, edit),
            EditKind::CopySource(_) => visitor.visit_copy_source(self, edit),
            EditKind::CopyTarget { .. } => visitor.visit_copy_target(self, edit),
            EditKind::Undo => visitor.visit_undo(self, edit),
        };
        if descend {
            // fix the iteration order at entry
            let children = self.edits[edit].children.clone();
            for child in children {
                self.accept_from(child, visitor);
            }
        }
        visitor.post_visit(self, edit);
    }
}
