use log::{debug, trace};

use crate::document::Document;
use crate::edit::EditKind;
use crate::region::{self, Range};
use crate::undo::UndoBuilder;
use crate::{BadLocation, EditId, EditTree, MalformedKind, MalformedTree};

bitflags::bitflags! {
    /// Controls what an apply produces beyond the document change itself.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Style: u32 {
        /// Record an inverse tree while the document is updated; applying it
        /// to the changed document restores the original text.
        const CREATE_UNDO = 1;
        /// Rewrite every edit's region to its post-apply position. Edits
        /// whose region was removed by an enclosing change are marked
        /// deleted instead.
        const UPDATE_REGIONS = 2;
    }
}

impl Default for Style {
    fn default() -> Style {
        Style::CREATE_UNDO | Style::UPDATE_REGIONS
    }
}

/// Either fault an apply can surface.
///
/// A [`MalformedTree`] is raised before the document is touched. A
/// [`BadLocation`] escapes mid-update and leaves the document in an
/// undefined intermediate state; callers needing atomicity must snapshot
/// first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Malformed(#[from] MalformedTree),
    #[error(transparent)]
    BadLocation(#[from] BadLocation),
}

impl EditTree {
    /// Apply the tree to `document` with the default style
    /// ([`CREATE_UNDO`](Style::CREATE_UNDO) |
    /// [`UPDATE_REGIONS`](Style::UPDATE_REGIONS)) and return the undo tree.
    pub fn apply<D: Document + ?Sized>(
        &mut self,
        document: &mut D,
    ) -> Result<EditTree, ApplyError> {
        let undo = Processor::new(document, Style::default()).apply(self)?;
        Ok(undo.expect("CREATE_UNDO always yields an undo tree"))
    }

    /// Apply with an explicit style; the undo tree is only produced under
    /// [`CREATE_UNDO`](Style::CREATE_UNDO).
    pub fn apply_with_style<D: Document + ?Sized>(
        &mut self,
        document: &mut D,
        style: Style,
    ) -> Result<Option<EditTree>, ApplyError> {
        Processor::new(document, style).apply(self)
    }
}

/// Executes an edit tree against a document in four passes: integrity
/// check, source computation, document updating, region updating.
///
/// An optional filter narrows which edits are *considered*, meaning executed
/// and consistency-checked, while the rest of the tree is traversed purely
/// as structure. This is how a client executes a subset of a larger tree
/// without dismantling it.
pub struct Processor<'a, D: Document + ?Sized> {
    document: &'a mut D,
    style: Style,
    filter: Option<Box<dyn Fn(&EditTree, EditId) -> bool + 'a>>,
}

impl<'a, D: Document + ?Sized> Processor<'a, D> {
    pub fn new(document: &'a mut D, style: Style) -> Processor<'a, D> {
        Processor {
            document,
            style,
            filter: None,
        }
    }

    /// Only edits for which `filter` returns `true` are executed.
    pub fn with_filter(mut self, filter: impl Fn(&EditTree, EditId) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Run all passes. On a [`MalformedTree`] fault neither the document
    /// nor the tree's regions have changed; on [`BadLocation`] the document
    /// state is undefined.
    pub fn apply(mut self, tree: &mut EditTree) -> Result<Option<EditTree>, ApplyError> {
        debug!(
            "applying edit tree ({} edits, style {:?})",
            tree.edits.len(),
            self.style
        );
        let root = tree.root;
        self.check_integrity(tree)?;
        self.compute_sources(tree, root)?;
        let mut undo = self
            .style
            .contains(Style::CREATE_UNDO)
            .then(UndoBuilder::new);
        self.update_document(tree, root, &mut undo)?;
        if self.style.contains(Style::UPDATE_REGIONS) {
            self.update_regions(tree, root, 0, false);
        }
        Ok(undo.map(UndoBuilder::finish))
    }

    fn considered(&self, tree: &EditTree, id: EditId) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(tree, id))
    }

    /// Pass A: verify the tree invariants and document bounds without
    /// touching anything. Also clears stale deltas from a previous apply.
    fn check_integrity(&self, tree: &mut EditTree) -> Result<(), MalformedTree> {
        if tree.edits[tree.root].span().end > self.document.len() {
            return Err(MalformedTree {
                parent: None,
                child: Some(tree.root),
                kind: MalformedKind::OutOfBounds,
            });
        }
        self.check_node(tree, tree.root)
    }

    fn check_node(&self, tree: &mut EditTree, id: EditId) -> Result<(), MalformedTree> {
        tree.edits[id].delta = 0;
        if self.considered(tree, id) {
            self.check_pairing(tree, id)?;
        }
        let children = tree.edits[id].children.clone();
        if children.is_empty() {
            return Ok(());
        }
        let (parent_span, framed) = {
            let data = &tree.edits[id];
            if data.length == 0 && !data.kind.has_computed_region() {
                return Err(MalformedTree {
                    parent: Some(id),
                    child: None,
                    kind: MalformedKind::ZeroLengthParent,
                });
            }
            // Undo children are replayed in recorded order and each one
            // lives in the coordinate frame its successors restore, so
            // neither the sibling ordering nor the covering re-check can be
            // stated in a single frame for them.
            (data.span(), matches!(data.kind, EditKind::Undo))
        };
        let mut prev: Option<Range> = None;
        for &child in &children {
            let fault = |kind| MalformedTree {
                parent: Some(id),
                child: Some(child),
                kind,
            };
            let span = {
                let data = &tree.edits[child];
                if data.deleted {
                    return Err(fault(MalformedKind::Deleted));
                }
                data.region_defined().then(|| data.span())
            };
            if let (false, Some(span)) = (framed, span) {
                if !region::covers(&parent_span, &span) {
                    return Err(fault(MalformedKind::NotCovered));
                }
                if let Some(prev) = &prev {
                    if region::conflicts(prev, &span) || span.start < prev.start {
                        return Err(fault(MalformedKind::Overlap));
                    }
                }
                prev = Some(span);
            }
            self.check_node(tree, child)?;
        }
        Ok(())
    }

    fn check_pairing(&self, tree: &EditTree, id: EditId) -> Result<(), MalformedTree> {
        let fault = |child, kind| MalformedTree {
            parent: Some(id),
            child,
            kind,
        };
        match &tree.edits[id].kind {
            EditKind::MoveSource(data) | EditKind::CopySource(data) => {
                let Some(target) = data.target else {
                    return Err(fault(None, MalformedKind::Unpaired));
                };
                let reciprocal = tree.edits.get(target).is_some_and(|t| match &t.kind {
                    EditKind::MoveTarget { source } | EditKind::CopyTarget { source } => {
                        *source == Some(id)
                    }
                    _ => false,
                });
                if !reciprocal {
                    return Err(fault(Some(target), MalformedKind::InvalidPair));
                }
            }
            EditKind::MoveTarget { source } | EditKind::CopyTarget { source } => {
                let Some(source) = *source else {
                    return Err(fault(None, MalformedKind::Unpaired));
                };
                let reciprocal = tree.edits.get(source).is_some_and(|s| match &s.kind {
                    EditKind::MoveSource(data) | EditKind::CopySource(data) => {
                        data.target == Some(id)
                    }
                    _ => false,
                });
                if !reciprocal {
                    return Err(fault(Some(source), MalformedKind::InvalidPair));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Pass B: move/copy sources lift their text before any document
    /// mutation, so every source reads the original document state.
    fn compute_sources(&mut self, tree: &mut EditTree, id: EditId) -> Result<(), ApplyError> {
        let children = tree.edits[id].children.clone();
        for &child in &children {
            self.compute_sources(tree, child)?;
        }
        if !self.considered(tree, id) || !tree.edits[id].kind.is_source() {
            return Ok(());
        }
        let span = tree.edits[id].span();
        let mut text = if tree.edits[id].children.is_empty() {
            self.document.get(span)?.into_owned()
        } else {
            // Edits nested inside the source rewrite the lifted text before
            // it travels to the target; run them against a scratch copy of
            // the region.
            let mut scratch = self.document.get(span)?.into_owned();
            let mut shifted = tree.copy_children_shifted(id);
            Processor::new(&mut scratch, Style::empty()).apply(&mut shifted)?;
            scratch
        };
        if let Some(modifier) = tree.edits[id].kind.modifier() {
            text = modifier.modify(&text);
        }
        if let Some(data) = tree.edits[id].kind.source_data_mut() {
            data.content = Some(text);
        }
        Ok(())
    }

    /// Pass C: walk children highest offset first so completed splices never
    /// invalidate the offsets of edits still waiting, then perform this
    /// edit's own splice. Returns the subtree's length delta.
    fn update_document(
        &mut self,
        tree: &mut EditTree,
        id: EditId,
        undo: &mut Option<UndoBuilder>,
    ) -> Result<isize, ApplyError> {
        let mut delta = 0;
        let children = tree.edits[id].children.clone();
        for &child in children.iter().rev() {
            delta += self.update_document(tree, child, undo)?;
        }
        if self.considered(tree, id) {
            if delta != 0 {
                // keep covering the children, which just shifted
                tree.adjust_length(id, delta);
            }
            let own = self.perform(tree, id, undo)?;
            if own != 0 {
                tree.adjust_length(id, own);
            }
            delta += own;
        }
        tree.edits[id].delta = delta;
        Ok(delta)
    }

    fn perform(
        &mut self,
        tree: &mut EditTree,
        id: EditId,
        undo: &mut Option<UndoBuilder>,
    ) -> Result<isize, ApplyError> {
        enum DocAction {
            None,
            Splice(String),
            Receive(EditId),
        }
        let action = match &tree.edits[id].kind {
            EditKind::Insert { text } | EditKind::Replace { text } => {
                DocAction::Splice(text.clone())
            }
            EditKind::Delete | EditKind::MoveSource(_) => DocAction::Splice(String::new()),
            EditKind::MoveTarget { source } | EditKind::CopyTarget { source } => {
                DocAction::Receive(source.expect("pairing verified by the integrity pass"))
            }
            EditKind::Group
            | EditKind::RangeMarker
            | EditKind::CopySource(_)
            | EditKind::Undo => DocAction::None,
        };
        let new_text = match action {
            DocAction::None => return Ok(0),
            DocAction::Splice(text) => text,
            // A source excluded by the filter never lifted any content; its
            // target then inserts nothing.
            DocAction::Receive(source) => tree.edits[source]
                .kind
                .source_data_mut()
                .and_then(|data| data.content.take())
                .unwrap_or_default(),
        };
        let span = tree.edits[id].span();
        trace!(
            "splice {span:?} ({} bytes) -> {} bytes",
            span.len(),
            new_text.len()
        );
        let displaced = match undo {
            Some(_) => Some(self.document.get(span.clone())?.into_owned()),
            None => None,
        };
        self.document.replace(span.clone(), &new_text)?;
        if let (Some(undo), Some(displaced)) = (undo.as_mut(), displaced) {
            undo.record(span.start, new_text.len(), displaced);
        }
        Ok(new_text.len() as isize - span.len() as isize)
    }

    /// Pass D: shift every surviving edit by the accumulated delta of the
    /// edits that executed before (below) it, and mark everything inside a
    /// deleting edit as deleted.
    fn update_regions(&self, tree: &mut EditTree, id: EditId, accumulated: isize, delete: bool) {
        if delete {
            tree.mark_deleted(id);
        } else if accumulated != 0 {
            tree.shift(id, accumulated);
        }
        let delete_children = delete || tree.edits[id].kind.deletes_children();
        let children = tree.edits[id].children.clone();
        let mut accumulated = accumulated;
        for &child in &children {
            self.update_regions(tree, child, accumulated, delete_children);
            accumulated += tree.edits[child].delta;
        }
    }
}
