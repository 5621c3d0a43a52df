use std::fmt;
use std::sync::Arc;

use crate::region::Range;
use crate::EditId;

/// Rewrites the text lifted from a move/copy source before it is handed to
/// the paired target. The classic use is re-indenting a block of code for
/// its destination.
///
/// Modifiers are attached with [`Edit::with_modifier`] and shared by
/// reference; copying a tree shares the modifier rather than cloning it.
pub trait SourceModifier: Send + Sync {
    fn modify(&self, source: &str) -> String;
}

/// Variant payload of an edit.
///
/// Structural state (offset, length, parent, children) lives in the tree;
/// this enum carries only what distinguishes the variants: replacement text,
/// and the partner wiring plus transient lifted content for move/copy pairs.
#[derive(Clone)]
pub enum EditKind {
    Insert { text: String },
    Delete,
    Replace { text: String },
    /// Pure grouping node. Its region is the coverage of its children and
    /// grows as children are added.
    Group,
    /// Records a region and tracks it through an apply without changing the
    /// document.
    RangeMarker,
    MoveSource(SourceData),
    MoveTarget { source: Option<EditId> },
    CopySource(SourceData),
    CopyTarget { source: Option<EditId> },
    /// Root of a tree returned by an apply with `CREATE_UNDO`. Its children
    /// are inverse replaces kept in recorded order, which is not the sorted
    /// sibling order of ordinary edits.
    Undo,
}

/// Shared state of the two source variants.
#[derive(Clone, Default)]
pub struct SourceData {
    pub(crate) target: Option<EditId>,
    /// Text lifted during the source-computation pass, consumed by the
    /// paired target during document updating.
    pub(crate) content: Option<String>,
    pub(crate) modifier: Option<Arc<dyn SourceModifier>>,
}

impl EditKind {
    /// Human-readable variant name, used in fixtures and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            EditKind::Insert { .. } => "insert",
            EditKind::Delete => "delete",
            EditKind::Replace { .. } => "replace",
            EditKind::Group => "group",
            EditKind::RangeMarker => "marker",
            EditKind::MoveSource(_) => "move-source",
            EditKind::MoveTarget { .. } => "move-target",
            EditKind::CopySource(_) => "copy-source",
            EditKind::CopyTarget { .. } => "copy-target",
            EditKind::Undo => "undo",
        }
    }

    /// Executing this edit removes the content of its own region, so any
    /// edit nested inside it is dead after an apply.
    pub(crate) fn deletes_children(&self) -> bool {
        matches!(
            self,
            EditKind::Delete | EditKind::Replace { .. } | EditKind::MoveSource(_)
        )
    }

    /// The region of these variants is derived from their children rather
    /// than fixed at construction, so they are exempt from the
    /// zero-length-edits-have-no-children rule.
    pub(crate) fn has_computed_region(&self) -> bool {
        matches!(self, EditKind::Group | EditKind::Undo)
    }

    pub(crate) fn is_source(&self) -> bool {
        matches!(self, EditKind::MoveSource(_) | EditKind::CopySource(_))
    }

    pub(crate) fn source_data_mut(&mut self) -> Option<&mut SourceData> {
        match self {
            EditKind::MoveSource(data) | EditKind::CopySource(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn modifier(&self) -> Option<Arc<dyn SourceModifier>> {
        match self {
            EditKind::MoveSource(data) | EditKind::CopySource(data) => data.modifier.clone(),
            _ => None,
        }
    }

    /// Clone for the copier: text and modifiers travel, lifted content does
    /// not, and partner ids are kept verbatim for the rewiring pass to remap.
    pub(crate) fn clone_for_copy(&self) -> EditKind {
        match self {
            EditKind::MoveSource(data) => EditKind::MoveSource(data.clone_for_copy()),
            EditKind::CopySource(data) => EditKind::CopySource(data.clone_for_copy()),
            other => other.clone(),
        }
    }
}

impl SourceData {
    /// The paired target, once [`EditTree::pair`](crate::EditTree::pair)
    /// has run.
    pub fn target(&self) -> Option<EditId> {
        self.target
    }

    fn clone_for_copy(&self) -> SourceData {
        SourceData {
            target: self.target,
            content: None,
            modifier: self.modifier.clone(),
        }
    }
}

impl fmt::Debug for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditKind::Insert { text } => f.debug_struct("Insert").field("text", text).finish(),
            EditKind::Replace { text } => f.debug_struct("Replace").field("text", text).finish(),
            EditKind::MoveSource(data) | EditKind::CopySource(data) => f
                .debug_struct(if matches!(self, EditKind::MoveSource(_)) {
                    "MoveSource"
                } else {
                    "CopySource"
                })
                .field("target", &data.target)
                .field("content", &data.content)
                .field("modifier", &data.modifier.is_some())
                .finish(),
            EditKind::MoveTarget { source } => {
                f.debug_struct("MoveTarget").field("source", source).finish()
            }
            EditKind::CopyTarget { source } => {
                f.debug_struct("CopyTarget").field("source", source).finish()
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Description of a single edit, ready to be placed into an [`EditTree`]
/// with [`EditTree::alloc`] or [`EditTree::add`].
///
/// [`EditTree`]: crate::EditTree
/// [`EditTree::alloc`]: crate::EditTree::alloc
/// [`EditTree::add`]: crate::EditTree::add
#[derive(Debug)]
pub struct Edit {
    pub(crate) offset: usize,
    pub(crate) length: usize,
    pub(crate) kind: EditKind,
}

impl Edit {
    fn spanning(range: Range, kind: EditKind) -> Edit {
        assert!(range.start <= range.end, "inverted edit range {range:?}");
        Edit {
            offset: range.start,
            length: range.end - range.start,
            kind,
        }
    }

    /// Insert `text` at `offset`.
    pub fn insert(offset: usize, text: impl Into<String>) -> Edit {
        Edit {
            offset,
            length: 0,
            kind: EditKind::Insert { text: text.into() },
        }
    }

    /// Remove the text in `range`.
    pub fn delete(range: Range) -> Edit {
        Edit::spanning(range, EditKind::Delete)
    }

    /// Replace the text in `range` with `text`.
    pub fn replace(range: Range, text: impl Into<String>) -> Edit {
        Edit::spanning(range, EditKind::Replace { text: text.into() })
    }

    /// A grouping node with no document effect of its own.
    pub fn group() -> Edit {
        Edit {
            offset: 0,
            length: 0,
            kind: EditKind::Group,
        }
    }

    /// Track `range` through an apply without changing the document.
    pub fn range_marker(range: Range) -> Edit {
        Edit::spanning(range, EditKind::RangeMarker)
    }

    /// The read-and-delete half of a move pair; wire it to its target with
    /// [`EditTree::pair`](crate::EditTree::pair).
    pub fn move_source(range: Range) -> Edit {
        Edit::spanning(range, EditKind::MoveSource(SourceData::default()))
    }

    /// The insertion half of a move pair.
    pub fn move_target(offset: usize) -> Edit {
        Edit {
            offset,
            length: 0,
            kind: EditKind::MoveTarget { source: None },
        }
    }

    /// The read-only half of a copy pair.
    pub fn copy_source(range: Range) -> Edit {
        Edit::spanning(range, EditKind::CopySource(SourceData::default()))
    }

    /// The insertion half of a copy pair.
    pub fn copy_target(offset: usize) -> Edit {
        Edit {
            offset,
            length: 0,
            kind: EditKind::CopyTarget { source: None },
        }
    }

    pub(crate) fn undo_root() -> Edit {
        Edit {
            offset: 0,
            length: 0,
            kind: EditKind::Undo,
        }
    }

    /// Attach a [`SourceModifier`] to a move/copy source.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not a move or copy source.
    pub fn with_modifier(mut self, modifier: Arc<dyn SourceModifier>) -> Edit {
        let data = self
            .kind
            .source_data_mut()
            .expect("only move/copy sources take a modifier");
        data.modifier = Some(modifier);
        self
    }
}
