use crate::region::{self, Range};
use crate::{Edit, EditTree};

/// Collects one inverse replace per atomic document change during the
/// document-updating pass.
///
/// Inverses are recorded in execution order, which is highest document
/// offset first. The finished tree keeps that order: the processor replays
/// children back to front, so the inverses run lowest offset first and each
/// one restores the coordinate frame the next was recorded in.
pub(crate) struct UndoBuilder {
    ops: Vec<InverseOp>,
    /// Bounding range of everything recorded so far, maintained in the
    /// coordinates of the evolving document. Individual inverse spans are
    /// frozen in the frame they were recorded in, so their plain union can
    /// overshoot the final document; this range becomes the undo root's
    /// region and must not.
    covered: Option<Range>,
}

struct InverseOp {
    /// Offset the change happened at.
    offset: usize,
    /// Length of the text the change wrote there.
    length: usize,
    /// The text it displaced.
    text: String,
}

impl UndoBuilder {
    pub(crate) fn new() -> UndoBuilder {
        UndoBuilder {
            ops: Vec::new(),
            covered: None,
        }
    }

    pub(crate) fn record(&mut self, offset: usize, inserted: usize, displaced: String) {
        let span = offset..offset + inserted;
        self.covered = Some(match self.covered.take() {
            None => span.clone(),
            Some(prev) => region::union(&transform(prev, offset, displaced.len(), inserted), &span),
        });
        self.ops.push(InverseOp {
            offset,
            length: inserted,
            text: displaced,
        });
    }

    pub(crate) fn finish(self) -> EditTree {
        let mut tree = EditTree::with_root(Edit::undo_root());
        let root = tree.root();
        for op in self.ops {
            let child = tree.alloc(Edit::replace(op.offset..op.offset + op.length, op.text));
            tree.attach_unchecked(root, child);
        }
        if let Some(covered) = self.covered {
            tree.set_span(root, covered);
        }
        tree
    }
}

/// Carry `prev` across a splice of `old_len` bytes at `at` by `new_len`
/// bytes: positions before the splice stay put, positions after it shift by
/// the length difference, positions inside it clamp onto the spliced span.
fn transform(prev: Range, at: usize, old_len: usize, new_len: usize) -> Range {
    let delta = new_len as isize - old_len as isize;
    let shift = |p: usize, clamp: usize| -> usize {
        if p <= at {
            p
        } else if p >= at + old_len {
            (p as isize + delta) as usize
        } else {
            clamp
        }
    };
    shift(prev.start, at)..shift(prev.end, at + new_len)
}
