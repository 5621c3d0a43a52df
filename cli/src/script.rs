use std::fs;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use quilt::{Edit, EditId, EditKind, EditTree};
use serde::{Deserialize, Serialize};

/// On-disk edit script.
///
/// `edits` form a single tree applied atomically, unless `sequence` is set,
/// in which case each entry is applied on its own, in order. Inverse scripts
/// written by `quilt apply --undo` are sequences: their entries are frozen
/// in the coordinate frame the preceding entries restore, so they cannot be
/// re-sorted into one tree.
#[derive(Debug, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub sequence: bool,
    pub edits: Vec<ScriptOp>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum ScriptOp {
    Insert {
        offset: usize,
        text: String,
    },
    Delete {
        start: usize,
        end: usize,
    },
    Replace {
        start: usize,
        end: usize,
        text: String,
    },
    Marker {
        start: usize,
        end: usize,
    },
    Group {
        #[serde(default)]
        children: Vec<ScriptOp>,
    },
    /// Shorthand for a paired move source and target under one parent.
    Move {
        start: usize,
        end: usize,
        to: usize,
    },
    /// Shorthand for a paired copy source and target under one parent.
    Copy {
        start: usize,
        end: usize,
        to: usize,
    },
}

pub fn read(path: &Path) -> anyhow::Result<Script> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open script {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse script {}", path.display()))
}

pub fn write(path: &Path, script: &Script) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(script).context("failed to serialize script")?;
    fs::write(path, json + "\n")
        .with_context(|| format!("failed to write script {}", path.display()))
}

/// Apply a script to `text`, returning the inverse script.
pub fn run(script: &Script, text: &mut String) -> anyhow::Result<Script> {
    let mut inverses = Vec::new();
    if script.sequence {
        for op in &script.edits {
            let mut tree = build(std::slice::from_ref(op))?;
            let undo = tree.apply(text)?;
            inverses.push(inverse_ops(&undo));
        }
    } else {
        let mut tree = build(&script.edits)?;
        let undo = tree.apply(text)?;
        inverses.push(inverse_ops(&undo));
    }
    // undoing replays the inverses of later applies first
    let edits = inverses.into_iter().rev().flatten().collect();
    Ok(Script {
        sequence: true,
        edits,
    })
}

pub fn build(edits: &[ScriptOp]) -> anyhow::Result<EditTree> {
    let mut tree = EditTree::new();
    let root = tree.root();
    for op in edits {
        add(&mut tree, root, op)?;
    }
    Ok(tree)
}

fn add(tree: &mut EditTree, parent: EditId, op: &ScriptOp) -> anyhow::Result<()> {
    match op {
        ScriptOp::Insert { offset, text } => {
            tree.add(parent, Edit::insert(*offset, text.clone()))?;
        }
        ScriptOp::Delete { start, end } => {
            tree.add(parent, Edit::delete(*start..*end))?;
        }
        ScriptOp::Replace { start, end, text } => {
            tree.add(parent, Edit::replace(*start..*end, text.clone()))?;
        }
        ScriptOp::Marker { start, end } => {
            tree.add(parent, Edit::range_marker(*start..*end))?;
        }
        ScriptOp::Group { children } => {
            let group = tree.add(parent, Edit::group())?;
            for child in children {
                add(tree, group, child)?;
            }
        }
        ScriptOp::Move { start, end, to } => {
            let source = tree.alloc(Edit::move_source(*start..*end));
            let target = tree.alloc(Edit::move_target(*to));
            tree.add_child(parent, source)?;
            tree.add_child(parent, target)?;
            tree.pair(source, target)?;
        }
        ScriptOp::Copy { start, end, to } => {
            let source = tree.alloc(Edit::copy_source(*start..*end));
            let target = tree.alloc(Edit::copy_target(*to));
            tree.add_child(parent, source)?;
            tree.add_child(parent, target)?;
            tree.pair(source, target)?;
        }
    }
    Ok(())
}

/// The undo tree's children are inverse replaces in recorded order; replay
/// order is the reverse.
fn inverse_ops(undo: &EditTree) -> Vec<ScriptOp> {
    undo.children(undo.root())
        .iter()
        .rev()
        .map(|&child| {
            let region = undo
                .region(child)
                .expect("inverse edits are never deleted");
            let text = match undo.kind(child) {
                EditKind::Replace { text } => text.clone(),
                other => unreachable!("undo trees only contain replaces, found {other:?}"),
            };
            ScriptOp::Replace {
                start: region.start,
                end: region.end,
                text,
            }
        })
        .collect()
}
