//! Fixture-file driven tests for the apply pipeline.
//!
//! A fixture is a plain text file with an input document, an edit script,
//! and three generated sections: the document after the apply, the tree with
//! its updated regions, and the document after re-applying the returned undo
//! tree. Checking a fixture re-derives the generated sections and diffs the
//! whole file; `env UPDATE_EXPECT=1 cargo test` rewrites fixtures in place.

use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use pretty_assertions::StrComparison;

use crate::edit::EditKind;
use crate::region::Range;
use crate::{Edit, EditId, EditTree};

macro_rules! w {
    ($dst: expr$(, $($args: tt)*)?) => {{
        let _ = write!($dst$(, $($args)*)?);
    }};
}
macro_rules! wln {
    ($dst: expr$(, $($args: tt)*)?) => {{
        let _ = writeln!($dst$(, $($args)*)?);
    }};
}

pub fn check_fixture(path: impl AsRef<Path>, roundtrip: impl FnOnce(&str) -> String) {
    let path = path.as_ref();
    let snapshot = match fs::read_to_string(path) {
        Ok(content) => content.replace("\r\n", "\n"),
        Err(err) => panic!("failed to read fixture {path:?}: {err}"),
    };
    let snapshot = snapshot.trim_end();
    let roundtrip = roundtrip(snapshot);
    if snapshot != roundtrip.trim_end() {
        if std::env::var_os("UPDATE_EXPECT").is_some_and(|it| it == "1") {
            println!("\x1b[1m\x1b[92mupdating\x1b[0m: {}", path.display());
            fs::write(path, roundtrip).unwrap();
        } else {
            println!(
                "\n
\x1b[1mCurrent\x1b[0m:
----
{}
----

\x1b[1mGenerated\x1b[0m:
----
{}
----

\x1b[1mDiff\x1b[0m:
----
{}
----
\x1b[1m\x1b[91merror\x1b[97m: fixture test failed\x1b[0m
   \x1b[1m\x1b[34m-->\x1b[0m {}

You can update all fixtures by running:

    env UPDATE_EXPECT=1 cargo test
",
                snapshot,
                roundtrip,
                StrComparison::new(snapshot, &roundtrip.trim_end()),
                path.display(),
            );

            std::panic::resume_unwind(Box::new(()));
        }
    }
}

pub fn check_apply_fixture(path: impl AsRef<Path>) {
    check_fixture(path, roundtrip_apply_fixture)
}

/// Parse the fixture, apply its edit tree with the default style, and render
/// the full fixture file back out with freshly generated sections.
pub fn roundtrip_apply_fixture(src: &str) -> String {
    let fixture = Fixture::parse(src);
    let mut tree = fixture.build_tree();
    let mut document = fixture.document.clone();
    let mut undo = tree
        .apply(&mut document)
        .unwrap_or_else(|err| panic!("fixture apply failed: {err}"));

    let mut out = String::new();
    wln!(out, "== document");
    wln!(out, "{}", fixture.document);
    wln!(out, "== edits");
    for line in &fixture.edit_lines {
        wln!(out, "{line}");
    }
    wln!(out, "== result");
    wln!(out, "{document}");
    wln!(out, "== tree");
    render_tree(&mut out, &tree, tree.root(), 0);

    let mut restored = document;
    undo.apply(&mut restored)
        .unwrap_or_else(|err| panic!("fixture undo failed: {err}"));
    wln!(out, "== undo");
    wln!(out, "{restored}");
    out
}

struct Fixture {
    document: String,
    edit_lines: Vec<String>,
}

impl Fixture {
    fn parse(src: &str) -> Fixture {
        let mut section = "";
        let mut doc_lines: Vec<&str> = Vec::new();
        let mut edit_lines = Vec::new();
        for line in src.lines() {
            if let Some(name) = line.strip_prefix("== ") {
                section = name.trim();
                continue;
            }
            match section {
                "document" => doc_lines.push(line),
                "edits" => {
                    if !line.trim().is_empty() {
                        edit_lines.push(line.trim_end().to_owned());
                    }
                }
                // result, tree, and undo are regenerated
                _ => {}
            }
        }
        while doc_lines.last().is_some_and(|line| line.is_empty()) {
            doc_lines.pop();
        }
        Fixture {
            document: doc_lines.join("\n"),
            edit_lines,
        }
    }

    fn build_tree(&self) -> EditTree {
        let mut tree = EditTree::new();
        let mut stack: Vec<EditId> = Vec::new();
        let mut pairs: HashMap<String, (Option<EditId>, Option<EditId>)> = HashMap::new();
        for line in &self.edit_lines {
            let body = line.trim_start();
            let indent = line.len() - body.len();
            assert!(indent % 2 == 0, "odd indentation in fixture line {line:?}");
            let depth = indent / 2;
            assert!(depth <= stack.len(), "skipped indent level in {line:?}");
            stack.truncate(depth);
            let parent = stack.last().copied().unwrap_or(tree.root());
            let (edit, label) = parse_edit(body);
            let id = tree
                .add(parent, edit)
                .unwrap_or_else(|err| panic!("fixture edit rejected ({line:?}): {err}"));
            if let Some((label, is_source)) = label {
                let slot = pairs.entry(label).or_default();
                let slot = if is_source { &mut slot.0 } else { &mut slot.1 };
                assert!(slot.is_none(), "duplicate pair label in {line:?}");
                *slot = Some(id);
            }
            stack.push(id);
        }
        for (label, pair) in pairs {
            let (Some(source), Some(target)) = pair else {
                panic!("unmatched pair label #{label}");
            };
            tree.pair(source, target)
                .unwrap_or_else(|err| panic!("fixture pair #{label} rejected: {err}"));
        }
        tree
    }
}

/// One edit per line: `kind args` with children indented two spaces below
/// their parent. Move/copy halves reference each other through a `#label`.
fn parse_edit(line: &str) -> (Edit, Option<(String, bool)>) {
    let (op, rest) = split_token(line);
    match op {
        "group" => (Edit::group(), None),
        "insert" => {
            let (offset, rest) = split_token(rest);
            (Edit::insert(parse_usize(offset), parse_quoted(rest)), None)
        }
        "delete" => (Edit::delete(parse_range(rest)), None),
        "replace" => {
            let (range, rest) = split_token(rest);
            (Edit::replace(parse_range(range), parse_quoted(rest)), None)
        }
        "marker" => (Edit::range_marker(parse_range(rest)), None),
        "move-source" => {
            let (range, rest) = split_token(rest);
            (
                Edit::move_source(parse_range(range)),
                Some((parse_label(rest), true)),
            )
        }
        "move-target" => {
            let (offset, rest) = split_token(rest);
            (
                Edit::move_target(parse_usize(offset)),
                Some((parse_label(rest), false)),
            )
        }
        "copy-source" => {
            let (range, rest) = split_token(rest);
            (
                Edit::copy_source(parse_range(range)),
                Some((parse_label(rest), true)),
            )
        }
        "copy-target" => {
            let (offset, rest) = split_token(rest);
            (
                Edit::copy_target(parse_usize(offset)),
                Some((parse_label(rest), false)),
            )
        }
        other => panic!("unknown fixture edit kind {other:?}"),
    }
}

fn split_token(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (text, ""),
    }
}

fn parse_usize(token: &str) -> usize {
    token
        .parse()
        .unwrap_or_else(|_| panic!("expected an offset, got {token:?}"))
}

fn parse_range(token: &str) -> Range {
    let (start, end) = token
        .split_once("..")
        .unwrap_or_else(|| panic!("expected a range, got {token:?}"));
    parse_usize(start)..parse_usize(end)
}

fn parse_label(token: &str) -> String {
    token
        .strip_prefix('#')
        .unwrap_or_else(|| panic!("expected a #label, got {token:?}"))
        .to_owned()
}

fn parse_quoted(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .unwrap_or_else(|| panic!("expected a quoted string, got {text:?}"));
    let mut out = String::new();
    let mut chars = inner.chars();
    loop {
        match chars.next() {
            Some('"') => return out,
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                other => panic!("bad escape {other:?} in {text:?}"),
            },
            Some(c) => out.push(c),
            None => panic!("unterminated string in {text:?}"),
        }
    }
}

fn quote(text: &str) -> String {
    let mut out = String::from('"');
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn render_tree(out: &mut String, tree: &EditTree, edit: EditId, depth: usize) {
    w!(out, "{:indent$}{}", "", tree.kind(edit).name(), indent = depth * 2);
    match tree.region(edit) {
        None => w!(out, " deleted"),
        Some(region) => {
            w!(out, " {}..{}", region.start, region.end);
            if let EditKind::Insert { text } | EditKind::Replace { text } = tree.kind(edit) {
                w!(out, " {}", quote(text));
            }
        }
    }
    wln!(out);
    for &child in tree.children(edit) {
        render_tree(out, tree, child, depth + 1);
    }
}
