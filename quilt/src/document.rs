use std::borrow::Cow;

use crate::region::Range;

/// The mutable character store an edit tree executes against.
///
/// The engine only ever touches a document through this trait: a length, a
/// read of a byte range, and a single splice primitive. Offsets are byte
/// indices and must land on UTF-8 character boundaries; anything outside
/// `0..=len` (or off a boundary) is reported as [`BadLocation`] rather than
/// a panic, since the range arithmetic that produced it may live far from
/// the call site.
pub trait Document {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the text currently occupying `range`.
    fn get(&self, range: Range) -> Result<Cow<'_, str>, BadLocation>;

    /// Replace the text in `range` with `text`. An empty range inserts, an
    /// empty `text` deletes.
    fn replace(&mut self, range: Range, text: &str) -> Result<(), BadLocation>;
}

/// A read or splice addressed a range the document cannot resolve: out of
/// bounds, inverted, or off a character boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("range {offset}..{end} is not addressable in a document of {doc_len} bytes", end = offset + length)]
pub struct BadLocation {
    pub offset: usize,
    pub length: usize,
    pub doc_len: usize,
}

fn check_str_range(text: &str, range: &Range) -> Result<(), BadLocation> {
    let ok = range.start <= range.end
        && range.end <= text.len()
        && text.is_char_boundary(range.start)
        && text.is_char_boundary(range.end);
    if ok {
        Ok(())
    } else {
        Err(BadLocation {
            offset: range.start,
            length: range.end.saturating_sub(range.start),
            doc_len: text.len(),
        })
    }
}

impl Document for String {
    fn len(&self) -> usize {
        self.as_str().len()
    }

    fn get(&self, range: Range) -> Result<Cow<'_, str>, BadLocation> {
        check_str_range(self, &range)?;
        Ok(Cow::Borrowed(&self[range]))
    }

    fn replace(&mut self, range: Range, text: &str) -> Result<(), BadLocation> {
        check_str_range(self, &range)?;
        self.replace_range(range, text);
        Ok(())
    }
}

#[cfg(feature = "ropey")]
mod rope {
    use super::*;

    fn char_bounds(rope: &ropey::Rope, range: &Range) -> Result<(usize, usize), BadLocation> {
        let bad = || BadLocation {
            offset: range.start,
            length: range.end.saturating_sub(range.start),
            doc_len: rope.len_bytes(),
        };
        if range.start > range.end {
            return Err(bad());
        }
        let start = rope.try_byte_to_char(range.start).map_err(|_| bad())?;
        let end = rope.try_byte_to_char(range.end).map_err(|_| bad())?;
        // try_byte_to_char floors into a codepoint; reject offsets that do
        // not sit on a boundary.
        if rope.char_to_byte(start) != range.start || rope.char_to_byte(end) != range.end {
            return Err(bad());
        }
        Ok((start, end))
    }

    impl Document for ropey::Rope {
        fn len(&self) -> usize {
            self.len_bytes()
        }

        fn get(&self, range: Range) -> Result<Cow<'_, str>, BadLocation> {
            let (start, end) = char_bounds(self, &range)?;
            Ok(self.slice(start..end).into())
        }

        fn replace(&mut self, range: Range, text: &str) -> Result<(), BadLocation> {
            let (start, end) = char_bounds(self, &range)?;
            self.remove(start..end);
            self.insert(start, text);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_splices() {
        let mut doc = String::from("hello world");
        assert_eq!(doc.get(0..5).unwrap(), "hello");
        doc.replace(0..5, "goodbye").unwrap();
        assert_eq!(doc, "goodbye world");
        doc.replace(7..7, ",").unwrap();
        assert_eq!(doc, "goodbye, world");
    }

    #[test]
    fn string_rejects_bad_ranges() {
        let mut doc = String::from("héllo");
        assert!(doc.get(0..99).is_err());
        // offset 2 is inside the two-byte 'é'
        let err = doc.replace(1..2, "x").unwrap_err();
        assert_eq!(err.doc_len, 6);
        assert_eq!(doc, "héllo");
    }

    #[cfg(feature = "ropey")]
    #[test]
    fn rope_matches_string_behavior() {
        let mut rope = ropey::Rope::from_str("héllo wörld");
        let mut string = String::from("héllo wörld");
        assert_eq!(Document::len(&rope), Document::len(&string));
        // byte 2 is inside 'é'
        assert!(rope.get(1..2).is_err());
        assert!(rope.replace(0..999, "x").is_err());
        for (range, text) in [(0..6, "bye"), (4..4, "!!"), (3..7, "")] {
            rope.replace(range.clone(), text).unwrap();
            string.replace(range, text).unwrap();
            assert_eq!(rope.to_string(), string);
        }
    }
}
