use super::LineInfo;
use crate::format::raw::LineTableRef;

/// Collects the line tables of all ranges into one contiguous array.
#[derive(Debug, Default)]
pub struct LineTableBuilder {
    entries: Vec<LineInfo>,
}

impl LineTableBuilder {
    /// Appends a line table, returning a reference to the appended slice.
    ///
    /// Line tables are not deduplicated. An empty table yields a zero reference.
    pub fn append(&mut self, lines: &[LineInfo]) -> LineTableRef {
        if lines.is_empty() {
            return LineTableRef::default();
        }
        let index = self.entries.len() as u64;
        self.entries.extend_from_slice(lines);
        LineTableRef {
            index,
            count: lines.len() as u64,
        }
    }

    /// All line table entries in insertion order.
    pub fn entries(&self) -> &[LineInfo] {
        &self.entries
    }
}
