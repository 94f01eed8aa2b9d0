//! # Path Tracking
//!
//! A reusable stack of location segments used to point at the exact part of
//! a request that produced an error, e.g. `body.field1.foo[0].field2`.

use std::fmt;

/// Stack-like builder of error location strings.
///
/// Field names are joined with `.`, sequence positions are rendered as
/// `[index]`. Every `push` must be matched by a `pop` before the buffer is
/// handed back to its owner.
#[derive(Debug, Clone, Default)]
pub struct PathBuffer {
    buf: String,
    marks: Vec<usize>,
}

impl PathBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named segment.
    pub fn push(&mut self, segment: &str) {
        self.marks.push(self.buf.len());
        if !self.buf.is_empty() {
            self.buf.push('.');
        }
        self.buf.push_str(segment);
    }

    /// Appends a sequence index segment.
    pub fn push_index(&mut self, index: usize) {
        self.marks.push(self.buf.len());
        self.buf.push('[');
        self.buf.push_str(&index.to_string());
        self.buf.push(']');
    }

    /// Removes the most recently pushed segment. Popping an empty buffer is a no-op.
    pub fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.buf.truncate(mark);
        }
    }

    /// Runs `f` with `segment` pushed, popping it again afterwards.
    pub fn scoped<R>(&mut self, segment: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push(segment);
        let out = f(self);
        self.pop();
        out
    }

    /// Renders the current location extended by `segment` without modifying the buffer.
    pub fn with(&self, segment: &str) -> String {
        if self.buf.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", self.buf, segment)
        }
    }

    /// The current location.
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Number of open segments.
    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    /// Whether no segment is open.
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

impl fmt::Display for PathBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fields_and_indices() {
        let mut pb = PathBuffer::new();
        pb.push("body");
        pb.push("field1");
        pb.push("foo");
        pb.push_index(0);
        assert_eq!(pb.with("field2"), "body.field1.foo[0].field2");
        assert_eq!(pb.to_string(), "body.field1.foo[0]");
        assert_eq!(pb.depth(), 4);
    }

    #[test]
    fn test_pop_restores_previous_location() {
        let mut pb = PathBuffer::new();
        pb.push("body");
        pb.push("items");
        pb.push_index(12);
        pb.pop();
        assert_eq!(pb.as_str(), "body.items");
        pb.pop();
        pb.pop();
        assert!(pb.is_empty());
        assert_eq!(pb.as_str(), "");
        // popping past the root stays empty
        pb.pop();
        assert_eq!(pb.as_str(), "");
    }

    #[test]
    fn test_scoped_pops_after_work() {
        let mut pb = PathBuffer::new();
        pb.push("query");
        let inner = pb.scoped("limit", |p| p.to_string());
        assert_eq!(inner, "query.limit");
        assert_eq!(pb.as_str(), "query");
    }

    #[test]
    fn test_with_on_empty_buffer() {
        let pb = PathBuffer::new();
        assert_eq!(pb.with("name"), "name");
    }

    #[test]
    fn test_index_at_root() {
        let mut pb = PathBuffer::new();
        pb.push_index(3);
        pb.push("id");
        assert_eq!(pb.as_str(), "[3].id");
    }
}
