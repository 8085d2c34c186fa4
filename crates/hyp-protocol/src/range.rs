use hyp_drive::ReadRange;

/// A satisfiable byte range, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parse a `Range` header against an entity of `size` bytes.
    ///
    /// Accepts `bytes=<start>-<end>`, `bytes=<start>-` and the suffix form
    /// `bytes=-<length>`. Only the first range of a list is considered. An
    /// `end` past the entity is clamped to its last byte. Returns `None` for
    /// malformed or unsatisfiable ranges.
    pub fn parse(header: &str, size: u64) -> Option<Self> {
        let (unit, spec) = header.trim().split_once('=')?;
        if !unit.trim().eq_ignore_ascii_case("bytes") || size == 0 {
            return None;
        }
        let first = spec.split(',').next()?.trim();
        let (start, end) = first.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());
        let last = size - 1;

        if start.is_empty() {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            return Some(Self { start: size - suffix.min(size), end: last });
        }

        let start: u64 = start.parse().ok()?;
        let end = if end.is_empty() { last } else { end.parse::<u64>().ok()?.min(last) };
        if start > end {
            return None;
        }
        Some(Self { start, end })
    }

    /// Number of bytes covered. Never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value of the `Content-Range` header for an entity of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }

    pub fn to_read_range(self) -> ReadRange {
        ReadRange::new(self.start, self.end)
    }
}
