/// Limit/offset window over a pinned result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Pagination {
    /// Create pagination with page number (1-indexed) and per-page count
    pub fn new(page: usize, per_page: usize) -> Self {
        let offset = if page > 0 {
            Some((page - 1) * per_page)
        } else {
            None
        };
        Self {
            limit: Some(per_page),
            offset,
        }
    }

    /// Calculate total pages given a total count
    pub fn total_pages(&self, total_count: usize) -> usize {
        match self.limit {
            Some(0) => 0,
            Some(limit) => total_count.div_ceil(limit),
            None if total_count == 0 => 0,
            None => 1,
        }
    }

    /// Index range this window covers in a slice of `len` rows
    pub fn range(&self, len: usize) -> std::ops::Range<usize> {
        let start = self.offset.unwrap_or(0).min(len);
        let end = match self.limit {
            Some(limit) => start.saturating_add(limit).min(len),
            None => len,
        };
        start..end
    }

    /// Apply this window to a slice
    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        &rows[self.range(rows.len())]
    }
}
