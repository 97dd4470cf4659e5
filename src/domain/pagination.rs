//! Cursor pagination types shared by every repository

/// Page size used when the caller asks for zero or a negative limit
pub const DEFAULT_PAGE_LIMIT: usize = 25;

/// Resolves a caller-supplied limit into an effective page size
pub fn page_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_PAGE_LIMIT
    } else {
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

/// One page of results ordered by primary key
///
/// `next_cursor` is the key of the last item when the page is full and empty
/// otherwise. Passing it back as the cursor resumes strictly after that key.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: String,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, limit: usize, cursor_of: impl Fn(&T) -> String) -> Self {
        let next_cursor = match items.last() {
            Some(last) if items.len() == limit => cursor_of(last),
            _ => String::new(),
        };

        Self { items, next_cursor }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when another page may follow
    pub fn has_more(&self) -> bool {
        !self.next_cursor.is_empty()
    }
}
