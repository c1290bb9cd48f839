use std::ops::Range;

use tuneline_protocol::Scrobble;

/// A page navigation request. Every variant is clamped into the valid page
/// range; none of them can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Previous,
    Next,
    Last,
    /// 1-based page number.
    Goto(usize),
}

/// Page cursor over a list of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_size: usize,
    total_items: usize,
    current: usize,
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            total_items: 0,
            current: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// At least one page, even for an empty list.
    pub fn total_pages(&self) -> usize {
        total_pages(self.total_items, self.page_size)
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    /// Track a new list length. A page that no longer exists snaps to the
    /// last one.
    pub fn set_total(&mut self, total_items: usize) {
        self.total_items = total_items;
        self.current = self.clamp(self.current);
    }

    pub fn navigate(&mut self, nav: PageNav) -> usize {
        let target = match nav {
            PageNav::First => 1,
            PageNav::Previous => self.current.saturating_sub(1),
            PageNav::Next => self.current.saturating_add(1),
            PageNav::Last => self.total_pages(),
            PageNav::Goto(page) => page,
        };
        self.current = self.clamp(target);
        self.current
    }

    /// The current page's slice of `items`.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let window = page_window(items.len(), self.page_size, self.current);
        &items[window]
    }

    /// 1-based page holding `row` of the full list.
    pub fn page_for_row(&self, row: usize) -> usize {
        self.clamp(row / self.page_size + 1)
    }

    fn clamp(&self, page: usize) -> usize {
        page.clamp(1, self.total_pages())
    }
}

/// One page of scrobbles, ready for the list view.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    pub items: &'a [Scrobble],
    pub current_page: usize,
    pub total_pages: usize,
    /// Row of `items[0]` within the full list.
    pub first_row: usize,
}

impl<'a> PageView<'a> {
    pub fn new(pagination: &Pagination, all: &'a [Scrobble]) -> Self {
        let window = page_window(all.len(), pagination.page_size(), pagination.current_page());
        Self {
            first_row: window.start,
            items: &all[window],
            current_page: pagination.current_page(),
            total_pages: pagination.total_pages(),
        }
    }
}

pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1)).max(1)
}

/// Clamp `requested` into range and return it with its slice of `items`.
pub fn paginate<T>(items: &[T], page_size: usize, requested: usize) -> (usize, &[T]) {
    let page = requested.clamp(1, total_pages(items.len(), page_size));
    (page, &items[page_window(items.len(), page_size, page)])
}

fn page_window(len: usize, page_size: usize, page: usize) -> Range<usize> {
    let size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(size).min(len);
    let end = start.saturating_add(size).min(len);
    start..end
}
