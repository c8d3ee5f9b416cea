//! Windowed page-number navigation.
//!
//! [`PaginationView::compute`] turns `(current_page, total_items,
//! items_per_page)` into the set of controls a page switcher shows: a
//! window of at most [`WINDOW_SIZE`] page numbers, the first and last page
//! when they fall outside the window, ellipses where there is a gap, and
//! previous/next enablement.

/// Number of page buttons shown at once.
pub const WINDOW_SIZE: u32 = 4;

/// Total number of pages needed for `total_items`. Zero items, or a page size
/// of zero, yields zero pages.
pub fn total_pages(total_items: usize, items_per_page: usize) -> u32 {
    if items_per_page == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(items_per_page);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// The items that belong on `page` (1-based). Out-of-range pages are empty.
pub fn page_slice<T>(items: &[T], page: u32, items_per_page: usize) -> &[T] {
    if page == 0 || items_per_page == 0 {
        return &[];
    }
    let start = (page as usize - 1).saturating_mul(items_per_page);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(items_per_page).min(items.len());
    &items[start..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageControl {
    Previous { enabled: bool },
    Page { number: u32, current: bool },
    Ellipsis,
    Next { enabled: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationView {
    pub current_page: u32,
    pub total_pages: u32,
    pub visible_pages: Vec<u32>,
    pub show_first_page: bool,
    pub show_leading_ellipsis: bool,
    pub show_last_page: bool,
    pub show_trailing_ellipsis: bool,
    pub previous_enabled: bool,
    pub next_enabled: bool,
}

impl PaginationView {
    /// Compute the view, or `None` when there is at most one page and no
    /// pagination should be rendered. `current_page` is clamped into
    /// `[1, total_pages]`.
    pub fn compute(current_page: u32, total_items: usize, items_per_page: usize) -> Option<Self> {
        let total = total_pages(total_items, items_per_page);
        if total <= 1 {
            return None;
        }
        let current = current_page.clamp(1, total);

        let mut start = current.saturating_sub(WINDOW_SIZE / 2).max(1);
        let mut end = start.saturating_add(WINDOW_SIZE - 1);

        if end > total {
            end = total;
            start = end.saturating_sub(WINDOW_SIZE - 1).max(1);
        }

        // Re-apply the clamp when the window came out short of a full run.
        if end - start + 1 < WINDOW_SIZE && start > 1 {
            start = end.saturating_sub(WINDOW_SIZE - 1).max(1);
        }

        let visible_pages: Vec<u32> = (start..=end).collect();
        let first = start;
        let last = end;

        Some(PaginationView {
            current_page: current,
            total_pages: total,
            visible_pages,
            show_first_page: first > 1,
            show_leading_ellipsis: first > 2,
            show_last_page: last < total,
            show_trailing_ellipsis: last < total - 1,
            previous_enabled: current > 1,
            next_enabled: current < total,
        })
    }

    /// Clamp a requested page into `[1, total_pages]`.
    pub fn request_page(&self, target: u32) -> u32 {
        target.clamp(1, self.total_pages)
    }

    pub fn previous_page(&self) -> Option<u32> {
        self.previous_enabled
            .then(|| self.request_page(self.current_page - 1))
    }

    pub fn next_page(&self) -> Option<u32> {
        self.next_enabled
            .then(|| self.request_page(self.current_page + 1))
    }

    /// Controls in display order.
    pub fn controls(&self) -> Vec<PageControl> {
        let mut controls = Vec::with_capacity(self.visible_pages.len() + 6);
        controls.push(PageControl::Previous {
            enabled: self.previous_enabled,
        });
        if self.show_first_page {
            controls.push(self.page(1));
            if self.show_leading_ellipsis {
                controls.push(PageControl::Ellipsis);
            }
        }
        controls.extend(self.visible_pages.iter().map(|&n| self.page(n)));
        if self.show_last_page {
            if self.show_trailing_ellipsis {
                controls.push(PageControl::Ellipsis);
            }
            controls.push(self.page(self.total_pages));
        }
        controls.push(PageControl::Next {
            enabled: self.next_enabled,
        });
        controls
    }

    fn page(&self, number: u32) -> PageControl {
        PageControl::Page {
            number,
            current: number == self.current_page,
        }
    }
}
