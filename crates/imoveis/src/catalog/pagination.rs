use serde::{Deserialize, Serialize};

/// Page number and size requested by a caller, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 12;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.limit as usize)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results in the list endpoint's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn slice(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len();
        let data = items
            .into_iter()
            .skip(request.offset())
            .take(request.limit as usize)
            .collect();
        Self {
            data,
            total,
            page: request.page,
            limit: request.limit,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn total_pages(&self) -> u32 {
        let limit = self.limit.max(1) as usize;
        let pages = self.total.div_ceil(limit).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSlot {
    Page(u32),
    Gap,
}

/// Pager buttons: first, last and the neighbours of the current page, with a
/// gap marker wherever numbers are skipped.
pub fn page_window(current: u32, total_pages: u32) -> Vec<PageSlot> {
    if total_pages <= 1 {
        return Vec::new();
    }
    let current = current.clamp(1, total_pages);

    let mut pages = vec![
        1,
        current.saturating_sub(1),
        current,
        current.saturating_add(1),
        total_pages,
    ];
    pages.retain(|page| (1..=total_pages).contains(page));
    pages.sort_unstable();
    pages.dedup();

    let mut slots = Vec::with_capacity(pages.len() + 2);
    let mut previous: Option<u32> = None;
    for page in pages {
        if let Some(prev) = previous {
            if page > prev + 1 {
                slots.push(PageSlot::Gap);
            }
        }
        slots.push(PageSlot::Page(page));
        previous = Some(page);
    }
    slots
}
