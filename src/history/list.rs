use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::api::SummaryBackend;
use crate::error::{AppError, Result};
use crate::models::{
    check_date_range, ExportFile, ExportFormat, Language, ListFilter, Page, PaginationMeta,
    PdfFilter, PdfRecord, PdfSort, Style, Summary, SummaryFilter, SummarySort, SummaryStatus,
};

/// One page of a backend list plus the filters that produced it.
///
/// Filter and page changes only mark the list dirty; [`sync`] then does a
/// single fetch with everything current. The backend does all filtering.
///
/// [`sync`]: HistoryList::sync
#[derive(Debug, Clone)]
pub struct HistoryList<F, T> {
    filter: F,
    page: u32,
    limit: u32,
    items: Vec<T>,
    meta: PaginationMeta,
    selected: usize,
    dirty: bool,
    request_seq: u64,
}

/// A fetch handed out by [`HistoryList::take_request`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest<F> {
    pub seq: u64,
    pub filter: F,
    pub page: u32,
    pub limit: u32,
}

pub type PdfHistory = HistoryList<PdfFilter, PdfRecord>;
pub type SummaryHistory = HistoryList<SummaryFilter, Summary>;

impl<F: ListFilter, T> HistoryList<F, T> {
    /// Starts dirty so the first `sync` loads page 1.
    pub fn new(limit: u32) -> Self {
        Self {
            filter: F::default(),
            page: 1,
            limit: limit.max(1),
            items: Vec::new(),
            meta: PaginationMeta::default(),
            selected: 0,
            dirty: true,
            request_seq: 0,
        }
    }

    /// A list that will fetch `page` of `filter` directly, for one-shot
    /// listings. The page is left for the backend to clamp.
    pub fn with_filter(filter: F, page: u32, limit: u32) -> Result<Self> {
        let (from, to) = filter.date_range();
        check_date_range(from, to).map_err(AppError::InvalidFilter)?;
        Ok(Self {
            filter,
            page: page.max(1),
            ..Self::new(limit)
        })
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    pub fn meta(&self) -> &PaginationMeta {
        &self.meta
    }

    pub fn total_pages(&self) -> u32 {
        self.meta.total_pages.max(1)
    }

    /// Force a re-fetch of the current page, e.g. after a mutation.
    /// Sequence number of the newest fetch handed out.
    pub fn request_seq(&self) -> u64 {
        self.request_seq
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn has_active_filters(&self) -> bool {
        self.filter.is_active()
    }

    /// Apply `change` to a copy of the filter. If the result differs it
    /// replaces the filter, the page goes back to 1 and the list is marked
    /// dirty. Returns whether anything changed.
    pub fn update_filter(&mut self, change: impl FnOnce(&mut F)) -> Result<bool> {
        let mut next = self.filter.clone();
        change(&mut next);
        if next == self.filter {
            return Ok(false);
        }
        let (from, to) = next.date_range();
        check_date_range(from, to).map_err(AppError::InvalidFilter)?;

        self.filter = next;
        self.page = 1;
        self.selected = 0;
        self.dirty = true;
        Ok(true)
    }

    pub fn set_search(&mut self, search: &str) -> Result<bool> {
        self.update_filter(|f| f.set_search(search))
    }

    pub fn set_date_range(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<bool> {
        self.update_filter(|f| f.set_date_range(from, to))
    }

    pub fn clear_filters(&mut self) -> bool {
        self.update_filter(|f| *f = F::default()).unwrap_or(false)
    }

    /// Move to `page`, clamped to the known page range.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        let page = page.clamp(1, self.total_pages());
        if page == self.page {
            return false;
        }
        self.page = page;
        self.selected = 0;
        self.dirty = true;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.go_to_page(self.page.saturating_sub(1))
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.items.len().saturating_sub(1);
    }

    /// Keep the cursor inside the list after items were removed.
    pub fn clamp_selection(&mut self) {
        if self.selected >= self.items.len() {
            self.selected = self.items.len().saturating_sub(1);
        }
    }

    /// Hand out the fetch for the current state if anything changed since
    /// the last one, clearing the dirty flag. Only the newest request's
    /// page is accepted by [`apply_page`].
    ///
    /// [`apply_page`]: HistoryList::apply_page
    pub fn take_request(&mut self) -> Option<ListRequest<F>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.request_seq += 1;
        Some(ListRequest {
            seq: self.request_seq,
            filter: self.filter.clone(),
            page: self.page,
            limit: self.limit,
        })
    }

    pub fn apply_page(&mut self, seq: u64, page: Page<T>) -> bool {
        if seq != self.request_seq {
            tracing::debug!("Dropping stale list page (request {} of {})", seq, self.request_seq);
            return false;
        }
        self.items = page.data;
        self.meta = page.meta;
        self.clamp_selection();
        true
    }

    /// Fetch the current page if anything changed since the last fetch.
    /// The dirty flag is cleared even when the fetch fails; nothing retries
    /// on its own.
    pub async fn sync<Fut>(&mut self, fetch: impl FnOnce(F, u32, u32) -> Fut) -> Result<bool>
    where
        Fut: Future<Output = Result<Page<T>>>,
    {
        let Some(request) = self.take_request() else {
            return Ok(false);
        };
        let page = fetch(request.filter, request.page, request.limit).await?;
        Ok(self.apply_page(request.seq, page))
    }

    /// Filters to send with an export: none unless some are active.
    pub fn export_filter(&self) -> Option<F> {
        self.has_active_filters().then(|| self.filter.clone())
    }

    /// Export every row matching the current filters (all rows when none
    /// are active) and save the file under `dir`.
    pub async fn export<Fut>(
        &self,
        format: ExportFormat,
        dir: &Path,
        fetch: impl FnOnce(Option<F>, ExportFormat) -> Fut,
    ) -> Result<PathBuf>
    where
        Fut: Future<Output = Result<ExportFile>>,
    {
        let file = fetch(self.export_filter(), format).await?;
        let path = file.save_in(dir)?;
        tracing::info!("Exported {} bytes to {}", file.bytes.len(), path.display());
        Ok(path)
    }
}

impl HistoryList<PdfFilter, PdfRecord> {
    pub fn set_sort(&mut self, sort: PdfSort) -> Result<bool> {
        self.update_filter(|f| f.sort = sort)
    }

    pub async fn sync_from(&mut self, backend: &dyn SummaryBackend) -> Result<bool> {
        self.sync(|filter, page, limit| async move { backend.list_pdfs(&filter, page, limit).await })
            .await
    }

    pub async fn export_from(&self, backend: &dyn SummaryBackend, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
        self.export(format, dir, |filter, format| async move {
            backend.export_pdfs(filter.as_ref(), format).await
        })
        .await
    }
}

impl HistoryList<SummaryFilter, Summary> {
    pub fn set_sort(&mut self, sort: SummarySort) -> Result<bool> {
        self.update_filter(|f| f.sort = sort)
    }

    pub fn set_status(&mut self, status: Option<SummaryStatus>) -> Result<bool> {
        self.update_filter(|f| f.status = status)
    }

    pub fn set_language(&mut self, language: Option<Language>) -> Result<bool> {
        self.update_filter(|f| f.language = language)
    }

    pub fn set_style(&mut self, style: Option<Style>) -> Result<bool> {
        self.update_filter(|f| f.style = style)
    }

    pub async fn sync_from(&mut self, backend: &dyn SummaryBackend, pdf_id: &str) -> Result<bool> {
        self.sync(|filter, page, limit| async move {
            backend.list_summaries(pdf_id, &filter, page, limit).await
        })
        .await
    }

    pub async fn export_from(
        &self,
        backend: &dyn SummaryBackend,
        pdf_id: &str,
        format: ExportFormat,
        dir: &Path,
    ) -> Result<PathBuf> {
        self.export(format, dir, |filter, format| async move {
            backend.export_summaries(pdf_id, filter.as_ref(), format).await
        })
        .await
    }

    /// Replace everything with a fresh, unfiltered state for another PDF.
    /// The request counter keeps going so pages requested before the reset
    /// stay stale.
    pub fn reset(&mut self) {
        *self = Self {
            request_seq: self.request_seq,
            ..Self::new(self.limit)
        };
    }
}
