mod export;
mod filter;
mod pagination;
mod pdf;
mod summary;

pub use export::{default_export_name, disposition_filename, ExportFile, ExportFormat};
pub use filter::{
    check_date_range, parse_date, ListFilter, PdfFilter, PdfSort, SummaryFilter, SummarySort,
};
pub use pagination::{Page, PaginationMeta};
pub use pdf::{PdfRecord, PdfStatus};
pub use summary::{Language, Style, Summary, SummaryStatus};

/// Records addressed by a backend-assigned identifier.
pub trait Identified {
    fn id(&self) -> &str;
}
