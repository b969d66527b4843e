mod list;
mod optimistic;

pub use list::{HistoryList, ListRequest, PdfHistory, SummaryHistory};
pub use optimistic::OptimisticRemoval;
