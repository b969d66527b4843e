mod backend;
mod client;
#[cfg(test)]
pub mod testing;

pub use backend::SummaryBackend;
pub use client::ApiClient;
