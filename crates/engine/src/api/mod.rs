//! External API clients

pub mod ebay;

pub use ebay::{EbayClient, Listing, SearchError, SearchOutcome};
