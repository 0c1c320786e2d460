pub mod connection;
pub mod operations;

pub use operations::{store_alert, store_classification, store_durations};
