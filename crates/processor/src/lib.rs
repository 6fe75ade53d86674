//! HTTP host for the stock event batch processor.

pub mod app;
