pub mod app;
pub mod config;
pub mod date;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod fasta;
pub mod filter;
pub mod fs_util;
pub mod normalize;
pub mod output;
pub mod reconcile;
pub mod selector;
pub mod store;
