//! Reconciles per-specimen genetic-marker accessions into connections and
//! scores how complete their GenBank metadata is.

pub mod cache;
pub mod config;
pub mod connections;
pub mod domain;
pub mod error;
pub mod genbank;
pub mod lock;
pub mod metadata;
pub mod ncbi;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod source_table;
pub mod store;
