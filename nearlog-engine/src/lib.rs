pub mod backtest;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod expansion;
pub mod heuristics;
pub mod matcher;
pub mod output;
pub mod pipeline;
pub mod provenance;
pub mod store;
