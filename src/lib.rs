pub mod analysis;
pub mod cohort;
pub mod db;
pub mod export;
pub mod import;
pub mod models;
pub mod prediction;
pub mod recommendations;
pub mod report;
pub mod scoring;
pub mod trends;
