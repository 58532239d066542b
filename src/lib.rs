pub mod annotation;
pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod exclusion;
pub mod interchange;
pub mod kb;
pub mod metrics;
pub mod network;
pub mod output;
pub mod record;
pub mod resolver;
pub mod seeds;
pub mod store;
pub mod tables;
pub mod taxonomy;
