//! Domain data types.
//!
//! - [`criteria`] - Run input: query, category, ordered filters
//! - [`site`] - Per-site selector and navigation profiles
//! - [`listing`] - Transient candidate listings from the navigator
//! - [`record`] - Raw extracted records, pre-reconciliation
//! - [`product`] - Canonical products, variants, price history
//! - [`schema`] - Category extraction schemas and validation
//! - [`config`] - Tunables for every pipeline stage

pub mod config;
pub mod criteria;
pub mod listing;
pub mod product;
pub mod record;
pub mod schema;
pub mod site;
