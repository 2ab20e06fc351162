//! Career advice handlers
//!
//! A handler routes a query to collaborator handlers, gathers their replies
//! (and optionally one auxiliary result), decides when it has enough, and
//! sends a single synthesized reply back to whoever asked.

pub mod catalog;
mod worker;
pub mod spec;

pub use worker::{Handler, HandlerMetrics, respond};
pub use spec::{AuxiliarySource, HandlerSpec, scrape_url};
