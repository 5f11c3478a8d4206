//! The three batch stages: transform, load, query.

pub mod load;
pub mod query;
pub mod request;
pub mod transform;
