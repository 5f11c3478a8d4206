pub mod db;
pub mod error;
pub mod objects;
pub mod queries;
pub(crate) mod schema;
pub mod tracks;
