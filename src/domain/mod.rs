pub mod digest;
pub mod record;
