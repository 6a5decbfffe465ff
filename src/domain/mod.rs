pub mod models;
pub mod repeat;
pub mod schedule;
