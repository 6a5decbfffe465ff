pub mod account_client;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod state_repository;
pub mod storage;
pub mod sync_log_repository;
