//! Server side of the GDPR compliance portal: the session bridge to the
//! compliance API, the scan monitor, and the report and artifact proxies.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod scan;
pub mod storage;
pub mod utils;
