//! Missing Person Service
//!
//! Library shared by the API server and the photo worker. The server files
//! reports and stages their photos; the worker claims pending reports,
//! publishes their photos to the image store, and records the outcome.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod shutdown;
pub mod worker;
