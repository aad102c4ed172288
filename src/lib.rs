//! Blood and organ bank inventory service.
//!
//! HTTP handlers validate a payload, hand one transactional unit to a
//! [`store::Store`] and turn the outcome into JSON.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod pages;
pub mod rules;
pub mod sql;
pub mod store;
pub mod types;
