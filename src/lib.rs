//! Sessionpage - server-side session state over HTTP
//!
//! A small web application that keeps per-visitor form data in a server-side
//! session identified by a cookie, with pluggable session storage.

pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod store;
pub mod views;
