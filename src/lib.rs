//! Research Locker - Backend for saving and organizing academic articles
//!
//! This library provides the HTTP API, services and storage used by the
//! Research Locker browser extension and web app.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
