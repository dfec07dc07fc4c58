//! Visitor analytics for a portfolio website
//!
//! Tracks page views and serves aggregate views over them:
//! - Client IP / user-agent extraction and device classification
//! - Best-effort GeoIP enrichment through an HTTP lookup service
//! - SQLite persistence with precomputed aggregate views

pub mod config;
pub mod db;
pub mod error;
pub mod geoip;
pub mod request;
pub mod user_agent;
pub mod web;
