//! Bridge API - backend service for The Bridge Project site
//!
//! This library provides CSRF token protection and the thin API routes the
//! site uses (health, web-vitals ingestion, contact intake).

pub mod api;
pub mod config;
pub mod contact;
pub mod csrf;
pub mod metrics;
pub mod vitals;
