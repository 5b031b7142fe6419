//! # Copycat
//!
//! Duplicate and near-duplicate submission detection, packaged as a CLI
//! over SQLite. The detection engine itself lives in `copycat-core`; this
//! crate supplies the pieces around it:
//!
//! ## Architecture
//!
//! ```text
//! file ──▶ copycat submit ──▶ copycat-core Engine ──▶ SqliteRepository
//!                                  │
//!                                  └──▶ TesseractOcr (images)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_repo`] | SQLite submission repository |
//! | [`ocr`] | Tesseract OCR backend |
//! | [`pipeline`] | Engine wiring |
//! | [`submit`] | Submission command |

pub mod compare;
pub mod config;
pub mod db;
pub mod get;
pub mod logging;
pub mod migrate;
pub mod ocr;
pub mod pipeline;
pub mod rebuild;
pub mod sqlite_repo;
pub mod stats;
pub mod submit;
