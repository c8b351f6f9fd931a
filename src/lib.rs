//! # refdex
//!
//! An incrementally-maintained full-text search index over a Zotero
//! reference library, with citation rendering on top.
//!
//! The Zotero application owns the source database; refdex mirrors it into
//! a purpose-built SQLite FTS index and keeps that index fresh with a
//! timestamp-driven diff instead of a full rebuild. A record pulled back
//! out of the index carries a cached CSL-JSON projection, which the style
//! catalog and an external citeproc program turn into a formatted
//! citation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌─────────────┐
//! │ zotero.sqlite │──▶│ normalize  │──▶│ search index │
//! │  (read-only)  │   │ sync diff  │   │ FTS5 + JSON │
//! └──────────────┘   └────────────┘   └──────┬──────┘
//!                                            │
//!                          ┌─────────────────┤
//!                          ▼                 ▼
//!                    ┌──────────┐      ┌───────────┐
//!                    │  search   │      │ cite (CSL) │
//!                    └──────────┘      └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Canonical record types |
//! | [`zotero`] | Read-only source database adapter |
//! | [`normalize`] | Raw rows → canonical records |
//! | [`index`] | Versioned FTS index store + ranked search |
//! | [`sync`] | Incremental diff-and-reconcile engine |
//! | [`csl`] | CSL-JSON projection |
//! | [`styles`] | Style catalog with parent-style resolution |
//! | [`locales`] | Supported citation locales |
//! | [`cite`] | External renderer boundary, HTML→RTF |
//! | [`cache`] | Versioned key-value store |

pub mod app;
pub mod cache;
pub mod cite;
pub mod config;
pub mod csl;
pub mod db;
pub mod get;
pub mod index;
pub mod locales;
pub mod models;
pub mod normalize;
pub mod search;
pub mod styles;
pub mod sync;
pub mod util;
pub mod zotero;
