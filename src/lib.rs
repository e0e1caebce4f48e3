//! # Findings Desk
//!
//! Backend for a split-screen security-findings browser: a left panel
//! lists issues loaded from a structured document; a right panel asks a
//! remediation assistant about the selected issue, optionally grounded in
//! text scraped from a reference URL. A settings view creates, edits, and
//! deletes issues.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌────────────┐
//! │ Issue store  │──▶│  Mutation /   │──▶│   HTTP      │
//! │ (JSON blob)  │   │  Flattening   │   │  (axum)     │
//! └──────────────┘   └───────────────┘   └─────┬──────┘
//!                                              │
//!                            ┌─────────────────┤
//!                            ▼                 ▼
//!                      ┌──────────┐      ┌──────────┐
//!                      │  Scrape  │      │ Assistant │
//!                      │ (fan-out)│      │  (proxy)  │
//!                      └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fdesk init               # seed the issue store
//! fdesk list               # print the flattened issue list
//! fdesk serve              # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Nested document and flat display types |
//! | [`store`] | File-backed document store with seed fallback |
//! | [`flatten`] | Nested document → flat display list projection |
//! | [`mutate`] | Create/update/delete with invariant enforcement |
//! | [`scrape`] | Batch URL fetch and HTML text extraction |
//! | [`assistant`] | Chat-completion proxy for the remediation assistant |
//! | [`server`] | JSON HTTP server |

pub mod assistant;
pub mod config;
pub mod flatten;
pub mod models;
pub mod mutate;
pub mod scrape;
pub mod server;
pub mod store;
