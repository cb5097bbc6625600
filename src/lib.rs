//! # Buzzboard
//!
//! Mention ingestion and weekly engagement leaderboards for a tracked
//! keyword set.
//!
//! Buzzboard pulls posts mentioning a set of keywords from a paginated
//! social search API, keeps every mention in a single JSON store, and ranks
//! the authors of the last seven days by a recency-weighted engagement
//! score.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌────────────┐
//! │ SearchSource │──▶│ Fetcher  │──▶│   Merge    │
//! │  (HTTP API)  │   │ paginate │   │ dedup by id│
//! └──────────────┘   └──────────┘   └─────┬──────┘
//!                                         ▼
//!                  ┌──────────┐     ┌────────────┐
//!                  │  Scorer  │◀────│ JSON store │
//!                  │ + window │     └─────▲──────┘
//!                  └────┬─────┘           │
//!                       └──── snapshot ───┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! buzz sync                 # fetch, merge, and aggregate once
//! buzz leaderboard          # show this week's ranking
//! buzz history              # list retained weekly snapshots
//! buzz watch                # sync on a fixed interval
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Records, snapshots, persisted state |
//! | [`store`] | JSON-file and in-memory persistence |
//! | [`search_api`] | Upstream search capability |
//! | [`fetch`] | Paginated mention fetcher |
//! | [`merge`] | Deduplicating merge |
//! | [`window`] | Rolling windows and week keys |
//! | [`score`] | Per-user scoring |
//! | [`aggregate`] | Cycle orchestration and snapshots |
//! | [`report`] | CLI rendering |

pub mod aggregate;
pub mod config;
pub mod fetch;
pub mod merge;
pub mod models;
pub mod report;
pub mod score;
pub mod search_api;
pub mod store;
pub mod window;
