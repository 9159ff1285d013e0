//! # market-indexer
//!
//! Restart-safe ingestion pipeline for an NFT marketplace contract.
//!
//! The indexer polls a HyperSync-style log source for the contract's
//! confirmed logs, decodes them into a closed set of marketplace events and
//! projects them onto PostgreSQL as listings, trades and an append-only
//! history, notifying the users involved. Progress is tracked by a single
//! cursor that is only advanced after every event of a poll cycle has been
//! reconciled, so delivery is at-least-once and every state transition is
//! idempotent.
//!
//! ## Architecture
//!
//! ```text
//! HyperSync (source/)          JSON-RPC node (chain/)
//!     │                            │
//!     ├── EventDecoder (decoder)   │
//!     │                            │
//!     └── Ingestor ── Reconciler ──┘── MetadataSource (enrichment)
//!          (service/)    │
//!                        ├── Store (persistence/) ── PostgreSQL
//!                        └── Notifier ── NotificationBus (domain/)
//!
//! Operations endpoint (api/): /health, /status
//! ```

mod abi;

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod enrichment;
pub mod error;
pub mod http;
pub mod persistence;
pub mod retry;
pub mod service;
pub mod source;
