//! # renderiq-gateway
//!
//! Credit-metered REST API gateway for the Renderiq AI render pipeline.
//!
//! This crate orchestrates generation requests against a remote
//! generative-AI provider: it prices each request from a static model
//! catalog, atomically reserves credits, invokes the provider, persists
//! the resulting artifact into durable storage, and records the render
//! in an ordered refinement chain. Credits reserved for a request that
//! later fails are always refunded before the error reaches the caller.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── RenderService (service/)
//!     │
//!     ├── ModelRegistry (domain/)
//!     ├── GenerationClient (generation/)
//!     ├── ArtifactStore (storage/)
//!     │
//!     └── CreditLedger + RenderStore (persistence/: PostgreSQL or in-memory)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod generation;
pub mod persistence;
pub mod service;
pub mod storage;
