//! Credit Funding API Library
//!
//! Credit profile aggregation, funding probability and timeline projection,
//! the Million Mode sequencer, and the consent plus admin approval gate that
//! every high-risk action passes through.
//!
//! # Modules
//!
//! - `api`: HTTP-facing handlers.
//! - `core`: Funding engine and gated workflows.
//! - `integrations`: Outbound notification client.
//! - `approval`: Gated action lifecycle and admin decisions.
//! - `calculator`: Single-target approval probability.
//! - `catalog`: Static funding product catalog.
//! - `circuit_breaker`: Circuit breaker for outbound calls.
//! - `config`: Configuration management.
//! - `consent`: E-signature consent records and the consent gate.
//! - `db`: Database connection and pool management.
//! - `disputes`: Credit report dispute drafts.
//! - `errors`: Error handling types.
//! - `million_mode`: Eligibility filter and throttled scheduling.
//! - `models`: Row, request and response models.
//! - `notifier`: Admin notification client.
//! - `profile`: Credit profile aggregation.
//! - `rate_limit`: Per-user operation limits.
//! - `storage`: Postgres persistence.
//! - `timeline`: Multi-target funding timeline.
//! - `workflows`: Request-level orchestration and store traits.

pub mod api;
pub mod core;
pub mod integrations;

pub mod admin_handler;
pub mod approval;
pub mod calculator;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod consent;
pub mod db;
pub mod disputes;
pub mod errors;
pub mod handlers;
pub mod million_mode;
pub mod models;
pub mod notifier;
pub mod profile;
pub mod rate_limit;
pub mod storage;
pub mod timeline;
pub mod workflows;
