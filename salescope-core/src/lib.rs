//! # salescope-core
//!
//! Core library for salescope - a natural-language OLAP analytics engine
//! over a star-schema sales dataset.
//!
//! This library provides:
//! - Domain types for filters, result tables, plans, and agent outputs
//! - SQLite storage layer with the star schema and migrations
//! - Parameterized query building (grouping, hierarchies, pivots)
//! - Analytical agents (navigation, cube ops, KPIs, anomalies, reports)
//! - Query planning (LLM with deterministic keyword fallback)
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! A user turn flows through three stages:
//! - **Plan:** the planner turns the question into an ordered list of
//!   agent steps
//! - **Execute:** the orchestrator runs each step against the database,
//!   isolating per-step failures
//! - **Narrate:** succeeding steps' summaries are joined into the answer
//!
//! ## Example
//!
//! ```rust,no_run
//! use salescope_core::{Config, Database, Orchestrator};
//!
//! # async fn run() {
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&config.database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let mut session = Orchestrator::new(db, config.planner.as_ref()).unwrap();
//! let result = session.process("compare 2023 and 2024 by region").await;
//! println!("{}", result.narrative);
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
pub use planner::{ConversationHistory, Planner};
pub use types::*;

// Public modules
pub mod agents;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod orchestrator;
pub mod planner;
pub mod query;
pub mod types;
