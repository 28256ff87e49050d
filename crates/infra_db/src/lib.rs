//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL storage engine for the master
//! data domain, implementing the domain's repository ports with SQLx.
//!
//! # Architecture
//!
//! The adapters here and the in-memory engine shipped with the domain
//! crate are interchangeable behind the same port traits; which one a
//! process uses is a wiring decision at startup.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PgPersonRepository};
//!
//! let pool = create_pool(DatabaseConfig::from_env()?).await?;
//! run_migrations(&pool).await?;
//! let persons = PgPersonRepository::new(pool);
//! ```

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::DatabaseError;
pub use pool::{
    create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool,
};
pub use repositories::{PgHouseholdRepository, PgPersonRepository};
