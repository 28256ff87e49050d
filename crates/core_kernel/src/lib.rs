//! Core Kernel - Foundational types for the master data system
//!
//! This crate provides the fundamental building blocks used across the
//! master data modules:
//! - Strongly-typed identifiers (tenant, person, household, history)
//! - The AHV number value object with validation and normalization
//! - Pagination types shared by all repository contracts

pub mod ahv;
pub mod identifiers;
pub mod page;

pub use ahv::{AhvNumber, AhvNumberError};
pub use identifiers::{HistoryEntryId, HouseholdId, PersonId, TenantId};
pub use page::{Page, PageRequest};
