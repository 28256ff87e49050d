//! SQLx repository implementations of the domain storage ports

pub mod household;
pub mod person;

pub use household::PgHouseholdRepository;
pub use person::PgPersonRepository;
