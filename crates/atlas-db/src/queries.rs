//! Database query functions organized by domain.

pub mod agreements;
pub mod financials;
pub mod ledgers;
pub mod partners;
pub mod settings;
pub mod statements;
