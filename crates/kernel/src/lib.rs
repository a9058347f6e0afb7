//! Diario Kernel Library
//!
//! Query-construction core of the diario activity journal backend. The
//! `listing` module turns untrusted filter/search/sort/pagination parameters
//! into parameterized PostgreSQL; `schema` declares the entity relationship
//! graph and per-endpoint listing rules that the engine is wired with.

pub mod listing;
pub mod schema;
