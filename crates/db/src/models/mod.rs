//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create/upsert DTO consumed by the matching repository

pub mod integration;
pub mod job;
pub mod order;
pub mod product;
pub mod status;
pub mod webhook;
