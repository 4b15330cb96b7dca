//! Board data model.

pub mod emotion;
