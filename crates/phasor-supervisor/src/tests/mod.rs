//! Crate-level tests spanning several modules.

pub(crate) mod support;
