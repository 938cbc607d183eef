//! Crate-level tests: shared fixtures, CLI runtime tests, and behaviour
//! scenarios.

pub(crate) mod support;
