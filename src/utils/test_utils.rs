//! Test utilities shared across modules.
