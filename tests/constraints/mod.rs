//! Integration tests for the constraint engine

// Constraint registration, cascades and teardown
mod constraint_tests;

// Enable/disable semantics
mod enable_tests;
