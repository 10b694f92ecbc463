//! Integration tests for the quantity model
//!
//! These tests verify unit and uncertainty propagation and the descriptor
//! and parameter setters.

// Tests for UnitValue arithmetic
mod unit_value_tests;

// Tests for Descriptor and Parameter behaviour in a GlobalObject
mod descriptor_tests;
