//! Integration tests for unit parsing and conversion

mod conversion_tests;
