//! Integration tests for undo/redo of quantity mutations

mod history_tests;
