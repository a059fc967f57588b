//! Tests for argument parsing and configuration loading
