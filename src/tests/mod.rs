//! Cross-module test cases for the lifecycle manager.
//!
//! Concurrency scenarios live here; single-threaded behavior is covered next to the code.


pub mod support;
