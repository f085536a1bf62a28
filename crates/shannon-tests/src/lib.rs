//! Integration test suite for the Shannon wallet engine.
//!
//! Exercises the wallet end to end against an in-memory chain that pages
//! live cells the way an indexer does and applies submitted transfers.

pub mod helpers;
