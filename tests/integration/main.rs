//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives a [`dicelink::die::Die`]
//! against a scripted firmware peer over the in-process loopback
//! transport. Nothing here needs a radio.

mod bulk_tests;
mod command_tests;
mod connection_tests;
