//! Fuzz target for whole chat sessions
//!
//! # Strategy
//!
//! - Arbitrary scripts of user intents, peer traffic, gateway faults and
//!   remounts, run through the connection manager and simulated gateway
//!
//! # Invariants
//!
//! - Every standard session invariant holds after every step
//! - No step panics, including completions that land after teardown

#![no_main]

use libfuzzer_sys::fuzz_target;
use pearchat_harness::{Session, Step};

fuzz_target!(|input: (u64, Vec<Step>)| {
    let (seed, steps) = input;
    if let Err(failure) = Session::run_blocking(seed, &steps) {
        panic!("{failure}");
    }
});
