//! Benchmark harnesses for the engine core, kept as a scaffold (§1
//! out-of-scope collaborators: performance benchmarking is outside this
//! crate's scope). Actual `criterion` benches live under `bench/` once
//! written; this crate exists so the workspace graph stays coherent.
#![allow(dead_code)]
