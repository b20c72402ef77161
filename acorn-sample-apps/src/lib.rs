//! Sample/demo applications built on the engine core, kept as a
//! scaffold (§1 out-of-scope collaborators). Individual demos are added
//! as binaries under `src/bin/` as they're written; this crate exists
//! so the workspace graph stays coherent.
#![allow(dead_code)]
