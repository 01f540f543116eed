//! Vector search module.
//!
//! Brute-force, in-memory cosine similarity per user. The reference system's
//! production deployment uses an ANN index; the scale targets (a single
//! user's personal memory, not a multi-tenant corpus) does not need one, so this
//! stays a straightforward scan, grounded in the same key/vector bookkeeping an
//! ANN index would use internally.

mod vector;

pub use vector::{VectorIndex, VectorMatch};
