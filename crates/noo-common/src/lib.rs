//! Shared infrastructure for the Noolang toolchain.
//!
//! Currently this is just source positions: byte-offset [`Span`]s and the
//! [`LineIndex`] used to turn them into human-readable line/column pairs
//! for diagnostics.

pub mod span;

pub use span::{LineIndex, Span};
