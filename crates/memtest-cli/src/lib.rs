//! Host-side driver for the memtest engine.

use memtest_core as _;

/// Generator listings and hex word formatting.
pub mod sequence;
/// One complete write/read-back test run over the reference fabric.
pub mod session;
