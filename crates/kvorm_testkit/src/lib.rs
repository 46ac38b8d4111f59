//! # kvorm testkit
//!
//! Test utilities for kvorm.
//!
//! This crate provides:
//! - Fixture records and pre-wired tables and indexes
//! - Property-based test generators using proptest
//! - Key layout test vectors
//! - Tracing initialisation for tests
//!
//! Cross-crate scenarios live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust
//! use kvorm_testkit::prelude::*;
//!
//! init_tracing();
//! let mut fx = RecordFixture::new();
//! let id = fx.create(&TestRecord::new("t1", b"m")).unwrap();
//! assert_eq!(id, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;

static TRACING: Once = Once::new();

/// Installs a test-writer tracing subscriber once per process.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        // Another harness may already have installed a global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
