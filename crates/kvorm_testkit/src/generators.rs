//! Property-based test generators using proptest.
//!
//! Strategies favour small alphabets so generated records collide on index
//! keys often enough to exercise shared and removed entries.

use crate::fixtures::TestRecord;
use kvorm_core::PageRequest;
use proptest::prelude::*;

/// Strategy for record names: short and lowercase, sometimes empty.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-d]{0,4}").expect("Invalid regex")
}

/// Strategy for metadata: up to two bytes from a four-letter alphabet,
/// sometimes empty.
pub fn metadata_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c', b'd']), 0..3)
}

/// Strategy for records without an id.
pub fn record_strategy() -> impl Strategy<Value = TestRecord> {
    (name_strategy(), metadata_strategy())
        .prop_map(|(name, metadata)| TestRecord::new(name, &metadata))
}

/// A mutation applied to an auto-id table.
///
/// `slot` selects among the ids created so far, modulo their count.
#[derive(Debug, Clone)]
pub enum TableOp {
    /// Create a record.
    Create(TestRecord),
    /// Replace an existing record.
    Update {
        /// Selector of the target id.
        slot: usize,
        /// Replacement record.
        record: TestRecord,
    },
    /// Delete an existing record.
    Delete {
        /// Selector of the target id.
        slot: usize,
    },
}

/// Strategy for a single table mutation.
pub fn table_op_strategy() -> impl Strategy<Value = TableOp> {
    prop_oneof![
        3 => record_strategy().prop_map(TableOp::Create),
        2 => (any::<usize>(), record_strategy())
            .prop_map(|(slot, record)| TableOp::Update { slot, record }),
        1 => any::<usize>().prop_map(|slot| TableOp::Delete { slot }),
    ]
}

/// Strategy for a sequence of mutations.
pub fn table_ops_strategy(min_ops: usize, max_ops: usize) -> impl Strategy<Value = Vec<TableOp>> {
    prop::collection::vec(table_op_strategy(), min_ops..max_ops)
}

/// Strategy for first-page requests with a positive limit.
pub fn page_request_strategy() -> impl Strategy<Value = PageRequest> {
    (1u64..8, any::<bool>(), any::<bool>()).prop_map(|(limit, count_total, reverse)| {
        PageRequest::new()
            .with_limit(limit)
            .with_count_total(count_total)
            .with_reverse(reverse)
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
