//! Aggregate root trait and optimistic version expectations.

/// Aggregate root marker + minimal interface.
///
/// Storage only sees identity and a version counter.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Starts at 1 on creation and grows by exactly one per committed mutation.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
///
/// Storage checks this on write even when the row is already locked.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
