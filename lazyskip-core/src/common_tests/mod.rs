//! Reclaimer-generic test suites.
//!
//! Every function takes a list (or a way to build one) so the same checks
//! run against each reclamation domain from the `tests/` directories.

pub mod skip_list_core_tests;

use crate::LazySkipList;

/// Integer map used by the shared suites.
pub type IntList<R> = LazySkipList<i64, i64, R>;
