//! Version-control adapter implementations (spec §4.4).

pub mod git_adapter;

#[cfg(any(test, feature = "test-support"))]
pub mod fake_adapter;

pub use git_adapter::GitAdapter;

#[cfg(any(test, feature = "test-support"))]
pub use fake_adapter::FakeVcsAdapter;
