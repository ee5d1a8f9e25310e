//! Test doubles shared by the unit tests.

mod fake_backend;

pub use fake_backend::{FakeBackend, FakeBehavior};
