//! In-memory fakes so unit tests across the workspace don't need a live
//! Postgres (the teacher's own `mqk-testkit`/`mqk-db` "testkit feature"
//! convention, adapted here as a standalone fake crate since this fleet's
//! persistence is a single `qf-bus`/`qf-kv` pair rather than per-crate
//! feature flags).

pub mod fake_bus;
pub mod fake_kv;

pub use fake_bus::FakeBus;
pub use fake_kv::FakeKv;
