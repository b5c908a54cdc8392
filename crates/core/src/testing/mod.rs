//! Testing utilities and mock implementations for E2E tests.
//!
//! The only external dependency of the download engine is HTTP, so a single
//! scripted [`MockWebService`] is enough to exercise every stage without
//! network access. [`fixtures`] builds realistic FDSN response bodies.

mod mock_service;

pub mod fixtures;

pub use mock_service::MockWebService;
