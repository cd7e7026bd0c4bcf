//! # Birch Testkit
//!
//! Testing utilities for Birch feeds.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known events with their expected canonical bytes,
//!   digests and signatures, for cross-implementation checks
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helpers for building signed chains
//!
//! ## Golden Vectors
//!
//! ```rust
//! use birch_testkit::vectors::{all_vectors, event_from_vector};
//!
//! for vector in all_vectors() {
//!     let event = event_from_vector(&vector);
//!     let encoded = event.encode().unwrap();
//!     assert_eq!(hex::encode(encoded), vector.expected_encoding);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use birch_testkit::generators::{event_from_params, EventParams};
//!
//! proptest! {
//!     #[test]
//!     fn encoding_is_deterministic(params: EventParams) {
//!         let e1 = event_from_params(&params);
//!         let e2 = event_from_params(&params);
//!         prop_assert_eq!(e1.encode().unwrap(), e2.encode().unwrap());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use birch_testkit::fixtures::FeedFixture;
//!
//! let fixture = FeedFixture::with_seed([7; 32]);
//! let chain = fixture.make_chain(&[&b"one"[..], &b"two"[..]]);
//! assert_eq!(chain.len(), 2);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_author_fixtures, FeedFixture};
pub use generators::{event_from_params, EventParams};
pub use vectors::{all_vectors, event_from_vector, verify_all_vectors, GoldenVector};
