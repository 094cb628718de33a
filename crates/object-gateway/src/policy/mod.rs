//! Authorization and key-namespace policy.
//!
//! Every object a user touches lives under `{namespace_root}/{subject}/`.
//! Upload keys are derived here, never taken from the client, and every
//! client-supplied key is checked here before it reaches storage.
//!
//! # Components
//!
//! - `key` - The `ObjectKey` newtype
//! - `namespace` - `KeyPolicy`: key derivation, ownership check, list prefix

pub mod key;
pub mod namespace;

pub use key::ObjectKey;
pub use namespace::{AuthzError, KeyPolicy};
