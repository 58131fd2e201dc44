//! Builds outbound partner callbacks from declarative configuration.
//!
//! [`CallbackRequestBuilder`] reshapes the input document into the request
//! body, runs the key pipeline (timestamps, nonces, signatures, REST token
//! round-trips) and resolves header placeholders into a [`CallbackRequest`].

pub mod auth;
pub mod error;
pub mod keys;
pub mod message;
pub mod request;
pub mod resolver;
pub mod rest_auth;

pub use auth::AuthStrategy;
pub use error::CallbackError;
pub use keys::{FixedKeySource, KeySource, SystemKeySource};
pub use request::{CallbackRequest, CallbackRequestBuilder};
pub use resolver::KeyMaps;
