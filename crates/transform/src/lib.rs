pub mod error;
pub mod layout;
pub mod path;
pub mod reshape;

pub use error::TransformError;
pub use reshape::{Reshaper, SpecReshaper};
