//! Auth-domain value types: ordered scope lists and redacted secrets.

pub mod scope;
pub mod secret;

pub use scope::*;
pub use secret::*;
