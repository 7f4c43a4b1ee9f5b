//! Records exchanged with remote servers and kept in the credential store.

pub mod introspection;
pub mod metadata;
pub mod registration;
pub mod token;

pub use introspection::{Introspection, IntrospectionResponse};
pub use metadata::ServerMetadata;
pub use registration::{ClientRegistration, RegistrationOutcome, RegistrationRequest};
pub use token::CachedAccessToken;
