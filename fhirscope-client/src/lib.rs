pub mod client;
pub mod error;
pub mod response;

pub use client::{AuthenticatedClient, ClientConfig};
pub use error::{ErrorKind, FhirError};
pub use response::RawResponse;
