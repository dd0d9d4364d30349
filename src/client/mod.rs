//! Rust client for the API with session management.
//!
//! A front end creates one [`SessionContext`], builds an [`ApiClient`] on it,
//! calls [`ApiClient::bootstrap`] once at startup and then watches
//! [`SessionContext::subscribe`] for [`SessionStatus`] changes. Refreshing
//! expired access tokens is handled by the client; concurrent 401s share a
//! single refresh call.

mod api;
mod error;
mod session;
mod single_flight;
mod types;

pub use api::{ApiClient, DEFAULT_BOOTSTRAP_TIMEOUT};
pub use error::{ClientError, RefreshFailure};
pub use session::{SessionContext, SessionState, SessionStatus};
pub use single_flight::{SharedCall, SingleFlight};
pub use types::{Appointment, Me, Profile, ProfileUpdate, Registration, User};
