//! Session authentication.
//!
//! Two credentials: short-lived access tokens (stateless JWTs sent as
//! `Authorization: Bearer`) and long-lived refresh tokens (opaque, stored in
//! the database, sent as an HTTP-only cookie). Protected routes only ever
//! look at the access token; the refresh token is exchanged for a new one
//! at `/api/auth/refresh-token`.

mod cookie;
mod errors;
mod extractors;
mod refresh;
mod state;

pub use cookie::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
pub use errors::{AuthError, AuthErrorKind};
pub use extractors::{CurrentUser, bearer_token, require_auth};
pub use refresh::{
    DEFAULT_REFRESH_TOKEN_TTL_SECS, IssuedRefreshToken, RefreshTokenError, RefreshTokenManager,
};
pub use state::HasAuthBackend;
