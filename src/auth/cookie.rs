//! Cookie parsing and `Set-Cookie` construction for the refresh token.

use axum::http::{HeaderMap, header};

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                let value = value.trim();
                return (!value.is_empty()).then_some(value);
            }
        }
    }
    None
}

/// `Set-Cookie` value carrying a refresh token that lives `max_age_secs`.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        REFRESH_COOKIE_NAME,
        token,
        max_age_secs.max(0),
        secure_attr(secure)
    )
}

/// `Set-Cookie` value that removes the refresh token cookie.
pub fn clear_refresh_cookie(secure: bool) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
        REFRESH_COOKIE_NAME,
        secure_attr(secure)
    )
}

fn secure_attr(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}
