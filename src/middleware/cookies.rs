use axum::http::{header, HeaderMap, HeaderName};
use cookie::{time, Cookie, SameSite};

/// First cookie called `name` across all `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// httpOnly session cookie for one portal
pub fn session_cookie(name: &str, token: &str, max_age: chrono::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// Readable by the browser, kept for a year
pub fn preference_cookie(name: &str, value: &str, max_age_days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), value.to_string()))
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(max_age_days))
        .build()
}

/// Expires `name` immediately
pub fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), String::new()))
        .path("/")
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// `Set-Cookie` pair for `AppendHeaders`
pub fn set_cookie(cookie: &Cookie<'_>) -> (HeaderName, String) {
    (header::SET_COOKIE, cookie.to_string())
}
