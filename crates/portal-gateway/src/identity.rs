use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use portal_core::{User, UserId};
use tracing::debug;

/// Cookie carrying the caller's user id.
pub const COOKIE_NAME: &str = "portal_user";

/// gRPC metadata key carrying the caller's user id.
pub const METADATA_KEY: &str = "x-user-id";

/// Recovers the caller from a presented id, or starts a new session when
/// the id is missing or malformed.
pub fn resolve_user(presented: Option<&str>) -> User {
    match presented.filter(|id| !id.is_empty()).map(UserId::new) {
        Some(Ok(id)) => User::existing(id),
        Some(Err(e)) => {
            debug!(error = %e, "Ignoring malformed user id");
            User::new_session()
        }
        None => User::new_session(),
    }
}

/// Middleware that attaches a [`User`] to every request.
///
/// New sessions get their id back in a `Set-Cookie` header.
pub async fn identify(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let cookie = jar.get(COOKIE_NAME);
    let user = resolve_user(cookie.as_ref().map(Cookie::value));
    let issued = user.is_new.then(|| user.id.to_string());

    request.extensions_mut().insert(user);
    let response = next.run(request).await;

    match issued {
        Some(id) => {
            let cookie = Cookie::build((COOKIE_NAME, id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            (jar.add(cookie), response).into_response()
        }
        None => response,
    }
}
