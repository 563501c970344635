use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::Engine;

use bankd_core::BankError;
use bankd_engine::UserService;
use bankd_store::LedgerStore;

/// State handed to the auth middleware.
pub struct AuthState<S: LedgerStore> {
    pub users: UserService<S>,
}

impl<S: LedgerStore> Clone for AuthState<S> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
        }
    }
}

/// HTTP Basic authentication.
///
/// Decodes the `Authorization` header, verifies the credential pair against
/// the store, and inserts the resulting `Principal` into request extensions.
pub async fn auth_middleware<S: LedgerStore>(
    State(state): State<AuthState<S>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let (username, password) = extract_basic(req.headers())?;

    let principal = state
        .users
        .verify_credentials(&username, &password)
        .await
        .map_err(|e| match e {
            BankError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

fn extract_basic(headers: &HeaderMap) -> Result<(String, String), StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?
        .trim();

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let decoded = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let (username, password) = decoded.split_once(':').ok_or(StatusCode::UNAUTHORIZED)?;
    if username.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn well_formed_basic_header_parses() {
        // "alice:hunter2"
        let headers = headers_with("Basic YWxpY2U6aHVudGVyMg==");
        let (user, pass) = extract_basic(&headers).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(pass, "hunter2");
    }

    #[test]
    fn password_may_contain_colons() {
        // "alice:a:b:c"
        let headers = headers_with("Basic YWxpY2U6YTpiOmM=");
        let (user, pass) = extract_basic(&headers).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(pass, "a:b:c");
    }

    #[test]
    fn missing_or_mangled_headers_are_unauthorized() {
        assert!(extract_basic(&HeaderMap::new()).is_err());
        assert!(extract_basic(&headers_with("Bearer abc")).is_err());
        assert!(extract_basic(&headers_with("Basic not-base64!!")).is_err());
        // "nocolon"
        assert!(extract_basic(&headers_with("Basic bm9jb2xvbg==")).is_err());
        // ":password" (empty username)
        assert!(extract_basic(&headers_with("Basic OnBhc3N3b3Jk")).is_err());
    }
}
