//! HTTP Basic authentication against the users in the project store.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use geoproj_core::{engine::GeometryEngine, spatial::SpatialDatabase, store::ProjectStore};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
  pub username: String,
}

/// Hash `password` into an argon2 PHC string suitable for
/// [`ProjectStore::add_user`].
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Decode `Authorization: Basic ...` into `(username, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let encoded = value.strip_prefix("Basic ")?;
  let decoded = B64.decode(encoded.trim()).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (username, password) = creds.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// Check the request's credentials against `store`.
pub async fn authenticate<S: ProjectStore>(
  store: &S,
  headers: &HeaderMap,
) -> Result<CurrentUser, ApiError> {
  let (username, password) = basic_credentials(headers).ok_or(ApiError::Unauthorized)?;

  let user = store
    .find_user(&username)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or(ApiError::Unauthorized)?;

  let parsed = PasswordHash::new(&user.password_hash).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(CurrentUser { username: user.username })
}

impl<S, G, D> FromRequestParts<AppState<S, G, D>> for CurrentUser
where
  S: ProjectStore + 'static,
  G: GeometryEngine + 'static,
  D: SpatialDatabase + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, G, D>,
  ) -> Result<Self, Self::Rejection> {
    authenticate(&*state.store, &parts.headers).await
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;
  use geoproj_store_sqlite::SqliteStore;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> HeaderMap {
    headers(&format!("Basic {}", B64.encode(format!("{user}:{pass}"))))
  }

  async fn store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.add_user("alice", &hash_password("secret").unwrap()).await.unwrap();
    store
  }

  #[test]
  fn decodes_basic_header() {
    assert_eq!(
      basic_credentials(&basic("alice", "pa:ss")),
      Some(("alice".into(), "pa:ss".into()))
    );
    assert_eq!(basic_credentials(&headers("Bearer abc")), None);
    assert_eq!(basic_credentials(&headers("Basic !!!not-base64!!!")), None);
    assert_eq!(basic_credentials(&HeaderMap::new()), None);
  }

  #[tokio::test]
  async fn correct_credentials() {
    let s = store().await;
    let user = authenticate(&s, &basic("alice", "secret")).await.unwrap();
    assert_eq!(user.username, "alice");
  }

  #[tokio::test]
  async fn wrong_password_or_unknown_user() {
    let s = store().await;
    assert!(matches!(
      authenticate(&s, &basic("alice", "wrong")).await,
      Err(ApiError::Unauthorized)
    ));
    assert!(matches!(
      authenticate(&s, &basic("bob", "secret")).await,
      Err(ApiError::Unauthorized)
    ));
    assert!(matches!(
      authenticate(&s, &HeaderMap::new()).await,
      Err(ApiError::Unauthorized)
    ));
  }
}
