use crate::{
    AppState,
    api::models::users::CurrentUser,
    db::{errors::DbError, handlers::Users},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Resolve the caller from the configured trusted proxy header.
///
/// The header holds the username of an active user. A missing header, a
/// non-UTF-8 value or an unknown/inactive username all reject with 401.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state), err)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header_name = &state.config.auth.proxy_header.header_name;
        let Some(username) = parts.headers.get(header_name).and_then(|h| h.to_str().ok()) else {
            trace!("No identity header present");
            return Err(Error::Unauthenticated { message: None });
        };

        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        match Users::new(&mut conn).find_current_user(username).await? {
            Some(user) => {
                debug!("Found proxy header authenticated user: {}", user.id);
                Ok(user)
            }
            None => Err(Error::Unauthenticated {
                message: Some(format!("unknown or inactive user '{username}'")),
            }),
        }
    }
}
