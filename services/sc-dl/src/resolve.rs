//!
//! src/resolve.rs  Andrew Belles  Oct 16th, 2026
//!
//! Turns a soundcloud url into a typed track or playlist payload
//!

use tracing::{debug, info};

use crate::errors::ScdlError;
use crate::fetch::{ApiClient, api_json};
use crate::types::{Credential, ResolvedEntity};

impl ApiClient {
    /// GET /resolve. 404 or an empty body is UnresolvableUrl,
    /// 401/403 surfaces as CredentialRejected for the caller to handle
    pub async fn resolve_entity(&self, credential: &Credential, url: &str) ->
        Result<ResolvedEntity, ScdlError> {
        debug!(url, "resolve.request");
        let request = self.resolve_url(url, credential)?;

        let value = api_json(request).await?
            .ok_or_else(|| ScdlError::UnresolvableUrl(url.to_string()))?;

        let entity = ResolvedEntity::from_value(value)?;
        match &entity {
            ResolvedEntity::Track(t) =>
                info!(kind = "track", id = ?t.id, title = t.title(), artist = t.artist(), "resolve.done"),
            ResolvedEntity::Playlist(p) =>
                info!(kind = "playlist", title = ?p.title, tracks = p.tracks().len(), "resolve.done"),
        }
        Ok(entity)
    }
}
