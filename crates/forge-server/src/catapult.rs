//! Upload of generated archives to the catapult service.

use forge_core::ForgeError;
use reqwest::header::LOCATION;
use reqwest::multipart::{Form, Part};
use tracing::{info, warn};

use crate::config::CatapultEndpoint;

/// Multipart field carrying the archive.
pub const UPLOAD_FIELD: &str = "file";

/// POST `archive` as `file_name` and return the `Location` the service
/// answered with.
pub async fn upload(
    client: &reqwest::Client,
    endpoint: &CatapultEndpoint,
    archive: Vec<u8>,
    file_name: &str,
) -> Result<String, ForgeError> {
    let url = endpoint.upload_url();
    let size = archive.len();
    let part = Part::bytes(archive)
        .file_name(file_name.to_string())
        .mime_str("application/zip")
        .map_err(|e| ForgeError::Upstream(e.to_string()))?;
    let form = Form::new().part(UPLOAD_FIELD, part);

    info!(url = %url, file = %file_name, bytes = size, "uploading archive to catapult");
    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| ForgeError::Upstream(format!("POST {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(url = %url, status = status.as_u16(), "catapult rejected upload");
        return Err(ForgeError::Upstream(format!(
            "catapult answered {status}: {}",
            body.trim()
        )));
    }

    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ForgeError::Upstream("catapult response has no Location header".into()))
}
