//! Blocking JSON POST shared by the analysis handoff and the publishers.

use log::debug;
use serde::Serialize;

use crate::domain::PipelineError;

/// POST `body` as JSON and return the response text.
///
/// A non-2xx answer becomes [`PipelineError::Remote`] carrying the response
/// body; connection problems become [`PipelineError::Http`]. No retries.
///
/// # Errors
/// See above, plus [`PipelineError::Json`] if `body` can't be encoded.
pub fn post_json<T: Serialize + ?Sized>(
    url: &str,
    headers: &[(&str, &str)],
    body: &T,
) -> Result<String, PipelineError> {
    let payload = serde_json::to_string(body)?;
    debug!("POST {url} ({} bytes)", payload.len());

    let mut request = ureq::post(url).set("Content-Type", "application/json");
    for (name, value) in headers {
        request = request.set(name, value);
    }

    match request.send_string(&payload) {
        Ok(response) => response
            .into_string()
            .map_err(|e| PipelineError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        Err(ureq::Error::Status(status, response)) => Err(PipelineError::Remote {
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default().trim_end().to_string(),
        }),
        Err(e) => Err(PipelineError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        }),
    }
}
