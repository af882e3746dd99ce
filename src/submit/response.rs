use crate::error::SubmitFailure;

use super::types::{Artifact, RawResponse, ServiceReply, SubmissionOutcome, DEFAULT_ARCHIVE_NAME};

/// Decide what the generation service sent back.
pub fn classify(resp: RawResponse) -> Result<SubmissionOutcome, SubmitFailure> {
    let is_json = looks_like_json(&resp);

    if !(200..300).contains(&resp.status) {
        let message = if is_json {
            extract_error(&resp.body)
        } else {
            text_snippet(&resp.body)
        };
        return Err(SubmitFailure::ServerError {
            status: resp.status,
            message,
        });
    }

    if is_json {
        let reply: ServiceReply = serde_json::from_slice(&resp.body)
            .map_err(|e| SubmitFailure::MalformedResponse(format!("Parse error: {}", e)))?;

        if let Some(url) = reply.url.or(reply.site_url).filter(|u| !u.is_empty()) {
            return Ok(SubmissionOutcome::Deployed {
                url,
                admin_url: reply.admin_url,
            });
        }
        if let Some(error) = reply.error {
            return Err(SubmitFailure::ServerError {
                status: resp.status,
                message: Some(error),
            });
        }
        return Err(SubmitFailure::MalformedResponse(
            "JSON reply has neither url nor error".to_string(),
        ));
    }

    if resp.body.is_empty() {
        return Err(SubmitFailure::MalformedResponse("Empty body".to_string()));
    }

    // Text that is not a JSON descriptor is an error page or a proxy banner.
    if resp
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("text/"))
    {
        return Err(SubmitFailure::MalformedResponse(format!(
            "Unexpected text reply: {}",
            text_snippet(&resp.body).unwrap_or_default()
        )));
    }

    let file_name = resp
        .content_disposition
        .as_deref()
        .and_then(disposition_filename)
        .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());

    Ok(SubmissionOutcome::Archive(Artifact {
        file_name,
        content_type: resp.content_type,
        bytes: resp.body,
    }))
}

fn looks_like_json(resp: &RawResponse) -> bool {
    let declared = resp
        .content_type
        .as_deref()
        .map(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false);
    if declared {
        return true;
    }
    // Untyped replies: a leading `{` means a JSON descriptor, not a zip.
    let untyped = resp.content_type.is_none()
        || resp
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/"));
    untyped
        && resp
            .body
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{')
}

fn extract_error(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.as_str().map(|s| s.to_string()))
        .or_else(|| text_snippet(body))
}

fn text_snippet(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.chars().take(200).collect())
    }
}

/// `attachment; filename="site.zip"` → `site.zip`
fn disposition_filename(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = value.trim().trim_matches('"');
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        (!name.is_empty()).then(|| name.to_string())
    })
}
