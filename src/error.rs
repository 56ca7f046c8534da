use anyhow::anyhow;
use reqwest::StatusCode;

/// Google API error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub(crate) error: ApiErrorBody,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) code: Option<u16>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

/// OAuth2 token endpoint error: `{"error", "error_description"}`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct OAuthErrorResponse {
    pub(crate) error: String,
    #[serde(default)]
    pub(crate) error_description: Option<String>,
}

pub(crate) fn format_api_error(
    status: StatusCode,
    url: &str,
    e: &ApiErrorResponse,
) -> anyhow::Error {
    let message = e.error.message.as_deref().unwrap_or("");
    let kind = e.error.status.as_deref().unwrap_or("");
    let code = e.error.code.unwrap_or(status.as_u16());

    let lower = message.to_lowercase();
    let not_registered = status == StatusCode::FORBIDDEN
        && (lower.contains("not registered") || lower.contains("has not been used in project"));
    if not_registered {
        return anyhow!(
            "Earth Engine returned 403: the project is not registered or the API is disabled.\n\nHow to fix:\n1) Register the project for Earth Engine: https://code.earthengine.google.com/register\n2) Enable the Earth Engine API for the project in the Cloud console\n3) Re-run this program\n\nServer message: {}",
            message
        );
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "Earth Engine authentication/authorization failed (HTTP {}).\n- Check that the refresh token in the credential file is still valid\n- Check that the project is set and your account has access to it\n\nServer message: {}\nstatus: {}\nrequest: {}",
            code,
            message,
            kind,
            url
        );
    }

    if status == StatusCode::NOT_FOUND {
        return anyhow!(
            "Earth Engine resource not found (HTTP 404).\n- The project id or API base URL may be wrong\n- The dataset id may not exist\n\nServer message: {}\nrequest: {}",
            message,
            url
        );
    }

    anyhow!(
        "API request failed: HTTP {} for url ({})\n{}\n{}",
        code,
        url,
        kind,
        message
    )
}

pub(crate) fn format_oauth_error(status: StatusCode, e: &OAuthErrorResponse) -> anyhow::Error {
    let description = e.error_description.as_deref().unwrap_or("");
    if e.error == "invalid_grant" {
        return anyhow!(
            "Token refresh rejected (HTTP {}): invalid_grant.\n- The refresh token is expired or revoked; re-authenticate and replace the stored credentials\n\nServer message: {}",
            status.as_u16(),
            description
        );
    }
    if e.error == "invalid_client" || e.error == "unauthorized_client" {
        return anyhow!(
            "Token refresh rejected (HTTP {}): {}.\n- Check client_id and client_secret in the credentials\n\nServer message: {}",
            status.as_u16(),
            e.error,
            description
        );
    }
    anyhow!(
        "Token refresh failed (HTTP {}): {} {}",
        status.as_u16(),
        e.error,
        description
    )
}
