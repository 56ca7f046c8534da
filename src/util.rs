use std::time::Duration;

pub(crate) fn retriable_status(code: u16) -> bool {
    matches!(code, 500 | 502 | 503 | 504 | 429 | 408)
}

pub(crate) fn backoff(current: Duration, max: Duration) -> Duration {
    let next = current.mul_f64(1.5);
    if next > max { max } else { next }
}

pub(crate) fn initial_sleep(max: Duration) -> Duration {
    max.min(Duration::from_secs(1))
}

pub(crate) fn urljoin(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// `{base}/v1/projects/{project}/value:compute`
pub(crate) fn compute_url(base: &str, project: &str) -> String {
    let project = project.trim().trim_start_matches("projects/");
    urljoin(base, &format!("/v1/projects/{}/value:compute", project))
}

/// Keeps the first and last few characters of a secret for log output.
pub(crate) fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}***{}", head, tail)
}
