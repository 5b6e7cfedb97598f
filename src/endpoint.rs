//! URL helpers

/// Join `endpoint` onto `base_url`. Absolute `http(s)://` endpoints pass
/// through untouched.
pub fn resolve_url(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }

    let base = base_url.trim_end_matches('/');
    let path = endpoint.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{base}/{path}")
}

/// Substitute `:name` path segments with URL-encoded values
///
/// Longer names are replaced first so `:id` never clobbers `:idType`.
pub fn replace_path_params(endpoint: &str, params: &[(String, String)]) -> String {
    let mut ordered: Vec<&(String, String)> = params.iter().filter(|(k, _)| !k.is_empty()).collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut url = endpoint.to_string();
    for (name, value) in ordered {
        url = url.replace(&format!(":{name}"), &urlencoding::encode(value));
    }
    url
}

/// Whether `url` targets the token refresh endpoint
pub fn is_refresh_endpoint(url: &str, refresh_path: &str) -> bool {
    !refresh_path.is_empty() && url.contains(refresh_path)
}
