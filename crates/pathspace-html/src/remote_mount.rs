// SPDX-License-Identifier: Apache-2.0
//! Remote mount configuration and path-prefix rewriting.

use pathspace_core::Error;

/// Configuration for mounting this facade's forwarded paths under a named remote alias.
///
/// Every path a caller forwards through [`crate::PathSpaceHtmlServer`] is rewritten to
/// `<mount_prefix>/<alias>/<path>` before reaching the underlying store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMount {
    /// Alias identifying this remote. Must be non-empty and contain no `/`; a leading
    /// `/remote/` is stripped if present (accepts either a bare name or a full prefix).
    pub alias: String,
    /// Root under which remote connection health is published, as
    /// `<metrics_root>/<alias>/client/connected`.
    pub metrics_root: String,
    /// Prefix every forwarded path is rewritten under.
    pub mount_prefix: String,
    /// When `true`, [`crate::PathSpaceHtmlServer::start`] aborts unless the remote
    /// reports a nonzero `connected` value.
    pub require_healthy: bool,
    /// Listen port for the background server launcher. `0` selects a random free port
    /// in `[20000, 60000]`.
    pub port: u16,
}

impl Default for RemoteMount {
    fn default() -> Self {
        Self {
            alias: String::new(),
            metrics_root: "/inspector/metrics/remotes".to_string(),
            mount_prefix: "/remote".to_string(),
            require_healthy: true,
            port: 0,
        }
    }
}

/// A [`RemoteMount`] after alias/prefix normalization, ready to rewrite paths with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRemoteMount {
    /// The normalized alias name, with any leading `/` or `remote/` stripped.
    pub alias_name: String,
    /// `<mount_prefix>/<alias_name>`, the prefix every forwarded path is rewritten under.
    pub alias_path: String,
    /// The normalized metrics root used for the health check.
    pub metrics_root: String,
}

fn strip_trailing_slashes(value: &mut String) {
    while value.len() > 1 && value.ends_with('/') {
        value.pop();
    }
}

fn ensure_leading_slash(value: &mut String) {
    if !value.starts_with('/') {
        value.insert(0, '/');
    }
}

/// Normalizes `mount.alias`/`mount.mount_prefix` into an `(alias_name, alias_path)` pair.
///
/// # Errors
///
/// Returns [`Error::InvalidError`] if the alias is empty, empty after stripping a
/// leading `/remote/`, or contains a `/`.
pub fn normalize_remote_alias(mount: &RemoteMount) -> Result<(String, String), Error> {
    if mount.alias.is_empty() {
        return Err(Error::InvalidError("remote mount alias must not be empty".to_string()));
    }

    let mut alias = mount.alias.trim_start_matches('/').to_string();
    if let Some(rest) = alias.strip_prefix("remote/") {
        alias = rest.to_string();
    }

    if alias.is_empty() {
        return Err(Error::InvalidError("remote mount alias must contain a name".to_string()));
    }
    if alias.contains('/') {
        return Err(Error::InvalidError("remote mount alias must not contain '/'".to_string()));
    }

    let mut mount_prefix =
        if mount.mount_prefix.is_empty() { "/remote".to_string() } else { mount.mount_prefix.clone() };
    ensure_leading_slash(&mut mount_prefix);
    strip_trailing_slashes(&mut mount_prefix);
    if mount_prefix.is_empty() {
        mount_prefix = "/remote".to_string();
    }

    let alias_path = format!("{mount_prefix}/{alias}");
    Ok((alias, alias_path))
}

/// Rewrites `value` to live under `alias_path`, rejecting values that already point
/// under a *different* `/remote/...` alias.
///
/// # Errors
///
/// Returns [`Error::InvalidError`] if `value` already starts with `/remote/` but not
/// with `alias_path` itself.
pub fn prefix_under_alias(alias_path: &str, value: &str) -> Result<String, Error> {
    if value.is_empty() {
        return Ok(alias_path.to_string());
    }
    if value.starts_with(alias_path) {
        return Ok(value.to_string());
    }
    if value.starts_with("/remote/") {
        return Err(Error::InvalidError("ServeHtml roots point to a different remote alias".to_string()));
    }

    let mut normalized = alias_path.to_string();
    if !value.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(value);
    Ok(normalized)
}

/// Applies [`prefix_under_alias`] when `resolved` is set, otherwise returns `path` unchanged.
///
/// # Errors
///
/// See [`prefix_under_alias`].
pub fn prefix_remote_path(path: &str, resolved: Option<&ResolvedRemoteMount>) -> Result<String, Error> {
    match resolved {
        Some(resolved) => prefix_under_alias(&resolved.alias_path, path),
        None => Ok(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_alias_under_default_prefix() {
        let mount = RemoteMount { alias: "studio-1".to_string(), ..Default::default() };
        let (name, path) = normalize_remote_alias(&mount).expect("normalize");
        assert_eq!(name, "studio-1");
        assert_eq!(path, "/remote/studio-1");
    }

    #[test]
    fn strips_leading_remote_prefix_from_alias() {
        let mount = RemoteMount { alias: "/remote/studio-1".to_string(), ..Default::default() };
        let (name, _) = normalize_remote_alias(&mount).expect("normalize");
        assert_eq!(name, "studio-1");
    }

    #[test]
    fn rejects_empty_alias() {
        let mount = RemoteMount::default();
        assert!(normalize_remote_alias(&mount).is_err());
    }

    #[test]
    fn rejects_alias_containing_slash() {
        let mount = RemoteMount { alias: "a/b".to_string(), ..Default::default() };
        assert!(normalize_remote_alias(&mount).is_err());
    }

    #[test]
    fn honors_custom_mount_prefix_with_trailing_slash() {
        let mount =
            RemoteMount { alias: "studio-1".to_string(), mount_prefix: "/edge/".to_string(), ..Default::default() };
        let (_, path) = normalize_remote_alias(&mount).expect("normalize");
        assert_eq!(path, "/edge/studio-1");
    }

    #[test]
    fn prefixes_relative_path_under_alias() {
        let rewritten = prefix_under_alias("/remote/studio-1", "/x/y").expect("prefix");
        assert_eq!(rewritten, "/remote/studio-1/x/y");
    }

    #[test]
    fn leaves_path_already_under_alias_unchanged() {
        let rewritten = prefix_under_alias("/remote/studio-1", "/remote/studio-1/x/y").expect("prefix");
        assert_eq!(rewritten, "/remote/studio-1/x/y");
    }

    #[test]
    fn rejects_path_under_a_different_remote_alias() {
        let result = prefix_under_alias("/remote/studio-1", "/remote/studio-2/x");
        assert!(result.is_err());
    }

    #[test]
    fn empty_path_resolves_to_alias_root() {
        let rewritten = prefix_under_alias("/remote/studio-1", "").expect("prefix");
        assert_eq!(rewritten, "/remote/studio-1");
    }
}
