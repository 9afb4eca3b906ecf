//! Root URI parsing.
//!
//! Accepted forms, with `host` matched case-insensitively:
//! - `https://host/owner` (owner-wide root)
//! - `https://host/owner/repo` and `https://host/owner/repo.git`
//! - `git://host/owner/repo`, `http://host/owner/repo`
//! - `https://host/owner/repo/tree/main` (segments after the repo are ignored)

use percent_encoding::percent_decode_str;
use url::Url;

use super::types::DEFAULT_HOST;
use crate::error::RootParseError;

const SUPPORTED_SCHEMES: [&str; 3] = ["https", "http", "git"];

/// Parse a root URI into a lowercase `(owner, repo)` pair.
///
/// `repo` is empty for owner-wide roots. An empty `expected_host` means
/// [`DEFAULT_HOST`].
pub fn parse_root_uri(uri: &str, expected_host: &str) -> Result<(String, String), RootParseError> {
    let (owner, repo) = split_root_uri(uri, expected_host)?;
    Ok((owner.to_lowercase(), repo.to_lowercase()))
}

/// Like [`parse_root_uri`] but keeps the segments as spelled in the URI.
pub fn split_root_uri(uri: &str, expected_host: &str) -> Result<(String, String), RootParseError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(RootParseError::Empty);
    }
    let expected_host = if expected_host.is_empty() {
        DEFAULT_HOST
    } else {
        expected_host
    };

    let parsed = Url::parse(uri).map_err(|e| RootParseError::Invalid {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(RootParseError::UnsupportedScheme {
            uri: uri.to_string(),
            scheme: parsed.scheme().to_string(),
        });
    }

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    if !host.eq_ignore_ascii_case(expected_host) {
        return Err(RootParseError::HostMismatch {
            host,
            expected: expected_host.to_string(),
        });
    }

    let decoded = percent_decode_str(parsed.path())
        .decode_utf8()
        .map_err(|e| RootParseError::Invalid {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
    let path = decoded.trim_start_matches('/').trim_end_matches('/');
    if path.is_empty() {
        return Err(RootParseError::EmptyPath(uri.to_string()));
    }

    let mut segments = path.splitn(3, '/');
    let owner = segments.next().unwrap_or_default();
    if owner.is_empty() {
        return Err(RootParseError::EmptyPath(uri.to_string()));
    }

    let repo = match segments.next() {
        None => String::new(),
        Some(segment) => {
            let repo = segment.strip_suffix(".git").unwrap_or(segment);
            if repo.is_empty() {
                return Err(RootParseError::EmptyRepo(uri.to_string()));
            }
            repo.to_string()
        }
    };

    Ok((owner.to_string(), repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(uri: &str) -> (String, String) {
        parse_root_uri(uri, "github.com").unwrap()
    }

    #[test]
    fn test_repo_level_roots() {
        assert_eq!(
            ok("https://github.com/octocat/Hello-World"),
            ("octocat".to_string(), "hello-world".to_string())
        );
        assert_eq!(
            ok("https://github.com/Octocat/Repo.git"),
            ("octocat".to_string(), "repo".to_string())
        );
        assert_eq!(
            ok("git://github.com/owner/repo"),
            ("owner".to_string(), "repo".to_string())
        );
        assert_eq!(
            ok("http://github.com/owner/repo/"),
            ("owner".to_string(), "repo".to_string())
        );
    }

    #[test]
    fn test_split_keeps_spelling() {
        assert_eq!(
            split_root_uri("https://github.com/Octocat/Hello-World.git", "").unwrap(),
            ("Octocat".to_string(), "Hello-World".to_string())
        );
    }

    #[test]
    fn test_escaped_segments_are_decoded() {
        assert_eq!(
            ok("https://github.com/octocat/Hello%2DWorld"),
            ("octocat".to_string(), "hello-world".to_string())
        );
        assert_eq!(
            split_root_uri("https://github.com/My%20Org/Repo%2Egit", "").unwrap(),
            ("My Org".to_string(), "Repo".to_string())
        );
        assert!(matches!(
            parse_root_uri("https://github.com/octocat/%FF%FE", "github.com"),
            Err(RootParseError::Invalid { .. })
        ));
    }

    #[test]
    fn test_extra_segments_ignored() {
        assert_eq!(
            ok("https://github.com/owner/repo/tree/main/src"),
            ("owner".to_string(), "repo".to_string())
        );
    }

    #[test]
    fn test_owner_level_root() {
        assert_eq!(ok("https://github.com/MyOrg"), ("myorg".to_string(), String::new()));
        assert_eq!(ok("https://github.com/myorg/"), ("myorg".to_string(), String::new()));
    }

    #[test]
    fn test_host_matching() {
        assert!(parse_root_uri("https://GitHub.com/a/b", "github.com").is_ok());
        assert!(parse_root_uri("https://ghe.example.com/a/b", "GHE.example.com").is_ok());
        assert_eq!(
            parse_root_uri("https://gitlab.com/a/b", "github.com"),
            Err(RootParseError::HostMismatch {
                host: "gitlab.com".to_string(),
                expected: "github.com".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_host_defaults_to_public_host() {
        assert!(parse_root_uri("https://github.com/a/b", "").is_ok());
        assert!(parse_root_uri("https://example.com/a/b", "").is_err());
    }

    #[test]
    fn test_rejections() {
        assert_eq!(parse_root_uri("", "github.com"), Err(RootParseError::Empty));
        assert!(matches!(
            parse_root_uri("file:///home/user/project", "github.com"),
            Err(RootParseError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            parse_root_uri("ssh://github.com/a/b", "github.com"),
            Err(RootParseError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            parse_root_uri("https://github.com", "github.com"),
            Err(RootParseError::EmptyPath(_))
        ));
        assert!(matches!(
            parse_root_uri("https://github.com/", "github.com"),
            Err(RootParseError::EmptyPath(_))
        ));
        assert!(matches!(
            parse_root_uri("not a uri", "github.com"),
            Err(RootParseError::Invalid { .. })
        ));
        assert!(matches!(
            parse_root_uri("https://github.com/owner/.git", "github.com"),
            Err(RootParseError::EmptyRepo(_))
        ));
    }
}
