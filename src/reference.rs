//! Repository reference parsing
//!
//! Turns a source location such as
//! `git+https://github.com/acme/widgets#release-1` into the owner,
//! repository and ref needed to fetch a snapshot.

use crate::error::{NodeserveError, NodeserveResult};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Ref used when the location carries no `#<ref>` suffix
pub const DEFAULT_REF: &str = "main";

const GITHUB_HOST: &str = "github.com";

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^git\+https://github\.com/(?P<owner>[A-Za-z0-9_.-]+)/(?P<repo>[A-Za-z0-9_.-]+)(?:#(?P<ref>[A-Za-z0-9_/-]+))?$",
    )
    .expect("static location regex")
});

/// A specific snapshot of a hosted repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    /// Host serving the repository (always `github.com`)
    pub host: String,
    /// Repository owner (user or organisation)
    pub owner: String,
    /// Repository name
    pub repository: String,
    /// Branch, tag or commit
    pub git_ref: String,
}

impl RepositoryReference {
    /// Parse a `git+https://github.com/<owner>/<repo>[#<ref>]` location.
    ///
    /// Fails closed: anything outside the grammar is rejected whole.
    pub fn parse(location: &str) -> NodeserveResult<Self> {
        let caps = LOCATION_RE
            .captures(location)
            .ok_or_else(|| NodeserveError::ReferenceParse(location.to_string()))?;

        Ok(Self {
            host: GITHUB_HOST.to_string(),
            owner: caps["owner"].to_string(),
            repository: caps["repo"].to_string(),
            git_ref: caps
                .name("ref")
                .map_or(DEFAULT_REF, |m| m.as_str())
                .to_string(),
        })
    }

    /// URL of the zipball snapshot for this reference
    pub fn snapshot_url(&self) -> String {
        format!(
            "https://api.{}/repos/{}/{}/zipball/{}",
            self.host, self.owner, self.repository, self.git_ref
        )
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repository, self.git_ref)
    }
}
