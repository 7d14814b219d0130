//! Repository identifier value object.

use serde::{Deserialize, Serialize};

use crate::Error;

/// A validated `owner/project` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    owner: String,
    project: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, project: impl Into<String>) -> Result<Self, Error> {
        let owner = owner.into();
        let project = project.into();
        Self::validate_part(&owner, "owner")?;
        Self::validate_part(&project, "project")?;
        Ok(Self { owner, project })
    }

    /// Parse `owner/project`.
    pub fn parse(repo: &str) -> Result<Self, Error> {
        let words: Vec<&str> = repo.trim().split('/').collect();
        match words.as_slice() {
            [owner, project] => Self::new(*owner, *project),
            _ => Err(Error::validation(format!(
                "repo should be <owner>/<project> format, got {repo:?}"
            ))),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn validate_part(part: &str, what: &str) -> Result<(), Error> {
        if part.is_empty() {
            return Err(Error::validation(format!("repository {what} cannot be empty")));
        }
        if part.contains(char::is_whitespace) {
            return Err(Error::validation(format!(
                "repository {what} cannot contain whitespace"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.project)
    }
}

impl std::str::FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.to_string()
    }
}
