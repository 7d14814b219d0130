mod expectation;
mod repo_id;

pub use expectation::Expectation;
pub use repo_id::RepoId;
