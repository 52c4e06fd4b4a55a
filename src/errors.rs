use thiserror::Error;

#[derive(Error, Debug)]
pub enum BranchesError {
    #[error("`{argv}` exited with code {code}: {stderr}")]
    CommandFailed {
        argv: String,
        code: i32,
        stderr: String,
    },

    #[error("Failed to execute `{0}`: {1}")]
    Spawn(String, std::io::Error),

    #[error("{0} is required but not installed")]
    MissingDependency(String),

    #[error("Not in a git repository")]
    NotARepository,

    #[error("Uncommitted changes detected. Please commit or stash before checkout.")]
    DirtyWorktree,

    #[error("Cannot change to directory '{0}': {1}")]
    Directory(String, std::io::Error),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BranchesError>;
