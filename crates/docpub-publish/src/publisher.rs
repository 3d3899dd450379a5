//! Fresh-history publishing of an output directory.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use git2::{
    Cred, CredentialType, IndexAddOption, PushOptions, RemoteCallbacks, Repository,
    RepositoryInitOptions, Signature,
};

use crate::ignore::ensure_ignore_entries;

/// Credential lookups libgit2 may request before a push is abandoned.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Configuration for publishing a directory.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Name given to the remote in the fresh repository
    pub remote_name: String,

    /// URL the output is pushed to
    pub remote_url: String,

    /// Branch created locally and overwritten on the remote
    pub branch: String,

    /// Message of the single published commit
    pub message: String,

    /// Commit author name; falls back to the user's git identity
    pub author_name: Option<String>,

    /// Commit author email; falls back to the user's git identity
    pub author_email: Option<String>,

    /// Entries written into the output `.gitignore` before staging
    pub ignore_entries: Vec<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            remote_name: "origin".to_string(),
            remote_url: String::new(),
            branch: "main".to_string(),
            message: "Publish documentation".to_string(),
            author_name: None,
            author_email: None,
            ignore_entries: vec![".doctrees".to_string()],
        }
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Id of the published commit
    pub commit: String,

    /// Number of files in the commit
    pub files: usize,

    /// Remote branch reference that now points at `commit`
    pub remote_ref: String,
}

/// Errors that can occur while publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Output directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("No remote URL configured for publishing")]
    MissingRemoteUrl,

    #[error("Failed to remove existing history: {0}")]
    RemoveHistory(String),

    #[error("Failed to write ignore file: {0}")]
    Ignore(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Remote rejected {reference}: {message}")]
    Rejected { reference: String, message: String },
}

/// Publishes a directory as the only commit of a remote branch.
pub struct Publisher {
    config: PublishConfig,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(config: PublishConfig) -> Self {
        Self { config }
    }

    /// The publisher's configuration.
    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Replace any history in `dir` with one commit of its current content and
    /// force-push it to the configured remote branch.
    ///
    /// All git operations are scoped to `dir`; the process working directory
    /// is never changed.
    pub fn publish(&self, dir: &Path) -> Result<PublishOutcome, PublishError> {
        if !dir.is_dir() {
            return Err(PublishError::MissingDirectory(dir.to_path_buf()));
        }
        if self.config.remote_url.is_empty() {
            return Err(PublishError::MissingRemoteUrl);
        }

        remove_history(dir)?;

        let repo = self.init_repo(dir)?;

        ensure_ignore_entries(dir, &self.config.ignore_entries)
            .map_err(|e| PublishError::Ignore(e.to_string()))?;

        let (commit, files) = self.commit_all(&repo)?;
        tracing::info!("Committed {} files as {}", files, commit);

        repo.remote(&self.config.remote_name, &self.config.remote_url)?;

        let local_ref = {
            let head = repo.head()?;
            head.name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("refs/heads/{}", self.config.branch))
        };
        let remote_ref = format!("refs/heads/{}", self.config.branch);

        self.force_push(&repo, &local_ref, &remote_ref)?;
        tracing::info!(
            "Pushed {} to {} ({})",
            local_ref,
            self.config.remote_url,
            remote_ref
        );

        Ok(PublishOutcome {
            commit: commit.to_string(),
            files,
            remote_ref,
        })
    }

    fn init_repo(&self, dir: &Path) -> Result<Repository, PublishError> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(&self.config.branch);

        let repo = Repository::init_opts(dir, &opts)?;
        tracing::debug!("Initialized repository in {}", dir.display());

        Ok(repo)
    }

    fn commit_all(&self, repo: &Repository) -> Result<(git2::Oid, usize), PublishError> {
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let files = index.len();
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        let signature = self.signature(repo)?;
        let commit = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &self.config.message,
            &tree,
            &[],
        )?;

        Ok((commit, files))
    }

    fn signature(&self, repo: &Repository) -> Result<Signature<'static>, PublishError> {
        if let (Some(name), Some(email)) = (&self.config.author_name, &self.config.author_email) {
            return Ok(Signature::now(name, email)?);
        }

        match repo.signature() {
            Ok(signature) => Ok(signature),
            Err(e) => {
                tracing::debug!("No git identity configured ({}), using default author", e);
                Ok(Signature::now(
                    self.config.author_name.as_deref().unwrap_or("docpub"),
                    self.config
                        .author_email
                        .as_deref()
                        .unwrap_or("docpub@localhost"),
                )?)
            }
        }
    }

    fn force_push(
        &self,
        repo: &Repository,
        local_ref: &str,
        remote_ref: &str,
    ) -> Result<(), PublishError> {
        let mut remote = repo.find_remote(&self.config.remote_name)?;

        let rejection: RefCell<Option<(String, String)>> = RefCell::new(None);
        let attempts = Cell::new(0u32);

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|url, username, allowed| {
            attempts.set(attempts.get() + 1);
            if attempts.get() > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }
            credentials(url, username, allowed)
        });
        callbacks.push_update_reference(|reference, status| {
            if let Some(message) = status {
                *rejection.borrow_mut() = Some((reference.to_string(), message.to_string()));
            }
            Ok(())
        });

        let mut opts = PushOptions::new();
        opts.remote_callbacks(callbacks);

        // Leading `+` overwrites the remote branch regardless of its history.
        let refspec = format!("+{}:{}", local_ref, remote_ref);
        remote.push(&[refspec.as_str()], Some(&mut opts))?;
        drop(opts);

        match rejection.into_inner() {
            Some((reference, message)) => Err(PublishError::Rejected { reference, message }),
            None => Ok(()),
        }
    }
}

/// Remove `.git` from `dir`, whether it is a directory or a gitfile.
fn remove_history(dir: &Path) -> Result<(), PublishError> {
    let git_dir = dir.join(".git");

    let result = if git_dir.is_dir() {
        fs::remove_dir_all(&git_dir)
    } else if git_dir.exists() {
        fs::remove_file(&git_dir)
    } else {
        return Ok(());
    };

    result.map_err(|e| PublishError::RemoveHistory(format!("{}: {}", git_dir.display(), e)))?;
    tracing::debug!("Removed existing history at {}", git_dir.display());

    Ok(())
}

fn credentials(
    url: &str,
    username: Option<&str>,
    allowed: CredentialType,
) -> Result<Cred, git2::Error> {
    if allowed.contains(CredentialType::SSH_KEY) {
        return Cred::ssh_key_from_agent(username.unwrap_or("git"));
    }

    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
        let config = git2::Config::open_default()?;
        return Cred::credential_helper(&config, url, username);
    }

    if allowed.contains(CredentialType::DEFAULT) {
        return Cred::default();
    }

    Err(git2::Error::from_str("no supported credential type"))
}
