// Clone URL construction.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::worker::GitWorkerError;

/// Where repositories are cloned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRemote {
    /// An HTTP(S) host; the job credential is embedded as URL userinfo.
    Http(Url),
    /// A local directory of `<owner>/<repo>.git` bare repositories. Used for
    /// mirrors and tests; no credential is involved.
    Local(PathBuf),
}

impl GitRemote {
    pub fn parse(base: &str) -> Self {
        match Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Http(url),
            _ => Self::Local(PathBuf::from(base)),
        }
    }

    /// `https://<credential>@<host>/<owner>/<repo>.git`, or the local bare
    /// repository path.
    ///
    /// An empty credential yields `https://<host>/...` with no userinfo at
    /// all rather than a bare `@`. Git treats both as an anonymous clone.
    pub fn clone_url(
        &self,
        credential: &SecretString,
        owner: &str,
        repo: &str,
    ) -> Result<String, GitWorkerError> {
        match self {
            Self::Http(base) => {
                let mut url = base.clone();
                let path = format!("{}/{owner}/{repo}.git", base.path().trim_end_matches('/'));
                url.set_path(&path);

                let token = credential.expose_secret();
                if !token.is_empty() {
                    url.set_username(token).map_err(|()| GitWorkerError::InvalidRemote {
                        base: base.to_string(),
                        message: "URL cannot carry credentials".to_string(),
                    })?;
                }
                Ok(url.to_string())
            }
            Self::Local(root) => {
                Ok(root.join(owner).join(format!("{repo}.git")).to_string_lossy().into_owned())
            }
        }
    }
}
