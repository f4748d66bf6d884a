//! Remote publish target.

use std::fmt;

/// Wire protocol used to copy artifacts to the remote host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    #[default]
    Rsync,
    Scp,
}

impl TransportProtocol {
    /// Flags used when none are configured.
    pub fn default_args(self) -> Vec<String> {
        match self {
            // archive mode, skip VCS files, compress, report progress
            Self::Rsync => vec!["-aCvz".to_string(), "--progress".to_string()],
            Self::Scp => Vec::new(),
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            Self::Rsync => "rsync",
            Self::Scp => "scp",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Where and how artifacts are published. Fixed for one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportTarget {
    pub protocol: TransportProtocol,
    pub host: String,
    pub user: Option<String>,
    pub remote_dir: String,
    /// Extra transport flags, in order.
    pub extra_args: Vec<String>,
}

impl TransportTarget {
    /// `user@host` or `host`.
    pub fn login(&self) -> String {
        match &self.user {
            Some(user) if !user.is_empty() => format!("{}@{}", user, self.host),
            _ => self.host.clone(),
        }
    }

    /// Remote path of `file_name` inside the remote directory.
    pub fn remote_path(&self, file_name: &str) -> String {
        let dir = self.remote_dir.trim_end_matches('/');
        if dir.is_empty() && !self.remote_dir.starts_with('/') {
            file_name.to_string()
        } else {
            format!("{}/{}", dir, file_name)
        }
    }

    /// `login:remote_dir/`, the destination of a directory copy.
    pub fn destination_dir(&self) -> String {
        format!("{}:{}", self.login(), self.remote_path(""))
    }
}
