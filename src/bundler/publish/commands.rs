//! Transfer command construction for rsync, scp and ssh.

use crate::bundler::{
    error::Result,
    settings::{TransportProtocol, TransportTarget},
    utils::ToolCommand,
};
use std::path::Path;

/// One rsync transfer of `local` into the remote directory.
///
/// rsync writes into a hidden temporary file and renames it into place, so
/// readers never see a partial artifact.
pub fn rsync(target: &TransportTarget, local: &Path) -> Result<ToolCommand> {
    ToolCommand::new(TransportProtocol::Rsync.program())
        .args(target.extra_args.iter().cloned())
        .path_arg(local)
        .map(|command| command.arg(target.destination_dir()))
}

/// Temporary remote name `name` is uploaded to before being renamed.
pub fn scp_temp_name(name: &str) -> String {
    format!(".{}.part", name)
}

/// `scp` of `local` to the temporary remote name of `name`.
pub fn scp(target: &TransportTarget, local: &Path, name: &str) -> Result<ToolCommand> {
    let remote = format!(
        "{}:{}",
        target.login(),
        target.remote_path(&scp_temp_name(name))
    );
    ToolCommand::new(TransportProtocol::Scp.program())
        .args(target.extra_args.iter().cloned())
        .path_arg(local)
        .map(|command| command.arg(remote))
}

/// `ssh` renaming the uploaded temporary file over `name`.
pub fn ssh_rename(target: &TransportTarget, name: &str) -> ToolCommand {
    let from = target.remote_path(&scp_temp_name(name));
    let to = target.remote_path(name);
    ToolCommand::new("ssh")
        .args(ssh_args(&target.extra_args))
        .arg(target.login())
        .arg(format!(
            "mv -f {} {}",
            remote_shell_path(&from),
            remote_shell_path(&to)
        ))
}

/// Quotes a remote path for the login shell.
///
/// A leading `~` or `~user` stays unquoted so the remote shell expands it to
/// the same home directory `scp` resolves it to.
pub fn remote_shell_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        let (user, tail) = rest.split_once('/').unwrap_or((rest, ""));
        let plain_user = user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if plain_user {
            return if tail.is_empty() {
                format!("~{}", user)
            } else {
                format!("~{}/{}", user, shell_quote(tail))
            };
        }
    }
    shell_quote(path)
}

/// Translates scp flags into their ssh equivalents.
///
/// `-P port` becomes `-p port`; identity, option and config flags pass
/// through; everything else is scp-only and dropped.
pub fn ssh_args(scp_args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut args = scp_args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-P" => {
                if let Some(port) = args.next() {
                    out.push("-p".to_string());
                    out.push(port.clone());
                }
            }
            "-i" | "-o" | "-F" | "-J" => {
                if let Some(value) = args.next() {
                    out.push(arg.clone());
                    out.push(value.clone());
                }
            }
            "-4" | "-6" | "-C" | "-q" | "-v" => out.push(arg.clone()),
            other if other.starts_with("-o") || other.starts_with("-i") => {
                out.push(other.to_string())
            }
            _ => {}
        }
    }
    out
}

/// Quotes `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
