use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Run a command with arguments and a timeout, returning trimmed stdout.
///
/// A non-zero exit becomes an error carrying the command's stderr, which is
/// where the cloud CLIs put their access-denied and throttling messages.
pub async fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<String> {
    debug!(cmd, ?args, "running command");
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(cmd)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .with_context(|| format!("Command `{}` timed out after {}s", cmd, timeout.as_secs()))?
    .with_context(|| format!("Failed to execute `{}`", cmd))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("`{}` exited with {}: {}", cmd, output.status, stderr.trim());
    }

    let stdout =
        String::from_utf8(output.stdout).with_context(|| format!("Non-UTF8 output from `{}`", cmd))?;
    Ok(stdout.trim().to_string())
}

/// Run a command and deserialize its JSON stdout.
pub async fn run_json<T: serde::de::DeserializeOwned>(
    cmd: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<T> {
    let stdout = run_command(cmd, args, timeout).await?;
    serde_json::from_str(&stdout)
        .with_context(|| format!("Unexpected JSON from `{} {}`", cmd, args.join(" ")))
}

/// Full path of `binary` on PATH, or an error carrying an install hint.
pub fn require_binary(binary: &str, install_hint: &str) -> Result<PathBuf> {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(binary))
                .find(|p| p.is_file())
        })
        .with_context(|| format!("`{}` not found in PATH; {}", binary, install_hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn require_binary_finds_sh() {
        assert!(require_binary("sh", "install a shell").is_ok());
    }

    #[test]
    fn missing_binary_error_carries_hint() {
        let err = require_binary("gcloud_nonexistent_xyz", "install the Google Cloud SDK").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("gcloud_nonexistent_xyz"));
        assert!(msg.ends_with("install the Google Cloud SDK"));
    }

    #[tokio::test]
    async fn run_command_echo() {
        let result = run_command("echo", &["hello"], Duration::from_secs(5)).await;
        assert_eq!(result.unwrap(), "hello");
    }

    #[tokio::test]
    async fn run_command_failure() {
        let result = run_command("false", &[], Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_command_times_out() {
        let err = run_command("sleep", &["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[derive(Deserialize)]
    struct Echoed {
        ok: bool,
    }

    #[tokio::test]
    async fn run_json_parses_stdout() {
        let parsed: Echoed = run_json("echo", &[r#"{"ok": true}"#], Duration::from_secs(5))
            .await
            .unwrap();
        assert!(parsed.ok);

        let bad = run_json::<Echoed>("echo", &["not json"], Duration::from_secs(5)).await;
        assert!(bad.is_err());
    }
}
