//! Mercurial getter
//!
//! Drives the `hg` client as a subprocess. A checkout is always a directory;
//! single files are taken from a disposable checkout.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use sourcefetch_core::paths::is_drive_path;
use sourcefetch_core::{
    Address, CancellationToken, FetchConfig, FetchError, FetchResult, Mode, Request,
};
use tokio::fs;
use tokio::process::Command;
use url::Url;

use crate::file::FileGetter;
use crate::shorthand::{HostingShorthand, ShorthandDetector};
use crate::traits::{claim_url, forced_path_fallback, DetectRequest, Getter, UrlClaim};

/// Reserved query parameter selecting the revision to update to.
pub const REV_PARAM: &str = "rev";

#[derive(Clone)]
pub struct HgGetter {
    binary: String,
    copy_buffer_size: usize,
    shorthand: Arc<dyn ShorthandDetector>,
}

impl HgGetter {
    pub fn new(config: &FetchConfig) -> Self {
        HgGetter {
            binary: config.hg_binary.clone(),
            copy_buffer_size: config.copy_buffer_size,
            shorthand: Arc::new(HostingShorthand::default()),
        }
    }

    pub fn with_shorthand(mut self, shorthand: Arc<dyn ShorthandDetector>) -> Self {
        self.shorthand = shorthand;
        self
    }

    fn locate_binary(&self) -> FetchResult<PathBuf> {
        which::which(&self.binary).map_err(|_| FetchError::BinaryNotFound {
            binary: self.binary.clone(),
        })
    }

    /// Run the client to completion, killing it if `cancel` fires first.
    async fn run(
        &self,
        cancel: &CancellationToken,
        binary: &Path,
        args: &[&OsStr],
        cwd: Option<&Path>,
    ) -> FetchResult<()> {
        let command_line = std::iter::once(Cow::Borrowed(self.binary.as_str()))
            .chain(args.iter().map(|a| a.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ");

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let start = std::time::Instant::now();
        let child = cmd.spawn().map_err(|e| FetchError::io(binary, e))?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(command = %command_line, "Mercurial command cancelled");
                return Err(FetchError::Cancelled);
            }
            output = child.wait_with_output() => output.map_err(|e| FetchError::io(binary, e))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                command = %command_line,
                status = %output.status,
                stderr = %stderr,
                "Mercurial command failed"
            );
            return Err(FetchError::CommandFailed {
                command: command_line,
                status: output.status.to_string(),
                stderr,
            });
        }

        tracing::debug!(
            command = %command_line,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Mercurial command finished"
        );
        Ok(())
    }

    async fn checkout_file(
        &self,
        req: &mut Request,
        repo: Url,
        file: &[String],
        checkout: &Path,
    ) -> FetchResult<()> {
        let mut checkout_req = Request::new(Address::forced(self.scheme(), repo), checkout)
            .with_cancellation(req.cancel.clone());
        self.get(&mut checkout_req).await?;

        let file_path = file.iter().fold(checkout.to_path_buf(), |p, s| p.join(s));

        // The checkout is about to be discarded, so never link into it.
        let mut file_req = Request::new(Address::from_file_path(&file_path)?, req.dst.clone())
            .with_copy(true)
            .with_cancellation(req.cancel.clone());
        FileGetter::new(self.copy_buffer_size)
            .get_file(&mut file_req)
            .await
    }
}

#[async_trait]
impl Getter for HgGetter {
    fn scheme(&self) -> &'static str {
        "hg"
    }

    fn detect(&self, req: &DetectRequest<'_>) -> FetchResult<Option<Address>> {
        if req.src.is_empty() || req.excludes(self) {
            return Ok(None);
        }

        match claim_url(self, req) {
            UrlClaim::Claimed(address) => return Ok(Some(address)),
            UrlClaim::Declined => return Ok(None),
            UrlClaim::NotUrl => {}
        }

        if let Some(shorthand) = self.shorthand.detect(req.src)? {
            if self.valid_scheme(shorthand.vcs) {
                return Ok(Some(Address::forced(self.scheme(), shorthand.url)));
            }
        }

        forced_path_fallback(self, req)
    }

    async fn mode(&self, _address: &Address, _cancel: &CancellationToken) -> FetchResult<Mode> {
        Ok(Mode::Directory)
    }

    async fn get(&self, req: &mut Request) -> FetchResult<()> {
        let binary = self.locate_binary()?;

        let (url, rev) = req.address.strip_query_param(REV_PARAM);
        let source = client_address(&url);
        let start = std::time::Instant::now();

        match fs::metadata(&req.dst).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let args = [
                    OsStr::new("clone"),
                    OsStr::new("-U"),
                    OsStr::new(&source),
                    req.dst.as_os_str(),
                ];
                self.run(&req.cancel, &binary, &args, None).await?;
            }
            Err(e) => return Err(FetchError::io(&req.dst, e)),
        }

        self.run(&req.cancel, &binary, &[OsStr::new("pull")], Some(&req.dst))
            .await?;

        let mut args = vec![OsStr::new("update")];
        if let Some(rev) = rev.as_deref().filter(|r| !r.is_empty()) {
            args.push(OsStr::new(rev));
        }
        self.run(&req.cancel, &binary, &args, Some(&req.dst)).await?;

        tracing::info!(
            source = %source,
            dst = %req.dst.display(),
            rev = rev.as_deref().unwrap_or("tip"),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Mercurial checkout successful"
        );
        Ok(())
    }

    async fn get_file(&self, req: &mut Request) -> FetchResult<()> {
        let (repo, file) = split_repo_path(&req.address)?;

        let tmp = tempfile::Builder::new()
            .prefix("sourcefetch-hg")
            .tempdir()
            .map_err(|e| FetchError::io(std::env::temp_dir(), e))?;
        // `hg clone` needs a path that does not exist yet.
        let checkout = tmp.path().join("checkout");

        let result = self.checkout_file(req, repo, &file, &checkout).await;

        let tmp_path = tmp.path().to_path_buf();
        if let Err(e) = tmp.close() {
            tracing::warn!(
                path = %tmp_path.display(),
                error = %e,
                "Failed to remove temporary Mercurial checkout"
            );
        }
        result
    }
}

/// Address form handed to the client.
///
/// `hg` only accepts drive-letter paths as `file:///C:/...`; the separator
/// before the drive letter must be present.
pub fn client_address(url: &Url) -> String {
    if url.scheme() == "file" {
        let trimmed = url.path().trim_start_matches('/');
        if is_drive_path(trimmed) {
            let mut out = format!("file:///{}", trimmed);
            if let Some(query) = url.query() {
                out.push('?');
                out.push_str(query);
            }
            return out;
        }
    }
    url.to_string()
}

/// Split an address into the repository URL and the in-repository file path.
///
/// `repo//path/to/file` selects a nested path; otherwise the last segment is the
/// file and everything before it the repository.
pub fn split_repo_path(address: &Address) -> FetchResult<(Url, Vec<String>)> {
    let url = address.url();
    let path = url.path();

    let (repo, file) = match path.get(1..).and_then(|p| p.find("//")) {
        Some(i) => (&path[..i + 1], &path[i + 3..]),
        None => path.rsplit_once('/').unwrap_or(("", path)),
    };

    let segments = file
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect::<Vec<_>>();

    if segments.is_empty() {
        return Err(FetchError::invalid_address(
            address.to_string(),
            "no file path inside the repository",
        ));
    }
    if segments.iter().any(|s| s == ".." || s.contains(['/', '\\'])) {
        return Err(FetchError::invalid_address(
            address.to_string(),
            "file path escapes the repository",
        ));
    }

    let mut repo_url = url.clone();
    repo_url.set_path(if repo.is_empty() { "/" } else { repo });
    Ok((repo_url, segments))
}
