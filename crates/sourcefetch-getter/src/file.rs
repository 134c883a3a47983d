use std::io;
use std::path::Path;

use async_trait::async_trait;
use sourcefetch_core::paths::{is_windows_share_path, join_pwd};
use sourcefetch_core::{
    copy_with_cancel, Address, CancellationToken, FetchError, FetchResult, Mode, Request,
};
use tokio::fs;

use crate::traits::{claim_url, DetectRequest, Getter, UrlClaim};

/// Creates a symbolic link at `dst` pointing to `src`.
pub type Linker = fn(&Path, &Path) -> io::Result<()>;

/// Local filesystem getter
///
/// Directories are always materialized as a symlink. Files are symlinked or
/// copied depending on `Request::copy`, falling back to a copy when the
/// platform refuses the symlink privilege.
#[derive(Clone)]
pub struct FileGetter {
    copy_buffer_size: usize,
    link_file: Linker,
}

impl FileGetter {
    pub fn new(copy_buffer_size: usize) -> Self {
        FileGetter {
            copy_buffer_size,
            link_file: symlink_file,
        }
    }

    /// Replace the file-linking primitive (used to simulate platforms that deny
    /// symlink creation).
    pub fn with_linker(mut self, link_file: Linker) -> Self {
        self.link_file = link_file;
        self
    }

    async fn copy_file(
        &self,
        src: &Path,
        dst: &Path,
        cancel: &CancellationToken,
    ) -> FetchResult<u64> {
        let mut src_file = fs::File::open(src)
            .await
            .map_err(|e| FetchError::io(src, e))?;
        let mut dst_file = fs::File::create(dst)
            .await
            .map_err(|e| FetchError::io(dst, e))?;
        copy_with_cancel(
            cancel,
            &mut src_file,
            src,
            &mut dst_file,
            dst,
            self.copy_buffer_size,
        )
        .await
    }
}

#[async_trait]
impl Getter for FileGetter {
    fn scheme(&self) -> &'static str {
        "file"
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

        // Left for a share-aware getter.
        if cfg!(windows) && is_windows_share_path(req.src) {
            return Ok(None);
        }

        let path = join_pwd(req.src, req.pwd)?;
        Address::from_file_path(&path).map(Some)
    }

    async fn mode(&self, address: &Address, _cancel: &CancellationToken) -> FetchResult<Mode> {
        let path = address.to_file_path()?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| FetchError::SourceUnavailable { path, source: e })?;

        if meta.is_dir() {
            Ok(Mode::Directory)
        } else {
            Ok(Mode::File)
        }
    }

    async fn get(&self, req: &mut Request) -> FetchResult<()> {
        let path = req.address.to_file_path()?;

        match fs::metadata(&path).await {
            Err(e) => return Err(FetchError::SourceUnavailable { path, source: e }),
            Ok(meta) if !meta.is_dir() => {
                return Err(FetchError::SourceKind {
                    path,
                    expected: Mode::Directory,
                })
            }
            Ok(_) => {}
        }

        let existing = symlink_metadata(&req.dst).await?;

        if req.inplace {
            req.dst = path;
            return Ok(());
        }

        // Only a previous link may be replaced; real content is never overwritten.
        if let Some(meta) = existing {
            if !meta.file_type().is_symlink() {
                return Err(FetchError::DestinationConflict(req.dst.clone()));
            }
            remove_link(&req.dst).await?;
        }

        create_parent_dirs(&req.dst).await?;

        symlink_dir(&path, &req.dst).map_err(|e| FetchError::io(&req.dst, e))?;

        tracing::info!(
            src = %path.display(),
            dst = %req.dst.display(),
            "Local directory linked"
        );
        Ok(())
    }

    async fn get_file(&self, req: &mut Request) -> FetchResult<()> {
        let path = req.address.to_file_path()?;

        match fs::metadata(&path).await {
            Err(e) => return Err(FetchError::SourceUnavailable { path, source: e }),
            Ok(meta) if meta.is_dir() => {
                return Err(FetchError::SourceKind {
                    path,
                    expected: Mode::File,
                })
            }
            Ok(_) => {}
        }

        if req.inplace {
            req.dst = path;
            return Ok(());
        }

        // Unlike `get`, any existing entry is removed rather than rejected.
        if let Some(meta) = symlink_metadata(&req.dst).await? {
            let removed = if meta.is_dir() {
                fs::remove_dir(&req.dst).await
            } else {
                fs::remove_file(&req.dst).await
            };
            removed.map_err(|e| FetchError::io(&req.dst, e))?;
        }

        create_parent_dirs(&req.dst).await?;

        if !req.copy {
            match (self.link_file)(&path, &req.dst) {
                Ok(()) => {
                    tracing::info!(
                        src = %path.display(),
                        dst = %req.dst.display(),
                        "Local file linked"
                    );
                    return Ok(());
                }
                Err(e) if is_symlink_privilege_error(&e) => {
                    tracing::warn!(
                        src = %path.display(),
                        dst = %req.dst.display(),
                        error = %e,
                        "Symlink privilege not held, copying instead"
                    );
                }
                Err(e) => return Err(FetchError::io(&req.dst, e)),
            }
        }

        let start = std::time::Instant::now();
        let size = self.copy_file(&path, &req.dst, &req.cancel).await?;

        tracing::info!(
            src = %path.display(),
            dst = %req.dst.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local file copied"
        );
        Ok(())
    }
}

pub(crate) async fn symlink_metadata(path: &Path) -> FetchResult<Option<std::fs::Metadata>> {
    match fs::symlink_metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FetchError::io(path, e)),
    }
}

pub(crate) async fn create_parent_dirs(path: &Path) -> FetchResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| FetchError::io(parent, e))?;
    }
    Ok(())
}

async fn remove_link(path: &Path) -> FetchResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        // Directory symlinks on Windows are removed as directories.
        Err(e) if cfg!(windows) => fs::remove_dir(path)
            .await
            .map_err(|_| FetchError::io(path, e)),
        Err(e) => Err(FetchError::io(path, e)),
    }
}

/// The platform refused symlink creation for lack of privilege.
pub fn is_symlink_privilege_error(err: &io::Error) -> bool {
    #[cfg(windows)]
    const PRIVILEGE_NOT_HELD: i32 = 1314;
    #[cfg(not(windows))]
    const PRIVILEGE_NOT_HELD: i32 = 1; // EPERM

    err.raw_os_error() == Some(PRIVILEGE_NOT_HELD)
}

#[cfg(unix)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}
