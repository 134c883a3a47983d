//! Path helpers shared by detection and the getters.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FetchError, FetchResult};

/// Convert platform separators to the URL convention.
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// `C:/...` or `c:\...`, optionally preceded by nothing else.
pub fn is_drive_path(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\')
}

/// Windows network share path: `\\host\share[\...]` or `//host/share[/...]`.
pub fn is_windows_share_path(s: &str) -> bool {
    let rest = match s.strip_prefix("\\\\").or_else(|| s.strip_prefix("//")) {
        Some(rest) => rest,
        None => return false,
    };
    let mut parts = rest.split(['\\', '/']);
    let host = parts.next().unwrap_or_default();
    let share = parts.next().unwrap_or_default();
    !host.is_empty() && !share.is_empty()
}

/// Resolve the working directory used for relative sources.
///
/// A symlinked `pwd` is replaced by its absolute real target so that joining
/// `..` components walks the real tree. A missing `pwd` is returned as is; the
/// failure surfaces later, when the joined path is used.
pub fn resolve_pwd(pwd: &Path) -> FetchResult<PathBuf> {
    match fs::symlink_metadata(pwd) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(pwd.to_path_buf()),
        Err(e) => Err(FetchError::io(pwd, e)),
        Ok(meta) if meta.file_type().is_symlink() => {
            let real = fs::canonicalize(pwd).map_err(|e| FetchError::io(pwd, e))?;
            std::path::absolute(&real).map_err(|e| FetchError::io(&real, e))
        }
        Ok(_) => Ok(pwd.to_path_buf()),
    }
}

/// Join a relative `src` onto `pwd`, normalizing `.` and `..` lexically.
///
/// Absolute sources are returned unchanged apart from normalization.
pub fn join_pwd(src: &str, pwd: Option<&Path>) -> FetchResult<PathBuf> {
    let path = Path::new(src);
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let pwd = match pwd {
        Some(pwd) if !pwd.as_os_str().is_empty() => pwd,
        _ => return Err(FetchError::MissingPwd(src.to_string())),
    };
    let pwd = resolve_pwd(pwd)?;
    Ok(normalize(&pwd.join(path)))
}

fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_paths() {
        assert!(is_windows_share_path("\\\\server\\share\\dir"));
        assert!(is_windows_share_path("//server/share"));
        assert!(!is_windows_share_path("//server"));
        assert!(!is_windows_share_path("/server/share"));
        assert!(!is_windows_share_path("C:\\server\\share"));
    }

    #[test]
    fn drive_paths() {
        assert!(is_drive_path("C:/work"));
        assert!(is_drive_path("c:\\work"));
        assert!(is_drive_path("d:"));
        assert!(!is_drive_path("/c:/work"));
        assert!(!is_drive_path("cd:/work"));
    }

    #[test]
    fn relative_source_without_pwd_is_an_error() {
        let err = join_pwd("./modules/foo", None).unwrap_err();
        assert!(matches!(err, FetchError::MissingPwd(_)));

        let err = join_pwd("./modules/foo", Some(Path::new(""))).unwrap_err();
        assert!(matches!(err, FetchError::MissingPwd(_)));
    }

    #[cfg(unix)]
    #[test]
    fn relative_source_is_joined_and_normalized() {
        let joined = join_pwd("./modules/../mods/foo", Some(Path::new("/work"))).unwrap();
        assert_eq!(joined, PathBuf::from("/work/mods/foo"));

        let absolute = join_pwd("/abs/./foo", None).unwrap();
        assert_eq!(absolute, PathBuf::from("/abs/foo"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_pwd_is_resolved_before_joining() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real").join("nested");
        fs::create_dir_all(&real).unwrap();
        fs::create_dir_all(dir.path().join("real").join("sibling")).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let joined = join_pwd("../sibling", Some(&link)).unwrap();
        let expected = fs::canonicalize(dir.path().join("real").join("sibling")).unwrap();
        assert_eq!(joined, expected);
    }
}
