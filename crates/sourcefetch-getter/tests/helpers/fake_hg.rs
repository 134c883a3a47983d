use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// A stand-in `hg` executable that records its arguments.
///
/// `clone` creates the destination, `update` writes `README` and
/// `docs/guide.txt` stamped with the requested revision.
pub struct FakeHg {
    pub binary: PathBuf,
    pub log: PathBuf,
}

impl FakeHg {
    pub fn install(dir: &Path) -> FakeHg {
        Self::install_with(dir, "")
    }

    /// Install a client whose `pull` fails with `stderr` on standard error.
    pub fn install_failing_pull(dir: &Path, stderr: &str) -> FakeHg {
        Self::install_with(
            dir,
            &format!("if [ \"$1\" = pull ]; then echo '{}' >&2; exit 255; fi\n", stderr),
        )
    }

    /// Install a client whose `pull` sleeps for three seconds and then touches
    /// `finished`.
    pub fn install_slow_pull(dir: &Path, finished: &Path) -> FakeHg {
        Self::install_with(
            dir,
            &format!(
                "if [ \"$1\" = pull ]; then sleep 3; touch \"{}\"; fi\n",
                finished.display()
            ),
        )
    }

    fn install_with(dir: &Path, preamble: &str) -> FakeHg {
        let binary = dir.join("hg");
        let log = dir.join("hg.log");
        let script = format!(
            r#"#!/bin/sh
echo "$*" >> "{log}"
{preamble}case "$1" in
  clone)
    mkdir -p "$4/.hg"
    ;;
  update)
    rev="${{2:-tip}}"
    echo "checkout at $rev" > README
    mkdir -p docs
    echo "guide at $rev" > docs/guide.txt
    ;;
esac
exit 0
"#,
            log = log.display(),
            preamble = preamble,
        );
        fs::write(&binary, script).unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
        FakeHg { binary, log }
    }

    /// Recorded invocations, one argument string per call.
    pub fn calls(&self) -> Vec<String> {
        match fs::read_to_string(&self.log) {
            Ok(log) => log.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }
}
