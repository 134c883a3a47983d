use std::fs;
use std::path::{Path, PathBuf};

/// Write `contents` at `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// A small module tree: `module/main.tf` and `module/nested/vars.tf`.
pub fn module_tree(root: &Path) -> PathBuf {
    let module = root.join("module");
    write_file(&module, "main.tf", b"resource \"null\" \"a\" {}\n");
    write_file(&module, "nested/vars.tf", b"variable \"x\" {}\n");
    module
}

pub fn read_string(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
