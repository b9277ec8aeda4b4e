use std::fs;
use std::io;
use std::path::{Component, Path};

pub fn ensure_dir<P: AsRef<Path>>(p: P) -> io::Result<()> {
    if !p.as_ref().exists() {
        fs::create_dir_all(&p)?;
    }
    Ok(())
}

/// Recreates `p` as an empty directory, dropping output left by a previous run.
pub fn reset_dir<P: AsRef<Path>>(p: P) -> io::Result<()> {
    let p = p.as_ref();
    if p.exists() {
        fs::remove_dir_all(p)?;
    }
    fs::create_dir_all(p)
}

/// Whether `name` stays inside the directory it is joined onto: a single plain
/// component, no separator of either platform, not `.` or `..`.
pub fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
