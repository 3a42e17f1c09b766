use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use eyre::{eyre, Result};

/// Expand a leading `~` or `~/` in a path to the user's home directory. Paths
/// without the shorthand, or systems without a home directory, are returned as-is.
///
/// ```
/// use argus_common::utils::io::file::expand_home;
/// use std::path::PathBuf;
///
/// assert_eq!(expand_home("contracts/Token.sol"), PathBuf::from("contracts/Token.sol"));
/// ```
pub fn expand_home(path: &str) -> PathBuf {
    #[allow(deprecated)]
    let home = std::env::home_dir();

    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Write contents to a file on the disc, creating parent directories
///
/// ```no_run
/// use argus_common::utils::io::file::write_file;
///
/// let result = write_file("/tmp/argus/test.txt", "Hello, World!");
/// ```
pub fn write_file<P: AsRef<Path>>(path: P, contents: &str) -> Result<()> {
    let path = path.as_ref();

    // Create the directory if it doesn't exist
    std::fs::create_dir_all(path.parent().ok_or_else(|| eyre!("unable to create directory"))?)?;

    let mut file = File::create(path)?;
    file.write_all(contents.as_bytes())?;

    Ok(())
}

/// Replace a file's contents as a whole. The contents are written to a sibling
/// temporary file which is then renamed over the destination, so readers observe
/// either the old or the new contents, never a partial write.
pub fn write_file_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = path.parent().ok_or_else(|| eyre!("unable to create directory"))?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("'{}' is not a file path", path.display()))?
        .to_string_lossy();
    let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    let written = File::create(&tmp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| std::fs::rename(&tmp_path, path)) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Read contents from a file on the disc
///
/// ```no_run
/// use argus_common::utils::io::file::read_file;
///
/// let contents = read_file("/tmp/argus/test.txt");
/// ```
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut file = File::open(path.as_ref())?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}
