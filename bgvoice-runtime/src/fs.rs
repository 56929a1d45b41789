use anyhow::Context;
use std::fs;
use std::path::Path;

/// Swaps `tmp` into place at `dst`, keeping a `.bak` of the previous file until the
/// rename succeeds.
pub fn replace_file(tmp: &Path, dst: &Path) -> anyhow::Result<()> {
    let backup = dst.with_extension("bak");

    if dst.exists() {
        let _ = fs::remove_file(&backup);
        fs::rename(dst, &backup)
            .with_context(|| format!("failed rename {} -> {}", dst.display(), backup.display()))?;
    }

    if let Err(e) = fs::rename(tmp, dst) {
        if backup.exists() {
            let _ = fs::rename(&backup, dst);
        }
        let _ = fs::remove_file(tmp);
        return Err(anyhow::Error::new(e).context(format!(
            "failed rename {} -> {}",
            tmp.display(),
            dst.display()
        )));
    }

    let _ = fs::remove_file(&backup);
    Ok(())
}

/// Writes `bytes` to a sibling temp file, then replaces `dst` with it.
pub fn write_replacing(dst: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory: {}", parent.display()))?;
    }

    let mut tmp_name = dst.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = dst.with_file_name(tmp_name);

    fs::write(&tmp, bytes).with_context(|| format!("write temp: {}", tmp.display()))?;
    replace_file(&tmp, dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("config.json");
        fs::write(&dst, b"old").unwrap();

        write_replacing(&dst, b"new").unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"new");
        assert!(!dir.path().join("config.bak").exists());
        assert!(!dir.path().join("config.json.tmp").exists());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("nested").join("deeper").join("config.json");

        write_replacing(&dst, b"{}").unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"{}");
    }

    #[test]
    fn failed_rename_restores_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("config.json");
        fs::write(&dst, b"old").unwrap();

        let missing_tmp = dir.path().join("does-not-exist.tmp");
        assert!(replace_file(&missing_tmp, &dst).is_err());
        assert_eq!(fs::read(&dst).unwrap(), b"old");
    }
}
