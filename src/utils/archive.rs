use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use crate::errors::{GoldbergError, Result};

const SEVEN_ZIP_MAGIC: [u8; 6] = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    SevenZip,
    Zip,
}

impl ArchiveKind {
    /// Sniff the container format from its leading bytes.
    pub fn detect(path: &Path) -> io::Result<Option<Self>> {
        let mut header = [0_u8; 6];
        let mut file = File::open(path)?;
        let mut filled = 0;
        while filled < header.len() {
            let read = file.read(&mut header[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled >= SEVEN_ZIP_MAGIC.len() && header == SEVEN_ZIP_MAGIC {
            return Ok(Some(ArchiveKind::SevenZip));
        }
        if filled >= ZIP_MAGIC.len() && header[..ZIP_MAGIC.len()] == ZIP_MAGIC {
            return Ok(Some(ArchiveKind::Zip));
        }
        Ok(None)
    }
}

#[derive(Debug, Default)]
pub struct ExtractReport {
    pub files: usize,
    pub errors: Vec<String>,
}

impl ExtractReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Extract every entry of `archive` under `dest`. Entry failures are collected rather
/// than aborting, so the caller sees the complete list.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<ExtractReport> {
    let kind = ArchiveKind::detect(archive)
        .map_err(|err| GoldbergError::provisioning_io(archive, err))?
        .ok_or_else(|| {
            GoldbergError::Provisioning(format!("{}: unknown archive format", archive.display()))
        })?;
    fs::create_dir_all(dest).map_err(|err| GoldbergError::provisioning_io(dest, err))?;
    match kind {
        ArchiveKind::SevenZip => extract_7z(archive, dest),
        ArchiveKind::Zip => extract_zip(archive, dest),
    }
}

fn extract_7z(archive: &Path, dest: &Path) -> Result<ExtractReport> {
    let mut report = ExtractReport::default();
    sevenz_rust::decompress_file_with_extract_fn(archive, dest, |entry, reader, target| {
        match sevenz_rust::default_entry_extract_fn(entry, reader, target) {
            Ok(keep_going) => {
                if !entry.is_directory() {
                    report.files += 1;
                }
                Ok(keep_going)
            }
            Err(err) => {
                report.errors.push(format!("{}: {}", entry.name(), err));
                Ok(true)
            }
        }
    })
    .map_err(|err| GoldbergError::Provisioning(format!("{}: {}", archive.display(), err)))?;
    Ok(report)
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<ExtractReport> {
    let file = File::open(archive).map_err(|err| GoldbergError::provisioning_io(archive, err))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|err| GoldbergError::Provisioning(format!("{}: {}", archive.display(), err)))?;

    let mut report = ExtractReport::default();
    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(err) => {
                report.errors.push(format!("entry {}: {}", index, err));
                continue;
            }
        };
        let Some(relative) = entry.enclosed_name().map(|path| path.to_path_buf()) else {
            report
                .errors
                .push(format!("{}: path escapes the archive root", entry.name()));
            continue;
        };
        let target = dest.join(relative);
        if entry.is_dir() {
            if let Err(err) = fs::create_dir_all(&target) {
                report.errors.push(format!("{}: {}", target.display(), err));
            }
            continue;
        }
        let written = target
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|()| File::create(&target))
            .and_then(|mut out| io::copy(&mut entry, &mut out));
        match written {
            Ok(_) => report.files += 1,
            Err(err) => report.errors.push(format!("{}: {}", target.display(), err)),
        }
    }
    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use uuid::Uuid;
    use zip::write::FileOptions;

    pub(crate) fn build_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).expect("zip file");
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in entries {
            writer
                .start_file(*name, FileOptions::default())
                .expect("start entry");
            writer.write_all(contents).expect("entry body");
        }
        writer.finish().expect("finish zip");
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("goldberg-archive-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn zip_entries_extract_and_unsafe_paths_are_reported() {
        let dir = temp_dir();
        let archive = dir.join("release.zip");
        build_zip(
            &archive,
            &[
                ("release/regular/x32/steam_api.dll", b"dll32"),
                ("../escape.txt", b"nope"),
            ],
        );
        assert_eq!(ArchiveKind::detect(&archive).expect("detect"), Some(ArchiveKind::Zip));

        let out = dir.join("out");
        let report = extract_archive(&archive, &out).expect("extract");
        assert_eq!(report.files, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_clean());
        assert_eq!(
            fs::read(out.join("release/regular/x32/steam_api.dll")).expect("dll"),
            b"dll32"
        );
        assert!(!dir.join("escape.txt").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_formats_are_rejected() {
        let dir = temp_dir();
        let archive = dir.join("goldberg.7z");
        fs::write(&archive, b"not an archive").expect("write");
        assert_eq!(ArchiveKind::detect(&archive).expect("detect"), None);
        assert!(matches!(
            extract_archive(&archive, &dir.join("out")),
            Err(GoldbergError::Provisioning(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
