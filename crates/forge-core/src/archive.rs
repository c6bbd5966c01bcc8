//! ZIP packaging of generated projects.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ForgeError, Result};

/// Zip every file under `dir`; entries are rooted at `<artifact>/`.
pub fn zip_directory(artifact: &str, dir: &Path) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    writer
        .add_directory(format!("{artifact}/"), options)
        .map_err(archive_error)?;

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ForgeError::Archive(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| ForgeError::Archive(e.to_string()))?;
        let name = entry_name(artifact, relative);

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(archive_error)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options).map_err(archive_error)?;
            let mut file = File::open(entry.path())?;
            std::io::copy(&mut file, &mut writer)?;
        }
    }

    writer.flush()?;
    let cursor = writer.finish().map_err(archive_error)?;
    Ok(cursor.into_inner())
}

fn entry_name(artifact: &str, relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{artifact}/{}", parts.join("/"))
}

fn archive_error(e: zip::result::ZipError) -> ForgeError {
    ForgeError::Archive(e.to_string())
}
