//! Where batch results go: a folder, a zip file, or a zip archive in memory.

use crate::error::{DomesticationError, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{Cursor, Read, Seek, Write},
    path::{Path, PathBuf},
};
use zip::{ZipArchive, ZipWriter, write::FileOptions};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Replaced if it already exists
    Folder(PathBuf),
    Zip(PathBuf),
    Memory,
}

/// Handle to written batch results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOutput {
    Folder(PathBuf),
    ZipFile(PathBuf),
    Archive(Vec<u8>),
}

impl BatchOutput {
    /// Contents of one file, by its path relative to the output root.
    pub fn read_file(&self, relative_path: &str) -> Result<Vec<u8>> {
        match self {
            Self::Folder(root) => Ok(fs::read(root.join(relative_path))?),
            Self::ZipFile(path) => read_entry(&mut ZipArchive::new(File::open(path)?)?, relative_path),
            Self::Archive(data) => read_entry(&mut ZipArchive::new(Cursor::new(data))?, relative_path),
        }
    }

    /// Relative paths of every written file, sorted.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let mut ret = match self {
            Self::Folder(root) => {
                let mut ret = vec![];
                collect_files(root, root, &mut ret)?;
                ret
            }
            Self::ZipFile(path) => ZipArchive::new(File::open(path)?)?
                .file_names()
                .map(|s| s.to_string())
                .collect(),
            Self::Archive(data) => ZipArchive::new(Cursor::new(data))?
                .file_names()
                .map(|s| s.to_string())
                .collect(),
        };
        ret.sort();
        Ok(ret)
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name).map_err(|e| {
        DomesticationError::not_found(format!("No '{name}' in output archive: {e}"))
    })?;
    let mut bytes = vec![];
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn collect_files(root: &Path, dir: &Path, ret: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, ret)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            ret.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

enum Sink {
    Folder(PathBuf),
    Zip {
        writer: ZipWriter<Cursor<Vec<u8>>>,
        path: Option<PathBuf>,
    },
}

/// A tree of files being written. Nothing is guaranteed to exist on disk
/// for zip targets before `close`.
pub struct OutputTree {
    sink: Sink,
}

impl OutputTree {
    pub fn open(target: &OutputTarget) -> Result<Self> {
        let sink = match target {
            OutputTarget::Folder(path) => {
                if path.is_dir() {
                    fs::remove_dir_all(path)?;
                } else if path.exists() {
                    return Err(DomesticationError::new(
                        ErrorCode::Io,
                        format!("{} exists and is not a folder", path.display()),
                    ));
                }
                fs::create_dir_all(path)?;
                Sink::Folder(path.clone())
            }
            OutputTarget::Zip(path) => Sink::Zip {
                writer: ZipWriter::new(Cursor::new(vec![])),
                path: Some(path.clone()),
            },
            OutputTarget::Memory => Sink::Zip {
                writer: ZipWriter::new(Cursor::new(vec![])),
                path: None,
            },
        };
        Ok(Self { sink })
    }

    /// Writes `data` at `relative_path`, `/`-separated.
    pub fn write_file(&mut self, relative_path: &str, data: &[u8]) -> Result<()> {
        match &mut self.sink {
            Sink::Folder(root) => {
                let path = root.join(relative_path);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, data)?;
            }
            Sink::Zip { writer, .. } => {
                writer.start_file(relative_path, FileOptions::default())?;
                writer.write_all(data)?;
            }
        }
        Ok(())
    }

    pub fn close(self) -> Result<BatchOutput> {
        match self.sink {
            Sink::Folder(root) => Ok(BatchOutput::Folder(root)),
            Sink::Zip { mut writer, path } => {
                let data = writer.finish()?.into_inner();
                match path {
                    Some(path) => {
                        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                            fs::create_dir_all(parent)?;
                        }
                        fs::write(&path, data)?;
                        Ok(BatchOutput::ZipFile(path))
                    }
                    None => Ok(BatchOutput::Archive(data)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        let mut tree = OutputTree::open(&OutputTarget::Folder(root.clone())).unwrap();
        tree.write_file("a/b.txt", b"hello").unwrap();
        tree.write_file("c.csv", b"x,y").unwrap();
        let output = tree.close().unwrap();
        assert_eq!(output.read_file("a/b.txt").unwrap(), b"hello");
        assert_eq!(output.file_names().unwrap(), vec!["a/b.txt", "c.csv"]);

        // reopening replaces the previous contents
        let tree = OutputTree::open(&OutputTarget::Folder(root)).unwrap();
        assert!(tree.close().unwrap().file_names().unwrap().is_empty());
    }

    #[test]
    fn test_memory_archive() {
        let mut tree = OutputTree::open(&OutputTarget::Memory).unwrap();
        tree.write_file("domesticated/x.gb", b"LOCUS").unwrap();
        let output = tree.close().unwrap();
        assert!(matches!(output, BatchOutput::Archive(_)));
        assert_eq!(output.read_file("domesticated/x.gb").unwrap(), b"LOCUS");
        assert!(output.read_file("missing.txt").is_err());
    }

    #[test]
    fn test_zip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("batch.zip");
        let mut tree = OutputTree::open(&OutputTarget::Zip(path.clone())).unwrap();
        tree.write_file("summary.csv", b"a,b\n").unwrap();
        let output = tree.close().unwrap();
        assert_eq!(output, BatchOutput::ZipFile(path.clone()));
        assert!(path.exists());
        assert_eq!(output.file_names().unwrap(), vec!["summary.csv"]);
    }
}
