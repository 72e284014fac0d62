use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::canvas::MAX_GRID_DIM;

// ============================================================================
// PROJECT FILE SHAPE
// ============================================================================

/// Serializable project.  JSON files use camelCase keys so they interchange
/// with the web editor's exports; `.pbp` files wrap the same structure in a
/// bincode envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// `grid[y][x]`.
    pub grid: Vec<Vec<CellRecord>>,
    #[serde(default)]
    pub marked_cells: BTreeMap<String, bool>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_modified: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub id: String,
    /// Palette ID or `#RRGGBB`; `None` is an empty cell.
    pub color: Option<String>,
    pub x: u32,
    pub y: u32,
}

impl ProjectFile {
    /// Reject files whose declared size disagrees with the grid they carry.
    pub fn validate(&self) -> Result<(), ProjectError> {
        if self.width == 0 || self.height == 0 {
            return Err(ProjectError::InvalidFormat(
                "Grid dimensions cannot be zero".into(),
            ));
        }
        if self.width > MAX_GRID_DIM || self.height > MAX_GRID_DIM {
            return Err(ProjectError::InvalidFormat(format!(
                "Grid size {}x{} exceeds maximum allowed {}x{}",
                self.width, self.height, MAX_GRID_DIM, MAX_GRID_DIM
            )));
        }
        if self.grid.len() != self.height as usize {
            return Err(ProjectError::InvalidFormat(format!(
                "Grid has {} rows, expected {}",
                self.grid.len(),
                self.height
            )));
        }
        if let Some((y, row)) = self
            .grid
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.width as usize)
        {
            return Err(ProjectError::InvalidFormat(format!(
                "Row {} has {} cells, expected {}",
                y,
                row.len(),
                self.width
            )));
        }
        Ok(())
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ProjectError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for ProjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectError::Io(e) => write!(f, "I/O error: {}", e),
            ProjectError::Serialize(e) => write!(f, "Serialization error: {}", e),
            ProjectError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for ProjectError {}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        ProjectError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for ProjectError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        ProjectError::Serialize(e.to_string())
    }
}

impl From<serde_json::Error> for ProjectError {
    fn from(e: serde_json::Error) -> Self {
        ProjectError::Serialize(e.to_string())
    }
}

impl From<image::ImageError> for ProjectError {
    fn from(e: image::ImageError) -> Self {
        ProjectError::Serialize(e.to_string())
    }
}

// ============================================================================
// FORMATS
// ============================================================================

/// Magic header of native binary project files.
const PBP_MAGIC: &str = "PBP1";

#[derive(Serialize, Deserialize)]
struct PbpEnvelope {
    magic: String,
    project: ProjectFile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectFormat {
    Json,
    Pbp,
}

impl ProjectFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(ProjectFormat::Json),
            "pbp" => Some(ProjectFormat::Pbp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ProjectFormat::Json => "json",
            ProjectFormat::Pbp => "pbp",
        }
    }
}

pub fn save_json(project: &ProjectFile, path: &Path) -> Result<(), ProjectError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, project)?;
    Ok(())
}

pub fn load_json(path: &Path) -> Result<ProjectFile, ProjectError> {
    let reader = BufReader::new(File::open(path)?);
    let project: ProjectFile = serde_json::from_reader(reader)?;
    project.validate()?;
    Ok(project)
}

pub fn save_pbp(project: &ProjectFile, path: &Path) -> Result<(), ProjectError> {
    let writer = BufWriter::new(File::create(path)?);
    let envelope = PbpEnvelope {
        magic: PBP_MAGIC.to_string(),
        project: project.clone(),
    };
    bincode::serialize_into(writer, &envelope)?;
    Ok(())
}

pub fn load_pbp(path: &Path) -> Result<ProjectFile, ProjectError> {
    let raw = std::fs::read(path)?;
    if raw.len() < 12 {
        return Err(ProjectError::InvalidFormat("File too small".into()));
    }

    // bincode writes a String as an 8-byte length prefix followed by the
    // UTF-8 bytes, so the 4-char magic sits at 8..12.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != PBP_MAGIC {
        return Err(ProjectError::InvalidFormat(format!(
            "Unknown magic '{}'",
            magic
        )));
    }

    let envelope: PbpEnvelope = bincode::deserialize(&raw)?;
    envelope.project.validate()?;
    Ok(envelope.project)
}

/// Save in the format named by the path's extension (JSON when unknown).
pub fn save_project(project: &ProjectFile, path: &Path) -> Result<(), ProjectError> {
    match ProjectFormat::from_path(path) {
        Some(ProjectFormat::Pbp) => save_pbp(project, path),
        _ => save_json(project, path),
    }
}

/// Load a `.pbp` or `.json` project.  Files without a known extension are
/// sniffed: a leading `{` means JSON.
pub fn load_project(path: &Path) -> Result<ProjectFile, ProjectError> {
    match ProjectFormat::from_path(path) {
        Some(ProjectFormat::Json) => load_json(path),
        Some(ProjectFormat::Pbp) => load_pbp(path),
        None => {
            let head = std::fs::read(path)?;
            if head.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
                load_json(path)
            } else {
                load_pbp(path)
            }
        }
    }
}

/// Write a rendered surface to disk; the format follows the extension.
pub fn export_image(image: &RgbaImage, path: &Path) -> Result<(), ProjectError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProjectFile {
        ProjectFile {
            id: "p1".into(),
            name: "Heart".into(),
            width: 2,
            height: 1,
            grid: vec![vec![
                CellRecord { id: "0-0".into(), color: Some("A2".into()), x: 0, y: 0 },
                CellRecord { id: "1-0".into(), color: None, x: 1, y: 0 },
            ]],
            marked_cells: BTreeMap::from([("0-0".to_string(), true)]),
            last_modified: 1_700_000_000_000,
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("perlerpad-io-{}-{}", std::process::id(), name))
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let text = serde_json::to_string(&sample()).unwrap();
        assert!(text.contains("\"markedCells\""));
        assert!(text.contains("\"lastModified\""));
        let back: ProjectFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn missing_optional_keys_default() {
        let text = r#"{"id":"a","name":"b","width":1,"height":1,
            "grid":[[{"id":"0-0","color":null,"x":0,"y":0}]]}"#;
        let file: ProjectFile = serde_json::from_str(text).unwrap();
        assert!(file.marked_cells.is_empty());
        assert!(file.validate().is_ok());
    }

    #[test]
    fn shape_mismatch_is_invalid() {
        let mut file = sample();
        file.width = 3;
        assert!(matches!(file.validate(), Err(ProjectError::InvalidFormat(_))));
        file.width = 0;
        assert!(matches!(file.validate(), Err(ProjectError::InvalidFormat(_))));
    }

    #[test]
    fn pbp_files_carry_magic() {
        let path = temp_path("sample.pbp");
        save_project(&sample(), &path).unwrap();
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[8..12], b"PBP1");
        assert_eq!(load_project(&path).unwrap(), sample());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn foreign_binary_is_rejected() {
        let path = temp_path("junk.pbp");
        std::fs::write(&path, b"\x04\0\0\0\0\0\0\0XXXXmore bytes").unwrap();
        assert!(matches!(load_pbp(&path), Err(ProjectError::InvalidFormat(_))));
        let _ = std::fs::remove_file(&path);
    }
}
