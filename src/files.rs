// Released under MIT License.
// Copyright (c) 2023-2025 Ladislav Bartos

//! Enum capturing trajectory file types supported by `trjkit`.

use std::path::Path;

/// Types of trajectory files supported by `trjkit`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FileType {
    Unknown,
    DCD,
    XTC,
    TRR,
}

impl FileType {
    /// Identify file type from the name of the file (based on file extension).
    /// Extension matching is case-insensitive.
    pub fn from_name(filename: impl AsRef<Path>) -> FileType {
        let extension = match filename.as_ref().extension() {
            Some(x) => x,
            None => return FileType::Unknown,
        };

        match extension.to_str().map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("dcd") => FileType::DCD,
            Some("xtc") => FileType::XTC,
            Some("trr") => FileType::TRR,
            Some(_) | None => FileType::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_dcd() {
        assert_eq!(FileType::from_name("file.dcd"), FileType::DCD);
    }

    #[test]
    fn identify_dcd_uppercase() {
        assert_eq!(FileType::from_name("traj/FILE.DCD"), FileType::DCD);
    }

    #[test]
    fn identify_xtc() {
        assert_eq!(FileType::from_name("file.xtc"), FileType::XTC);
    }

    #[test]
    fn identify_trr() {
        assert_eq!(FileType::from_name("file.trr"), FileType::TRR);
    }

    #[test]
    fn identify_unknown() {
        assert_eq!(FileType::from_name("file.gro"), FileType::Unknown);
    }

    #[test]
    fn identify_noextension() {
        assert_eq!(FileType::from_name("file"), FileType::Unknown);
    }
}
