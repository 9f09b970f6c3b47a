use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use super::{parse_program, ParseError, Program};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Parse { path: PathBuf, source: ParseError },
}

/// Reads and parses every program file. A path listed more than once is only
/// loaded the first time.
pub fn load_programs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Program>, LoadError> {
    let mut seen = HashSet::new();
    let mut programs = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if !seen.insert(path.to_path_buf()) {
            warn!("Skipping {}, already loaded", path.display());
            continue;
        }

        let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let instructions = parse_program(&source).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        programs.push(Program {
            name: path.display().to_string(),
            instructions,
        });
    }

    Ok(programs)
}
