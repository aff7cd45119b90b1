use super::{ast::SourceFile, parser::ElementParser};
use element_utils::{ElementResult, Error};
use itertools::Itertools;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Source of the built-in declarations every program can use.
pub const PRELUDE: &str = include_str!("../prelude/Prelude.ele");

/// Name the prelude is registered under in diagnostics.
pub const PRELUDE_NAME: &str = "<prelude>";

/// File extension of Element sources found in package directories.
const SOURCE_EXTENSION: &str = "ele";

/// A source that failed to parse. Parse failures are not fatal to the
/// workspace: the compiler reports them as diagnostics and carries on with
/// the remaining sources.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub source: String,
    pub message: String,
}

/// A Workspace represents all Element sources gathered for one compilation:
/// the prelude (unless excluded), every source file found in the package
/// directories and any extra source files named explicitly.
#[derive(Default)]
pub struct Workspace {
    /// Sources that parsed successfully, in load order.
    pub files: Vec<SourceFile>,
    /// Sources that failed to parse.
    pub failures: Vec<ParseFailure>,
}

impl Workspace {
    /// Construct a workspace from the prelude, package directories and
    /// extra source files.
    pub fn construct(
        include_prelude: bool,
        packages: &[PathBuf],
        extra_files: &[PathBuf],
    ) -> ElementResult<Self> {
        let mut ws = Workspace::default();
        if include_prelude {
            ws.add_source(PRELUDE_NAME, PRELUDE);
        }
        for package in packages {
            for file in Self::package_sources(package)? {
                ws.add_file(&file)?;
            }
        }
        for file in extra_files {
            ws.add_file(file)?;
        }
        Ok(ws)
    }

    /// Parse `text` and record it under `name`.
    pub fn add_source(&mut self, name: &str, text: &str) {
        match ElementParser::parse_source(name, text) {
            Ok(file) => self.files.push(file),
            Err(err) => {
                log::debug!("Failed to parse `{name}`: {err}");
                self.failures.push(ParseFailure {
                    source: name.to_string(),
                    message: err.message(),
                })
            }
        }
    }

    fn add_file(&mut self, path: &Path) -> ElementResult<()> {
        let text = fs::read_to_string(path).map_err(|err| {
            Error::invalid_file(format!(
                "Failed to read {}: {err}",
                path.to_string_lossy()
            ))
        })?;
        self.add_source(&path.to_string_lossy(), &text);
        Ok(())
    }

    /// All source files below `dir`, sorted so that load order does not
    /// depend on the file system.
    fn package_sources(dir: &Path) -> ElementResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(Error::invalid_file(format!(
                "Package directory `{}` does not exist",
                dir.to_string_lossy()
            )));
        }
        let mut found = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let entries = fs::read_dir(&current).map_err(|err| {
                Error::invalid_file(format!(
                    "Failed to read package directory {}: {err}",
                    current.to_string_lossy()
                ))
            })?;
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path
                    .extension()
                    .is_some_and(|ext| ext == SOURCE_EXTENSION)
                {
                    found.push(path);
                }
            }
        }
        Ok(found.into_iter().sorted().collect())
    }
}
