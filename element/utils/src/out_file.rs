use crate::{ElementResult, Error};
use std::{
    fs,
    io::{self, BufWriter},
    path::PathBuf,
    str::FromStr,
};

/// Possible choices for output streams. Used by the `-o` option to the compiler.
/// * "-" and "<out>" are treated as stdout.
/// * "<err>" is treated as stderr.
/// * "<null>" is treated as a null output stream.
/// * All other strings are treated as file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFile {
    Null,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl FromStr for OutputFile {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("output path cannot be empty".to_string()),
            "-" | "<out>" => Ok(OutputFile::Stdout),
            "<err>" => Ok(OutputFile::Stderr),
            "<null>" => Ok(OutputFile::Null),
            _ => Ok(OutputFile::File(PathBuf::from(s))),
        }
    }
}

impl std::fmt::Display for OutputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFile::Stdout => write!(f, "-"),
            OutputFile::Stderr => write!(f, "<err>"),
            OutputFile::Null => write!(f, "<null>"),
            OutputFile::File(path) => write!(f, "{}", path.to_string_lossy()),
        }
    }
}

impl OutputFile {
    pub fn isatty(&self) -> bool {
        match self {
            OutputFile::Stdout => atty::is(atty::Stream::Stdout),
            OutputFile::Stderr => atty::is(atty::Stream::Stderr),
            OutputFile::Null | OutputFile::File(_) => false,
        }
    }

    /// Open a buffered writer for this output. Files are truncated.
    pub fn get_write(&self) -> ElementResult<Box<dyn io::Write>> {
        Ok(match self {
            OutputFile::Stdout => Box::new(BufWriter::new(io::stdout())),
            OutputFile::Stderr => Box::new(BufWriter::new(io::stderr())),
            OutputFile::File(path) => {
                let file = fs::File::create(path).map_err(|err| {
                    Error::invalid_file(format!(
                        "Failed to create {}: {err}",
                        path.to_string_lossy()
                    ))
                })?;
                Box::new(BufWriter::new(file))
            }
            OutputFile::Null => Box::new(io::sink()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::OutputFile;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn parses_special_streams() {
        assert_eq!("-".parse::<OutputFile>(), Ok(OutputFile::Stdout));
        assert_eq!("<out>".parse::<OutputFile>(), Ok(OutputFile::Stdout));
        assert_eq!("<err>".parse::<OutputFile>(), Ok(OutputFile::Stderr));
        assert_eq!("<null>".parse::<OutputFile>(), Ok(OutputFile::Null));
        assert_eq!(
            "graph.txt".parse::<OutputFile>(),
            Ok(OutputFile::File(PathBuf::from("graph.txt")))
        );
        assert!("".parse::<OutputFile>().is_err());
    }

    #[test]
    fn null_output_swallows_writes() {
        let mut out = OutputFile::Null.get_write().unwrap();
        assert!(out.write_all(b"ignored").is_ok());
    }
}
