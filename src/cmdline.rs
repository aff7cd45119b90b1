//! Command line parsing for the Element compiler.
use argh::FromArgs;
use element_ir::{CompilationInput, MessageLevel};
use element_utils::{ElementResult, Error, OutputFile};
use std::io::Read;
use std::path::PathBuf;

#[derive(FromArgs)]
/// The Element Compiler
pub struct Opts {
    /// expression to compile, read from stdin when no target is given
    #[argh(option, short = 'e', long = "expression")]
    pub expression: Option<String>,

    /// qualified name of a function to compile for a host
    #[argh(option, short = 'f', long = "function")]
    pub functions: Vec<String>,

    /// do not load the built-in prelude
    #[argh(switch, long = "no-prelude")]
    pub no_prelude: bool,

    /// directory searched recursively for `.ele` sources
    #[argh(option, short = 'p', long = "packages")]
    pub packages: Vec<PathBuf>,

    /// extra source file
    #[argh(option, short = 's', long = "source-files")]
    pub source_files: Vec<PathBuf>,

    /// also print the graph before optimization
    #[argh(switch, short = 'd', long = "debug")]
    pub debug: bool,

    /// minimum level of compiler messages to emit
    #[argh(option, long = "verbosity", default = "MessageLevel::Information")]
    pub verbosity: MessageLevel,

    /// print compiler messages as JSON on stderr
    #[argh(switch, long = "log-json")]
    pub log_json: bool,

    /// skip structural validation of declarations
    #[argh(switch, long = "skip-validation")]
    pub skip_validation: bool,

    /// logging level for the compiler internals
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,

    /// output file, default is stdout
    #[argh(option, short = 'o', long = "output", default = "OutputFile::Stdout")]
    pub output: OutputFile,

    /// list the registered intrinsics and exit
    #[argh(switch, long = "list-intrinsics")]
    pub list_intrinsics: bool,
}

/// Something the driver compiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Source text of an expression resolved in the root scope.
    Expression(String),
    /// Qualified name of a declaration.
    Function(String),
}

impl Opts {
    /// Parse the command line. When no target is named and stdin is not a
    /// terminal, the expression is read from stdin.
    pub fn get_opts() -> ElementResult<Opts> {
        let mut opts: Opts = argh::from_env();
        if opts.expression.is_none()
            && opts.functions.is_empty()
            && !opts.list_intrinsics
            && !atty::is(atty::Stream::Stdin)
        {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).map_err(|err| {
                Error::invalid_file(format!("Failed to read stdin: {err}"))
            })?;
            let text = text.trim();
            if !text.is_empty() {
                opts.expression = Some(text.to_string());
            }
        }
        Ok(opts)
    }

    /// Compilation options named on the command line.
    pub fn compilation_input(&self) -> CompilationInput {
        CompilationInput {
            exclude_prelude: self.no_prelude,
            packages: self.packages.clone(),
            extra_source_files: self.source_files.clone(),
            debug: self.debug,
            verbosity: self.verbosity,
            skip_validation: self.skip_validation,
        }
    }

    /// Targets in the order they are printed: functions first.
    pub fn targets(&self) -> Vec<Target> {
        self.functions
            .iter()
            .cloned()
            .map(Target::Function)
            .chain(self.expression.iter().cloned().map(Target::Expression))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Opts, Target};
    use argh::FromArgs;
    use element_ir::MessageLevel;
    use element_utils::OutputFile;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Opts {
        Opts::from_args(&["elementc"], args).unwrap()
    }

    #[test]
    fn defaults() {
        let opts = parse(&[]);
        assert_eq!(opts.verbosity, MessageLevel::Information);
        assert_eq!(opts.log_level, log::LevelFilter::Warn);
        assert_eq!(opts.output, OutputFile::Stdout);
        assert!(opts.targets().is_empty());
        let input = opts.compilation_input();
        assert!(!input.exclude_prelude);
        assert!(!input.skip_validation);
    }

    #[test]
    fn options_flow_into_the_input() {
        let opts = parse(&[
            "--no-prelude",
            "-p",
            "lib",
            "-s",
            "a.ele",
            "-s",
            "b.ele",
            "--verbosity",
            "Warning",
            "--skip-validation",
            "-f",
            "Geo.area",
            "-e",
            "1.add(2)",
        ]);
        let input = opts.compilation_input();
        assert!(input.exclude_prelude);
        assert!(input.skip_validation);
        assert_eq!(input.packages, vec![PathBuf::from("lib")]);
        assert_eq!(input.extra_source_files.len(), 2);
        assert_eq!(input.verbosity, MessageLevel::Warning);
        assert_eq!(
            opts.targets(),
            vec![
                Target::Function("Geo.area".to_string()),
                Target::Expression("1.add(2)".to_string()),
            ]
        );
    }

    #[test]
    fn log_level_is_parsed() {
        let opts = parse(&["--log-level", "debug"]);
        assert_eq!(opts.log_level, log::LevelFilter::Debug);
        assert!(Opts::from_args(&["elementc"], &["--log", "debug"]).is_err());
    }

    #[test]
    fn unknown_levels_are_rejected() {
        assert!(Opts::from_args(&["elementc"], &["--verbosity", "Loud"]).is_err());
    }
}
