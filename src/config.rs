use std::path::PathBuf;

use thiserror::Error;

pub const SOURCE_EXTENSION: &str = "okr";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mode {
    Run,
    Fmt,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Config {
    pub mode: Mode,
    pub path: PathBuf,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "Must use one of the following:\n  \
         ~ 'okra run [script]' => Runs the Okra interpreter on a .okr file\n  \
         ~ 'okra fmt [script]' => Runs the Okra formatter on a .okr file"
    )]
    Usage,
    #[error("File type not supported; please pass a .okr file")]
    UnsupportedFile(PathBuf),
}

impl Config {
    /// Builds a config from the full argument list, program name included.
    pub fn from_args<I, S>(args: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();

        let [_, mode, path] = args.as_slice() else {
            return Err(ConfigError::Usage);
        };

        let mode = match mode.as_str() {
            "run" => Mode::Run,
            "fmt" => Mode::Fmt,
            _ => return Err(ConfigError::Usage),
        };

        let path = PathBuf::from(path);
        if path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
            return Err(ConfigError::UnsupportedFile(path));
        }

        Ok(Config { mode, path })
    }
}
