use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Plan text plus the name diagnostics refer to it by.
pub struct TextInput {
    pub name: String,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("input is required: use a positional argument, `-` for stdin, or -t/--text")]
    Missing,
    #[error("failed to read stdin: {0}")]
    Stdin(#[source] io::Error),
    #[error("failed to read '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to write stdout: {0}")]
    Stdout(#[source] io::Error),
    #[error("'{name}' is not UTF-8 text")]
    NotText { name: String },
}

pub fn load_text(path: Option<&Path>, text: Option<&str>) -> Result<TextInput, InputError> {
    if let Some(text) = text {
        return Ok(TextInput {
            name: "<text>".to_owned(),
            content: text.to_owned(),
        });
    }
    let Some(path) = path else {
        return Err(InputError::Missing);
    };
    let bytes = load_bytes(Some(path))?;
    let name = display_name(path);
    let content = String::from_utf8(bytes).map_err(|_| InputError::NotText { name: name.clone() })?;
    Ok(TextInput { name, content })
}

/// Reads a file, or stdin when `path` is absent or `-`.
pub fn load_bytes(path: Option<&Path>) -> Result<Vec<u8>, InputError> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read(path).map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        }),
        _ => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(InputError::Stdin)?;
            Ok(buf)
        }
    }
}

pub fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<(), InputError> {
    match path {
        Some(path) => fs::write(path, bytes).map_err(|source| InputError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|()| stdout.flush())
                .map_err(InputError::Stdout)
        }
    }
}

pub fn display_name(path: &Path) -> String {
    if path.as_os_str() == "-" {
        "<stdin>".to_owned()
    } else {
        path.to_string_lossy().into_owned()
    }
}
