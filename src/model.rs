use std::path::{Component, Path, PathBuf};

use util::PathEncodingError;

use crate::settings::Settings;

/// Placeholder in the output directory template.
const NAME_PLACEHOLDER: &str = "{name}";

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("Unable to locate model file {0:?}")]
    NotFound(PathBuf, #[source] std::io::Error),
    #[error("{0:?} is a directory, not a model file")]
    IsDirectory(PathBuf),
    #[error("Model path {0:?} has no file name")]
    NoFileName(PathBuf),
    #[error("Unknown placeholder in output directory template '{0}' (only {{name}} is supported)")]
    InvalidTemplate(String),
    #[error("Output directory {dir:?} (template '{template}') must be a subdirectory of {model_dir:?}")]
    OutputOutsideModelDir {
        template: String,
        dir: PathBuf,
        model_dir: PathBuf,
    },
    #[error("Output directory {dir:?} is already used by {other:?}")]
    OutputDirCollision { dir: PathBuf, other: PathBuf },
    #[error("{0:?} is not a directory; add an extension if it is a model file")]
    NotDirectory(PathBuf),
    #[error("Unable to list models in {0:?}")]
    ListDir(PathBuf, #[source] std::io::Error),
    #[error(transparent)]
    Sequence(#[from] syntax::Error),
    #[error(transparent)]
    PathEncoding(#[from] PathEncodingError),
}

/// Per-model run settings, copied into every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub git: bool,
    pub verbose: bool,
    pub debug: bool,
    pub clean_lvl: u8,
    pub copy_lvl: u8,
    pub cache_dir: Option<String>,
    pub cache_exe: Option<String>,
    pub nm_executable: String,
    pub one_est: bool,
    pub overwrite: bool,
}

/// Everything we know about one model before it runs.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    /// File name of the model, e.g. `run001.mod`
    pub model: String,
    /// Absolute path to the model file
    pub path: PathBuf,
    /// Model name without its extension, e.g. `run001`
    pub file_name: String,
    /// Extension without the dot, possibly empty
    pub extension: String,
    /// Directory containing the model file
    pub original_path: PathBuf,
    /// Directory the model will run in
    pub output_dir: PathBuf,
    pub settings: RunSettings,
}

impl JobDescriptor {
    /// Resolve a model argument relative to `cwd`.
    ///
    /// The output directory must land strictly below the model's directory,
    /// since overwriting deletes it and cleanup removes files from it.
    pub fn resolve(arg: &str, settings: &Settings, cwd: &Path) -> Result<Self, SetupError> {
        let path = normalize(&cwd.join(arg));
        let metadata =
            std::fs::metadata(&path).map_err(|e| SetupError::NotFound(path.clone(), e))?;
        if metadata.is_dir() {
            return Err(SetupError::IsDirectory(path));
        }

        let model = path
            .file_name()
            .ok_or_else(|| SetupError::NoFileName(path.clone()))?
            .to_str()
            .ok_or(PathEncodingError)?
            .to_owned();
        let (file_name, extension) = match model.split_once('.') {
            Some((name, ext)) => (name.to_owned(), ext.to_owned()),
            None => (model.clone(), String::new()),
        };

        let original_path = path
            .parent()
            .ok_or_else(|| SetupError::NoFileName(path.clone()))?
            .to_path_buf();
        let output_dir = normalize(
            &original_path.join(render_output_dir(&settings.output_dir, &file_name)?),
        );
        if output_dir == original_path || !output_dir.starts_with(&original_path) {
            return Err(SetupError::OutputOutsideModelDir {
                template: settings.output_dir.clone(),
                dir: output_dir,
                model_dir: original_path,
            });
        }

        Ok(Self {
            model,
            path,
            file_name,
            extension,
            original_path,
            output_dir,
            settings: settings.run.clone(),
        })
    }
}

/// Substitute the model name into the output directory template.
fn render_output_dir(template: &str, name: &str) -> Result<String, SetupError> {
    let rest = template.replace(NAME_PLACEHOLDER, "");
    if rest.contains('{') || rest.contains('}') {
        return Err(SetupError::InvalidTemplate(template.to_owned()));
    }
    Ok(template.replace(NAME_PLACEHOLDER, name))
}

/// Resolve `.` and `..` components without touching the filesystem.
/// `..` at the root stays at the root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}
