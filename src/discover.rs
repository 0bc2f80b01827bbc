use std::path::{Path, PathBuf};

use util::{HashMap, HashSet, PathEncodingError};

use crate::model::{JobDescriptor, SetupError};
use crate::settings::Settings;

/// Extensions of model files picked up when a directory is given.
const MODEL_EXTENSIONS: [&str; 2] = ["mod", "ctl"];

/// Result of resolving the command-line model arguments.
#[derive(Debug, Default)]
pub struct Discovered {
    pub models: Vec<JobDescriptor>,
    /// Arguments (or expanded model names) that could not be resolved
    pub errors: Vec<(String, SetupError)>,
}

/// Expand each argument into zero or more model files and resolve them.
///
/// Arguments without an extension (or `.`) are directories, and contribute
/// every `.mod`/`.ctl` file inside, sorted by name. Arguments like
/// `run[001:006].mod` expand to a sequence. Anything else is a single model.
/// A model named more than once only runs once. A different model whose
/// output directory is already taken is reported as a setup error.
pub fn collect_models(args: &[String], settings: &Settings, cwd: &Path) -> Discovered {
    let mut found = Discovered::default();
    let mut seen: HashSet<PathBuf> = HashSet::default();
    // output dir -> model that claimed it
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::default();

    for arg in args {
        let names = match expand(arg, cwd) {
            Ok(names) => names,
            Err(e) => {
                found.errors.push((arg.clone(), e));
                continue;
            }
        };
        for name in names {
            match JobDescriptor::resolve(&name, settings, cwd) {
                Ok(model) => {
                    if !seen.insert(model.path.clone()) {
                        log::warn!("Model {name} was given more than once; running it once");
                    } else if let Some(other) = claimed.get(&model.output_dir) {
                        let e = SetupError::OutputDirCollision {
                            dir: model.output_dir.clone(),
                            other: other.clone(),
                        };
                        found.errors.push((name, e));
                    } else {
                        log::debug!("Located model {:?}", model.path);
                        claimed.insert(model.output_dir.clone(), model.path.clone());
                        found.models.push(model);
                    }
                }
                Err(e) => found.errors.push((name, e)),
            }
        }
    }
    found
}

fn expand(arg: &str, cwd: &Path) -> Result<Vec<String>, SetupError> {
    if syntax::is_name_sequence(arg) {
        return Ok(syntax::expand_name_sequence(arg)?);
    }
    if arg == "." || Path::new(arg).extension().is_none() {
        let dir = cwd.join(arg);
        if !dir.is_dir() {
            return Err(SetupError::NotDirectory(dir));
        }
        return list_models(&dir);
    }
    Ok(vec![arg.to_owned()])
}

fn list_models(dir: &Path) -> Result<Vec<String>, SetupError> {
    let list_err = |e| SetupError::ListDir(dir.to_path_buf(), e);
    let mut models = Vec::with_capacity(16);
    for entry in std::fs::read_dir(dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        let is_model = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| MODEL_EXTENSIONS.contains(&ext));
        if is_model && path.is_file() {
            models.push(path.to_str().ok_or(PathEncodingError)?.to_owned());
        }
    }
    models.sort();
    if models.is_empty() {
        log::warn!("No model files found in {dir:?}");
    }
    Ok(models)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::args::Args;
    use crate::settings::FileConfig;
    use anyhow::Result;
    use clap::Parser;

    fn settings() -> Settings {
        settings_with_output("{name}")
    }

    fn settings_with_output(template: &str) -> Settings {
        let args = Args::parse_from(["nmb", "--output-dir", template, "local", "."]);
        Settings::merge(args, FileConfig::default(), None).unwrap()
    }

    fn touch(dir: &Path, names: &[&str]) -> Result<()> {
        for name in names {
            std::fs::write(dir.join(name), "$PROBLEM\n")?;
        }
        Ok(())
    }

    fn names(found: &Discovered) -> Vec<&str> {
        found.models.iter().map(|m| m.model.as_str()).collect()
    }

    #[test]
    fn test_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), &["run002.mod", "run001.mod", "run003.ctl", "data.csv", "run001.lst"])?;
        std::fs::create_dir(dir.path().join("sub.mod"))?;

        let found = collect_models(&[".".to_owned()], &settings(), dir.path());
        assert_eq!(vec!["run001.mod", "run002.mod", "run003.ctl"], names(&found));
        assert!(found.errors.is_empty());
        Ok(())
    }

    #[test]
    fn test_sequence() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), &["run001.mod", "run002.mod", "run004.mod"])?;

        let found = collect_models(&["run[001:004].mod".to_owned()], &settings(), dir.path());
        assert_eq!(vec!["run001.mod", "run002.mod", "run004.mod"], names(&found));
        assert_eq!(1, found.errors.len());
        assert_eq!("run003.mod", found.errors[0].0);
        assert!(matches!(found.errors[0].1, SetupError::NotFound(..)));
        Ok(())
    }

    #[test]
    fn test_bad_args() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), &["run001.mod"])?;
        let args = ["nope".to_owned(), "run[5:1].mod".to_owned(), "run001.mod".to_owned()];

        let found = collect_models(&args, &settings(), dir.path());
        assert_eq!(vec!["run001.mod"], names(&found));
        assert!(matches!(found.errors[0].1, SetupError::NotDirectory(_)));
        assert!(matches!(found.errors[1].1, SetupError::Sequence(_)));
        Ok(())
    }

    #[test]
    fn test_duplicates_run_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), &["run001.mod"])?;
        let args = ["run001.mod".to_owned(), ".".to_owned()];

        let found = collect_models(&args, &settings(), dir.path());
        assert_eq!(vec!["run001.mod"], names(&found));
        Ok(())
    }

    #[test]
    fn test_output_dir_collisions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), &["run001.mod", "run002.mod"])?;

        let found = collect_models(&[".".to_owned()], &settings_with_output("out"), dir.path());
        assert_eq!(vec!["run001.mod"], names(&found));
        assert_eq!(1, found.errors.len());
        let (name, e) = &found.errors[0];
        assert!(name.ends_with("run002.mod"), "{name}");
        match e {
            SetupError::OutputDirCollision { dir: out, other } => {
                assert_eq!(&dir.path().join("out"), out);
                assert_eq!(&dir.path().join("run001.mod"), other);
            }
            other => panic!("unexpected error {other:?}"),
        }

        // same base name, different extension:
        touch(dir.path(), &["run003.ctl", "run003.mod"])?;
        let args = ["run003.ctl".to_owned(), "run003.mod".to_owned()];
        let found = collect_models(&args, &settings(), dir.path());
        assert_eq!(vec!["run003.ctl"], names(&found));
        assert!(matches!(found.errors[0].1, SetupError::OutputDirCollision { .. }));
        Ok(())
    }
}
