use anyhow::Result;
use nmbatch::{App, Args, BackendArgs, Settings};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::{tempdir, TempDir};
use turnstile::RunCounters;

const MODEL: &str = "$PROBLEM integration test
$DATA ../data.csv IGNORE=@
$INPUT ID TIME DV
$EST METHOD=1 INTER
$TABLE ID TIME DV NOPRINT ONEHEADER FILE=sdtab001
";

/// Stands in for nmfe: `$1` is the model, `$2` the listing; runs in the output dir.
const FAKE_NONMEM: &str = r#"#!/bin/sh
echo "running $1"
echo "listing for $1" > "$2"
echo "table" > sdtab001
echo "scratch" > FDATA
"#;

const FAILING_NONMEM: &str = r#"#!/bin/sh
echo "license expired"
exit 3
"#;

const FAKE_QSUB: &str = r#"#!/bin/sh
echo "Your job 1 (\"$1\") has been submitted"
"#;

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_owned()
}

fn write_exe(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// A models dir holding `names`, plus a `bin` dir holding the fake executables.
fn setup(names: &[&str]) -> Result<TempDir> {
    let dir = tempdir()?;
    fs::create_dir(dir.path().join("models"))?;
    for name in names {
        fs::write(dir.path().join("models").join(name), MODEL)?;
    }
    fs::create_dir(dir.path().join("bin"))?;
    write_exe(&dir.path().join("bin/nmfe"), FAKE_NONMEM)?;
    write_exe(&dir.path().join("bin/nmfe-fail"), FAILING_NONMEM)?;
    write_exe(&dir.path().join("bin/qsub"), FAKE_QSUB)?;
    Ok(dir)
}

fn basic_args(dir: &TempDir, models: &[&str]) -> Args {
    let models = models
        .iter()
        .map(|m| path_str(&dir.path().join("models").join(m)))
        .collect();
    Args {
        config: None,
        verbose: 1,
        debug: false,
        threads: Some(2),
        clean_lvl: None,
        copy_lvl: None,
        git: false,
        overwrite: false,
        one_est: false,
        nm_executable: Some(path_str(&dir.path().join("bin/nmfe"))),
        cache_dir: None,
        cache_exe: None,
        output_dir: None,
        backend: BackendArgs::Local { models },
    }
}

fn run(args: Args) -> Result<RunCounters> {
    simple_logging::log_to_stderr(log::LevelFilter::Trace);
    let settings: Settings = args.try_into()?;
    App::new(settings).run()
}

fn notes(counters: &RunCounters) -> Vec<&str> {
    counters.errors.iter().map(|e| e.notes()).collect()
}

#[test]
fn test_local_run_copies_results_back() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    let mut args = basic_args(&dir, &["run001.mod"]);
    args.copy_lvl = Some(1);

    let counters = run(args)?;
    assert_eq!((1, 0, 1), (counters.started, counters.failed, counters.completed));
    assert!(counters.errors.is_empty());

    let models = dir.path().join("models");
    let out = models.join("run001");
    let copied = fs::read_to_string(out.join("run001.mod"))?;
    assert!(copied.contains("$DATA ../../data.csv IGNORE=@"));

    let captured = fs::read_to_string(out.join("run001.mod.out"))?;
    assert!(captured.contains("running"));

    assert!(models.join("run001.lst").exists(), "listing copied back");
    assert!(models.join("sdtab001").exists(), "table copied back");
    assert!(!models.join("FDATA").exists(), "scratch files stay put");
    assert!(out.join("FDATA").exists(), "nothing cleaned at level 0");
    Ok(())
}

#[test]
fn test_local_run_cleans_output_dir() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    let mut args = basic_args(&dir, &["run001.mod"]);
    args.clean_lvl = Some(2);

    let counters = run(args)?;
    assert_eq!(0, counters.failed);

    let out = dir.path().join("models/run001");
    assert!(!out.join("FDATA").exists());
    assert!(!out.join("run001.lst").exists());
    assert!(!out.join("sdtab001").exists());
    assert!(out.join("run001.mod").exists(), "model file is never cleaned");
    Ok(())
}

#[test]
fn test_nonzero_exit_is_recorded() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    let mut args = basic_args(&dir, &["run001.mod"]);
    args.nm_executable = Some(path_str(&dir.path().join("bin/nmfe-fail")));

    let counters = run(args)?;
    assert_eq!((1, 1, 1), (counters.started, counters.failed, counters.completed));
    let notes = notes(&counters);
    assert_eq!(1, notes.len());
    assert!(notes[0].contains("exit code 3"), "{}", notes[0]);
    assert!(notes[0].contains("license expired"), "{}", notes[0]);
    assert_eq!("run001.mod", counters.errors[0].run_identifier());
    Ok(())
}

#[test]
fn test_existing_output_dir() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    fs::create_dir(dir.path().join("models/run001"))?;

    let counters = run(basic_args(&dir, &["run001.mod"]))?;
    assert_eq!((1, 1, 1), (counters.started, counters.failed, counters.completed));
    assert!(notes(&counters)[0].contains("already exists"));
    assert!(!dir.path().join("models/run001/run001.mod.out").exists());
    Ok(())
}

#[test]
fn test_overwrite_existing_output_dir() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    fs::create_dir(dir.path().join("models/run001"))?;
    fs::write(dir.path().join("models/run001/old.txt"), "stale")?;
    let mut args = basic_args(&dir, &["run001.mod"]);
    args.overwrite = true;

    let counters = run(args)?;
    assert_eq!(0, counters.failed);
    assert!(!dir.path().join("models/run001/old.txt").exists());
    assert!(dir.path().join("models/run001/run001.mod.out").exists());
    Ok(())
}

#[test]
fn test_overwrite_never_leaves_the_model_dir() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    fs::create_dir(dir.path().join("run001"))?;
    fs::write(dir.path().join("run001/keep.txt"), "not ours")?;

    for template in [".", "", "../{name}"] {
        let mut args = basic_args(&dir, &["run001.mod"]);
        args.overwrite = true;
        args.output_dir = Some(template.to_owned());

        let err = run(args).unwrap_err();
        assert!(err.to_string().contains("No models"), "template '{template}': {err}");
        assert!(dir.path().join("models/run001.mod").exists());
        assert!(dir.path().join("run001/keep.txt").exists());
        assert!(dir.path().join("bin/nmfe").exists());
    }
    Ok(())
}

#[test]
fn test_shared_output_dir_runs_first_model_only() -> Result<()> {
    let dir = setup(&["run001.mod", "run002.mod"])?;
    let mut args = basic_args(&dir, &["run001.mod", "run002.mod"]);
    args.output_dir = Some("out".to_owned());

    let counters = run(args)?;
    assert_eq!((1, 0, 1), (counters.started, counters.failed, counters.completed));
    let out = dir.path().join("models/out");
    assert!(out.join("run001.sh").exists());
    assert!(!out.join("run002.sh").exists());
    Ok(())
}

#[test]
fn test_model_dir_with_spaces() -> Result<()> {
    let dir = setup(&[])?;
    let models = dir.path().join("my models");
    fs::create_dir(&models)?;
    fs::write(models.join("run001.mod"), MODEL)?;
    let mut args = basic_args(&dir, &[]);
    args.copy_lvl = Some(1);
    args.backend = BackendArgs::Local {
        models: vec![path_str(&models.join("run001.mod"))],
    };

    let counters = run(args)?;
    assert_eq!((1, 0, 1), (counters.started, counters.failed, counters.completed));
    assert!(counters.errors.is_empty());
    let listing = fs::read_to_string(models.join("run001.lst"))?;
    assert!(listing.contains("my models/run001/run001.mod"), "{listing}");
    Ok(())
}

#[test]
fn test_missing_nonmem_executable() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    let mut args = basic_args(&dir, &["run001.mod"]);
    args.nm_executable = Some("no-such-nmfe-here".to_owned());

    let counters = run(args)?;
    assert_eq!(1, counters.failed);
    assert!(notes(&counters)[0].contains("Couldn't locate"));
    Ok(())
}

#[test]
fn test_sequence_and_directory() -> Result<()> {
    let dir = setup(&["run001.mod", "run002.mod", "run003.mod", "run004.ctl"])?;
    let mut args = basic_args(&dir, &["run[001:003].mod"]);
    if let BackendArgs::Local { models } = &mut args.backend {
        // the directory repeats the sequence; those should only run once
        models.push(path_str(&dir.path().join("models")));
    }

    let counters = run(args)?;
    assert_eq!((4, 0, 4), (counters.started, counters.failed, counters.completed));
    for name in ["run001", "run002", "run003", "run004"] {
        assert!(dir.path().join("models").join(name).join(format!("{name}.sh")).exists());
    }
    Ok(())
}

#[test]
fn test_unresolved_models_are_not_counted() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    let counters = run(basic_args(&dir, &["run001.mod", "run002.mod"]))?;
    assert_eq!((1, 0, 1), (counters.started, counters.failed, counters.completed));
    Ok(())
}

#[test]
fn test_no_models_is_fatal() -> Result<()> {
    let dir = setup(&[])?;
    let err = run(basic_args(&dir, &["run001.mod"])).unwrap_err();
    assert!(err.to_string().contains("No models"));
    Ok(())
}

#[test]
fn test_sge_submission() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    let mut args = basic_args(&dir, &["run001.mod"]);
    args.git = true;
    args.backend = BackendArgs::Sge {
        qsub: path_str(&dir.path().join("bin/qsub")),
        models: vec![path_str(&dir.path().join("models/run001.mod"))],
    };

    let counters = run(args)?;
    assert_eq!((1, 0, 1), (counters.started, counters.failed, counters.completed));

    let out = dir.path().join("models/run001");
    let script = fs::read_to_string(out.join("run001.sh"))?;
    assert!(script.contains(&format!("#$ -wd {}\n", path_str(&out))));
    let captured = fs::read_to_string(out.join("run001.mod.out"))?;
    assert!(captured.contains("has been submitted"));
    assert!(out.join(".gitignore").exists());
    assert!(!dir.path().join("models/run001.lst").exists(), "nothing copied for sge");
    Ok(())
}

#[test]
fn test_sge_without_qsub() -> Result<()> {
    let dir = setup(&["run001.mod"])?;
    let mut args = basic_args(&dir, &["run001.mod"]);
    args.backend = BackendArgs::Sge {
        qsub: path_str(&dir.path().join("bin/missing-qsub")),
        models: vec![path_str(&dir.path().join("models/run001.mod"))],
    };

    let counters = run(args)?;
    assert_eq!((1, 1, 1), (counters.started, counters.failed, counters.completed));
    assert!(notes(&counters)[0].contains("Couldn't locate"));
    Ok(())
}
