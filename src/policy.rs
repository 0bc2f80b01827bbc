use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::HashSet;

/// Highest retention tier with entries in the tables below.
const MAX_TIER: usize = 3;

/// Suffixes appended to a model's base name, by retention tier.
const EXTENSIONS: [&[&str]; MAX_TIER + 1] = [
    &[],
    &[".xml", ".grd", ".shk", ".cor", ".cov", ".ext", ".lst"],
    &[".clt", ".coi", ".clt", ".coi", ".cpu", ".shm", ".phi"],
    &[
        "",
        "_ETAS",
        "_RMAT",
        "_SMAT",
        ".msf",
        "_ETAS.msf",
        "_RMAT.msf",
        "_SMAT.msf",
    ],
];

/// Scratch files NONMEM leaves in its working directory, by retention tier.
/// Tier 1 also gets the model's declared `$TABLE` outputs at runtime.
const RESERVED_FILES: [&[&str]; MAX_TIER + 1] = [
    &[],
    &[],
    &[
        "background.set",
        "compile.lnk",
        "FCON",
        "FDATA",
        "FMSG",
        "FREPORT",
        "FSIZES",
        "FSTREAM",
        "FSUBS",
        "FSUBS.0",
        "FSUBS.o",
        "FSUBS_MU.F90",
        "FSUBS.f90",
        "fsubs.f90",
        "FSUBS2",
        "gfortran.txt",
        "GFCOMPILE.BAT",
        "INTER",
        "licfile.set",
        "linkc.lnk",
        "LINK.LNK",
        "LINKC.LNK",
        "locfile.set",
        "maxlim.set",
        "newline",
        "nmexec.set",
        "nmpathlist.txt",
        "nmprd4p.mod",
        "nobuild.set",
        "parafile.set",
        "parafprint.set",
        "prcompile.set",
        "prdefault.set",
        "prsame.set",
        "PRSIZES.f90",
        "rundir.set",
        "runpdir.set",
        "simparon.set",
        "temp_dir",
        "tprdefault.set",
        "trskip.set",
        "worker.set",
        "xmloff.set",
        "fort.2001",
        "fort.2002",
        "flushtime.set",
    ],
    &[],
];

/// Scratch files that never belong in version control.
pub fn scratch_files() -> &'static [&'static str] {
    RESERVED_FILES[2]
}

/// A file name selected by the policy, tagged with the tier that selected it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetedFile {
    pub file: String,
    pub level: u8,
}

impl TargetedFile {
    /// Level assigned to files included regardless of the requested level.
    pub const MANDATORY: u8 = u8::MAX;

    fn new(file: impl Into<String>, level: u8) -> Self {
        Self {
            file: file.into(),
            level,
        }
    }

    pub fn is_mandatory(&self) -> bool {
        self.level == Self::MANDATORY
    }
}

/// What a file set will be used for.
#[derive(Debug, Clone, Copy)]
pub enum Role<'a> {
    /// Files to delete from the output directory; `exceptions` are never included.
    Clean { exceptions: &'a [String] },
    /// Files to bring back to the source directory; `mandatory` are always included.
    Copy { mandatory: &'a [String] },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCleanInstruction {
    pub location: PathBuf,
    pub files_to_remove: Vec<TargetedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCopyInstruction {
    pub copy_from: PathBuf,
    pub copy_to: PathBuf,
    pub files_to_copy: Vec<TargetedFile>,
}

/// Decides which files a model run produces at each retention level.
#[derive(Debug, Clone)]
pub struct FilePolicy {
    base_name: String,
    output_tables: Vec<String>,
}

impl FilePolicy {
    /// Policy for `base_name` (e.g. `run001`) with an explicit list of table outputs.
    pub fn new(base_name: impl Into<String>, output_tables: Vec<String>) -> Self {
        Self {
            base_name: base_name.into(),
            output_tables,
        }
    }

    /// Policy for the model file `model` in `directory`,
    /// reading its `$TABLE` records to find the declared outputs.
    pub fn for_model(directory: &Path, model: &str) -> Result<Self> {
        let path = directory.join(model);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {path:?} to locate output tables"))?;
        let lines: Vec<&str> = text.lines().collect();
        Ok(Self::new(base_name(model), syntax::find_output_files(&lines)))
    }

    /// Policy for `model` that knows nothing about its table outputs.
    pub fn without_outputs(model: &str) -> Self {
        Self::new(base_name(model), Vec::new())
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Every file up to and including `level`, in ascending tier order.
    /// Within a tier, names derived from the base name come before literal names.
    /// Duplicates in the tables are kept.
    pub fn compute_file_set(&self, level: u8, role: Role<'_>) -> Vec<TargetedFile> {
        match role {
            Role::Clean { exceptions } => {
                let exceptions: HashSet<&str> = exceptions.iter().map(String::as_str).collect();
                self.tiered(level)
                    .filter(|f| !exceptions.contains(f.file.as_str()))
                    .collect()
            }
            Role::Copy { mandatory } => mandatory
                .iter()
                .map(|f| TargetedFile::new(f.as_str(), TargetedFile::MANDATORY))
                .chain(self.tiered(level))
                .collect(),
        }
    }

    pub fn clean_instruction(
        &self,
        location: &Path,
        level: u8,
        exceptions: &[String],
    ) -> FileCleanInstruction {
        FileCleanInstruction {
            location: location.to_path_buf(),
            files_to_remove: self.compute_file_set(level, Role::Clean { exceptions }),
        }
    }

    pub fn copy_instruction(
        &self,
        copy_from: &Path,
        copy_to: &Path,
        level: u8,
        mandatory: &[String],
    ) -> FileCopyInstruction {
        FileCopyInstruction {
            copy_from: copy_from.to_path_buf(),
            copy_to: copy_to.to_path_buf(),
            files_to_copy: self.compute_file_set(level, Role::Copy { mandatory }),
        }
    }

    fn tiered(&self, level: u8) -> impl Iterator<Item = TargetedFile> + '_ {
        let top = usize::from(level).min(MAX_TIER);
        (0..=top).flat_map(move |tier| {
            // tier <= MAX_TIER, so this always fits
            let tag = tier as u8;
            let derived = EXTENSIONS[tier].iter().map(move |ext| {
                TargetedFile::new(format!("{}{}", self.base_name, ext).trim(), tag)
            });
            let tables = match tier {
                1 => self.output_tables.as_slice(),
                _ => &[][..],
            };
            let tables = tables.iter().map(move |f| TargetedFile::new(f.trim(), tag));
            let reserved = RESERVED_FILES[tier]
                .iter()
                .map(move |f| TargetedFile::new(*f, tag));
            derived.chain(tables).chain(reserved)
        })
    }
}

/// Text before the first `.` of a model file name.
pub fn base_name(model: &str) -> &str {
    model.split_once('.').map_or(model, |(base, _)| base)
}

#[cfg(test)]
mod test {
    use super::*;

    fn names(files: &[TargetedFile]) -> Vec<&str> {
        files.iter().map(|f| f.file.as_str()).collect()
    }

    fn policy() -> FilePolicy {
        FilePolicy::new("run001", vec!["sdtab001".to_owned(), "patab001".to_owned()])
    }

    #[test]
    fn test_level_zero_is_empty() {
        let files = policy().compute_file_set(0, Role::Clean { exceptions: &[] });
        assert!(files.is_empty());
    }

    #[test]
    fn test_level_one_copy_order() {
        let files = policy().compute_file_set(1, Role::Copy { mandatory: &[] });
        assert_eq!(
            vec![
                "run001.xml",
                "run001.grd",
                "run001.shk",
                "run001.cor",
                "run001.cov",
                "run001.ext",
                "run001.lst",
                "sdtab001",
                "patab001",
            ],
            names(&files)
        );
        assert!(files.iter().all(|f| f.level == 1));
    }

    #[test]
    fn test_mandatory_files_at_level_zero() {
        let mandatory = vec!["run001.lst".to_owned(), "notes.txt".to_owned()];
        let files = policy().compute_file_set(0, Role::Copy { mandatory: &mandatory });
        assert_eq!(vec!["run001.lst", "notes.txt"], names(&files));
        assert!(files.iter().all(TargetedFile::is_mandatory));

        // mandatory files come first at higher levels too:
        let files = policy().compute_file_set(2, Role::Copy { mandatory: &mandatory });
        assert_eq!(vec!["run001.lst", "notes.txt", "run001.xml"], names(&files[..3]));
    }

    #[test]
    fn test_exceptions_are_never_cleaned() {
        let exceptions = vec!["run001.lst".to_owned(), "FDATA".to_owned()];
        let files = policy().compute_file_set(3, Role::Clean { exceptions: &exceptions });
        let files = names(&files);
        assert!(!files.contains(&"run001.lst"));
        assert!(!files.contains(&"FDATA"));
        assert!(files.contains(&"run001.ext"));
        assert!(files.contains(&"FMSG"));
    }

    #[test]
    fn test_levels_are_monotonic() {
        let policy = policy();
        for role in [Role::Clean { exceptions: &[] }, Role::Copy { mandatory: &[] }] {
            let mut prev = policy.compute_file_set(0, role);
            for level in 1..=5 {
                let next = policy.compute_file_set(level, role);
                assert!(next.starts_with(&prev), "level {level} drops files");
                prev = next;
            }
        }
    }

    #[test]
    fn test_tier_tags() {
        let files = policy().compute_file_set(3, Role::Clean { exceptions: &[] });
        let level_of = |name: &str| files.iter().find(|f| f.file == name).map(|f| f.level);
        assert_eq!(Some(1), level_of("sdtab001"));
        assert_eq!(Some(2), level_of("temp_dir"));
        assert_eq!(Some(2), level_of("run001.phi"));
        assert_eq!(Some(3), level_of("run001"));
        assert_eq!(Some(3), level_of("run001_SMAT.msf"));
        // levels past the last tier add nothing
        assert_eq!(files, policy().compute_file_set(200, Role::Clean { exceptions: &[] }));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let files = policy().compute_file_set(2, Role::Clean { exceptions: &[] });
        let clt = files.iter().filter(|f| f.file == "run001.clt").count();
        assert_eq!(2, clt);
    }

    #[test]
    fn test_for_model_reads_tables() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join("run002.mod"),
            "$PROBLEM test\n$DATA ../data.csv\n$TABLE ID TIME NOPRINT FILE=run002.tab\n",
        )?;
        let policy = FilePolicy::for_model(dir.path(), "run002.mod")?;
        assert_eq!("run002", policy.base_name());
        let files = policy.compute_file_set(1, Role::Copy { mandatory: &[] });
        assert_eq!(Some("run002.tab"), names(&files).last().copied());

        assert!(FilePolicy::for_model(dir.path(), "missing.mod").is_err());
        Ok(())
    }

    #[test]
    fn test_base_name() {
        assert_eq!("run001", base_name("run001.mod"));
        assert_eq!("run001", base_name("run001.boot.ctl"));
        assert_eq!("run001", base_name("run001"));
    }
}
