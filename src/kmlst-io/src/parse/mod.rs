use std::{collections::HashMap, fs, path::{Path, PathBuf}};

use anyhow::Result;
use located_error::LocatedError;
use log::trace;

mod error;
pub use error::ParseError;

/// Attempt to create an output directory (and its parents) if needed.
pub fn create_output_directory(dir: &Path) -> Result<()> {
    use ParseError::CreateOutputDirectory;
    fs::create_dir_all(dir).map_err(CreateOutputDirectory)
        .with_loc(|| format!("While attempting to create output directory '{}'", dir.display()))?;
    Ok(())
}

/// Resolve the predefined result filenames within the output directory, after
/// checking that none of them would clobber a previous run.
///
/// Returns a map keyed by the provided filenames.
///
/// # Errors
/// - If creating the output directory fails (e.g. UNIX permissions).
/// - `ParseError::OverwriteDisallowed` when a target file exists and the user
///   did not pass `--overwrite`.
pub fn output_files(
    output_dir     : &Path,
    allow_overwrite: bool,
    filenames      : &[&str],
) -> Result<HashMap<String, PathBuf>> {
    create_output_directory(output_dir)?;

    let mut outfiles = HashMap::with_capacity(filenames.len());
    for name in filenames {
        let path = output_dir.join(name);
        can_write_file(allow_overwrite, &path)?;
        outfiles.insert((*name).to_string(), path);
    }
    trace!("Output file(s): {:#?}", outfiles.values());
    Ok(outfiles)
}

/// Check if a given file already exists ; raise an error if such is the case,
/// and the user did not explicitly allow file overwriting.
///
/// # Errors
/// - `ParseError::OverwriteDisallowed` if `path` exists and `overwrite` is unset.
pub fn can_write_file(overwrite: bool, path: &Path) -> Result<bool> {
    if !overwrite && path.exists() {
        return Err(ParseError::OverwriteDisallowed { path: path.to_path_buf() })
            .loc("While ensuring that file permissions were appropriate")
    }
    Ok(true)
}
