//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (LANDING_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "$LANDING_SW_ROOT/params" directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    // Get the params dir
    let mut path = crate::host::get_sw_root().map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    load_from_path(path)
}

/// Load a parameter file from an explicit path.
pub fn load_from_path<P, Q>(path: Q) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    Q: AsRef<Path>,
{
    // Load the file into a string
    let params_str = read_to_string(path).map_err(LoadError::FileLoadError)?;

    // Parse the string into the parameter struct
    toml::from_str(params_str.as_str()).map_err(LoadError::DeserialiseError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestParams {
        rate_hz: f64,
        name: String,
    }

    #[test]
    fn test_load_from_path() {
        let path = std::env::temp_dir().join("util_params_test_load.toml");
        std::fs::write(&path, "rate_hz = 50.0\nname = \"pad\"\n").unwrap();

        let params: TestParams = load_from_path(&path).unwrap();
        assert_eq!(params.rate_hz, 50.0);
        assert_eq!(params.name, "pad");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_errors() {
        let missing = std::env::temp_dir().join("util_params_test_missing.toml");
        assert!(matches!(
            load_from_path::<TestParams, _>(&missing),
            Err(LoadError::FileLoadError(_))
        ));

        let path = std::env::temp_dir().join("util_params_test_bad.toml");
        std::fs::write(&path, "rate_hz = \"fast\"\n").unwrap();
        assert!(matches!(
            load_from_path::<TestParams, _>(&path),
            Err(LoadError::DeserialiseError(_))
        ));
        std::fs::remove_file(&path).ok();
    }
}
