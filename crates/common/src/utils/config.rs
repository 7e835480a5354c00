use anyhow::{Context, Result};
use ::config::{Config, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Loads configuration from a file into a struct.
/// Supports TOML, YAML, JSON, etc. based on file extension.
pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_str = path.as_ref().to_str().context("Invalid config path")?;

    let settings = Config::builder()
        .add_source(File::with_name(path_str))
        .build()
        .context("Failed to build configuration")?;

    settings.try_deserialize::<T>().context("Failed to deserialize configuration")
}

/// Like [`load_config`], but falls back to `T::default()` when the file is absent.
pub fn load_config_or_default<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    if path.as_ref().exists() {
        load_config(path)
    } else {
        tracing::debug!("Config file {:?} not found, using defaults", path.as_ref());
        Ok(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        retries: u32,
    }

    #[test]
    fn test_load_toml_file() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "name = \"faucet\"\nretries = 3")?;

        let sample: Sample = load_config(file.path())?;
        assert_eq!(sample, Sample { name: "faucet".into(), retries: 3 });
        Ok(())
    }

    #[test]
    fn test_missing_file_uses_default() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sample: Sample = load_config_or_default(dir.path().join("absent.toml"))?;
        assert_eq!(sample, Sample::default());
        Ok(())
    }
}
