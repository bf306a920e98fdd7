//! Compiler configuration for the CLI.
//!
//! Images resolve with this priority (highest first):
//! 1. `--creds-image` / `--shell-image` flags
//! 2. `STEPRUN_CREDS_IMAGE` / `STEPRUN_SHELL_IMAGE` environment variables
//! 3. the `images` section of the `--config` YAML file
//! 4. built-in defaults
//!
//! Flags and environment are merged by clap before they reach [`resolve_images`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use steprun_pod::Images;

use crate::{Error, Result};

/// Environment variable overriding the credentials init image
pub const CREDS_IMAGE_ENV: &str = "STEPRUN_CREDS_IMAGE";

/// Environment variable overriding the shell image
pub const SHELL_IMAGE_ENV: &str = "STEPRUN_SHELL_IMAGE";

/// Contents of a `--config` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub images: Images,
}

impl FileConfig {
    /// Parse a config document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml(&contents)
    }
}

/// Apply explicit image overrides on top of the file config
pub fn resolve_images(
    file: Option<FileConfig>,
    creds_image: Option<String>,
    shell_image: Option<String>,
) -> Images {
    let mut images = file.map(|f| f.images).unwrap_or_default();
    if let Some(image) = creds_image {
        images.creds_image = image;
    }
    if let Some(image) = shell_image {
        images.shell_image = image;
    }
    images
}
