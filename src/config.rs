//! Render options and their TOML configuration file.
//!
//! ```toml
//! dialect = "mysql"
//! inline_literals = false
//!
//! [naming]
//! case = "snake_case"
//! escape = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::IrResult;
use crate::naming::NamingStrategy;
use crate::transpiler::Dialect;

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "qail-ir.toml";

/// Everything a render call depends on besides the tree and its bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub dialect: Dialect,
    pub naming: NamingStrategy,
    /// Inline constants as SQL literals instead of parameters
    pub inline_literals: bool,
    /// Dump intermediate trees at `trace` level
    pub trace: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            naming: NamingStrategy::default(),
            inline_literals: true,
            trace: false,
        }
    }
}

impl RenderOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn with_naming(mut self, naming: NamingStrategy) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_inline_literals(mut self, inline: bool) -> Self {
        self.inline_literals = inline;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}

/// Parse options from TOML text. Missing keys keep their defaults.
pub fn parse(content: &str) -> IrResult<RenderOptions> {
    Ok(toml::from_str(content)?)
}

/// Load options from `path`, else `./qail-ir.toml`, else the user config
/// directory, else defaults.
pub fn load(path: Option<&Path>) -> IrResult<RenderOptions> {
    let candidate = match path {
        Some(p) => Some(p.to_path_buf()),
        None => discover(),
    };
    match candidate {
        Some(p) => {
            tracing::debug!(path = %p.display(), "loading render options");
            let content = std::fs::read_to_string(&p)?;
            parse(&content)
        }
        None => Ok(RenderOptions::default()),
    }
}

fn discover() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("qail-ir").join("config.toml"))
        .filter(|p| p.is_file())
}
