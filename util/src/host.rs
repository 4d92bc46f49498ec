//! Host platform (linux for example) utility functions

use std::{env, path::PathBuf};

use uname;

/// Name of the environment variable pointing to the root of the software tree.
pub const SW_ROOT_ENV_VAR: &str = "MANIP_SW_ROOT";

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the root directory of the software tree from the `MANIP_SW_ROOT` environment variable.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
