//! This module provides helpers for working with environment
//! variables and paths, together with a struct
//! that keeps track of all the runtime-relevant paths.

use anyhow::Context;
use std::{path::Path, path::PathBuf, str::FromStr};

/// Wrapper around [std::env::var] which adds [anyhow] context around errors.
pub fn get_var(name: &str) -> anyhow::Result<String> {
	std::env::var(name).with_context(|| format!("Missing ${name} environment variable"))
}

/// Reads an environment variable, falling back to a default when it's missing.
pub fn get_var_or(name: &str, default: &str) -> String {
	std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

/// Reads and parses an environment variable, falling back to a default when it's missing.
pub fn parse_var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
	T: FromStr,
	T::Err: std::error::Error + Send + Sync + 'static,
{
	match std::env::var(name) {
		Ok(raw) => raw
			.trim()
			.parse()
			.with_context(|| format!("${name} has an invalid value: `{raw}`")),
		Err(_) => Ok(default),
	}
}

/// Reads an environment variable containing a directory path,
/// creating the directory if it doesn't exist.
pub fn get_env_dir_path(name: &str, default_to: Option<&str>) -> anyhow::Result<PathBuf> {
	let var = get_var(name);
	let var = match default_to {
		None => var?,
		Some(other) => var.or_else(|_| get_var(other))?,
	};

	let path = PathBuf::from_str(&var).with_context(|| format!("${name} is not a valid path"))?;
	ensure_dir(&path).with_context(|| format!("Could not create ${name}"))?;

	Ok(path)
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
	if !path.exists() {
		std::fs::create_dir_all(path)?;
	}

	Ok(())
}

#[derive(Clone, Debug)]
pub struct CrownPaths {
	/// This directory contains files that are entirely managed
	/// by the runtime of the app, like the database.
	data_dir: PathBuf,
}

impl CrownPaths {
	/// Gets all the standard paths from the environment,
	/// creating every involved directory in the process.
	pub fn new() -> anyhow::Result<Self> {
		Ok(Self {
			data_dir: get_env_dir_path("CROWNDUEL_DATA_DIR", Some("STATE_DIRECTORY"))?,
		})
	}

	/// Uses an explicit data directory, creating it if needed.
	pub fn with_data_dir(data_dir: &Path) -> anyhow::Result<Self> {
		ensure_dir(data_dir)
			.with_context(|| format!("Could not create data directory `{data_dir:?}`"))?;

		Ok(Self {
			data_dir: data_dir.to_path_buf(),
		})
	}

	pub fn db_path(&self) -> PathBuf {
		self.data_dir.join("db.sqlite")
	}
}
