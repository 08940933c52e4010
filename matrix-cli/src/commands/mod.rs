pub mod run;
pub mod tree;
pub mod validate;

use std::path::{Path, PathBuf};

use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;

use matrix_service::{MatrixConfig, MatrixConfigParser, Session};

/// Use the given config path, or the first config found in the current directory
pub fn resolve_config_path(config: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = config {
        return Ok(path);
    }
    let cwd = std::env::current_dir()?;
    MatrixConfigParser::discover(&cwd)
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("No matrix.yml found in {}", cwd.display()))
}

pub fn load_config(path: &Path) -> Result<MatrixConfig> {
    MatrixConfigParser::parse_file(path).map_err(|e| eyre!("{}", e))
}

/// Split `key=v1,v2` into the dimension key and its selected values
pub fn parse_filter(spec: &str) -> Result<(String, Vec<String>)> {
    let Some((key, values)) = spec.split_once('=') else {
        bail!("Invalid filter '{}'. Expected key=value[,value...]", spec);
    };
    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect();
    if key.trim().is_empty() || values.is_empty() {
        bail!("Invalid filter '{}'. Expected key=value[,value...]", spec);
    }
    Ok((key.trim().to_string(), values))
}

/// Restrict each named dimension to the listed values
pub fn apply_filters(session: &mut Session, filters: &[String]) -> Result<()> {
    for spec in filters {
        let (key, selected) = parse_filter(spec)?;
        let dimension = session
            .schema()
            .dimension(&key)
            .ok_or_else(|| eyre!("Unknown dimension '{}' in filter", key))?;

        if let Some(unknown) = selected.iter().find(|v| dimension.position(v).is_none()) {
            bail!("Dimension '{}' has no value '{}'", key, unknown);
        }

        let excluded: Vec<String> = dimension
            .values
            .iter()
            .filter(|v| !selected.contains(v))
            .cloned()
            .collect();
        for value in excluded {
            session.set_filter_value(&key, &value, false)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_service::{Dimension, DimensionSchema};

    fn session() -> Session {
        Session::new(DimensionSchema::new(vec![
            Dimension::new("Env", "env", ["local", "remote"]),
            Dimension::new("Platform", "platform", ["native", "docker", "wasm"]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_parse_filter() {
        let (key, values) = parse_filter("platform=native, docker").unwrap();
        assert_eq!(key, "platform");
        assert_eq!(values, vec!["native", "docker"]);

        assert!(parse_filter("platform").is_err());
        assert!(parse_filter("platform=").is_err());
        assert!(parse_filter("=native").is_err());
    }

    #[test]
    fn test_apply_filters() {
        let mut session = session();
        apply_filters(&mut session, &["platform=native".to_string()]).unwrap();

        assert!(session.is_visible("local.native"));
        assert!(!session.is_visible("local.docker"));
        assert!(!session.is_visible("remote.wasm"));
        assert_eq!(session.filter().visible_leaf_count(session.tree()), 2);
    }

    #[test]
    fn test_apply_filters_rejects_unknowns() {
        let mut session = session();
        assert!(apply_filters(&mut session, &["os=linux".to_string()]).is_err());
        assert!(apply_filters(&mut session, &["env=cloud".to_string()]).is_err());
        assert!(!session.filter().is_filtering());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.yml");
        std::fs::write(
            &path,
            "dimensions:\n  - { name: Env, key: env, values: [local, remote] }\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.name.as_deref(), Some("matrix"));
        assert!(load_config(&dir.path().join("missing.yml")).is_err());
    }
}
