//! Configuration loader for the suggest workspace.
//!
//! Merges `config.toml` + `config.<env>.toml` (selected by `RUST_ENV`) +
//! `APP_*` env vars via Figment. Dimension declarations live under a
//! top-level `dimensions` array so an index schema can be stated once in
//! config and shared by every binary that builds or queries it.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::types::ContextDimension;

/// Engine/CLI tuning knobs under the `[engine]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Results returned when a query does not say otherwise.
    #[serde(default = "default_size")]
    pub default_size: usize,
    /// Edit budget used by the CLI `--fuzzy` shorthand.
    #[serde(default = "default_fuzzy_edits")]
    pub default_fuzzy_edits: u8,
}

fn default_size() -> usize {
    5
}

fn default_fuzzy_edits() -> u8 {
    1
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { default_size: default_size(), default_fuzzy_edits: default_fuzzy_edits() }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Declared context dimensions, or an empty set when config has none.
    pub fn dimensions(&self) -> anyhow::Result<Vec<ContextDimension>> {
        match self.figment.find_value("dimensions") {
            Ok(_) => self.get("dimensions"),
            Err(_) => Ok(Vec::new()),
        }
    }

    /// `[engine]` settings, falling back to defaults when the table is absent.
    pub fn engine(&self) -> EngineSettings {
        self.figment.extract_inner("engine").unwrap_or_default()
    }
}

/// Expand a user-provided path string: leading `~` and `$VAR`/`${VAR}`
/// references are resolved; the result is not canonicalized.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let with_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    PathBuf::from(shellexpand::tilde(&with_env).as_ref())
}

/// Resolve a possibly relative path against `base` after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DimensionKind;

    #[test]
    fn expand_path_resolves_tilde_and_vars() {
        std::env::set_var("SUGGEST_TEST_DIR", "datasets");
        let p = expand_path("$SUGGEST_TEST_DIR/entries.jsonl");
        assert_eq!(p, PathBuf::from("datasets/entries.jsonl"));

        let home = expand_path("~/x");
        assert!(!home.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = Path::new("/srv/suggest");
        assert_eq!(resolve_with_base(base, "/tmp/data"), PathBuf::from("/tmp/data"));
        assert_eq!(resolve_with_base(base, "data"), PathBuf::from("/srv/suggest/data"));
    }

    #[test]
    fn dimensions_parse_from_toml() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [[dimensions]]
            name = "cat"
            kind = "category"
            path = "cat"

            [[dimensions]]
            name = "geo"
            kind = "geo"
            precision = 4
            "#,
        ));
        let config = Config { figment };
        let dims = config.dimensions().expect("dimensions");
        assert_eq!(dims.len(), 2);
        assert_eq!(dims[0].name, "cat");
        assert_eq!(dims[0].kind, DimensionKind::Category);
        assert_eq!(dims[0].path.as_deref(), Some("cat"));
        assert_eq!(dims[1].kind, DimensionKind::Geo { precision: 4 });
    }

    #[test]
    fn engine_settings_default_when_missing() {
        let config = Config { figment: Figment::new() };
        let settings = config.engine();
        assert_eq!(settings.default_size, 5);
        assert_eq!(settings.default_fuzzy_edits, 1);
    }
}
