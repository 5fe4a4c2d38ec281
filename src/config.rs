use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{bail, Context, Result};

pub const BUCKET_COUNT: usize = 8;

const DEFAULT_TOPOLOGY_URL: &str =
    "https://cdn.freecodecamp.org/testable-projects-fcc/data/choropleth_map/counties.json";
const DEFAULT_EDUCATION_URL: &str =
    "https://cdn.freecodecamp.org/testable-projects-fcc/data/choropleth_map/for_user_education.json";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub render: RenderConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub topology_url: String,
    pub education_url: String,
    pub topology_fallback: Option<PathBuf>,
    pub education_fallback: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            topology_url: DEFAULT_TOPOLOGY_URL.to_string(),
            education_url: DEFAULT_EDUCATION_URL.to_string(),
            topology_fallback: None,
            education_fallback: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionKind {
    /// Coordinates in the topology are already screen coordinates.
    #[default]
    Identity,
    AlbersUsa,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub width: f64,
    pub height: f64,
    pub projection: ProjectionKind,
    pub palette: Vec<String>, // Hex codes, light to dark
    pub neutral_color: String,
    pub title: String,
    pub description: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 600.0,
            projection: ProjectionKind::Identity,
            palette: [
                "#f7fcf5", "#e5f5e0", "#c7e9c0", "#a1d99b",
                "#74c476", "#41ab5d", "#238b45", "#005a32",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            neutral_color: "#cccccc".to_string(),
            title: "United States Educational Attainment".to_string(),
            description: "Percentage of adults age 25 and older with a bachelor's degree or higher (2010-2014)".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub html: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            html: PathBuf::from("output/choropleth.html"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.render.palette.len() != BUCKET_COUNT {
            bail!(
                "render.palette must list exactly {} colors, found {}",
                BUCKET_COUNT,
                self.render.palette.len()
            );
        }
        if self.render.width <= 0.0 || self.render.height <= 0.0 {
            bail!("render.width and render.height must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = write_config("");
        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.input.topology_url, DEFAULT_TOPOLOGY_URL);
        assert_eq!(config.render.palette.len(), BUCKET_COUNT);
        assert_eq!(config.render.projection, ProjectionKind::Identity);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn partial_sections_override_fields() {
        let file = write_config(
            r##"
[input]
education_url = "http://localhost/edu.json"
education_fallback = "data/edu.json"

[render]
projection = "albers-usa"
neutral_color = "#999999"

[server]
port = 3000
"##,
        );
        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.input.education_url, "http://localhost/edu.json");
        assert_eq!(config.input.topology_url, DEFAULT_TOPOLOGY_URL);
        assert_eq!(config.input.education_fallback, Some(PathBuf::from("data/edu.json")));
        assert_eq!(config.render.projection, ProjectionKind::AlbersUsa);
        assert_eq!(config.render.neutral_color, "#999999");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn palette_must_have_eight_colors() {
        let file = write_config("[render]\npalette = [\"#000000\", \"#ffffff\"]\n");
        let err = AppConfig::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("exactly 8 colors"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load_from_file(Path::new("/nonexistent/config.toml")).is_err());
    }
}
