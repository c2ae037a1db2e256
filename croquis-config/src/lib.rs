use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 显式指定配置文件的环境变量。
pub const CONFIG_ENV: &str = "CROQUIS_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `CROQUIS_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 编辑器参数：街道吸附距离、聚焦半径与画布尺寸。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "EditorConfig::default_snap_threshold")]
    pub snap_threshold: f64,
    #[serde(default = "EditorConfig::default_focus_radius")]
    pub focus_radius: f64,
    #[serde(default = "EditorConfig::default_canvas_width")]
    pub canvas_width: f64,
    #[serde(default = "EditorConfig::default_canvas_height")]
    pub canvas_height: f64,
}

impl EditorConfig {
    fn default_snap_threshold() -> f64 {
        20.0
    }

    fn default_focus_radius() -> f64 {
        500.0
    }

    fn default_canvas_width() -> f64 {
        1280.0
    }

    fn default_canvas_height() -> f64 {
        800.0
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_threshold: Self::default_snap_threshold(),
            focus_radius: Self::default_focus_radius(),
            canvas_width: Self::default_canvas_width(),
            canvas_height: Self::default_canvas_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
    #[serde(default = "StorageConfig::default_auto_create")]
    pub auto_create: bool,
}

impl StorageConfig {
    fn default_auto_create() -> bool {
        true
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            cache_root: None,
            auto_create: true,
        }
    }
}

/// 快照图片的输出参数。
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "RenderConfig::default_width")]
    pub width: u32,
    #[serde(default = "RenderConfig::default_height")]
    pub height: u32,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl RenderConfig {
    fn default_width() -> u32 {
        1200
    }

    fn default_height() -> u32 {
        900
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            output: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_every_section() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert!((cfg.editor.snap_threshold - 20.0).abs() < f64::EPSILON);
        assert!((cfg.editor.focus_radius - 500.0).abs() < f64::EPSILON);
        assert!(cfg.storage.root.is_none());
        assert!(cfg.storage.cache_root.is_none());
        assert!(cfg.storage.auto_create);
        assert_eq!((cfg.render.width, cfg.render.height), (1200, 900));
        assert!(cfg.render.output.is_none());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [editor]
            focus_radius = 5000.0

            [storage]
            root = "data/croquis"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert!((cfg.editor.focus_radius - 5000.0).abs() < f64::EPSILON);
        assert!((cfg.editor.canvas_width - 1280.0).abs() < f64::EPSILON);
        assert_eq!(cfg.storage.root, Some(PathBuf::from("data/croquis")));
        assert!(cfg.storage.auto_create);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [editor]
            snap_threshold = 12.5
            canvas_width = 640.0
            canvas_height = 480.0

            [storage]
            root = "../store"
            cache_root = "../cache"
            auto_create = false

            [render]
            width = 800
            height = 600
            output = "out/croquis.png"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert!((cfg.editor.snap_threshold - 12.5).abs() < f64::EPSILON);
        assert!((cfg.editor.canvas_height - 480.0).abs() < f64::EPSILON);
        assert_eq!(
            cfg.storage
                .cache_root
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("../cache".to_string())
        );
        assert!(!cfg.storage.auto_create);
        assert_eq!(cfg.render.width, 800);
        assert_eq!(cfg.render.output, Some(PathBuf::from("out/croquis.png")));
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[render]\nwidth = \"wide\"").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let missing = AppConfig::from_file("/nonexistent/croquis.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
