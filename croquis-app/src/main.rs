use std::path::PathBuf;

use croquis_config::{AppConfig, ConfigError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod storage_setup;

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut sketch_override: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--sketch" => {
                let Some(id) = args.next() else {
                    eprintln!("`--sketch` 需要提供草图 ID");
                    std::process::exit(1);
                };
                sketch_override = Some(id);
            }
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动草图编辑器");

    if let Err(err) = storage_setup::prepare_storage(&config.storage) {
        warn!(error = %err, "无法准备草图存储目录");
    }

    if let Err(err) = croquis_frontend::run_cli_demo(&config, sketch_override.as_deref()) {
        error!(error = %err, "执行 CLI 演示失败");
        std::process::exit(1);
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
