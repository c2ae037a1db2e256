pub mod cli;
pub mod errors;
pub mod loader;
pub mod render;
pub mod store_locator;
pub mod workspace;

use croquis_config::AppConfig;
use errors::FrontendError;
use tracing::info;

/// 启动 CLI 演示或返回错误。`sketch_id` 优先于环境变量 `CROQUIS_SKETCH_ID`。
pub fn run_cli_demo(config: &AppConfig, sketch_id: Option<&str>) -> Result<(), FrontendError> {
    info!("启动 CLI 演示前端");
    cli::run_demo(config, sketch_id)
}
