use croquis_config::AppConfig;
use croquis_core::geometry::{self, Point2};
use croquis_core::sketch::{ElementKind, Sketch};
use croquis_engine::command::{CommandBus, CommandContext, CommandRequest};
use croquis_engine::query::{BlockSelection, BlockSummary};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{SketchSource, load_workspace_or_demo};
use crate::render::{SnapshotOptions, render_snapshot};

/// 简易 CLI 演示：打开存储中的草图或内置示例，执行街区查询、渲染快照，并在关闭时保存。
pub fn run_demo(config: &AppConfig, sketch_id: Option<&str>) -> Result<(), FrontendError> {
    let loaded = load_workspace_or_demo(config, sketch_id);
    let mut workspace = loaded.workspace;
    let command_bus = CommandBus::new();
    {
        let mut context = CommandContext {
            scene: workspace.scene_mut(),
        };
        if let Err(err) = dispatch_cli_command(&command_bus, "focus_selection", &mut context) {
            warn!("CLI 命令执行失败: {err}");
        }
    }
    let mut commands: Vec<&str> = command_bus.available_commands().copied().collect();
    commands.sort_unstable();
    println!("支持的命令: {}", commands.join(", "));

    println!("Rust 版草图编辑器 CLI 演示");
    match &loaded.source {
        SketchSource::Stored(id) => println!("已从存储加载草图：{id}"),
        SketchSource::Demo => {
            if let Some(ids) = &loaded.demo_elements {
                println!("已构建内置示例草图：");
                println!("  - 社区 ID = {}", ids.neighborhood);
                let blocks: Vec<String> = ids.blocks.iter().map(ToString::to_string).collect();
                println!("  - 街区 ID = {}", blocks.join(", "));
                println!("  - 街道 ID = {}", ids.street);
                println!("  - 参考点 ID = {}", ids.reference);
            }
        }
    }

    let scene = workspace.scene();
    print_sketch_overview(scene.sketch());
    match scene.selected_element() {
        Some(element) => println!("当前选中：{} ({})", element.id(), element.kind()),
        None => println!("当前尚未选中任何元素。"),
    }
    let viewport = scene.viewport();
    println!(
        "视口中心=({:.2}, {:.2}), 缩放={:.3}",
        viewport.center.x(),
        viewport.center.y(),
        viewport.zoom
    );

    let neighborhood_ids: Vec<_> = scene
        .sketch()
        .neighborhoods()
        .map(|element| element.id().clone())
        .collect();
    for id in &neighborhood_ids {
        let selection = scene.select_neighborhood(id)?;
        println!("社区 {id} 的街区：");
        print_selection(&selection);
    }

    let focus_point = scene
        .sketch()
        .blocks()
        .next()
        .and_then(|block| block.polygon().and_then(geometry::polygon_centroid));
    let focus = focus_point.map(|point| workspace.scene_mut().focus_on_point(point));
    if let (Some(point), Some(selection)) = (focus_point, &focus) {
        println!(
            "聚焦点 ({:.2}, {:.2})，半径 {:.0} 内的街区：",
            point.x(),
            point.y(),
            workspace.scene().settings().focus_radius
        );
        print_selection(selection);
    }

    let selected_labels = focus
        .as_ref()
        .map(BlockSelection::selected_labels)
        .unwrap_or_default();
    let scene = workspace.scene();
    let snapshot = render_snapshot(
        scene.sketch(),
        &selected_labels,
        &scene.visible_bounds(),
        SnapshotOptions::from(&config.render),
    )?;
    println!(
        "快照 {}x{}，PNG {} 字节",
        snapshot.width,
        snapshot.height,
        snapshot.png.len()
    );
    if let Some(path) = &config.render.output {
        snapshot.write_to(path)?;
        println!("快照已写入 {}", path.display());
    }

    let outcome = workspace.close();
    if let Some(id) = &outcome.committed {
        println!("关闭前提交了未完成的图形 {id}");
    }
    if outcome.needs_confirmation {
        match workspace.save() {
            Ok(id) => println!("未保存的修改已保存，草图 ID = {id}"),
            Err(err) => {
                warn!(error = %err, "关闭前保存失败");
                println!("保存失败，修改仍保留：{err}");
            }
        }
    }

    match workspace.list() {
        Ok(list) => {
            println!("存储中的草图：");
            for summary in list {
                println!(
                    "  - {} [{}]，{} 个元素",
                    summary.name, summary.id, summary.element_count
                );
            }
        }
        Err(err) => warn!(error = %err, "无法列出草图"),
    }

    Ok(())
}

fn dispatch_cli_command(
    bus: &CommandBus,
    name: &str,
    context: &mut CommandContext<'_>,
) -> Result<(), String> {
    let response = bus.dispatch(&CommandRequest::new(name), context);
    if response.success {
        if let Some(message) = response.message {
            info!(command = name, %message, "CLI 命令执行成功");
        }
        Ok(())
    } else {
        Err(response
            .message
            .unwrap_or_else(|| format!("命令 {name} 执行失败")))
    }
}

fn print_sketch_overview(sketch: &Sketch) {
    let count = |kind| sketch.elements_of(kind).count();
    info!(
        elements = sketch.len(),
        blocks = count(ElementKind::Block),
        houses = count(ElementKind::House),
        "CLI 演示草图统计"
    );
    println!(
        "草图「{}」：街道 {}，街区 {}，房屋 {}，社区 {}，参考点 {}",
        sketch.name,
        count(ElementKind::Street),
        count(ElementKind::Block),
        count(ElementKind::House),
        count(ElementKind::Neighborhood),
        count(ElementKind::Reference)
    );

    println!("街区明细：");
    for block in sketch.blocks() {
        let summary = BlockSummary::from_block(sketch, block);
        let inside = if sketch.block_is_inside_any_neighborhood(block) {
            "是"
        } else {
            "否"
        };
        println!(
            "  - 街区 {} ({})：房屋 {}，参考点 {}，居民 {}，重心 {}，属于社区 {}",
            summary.label,
            summary.id,
            summary.house_count,
            summary.reference_label.as_deref().unwrap_or("<无>"),
            summary
                .inhabitants
                .map(|value| value.to_string())
                .unwrap_or_else(|| "<未填>".to_string()),
            format_point_option(summary.centroid),
            inside
        );
    }
}

fn print_selection(selection: &BlockSelection) {
    if selection.available().is_empty() {
        println!("  （没有可选街区）");
        return;
    }
    for block in selection.available() {
        let mark = if selection.is_selected(&block.label) {
            "x"
        } else {
            " "
        };
        println!("  [{mark}] 街区 {}，房屋 {}", block.label, block.house_count);
    }
    println!(
        "  已选街区：{}（共 {} 户）",
        selection.manzana_list(),
        selection.selected_house_total()
    );
}

fn format_point(point: Point2) -> String {
    format!("({:.2}, {:.2})", point.x(), point.y())
}

fn format_point_option(value: Option<Point2>) -> String {
    value
        .map(format_point)
        .unwrap_or_else(|| "<无>".to_string())
}
