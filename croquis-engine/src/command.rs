use std::collections::HashMap;

use crate::draw::Tool;
use crate::scene::Scene;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub scene: &'a mut Scene,
}

/// 按名称分派编辑器命令，供键盘绑定与脚本调用。
pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(UndoCommand);
        bus.register(RedoCommand);
        bus.register(FinishCommand);
        bus.register(RemoveLastPointCommand);
        bus.register(DeleteSelectedCommand);
        bus.register(ClearSelectionCommand);
        bus.register(FocusSelectionCommand);
        bus.register(ToolCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

struct UndoCommand;

impl CommandHandler for UndoCommand {
    fn name(&self) -> &'static str {
        "undo"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if context.scene.undo() {
            CommandResponse::ok("已撤销")
        } else {
            CommandResponse::err("没有可撤销的操作")
        }
    }
}

struct RedoCommand;

impl CommandHandler for RedoCommand {
    fn name(&self) -> &'static str {
        "redo"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if context.scene.redo() {
            CommandResponse::ok("已重做")
        } else {
            CommandResponse::err("没有可重做的操作")
        }
    }
}

struct FinishCommand;

impl CommandHandler for FinishCommand {
    fn name(&self) -> &'static str {
        "finish"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        // 顶点不足时静默丢弃，不视为错误。
        match context.scene.finish_drawing() {
            Some(id) => CommandResponse::ok(format!("已提交图形 {id}")),
            None => CommandResponse::ok("没有可提交的图形"),
        }
    }
}

struct RemoveLastPointCommand;

impl CommandHandler for RemoveLastPointCommand {
    fn name(&self) -> &'static str {
        "remove_last_point"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.scene.remove_last_point() {
            Some(point) => CommandResponse::ok(format!(
                "已移除顶点 ({:.2}, {:.2})",
                point.x(),
                point.y()
            )),
            None => CommandResponse::ok("没有待定顶点"),
        }
    }
}

struct DeleteSelectedCommand;

impl CommandHandler for DeleteSelectedCommand {
    fn name(&self) -> &'static str {
        "delete_selected"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let removed = context.scene.delete_selected();
        if removed.is_empty() {
            CommandResponse::err("当前没有选中元素")
        } else {
            CommandResponse::ok(format!("已删除 {} 个元素", removed.len()))
        }
    }
}

struct ClearSelectionCommand;

impl CommandHandler for ClearSelectionCommand {
    fn name(&self) -> &'static str {
        "clear_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.scene.clear_selection();
        CommandResponse::ok("选中已清空")
    }
}

struct FocusSelectionCommand;

impl CommandHandler for FocusSelectionCommand {
    fn name(&self) -> &'static str {
        "focus_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.scene.focus_on_selection();
        CommandResponse::ok("视口已聚焦当前选中元素")
    }
}

struct ToolCommand;

impl CommandHandler for ToolCommand {
    fn name(&self) -> &'static str {
        "tool"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(name) = request.args.first() else {
            return CommandResponse::err("`tool` 需要提供工具名");
        };
        let Some(tool) = Tool::from_name(name) else {
            return CommandResponse::err(format!("未知工具: {name}"));
        };
        match context.scene.set_tool(tool) {
            Some(id) => CommandResponse::ok(format!("已切换到 {}，并提交图形 {id}", tool.name())),
            None => CommandResponse::ok(format!("已切换到 {}", tool.name())),
        }
    }
}
