use std::str::FromStr;
use std::sync::Arc;

use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::{
    api::{ApiError, FieldErrors, HttpGateway},
    collection::TaskListController,
    detail::TaskDetailController,
    form::{CategoryManager, LoginForm, RegisterForm, TaskFormController},
    notice::NoticeBoard,
    router::{Route, guard},
    screen::{ScreenContext, ScreenError, SharedGateway},
    session::{AuthError, SessionFile, SessionStore},
    settings::Settings,
    types::{Category, CategoryId, CompletionFilter, Task, TaskId},
};

const SCHEMA_VERSION: &str = "cli.v1";

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    /// Sign in and remember the session.
    Login(LoginArgs),
    /// Create an account and sign in.
    Register(RegisterArgs),
    Logout,
    Whoami,
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum TaskCommand {
    List(TaskListArgs),
    Show(TaskIdArgs),
    Create(TaskCreateArgs),
    Edit(TaskEditArgs),
    Toggle(TaskIdArgs),
    Delete(TaskIdArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum CategoryCommand {
    List,
    Create(CategoryCreateArgs),
    Update(CategoryUpdateArgs),
    Delete(CategoryDeleteArgs),
}

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    #[arg(long, value_name = "NAME")]
    pub username: String,

    #[arg(long, value_name = "PASSWORD")]
    pub password: String,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    #[arg(long, value_name = "NAME")]
    pub username: String,

    #[arg(long, value_name = "PASSWORD")]
    pub password: String,

    #[arg(long, value_name = "PASSWORD")]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Args)]
pub struct TaskListArgs {
    /// all, completed or incomplete
    #[arg(long, value_name = "FILTER", default_value = "all")]
    pub filter: String,

    #[arg(long, value_name = "N", default_value_t = 1)]
    pub page: u32,
}

#[derive(Debug, Clone, Args)]
pub struct TaskIdArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: TaskId,
}

#[derive(Debug, Clone, Args)]
pub struct TaskCreateArgs {
    #[arg(long, value_name = "TEXT")]
    pub title: String,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    #[arg(long, value_name = "CATEGORY_ID")]
    pub category: Option<CategoryId>,
}

#[derive(Debug, Clone, Args)]
pub struct TaskEditArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: TaskId,

    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    #[arg(long, value_name = "CATEGORY_ID", conflicts_with = "clear_category")]
    pub category: Option<CategoryId>,

    #[arg(long)]
    pub clear_category: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CategoryCreateArgs {
    #[arg(long, value_name = "TEXT")]
    pub name: String,
}

#[derive(Debug, Clone, Args)]
pub struct CategoryUpdateArgs {
    #[arg(long, value_name = "CATEGORY_ID")]
    pub id: CategoryId,

    #[arg(long, value_name = "TEXT")]
    pub name: String,
}

#[derive(Debug, Clone, Args)]
pub struct CategoryDeleteArgs {
    #[arg(long, value_name = "CATEGORY_ID")]
    pub id: CategoryId,
}

pub async fn run(settings: &Settings, command: RootCommand, json_output: bool, quiet: bool) -> i32 {
    let notices = NoticeBoard::new();
    let result = match connect(settings, &notices) {
        Ok(ctx) => execute(&ctx, command).await,
        Err(err) => Err(err),
    };
    flush_notices(&notices, json_output || quiet);

    match result {
        Ok(output) => {
            print_success(output, json_output, quiet);
            0
        }
        Err(err) => {
            print_error(&err, json_output);
            err.exit_code
        }
    }
}

struct CommandOutput {
    command: &'static str,
    data: Value,
    text: String,
}

#[derive(Debug)]
struct CliError {
    exit_code: i32,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

fn connect(settings: &Settings, notices: &NoticeBoard) -> CliResult<ScreenContext> {
    let session = if settings.persist_session {
        match SessionFile::default_path() {
            Some(path) => SessionStore::with_file(SessionFile::new(path)),
            None => {
                warn!("no config directory; the session will not be remembered");
                SessionStore::new()
            }
        }
    } else {
        SessionStore::new()
    };

    let gateway = HttpGateway::new(settings.gateway_config(), Arc::new(session.clone()))
        .map_err(|err| runtime_error(format!("{err:#}")))?;
    let api: SharedGateway = Arc::new(gateway);

    Ok(ScreenContext::new(api, session, Arc::new(notices.clone())))
}

/// The board already logged each notice as it was reported.
fn flush_notices(notices: &NoticeBoard, silent: bool) {
    let lines = notice_lines(notices);
    if !silent {
        for line in lines {
            eprintln!("{line}");
        }
    }
}

fn notice_lines(notices: &NoticeBoard) -> Vec<String> {
    notices
        .drain()
        .into_iter()
        .map(|notice| format!("{}: {}", notice.severity.as_str(), notice.message))
        .collect()
}

fn command_route(command: &RootCommand) -> Route {
    match command {
        RootCommand::Login(_) | RootCommand::Logout | RootCommand::Whoami => Route::Login,
        RootCommand::Register(_) => Route::Register,
        RootCommand::Task { command } => match command {
            TaskCommand::List(_) => Route::TaskList,
            TaskCommand::Create(_) => Route::TaskCreate,
            TaskCommand::Edit(args) => Route::TaskEdit(args.id),
            TaskCommand::Show(args) | TaskCommand::Toggle(args) | TaskCommand::Delete(args) => {
                Route::TaskDetail(args.id)
            }
        },
        RootCommand::Category { .. } => Route::Categories,
    }
}

fn check_route(route: Route, session: &SessionStore) -> CliResult<()> {
    let resolved = guard(route, &session.state());
    if resolved != route {
        return Err(login_required_error(format!(
            "'{route}' requires a signed-in session; run `taskdeck login` first"
        )));
    }
    Ok(())
}

async fn execute(ctx: &ScreenContext, command: RootCommand) -> CliResult<CommandOutput> {
    check_route(command_route(&command), &ctx.session)?;

    match command {
        RootCommand::Login(args) => login(ctx, args).await,
        RootCommand::Register(args) => register(ctx, args).await,
        RootCommand::Logout => Ok(logout(ctx)),
        RootCommand::Whoami => Ok(whoami(ctx)),
        RootCommand::Task { command } => execute_task_command(ctx, command).await,
        RootCommand::Category { command } => execute_category_command(ctx, command).await,
    }
}

async fn execute_task_command(
    ctx: &ScreenContext,
    command: TaskCommand,
) -> CliResult<CommandOutput> {
    match command {
        TaskCommand::List(args) => task_list(ctx, args).await,
        TaskCommand::Show(args) => task_show(ctx, args).await,
        TaskCommand::Create(args) => task_create(ctx, args).await,
        TaskCommand::Edit(args) => task_edit(ctx, args).await,
        TaskCommand::Toggle(args) => task_toggle(ctx, args).await,
        TaskCommand::Delete(args) => task_delete(ctx, args).await,
    }
}

async fn execute_category_command(
    ctx: &ScreenContext,
    command: CategoryCommand,
) -> CliResult<CommandOutput> {
    match command {
        CategoryCommand::List => category_list(ctx).await,
        CategoryCommand::Create(args) => category_create(ctx, args).await,
        CategoryCommand::Update(args) => category_update(ctx, args).await,
        CategoryCommand::Delete(args) => category_delete(ctx, args).await,
    }
}

async fn login(ctx: &ScreenContext, args: LoginArgs) -> CliResult<CommandOutput> {
    let mut form = LoginForm::new(args.username, args.password);
    let route = form
        .submit(&ctx.session, ctx.api.as_ref())
        .await
        .map_err(auth_error)?;

    Ok(identity_output("login", ctx, route))
}

async fn register(ctx: &ScreenContext, args: RegisterArgs) -> CliResult<CommandOutput> {
    let mut form = RegisterForm::new(args.username, args.password, args.confirm_password);
    let route = form
        .submit(&ctx.session, ctx.api.as_ref())
        .await
        .map_err(auth_error)?;

    Ok(identity_output("register", ctx, route))
}

fn identity_output(command: &'static str, ctx: &ScreenContext, route: Route) -> CommandOutput {
    let username = ctx.session.identity().map(|identity| identity.username);
    CommandOutput {
        command,
        data: json!({ "username": username.clone(), "next": route.path() }),
        text: format!("signed in as {}", username.unwrap_or_default()),
    }
}

fn logout(ctx: &ScreenContext) -> CommandOutput {
    let was_signed_in = ctx.session.is_authenticated();
    ctx.session.logout();
    CommandOutput {
        command: "logout",
        data: json!({ "signed_out": was_signed_in }),
        text: if was_signed_in {
            "signed out".to_string()
        } else {
            "not signed in".to_string()
        },
    }
}

fn whoami(ctx: &ScreenContext) -> CommandOutput {
    let username = ctx.session.identity().map(|identity| identity.username);
    CommandOutput {
        command: "whoami",
        data: json!({ "username": username.clone() }),
        text: username.unwrap_or_else(|| "not signed in".to_string()),
    }
}

async fn task_list(ctx: &ScreenContext, args: TaskListArgs) -> CliResult<CommandOutput> {
    let filter = CompletionFilter::from_str(&args.filter).map_err(|()| {
        usage_error(
            "INVALID_FILTER",
            format!(
                "unknown filter '{}'; expected all, completed or incomplete",
                args.filter
            ),
        )
    })?;

    let mut controller = TaskListController::new(ctx.clone());
    controller.set_filter(filter).await.map_err(screen_error)?;
    if args.page > 1 {
        controller.set_page(args.page).await.map_err(screen_error)?;
    }

    let view = controller.view();
    let data = json!({
        "filter": view.filter.as_str(),
        "page": view.page,
        "page_size": view.page_size,
        "total_pages": view.total_pages,
        "total_count": view.total_count,
        "tasks": view.items.iter().map(task_json).collect::<Vec<_>>()
    });
    let text = format!(
        "{}\npage {} of {} ({} tasks, filter: {})",
        render_task_list_text(&view.items),
        view.page,
        view.total_pages,
        view.total_count,
        view.filter.as_str()
    );

    Ok(CommandOutput {
        command: "task list",
        data,
        text,
    })
}

async fn task_show(ctx: &ScreenContext, args: TaskIdArgs) -> CliResult<CommandOutput> {
    let mut detail = TaskDetailController::new(ctx.clone(), args.id);
    detail.load().await.map_err(screen_error)?;
    let task = detail
        .task()
        .ok_or_else(|| task_not_found_error(args.id))?;

    Ok(CommandOutput {
        command: "task show",
        data: json!({ "task": task_json(task) }),
        text: render_task_detail_text(task),
    })
}

async fn task_create(ctx: &ScreenContext, args: TaskCreateArgs) -> CliResult<CommandOutput> {
    let mut form = TaskFormController::create(ctx.clone());
    form.open().await.map_err(screen_error)?;
    form.set_title(args.title);
    form.set_description(args.description.unwrap_or_default());
    if args.category.is_some() {
        if !form.category_field_enabled() {
            return Err(runtime_error(
                "categories could not be loaded, so --category cannot be applied",
            ));
        }
        form.select_category(args.category);
    }

    form.submit().await.map_err(screen_error)?;
    saved_task_output("task create", form.saved())
}

async fn task_edit(ctx: &ScreenContext, args: TaskEditArgs) -> CliResult<CommandOutput> {
    let mut form = TaskFormController::edit(ctx.clone(), args.id);
    form.open().await.map_err(screen_error)?;

    if let Some(title) = args.title {
        form.set_title(title);
    }
    if let Some(description) = args.description {
        form.set_description(description);
    }
    if args.category.is_some() || args.clear_category {
        if !form.category_field_enabled() {
            return Err(runtime_error(
                "categories could not be loaded, so the category cannot be changed",
            ));
        }
        form.select_category(args.category);
    }

    form.submit().await.map_err(screen_error)?;
    saved_task_output("task edit", form.saved())
}

fn saved_task_output(command: &'static str, task: Option<&Task>) -> CliResult<CommandOutput> {
    let task = task.ok_or_else(|| runtime_error("the service did not return the saved task"))?;
    Ok(CommandOutput {
        command,
        data: json!({ "task": task_json(task) }),
        text: format!("saved task {}: {}", task.id, task.title),
    })
}

async fn task_toggle(ctx: &ScreenContext, args: TaskIdArgs) -> CliResult<CommandOutput> {
    let mut detail = TaskDetailController::new(ctx.clone(), args.id);
    detail.load().await.map_err(screen_error)?;
    detail.toggle_completion().await.map_err(screen_error)?;
    let task = detail
        .task()
        .ok_or_else(|| task_not_found_error(args.id))?;

    Ok(CommandOutput {
        command: "task toggle",
        data: json!({ "task": task_json(task) }),
        text: format!(
            "task {} marked {}",
            task.id,
            if task.is_completed {
                "completed"
            } else {
                "incomplete"
            }
        ),
    })
}

async fn task_delete(ctx: &ScreenContext, args: TaskIdArgs) -> CliResult<CommandOutput> {
    let mut detail = TaskDetailController::new(ctx.clone(), args.id);
    let route = detail.delete().await.map_err(screen_error)?;

    Ok(CommandOutput {
        command: "task delete",
        data: json!({ "deleted": args.id, "next": route.path() }),
        text: format!("deleted task {}", args.id),
    })
}

async fn category_list(ctx: &ScreenContext) -> CliResult<CommandOutput> {
    let mut manager = CategoryManager::new(ctx.clone());
    manager.load().await.map_err(screen_error)?;
    Ok(category_list_output("category list", manager.categories()))
}

async fn category_create(ctx: &ScreenContext, args: CategoryCreateArgs) -> CliResult<CommandOutput> {
    let mut manager = CategoryManager::new(ctx.clone());
    manager.set_name(args.name);
    let saved = manager.submit().await.map_err(screen_error)?;

    Ok(CommandOutput {
        command: "category create",
        data: json!({ "category": category_json(&saved) }),
        text: format!("created category {}: {}", saved.id, saved.name),
    })
}

async fn category_update(ctx: &ScreenContext, args: CategoryUpdateArgs) -> CliResult<CommandOutput> {
    let mut manager = CategoryManager::new(ctx.clone());
    manager.load().await.map_err(screen_error)?;
    manager.begin_edit(args.id).map_err(screen_error)?;
    manager.set_name(args.name);
    let saved = manager.submit().await.map_err(screen_error)?;

    Ok(CommandOutput {
        command: "category update",
        data: json!({ "category": category_json(&saved) }),
        text: format!("renamed category {} to {}", saved.id, saved.name),
    })
}

async fn category_delete(ctx: &ScreenContext, args: CategoryDeleteArgs) -> CliResult<CommandOutput> {
    let mut manager = CategoryManager::new(ctx.clone());
    manager.delete(args.id).await.map_err(screen_error)?;

    let mut output = category_list_output("category delete", manager.categories());
    output.data["deleted"] = json!(args.id);
    output.text = format!("deleted category {}\n{}", args.id, output.text);
    Ok(output)
}

fn category_list_output(command: &'static str, categories: &[Category]) -> CommandOutput {
    CommandOutput {
        command,
        data: json!({
            "categories": categories.iter().map(category_json).collect::<Vec<_>>()
        }),
        text: render_category_list_text(categories),
    }
}

fn render_category_list_text(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "No categories found.".to_string();
    }

    let headers = ["ID", "Name"];
    let rows = categories
        .iter()
        .map(|category| vec![category.id.to_string(), category.name.replace('\n', " ")])
        .collect::<Vec<_>>();

    render_text_table(&headers, &rows)
}

fn render_task_list_text(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found.".to_string();
    }

    let headers = ["ID", "Done", "Category", "Title"];
    let rows = tasks
        .iter()
        .map(|task| {
            vec![
                task.id.to_string(),
                if task.is_completed { "x" } else { " " }.to_string(),
                task.category
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                task.title.replace('\n', " "),
            ]
        })
        .collect::<Vec<_>>();

    render_text_table(&headers, &rows)
}

fn render_task_detail_text(task: &Task) -> String {
    let mut lines = vec![
        format!("#{} {}", task.id, task.title),
        format!(
            "status:    {}",
            if task.is_completed {
                "completed"
            } else {
                "incomplete"
            }
        ),
        format!(
            "category:  {}",
            task.category
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("created:   {}", task.created_at.format("%Y-%m-%d %H:%M")),
    ];
    if let Some(completed_at) = task.completed_at {
        lines.push(format!("completed: {}", completed_at.format("%Y-%m-%d %H:%M")));
    }
    if !task.description.is_empty() {
        lines.push(String::new());
        lines.push(task.description.clone());
    }
    lines.join("\n")
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            if width > widths[index] {
                widths[index] = width;
            }
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(*width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let render_row = |cells: Vec<&str>| {
        format!(
            "| {} |",
            cells
                .iter()
                .enumerate()
                .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
                .collect::<Vec<_>>()
                .join(" | ")
        )
    };

    let mut lines = vec![border.clone(), render_row(headers.to_vec()), border.clone()];
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str).collect()));
    }
    lines.push(border);
    lines.join("\n")
}

fn task_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "is_completed": task.is_completed,
        "category": task.category,
        "created_at": task.created_at.to_rfc3339(),
        "completed_at": task.completed_at.map(|at| at.to_rfc3339())
    })
}

fn category_json(category: &Category) -> Value {
    json!({
        "id": category.id,
        "name": category.name
    })
}

fn usage_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 2,
        code,
        message: message.into(),
        details: None,
    }
}

fn not_found_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 3,
        code,
        message: message.into(),
        details: None,
    }
}

fn validation_error(errors: &FieldErrors) -> CliError {
    CliError {
        exit_code: 4,
        code: "VALIDATION_FAILED",
        message: errors.to_string(),
        details: serde_json::to_value(errors).ok(),
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 5,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn login_required_error(message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 6,
        code: "LOGIN_REQUIRED",
        message: message.into(),
        details: None,
    }
}

fn task_not_found_error(id: TaskId) -> CliError {
    not_found_error("TASK_NOT_FOUND", format!("task {id} not found"))
}

fn screen_error(err: ScreenError) -> CliError {
    match err {
        ScreenError::SessionRequired | ScreenError::Api(ApiError::Unauthorized) => {
            login_required_error("the session is missing or expired; run `taskdeck login`")
        }
        ScreenError::Api(ApiError::NotFound) => {
            not_found_error("NOT_FOUND", "the requested record does not exist")
        }
        ScreenError::Api(ApiError::ValidationFailed(errors)) | ScreenError::Invalid(errors) => {
            validation_error(&errors)
        }
        ScreenError::Api(ApiError::Unreachable(message)) => CliError {
            exit_code: 5,
            code: "UNREACHABLE",
            message: format!("could not reach the service: {message}"),
            details: None,
        },
        ScreenError::UnknownTask(id) => task_not_found_error(id),
        ScreenError::UnknownCategory(id) => {
            not_found_error("CATEGORY_NOT_FOUND", format!("category {id} not found"))
        }
        ScreenError::SubmissionDisabled => not_found_error(
            "TASK_UNAVAILABLE",
            "the task could not be loaded, so it cannot be saved",
        ),
    }
}

fn auth_error(err: AuthError) -> CliError {
    match err {
        AuthError::Rejected => CliError {
            exit_code: 6,
            code: "INVALID_CREDENTIALS",
            message: err.to_string(),
            details: None,
        },
        AuthError::Invalid(errors) => validation_error(&errors),
        AuthError::Unreachable(message) => CliError {
            exit_code: 5,
            code: "UNREACHABLE",
            message: format!("could not reach the service: {message}"),
            details: None,
        },
    }
}

fn print_success(output: CommandOutput, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "data": output.data
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{}", payload),
        }
        return;
    }

    if quiet {
        return;
    }

    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn print_error(err: &CliError, json_output: bool) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "error": {
                "code": err.code,
                "message": err.message,
                "details": err.details
            }
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{}", payload),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
}
