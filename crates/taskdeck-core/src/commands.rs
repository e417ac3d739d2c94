use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use taskdeck_shared::{FieldError, TaskQuery};
use tracing::{debug, info, instrument, warn};

use crate::api::{HttpClient, NotificationApi};
use crate::bulk::{self, Selection};
use crate::cli::{
    AddArgs, BulkAction, BulkArgs, Command, EditArgs, ExportArgs, FormatArg, ListArgs, TodoCommand,
};
use crate::config::Config;
use crate::datetime::{local_today, parse_due_input};
use crate::error::ApiError;
use crate::export::{ExportFormat, export};
use crate::filter::{self, FilterSpec, PriorityFilter, SortKey, SortOrder, StatusFilter};
use crate::reorder::{DragOutcome, keyboard_move};
use crate::render::{Renderer, Row};
use crate::session::Session;
use crate::stats::export_stats;
use crate::store::auth::{AuthError, UserUpdate};
use crate::store::{AuthStore, Rejected, RetryPolicy, TaskStore, TodoStore};
use crate::task::{Priority, Task, TaskCreate, TaskPatch};
use crate::templates::{self, ALL_TEMPLATES};
use crate::validate::{validate_login, validate_signup, validate_task_create, validate_task_patch};

/// Everything a command needs: the stores wired to one HTTP client.
pub struct App {
    renderer: Renderer,
    client: Arc<HttpClient>,
    auth: AuthStore,
    tasks: TaskStore,
    todos: TodoStore,
    due_soon_window: Duration,
}

impl App {
    pub fn new(cfg: &Config, session: Session, quiet: u8) -> anyhow::Result<Self> {
        let renderer = Renderer::new(cfg)?;
        let client = Arc::new(HttpClient::from_config(cfg, session.clone())?);
        let retry = RetryPolicy::from_config(cfg)?;

        let tasks = TaskStore::new(client.clone(), retry);
        if quiet == 0 {
            let celebrate = renderer.clone();
            tasks
                .hooks()
                .register(Arc::new(move |task: &Task| celebrate.celebrate(task)));
        }

        Ok(Self {
            auth: AuthStore::new(client.clone(), session),
            todos: TodoStore::new(client.clone()),
            tasks,
            client,
            renderer,
            due_soon_window: cfg.due_soon_window()?,
        })
    }
}

#[instrument(skip(app, command))]
pub async fn dispatch(app: &App, command: Command) -> anyhow::Result<()> {
    let now = Utc::now();
    debug!(?command, "dispatching command");

    if requires_sign_in(&command) {
        app.auth.require_auth()?;
    }

    match command {
        Command::Login { email, password } => cmd_login(app, &email, password).await,
        Command::Signup {
            name,
            email,
            password,
        } => cmd_signup(app, &name, &email, password).await,
        Command::Logout => cmd_logout(app),
        Command::Whoami => cmd_whoami(app).await,
        Command::Profile { name, email } => cmd_profile(app, name, email),
        Command::List(args) => cmd_list(app, args, now).await,
        Command::Info { task } => cmd_info(app, &task).await,
        Command::Add(args) => cmd_add(app, args, now).await,
        Command::Template { id, variation } => {
            cmd_template(app, id.as_deref(), variation.as_deref(), now).await
        }
        Command::Edit(args) => cmd_edit(app, args, now).await,
        Command::Done { tasks } => cmd_set_completed(app, &tasks, true).await,
        Command::Undone { task } => {
            cmd_set_completed(app, std::slice::from_ref(&task), false).await
        }
        Command::Rm { task } => cmd_rm(app, &task).await,
        Command::Move { task, to } => cmd_move(app, &task, to).await,
        Command::Stats => cmd_stats(app, now).await,
        Command::Due { hours } => cmd_due(app, hours, now).await,
        Command::Export(args) => cmd_export(app, args, now).await,
        Command::Bulk(args) => cmd_bulk(app, args, now).await,
        Command::Todo(todo) => cmd_todo(app, todo).await,
    }
}

/// Listing templates is offline; everything that touches tasks, todos or
/// the profile needs a session.
fn requires_sign_in(command: &Command) -> bool {
    match command {
        Command::Login { .. } | Command::Signup { .. } | Command::Logout | Command::Whoami => false,
        Command::Template { id, .. } => id.is_some(),
        _ => true,
    }
}

async fn cmd_login(app: &App, email: &str, password: Option<String>) -> anyhow::Result<()> {
    info!("command login");
    let password = read_password(password)?;

    let errors = validate_login(email, &password);
    if !errors.is_empty() {
        return Err(invalid_input(&errors));
    }

    let user = app
        .auth
        .login(email, &password)
        .await
        .map_err(|err| auth_failure("login failed", err))?;
    println!("Signed in as {} <{}>.", user.name, user.email);
    Ok(())
}

async fn cmd_signup(
    app: &App,
    name: &str,
    email: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    info!("command signup");
    let password = read_password(password)?;

    let errors = validate_signup(name, email, &password);
    if !errors.is_empty() {
        return Err(invalid_input(&errors));
    }

    let user = app
        .auth
        .signup(name, email, &password)
        .await
        .map_err(|err| auth_failure("signup failed", err))?;
    println!("Welcome, {}! You are signed in.", user.name);
    Ok(())
}

fn cmd_logout(app: &App) -> anyhow::Result<()> {
    info!("command logout");
    app.auth.logout()?;
    println!("Signed out.");
    Ok(())
}

async fn cmd_whoami(app: &App) -> anyhow::Result<()> {
    match app.auth.restore().await? {
        Some(user) => app.renderer.print_user(&user),
        None => Err(AuthError::NotAuthenticated.into()),
    }
}

fn cmd_profile(app: &App, name: Option<String>, email: Option<String>) -> anyhow::Result<()> {
    info!("command profile");
    if name.is_none() && email.is_none() {
        bail!("nothing to change; pass --name or --email");
    }
    let user = app.auth.update_user(UserUpdate { name, email })?;
    app.renderer.print_user(&user)
}

async fn cmd_list(app: &App, args: ListArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command list");

    let query = TaskQuery {
        page: args.page,
        limit: args.limit,
        ..TaskQuery::default()
    };
    load_tasks(app, &query).await?;

    let status = parse_opt::<StatusFilter>(args.status.as_deref())?;
    let priority = parse_opt::<PriorityFilter>(args.priority.as_deref())?;
    let sort_by = parse_opt::<SortKey>(args.sort.as_deref())?;
    let order = parse_opt::<SortOrder>(args.order.as_deref())?;
    app.tasks.clear_filters();
    app.tasks.update_filters(|spec| {
        if let Some(status) = status {
            spec.status = status;
        }
        if let Some(priority) = priority {
            spec.priority = priority;
        }
        if let Some(search) = args.search.clone() {
            spec.search = search;
        }
        if let Some(sort_by) = sort_by {
            spec.sort_by = sort_by;
        }
        if let Some(order) = order {
            spec.order = order;
        }
    });

    let all = app.tasks.tasks();
    let visible = if args.manual {
        let spec = app.tasks.filters();
        let result = filter::filter_by_status(&all, spec.status);
        let result = filter::filter_by_priority(&result, spec.priority);
        filter::filter_by_search(&result, &spec.search)
    } else {
        app.tasks.visible()
    };

    if visible.is_empty() {
        if app.tasks.filters().has_filters() {
            println!("No tasks match the current filters.");
        } else {
            println!("No tasks yet. Add one with `taskdeck add`.");
        }
        return Ok(());
    }

    let numbers = row_numbers(&all);
    let rows = rows_for(&visible, &numbers);
    app.renderer
        .print_task_table(&rows, now, app.due_soon_window)?;

    let state = app.tasks.snapshot();
    match state.pagination {
        Some(page) => println!(
            "\n{} shown; page {} of {} ({} tasks)",
            rows.len(),
            page.page,
            page.pages,
            page.total
        ),
        None => println!("\n{} of {} tasks", rows.len(), all.len()),
    }
    Ok(())
}

async fn cmd_info(app: &App, reference: &str) -> anyhow::Result<()> {
    load_tasks(app, &TaskQuery::default()).await?;
    let tasks = app.tasks.tasks();
    let idx = resolve_task(&tasks, reference)?;
    app.renderer.print_task_info(&tasks[idx])
}

async fn cmd_add(app: &App, args: AddArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");

    let priority: Priority = args.priority.parse().map_err(|e| anyhow!("{e}"))?;
    let due_date = args
        .due
        .as_deref()
        .map(|input| parse_due_input(input, now))
        .transpose()?;

    let mut input = TaskCreate {
        title: args.title,
        description: args.description,
        priority,
        due_date,
        due_time: args.time,
    };
    create_task(app, &mut input, now).await
}

async fn cmd_template(
    app: &App,
    id: Option<&str>,
    variation: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some(id) = id else {
        return app.renderer.print_templates(&ALL_TEMPLATES);
    };
    info!(template = id, "command template");

    let template = templates::find(id).ok_or_else(|| {
        let known: Vec<&str> = ALL_TEMPLATES.iter().map(|t| t.id).collect();
        anyhow!("unknown template {id:?} (known: {})", known.join(", "))
    })?;
    let mut input = template.instantiate(variation, local_today(now))?;
    create_task(app, &mut input, now).await
}

async fn create_task(app: &App, input: &mut TaskCreate, now: DateTime<Utc>) -> anyhow::Result<()> {
    let errors = validate_task_create(input, local_today(now));
    if !errors.is_empty() {
        return Err(invalid_input(&errors));
    }

    let task = app
        .tasks
        .create(input)
        .await
        .map_err(|rejected| rejection("failed to create task", rejected))?;
    println!("Created task {} ({}).", task.id, task.title);
    Ok(())
}

async fn cmd_edit(app: &App, args: EditArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command edit");

    let mut patch = TaskPatch {
        title: args.title,
        description: args.description,
        ..TaskPatch::default()
    };
    if let Some(priority) = args.priority.as_deref() {
        patch.priority = Some(priority.parse().map_err(|e| anyhow!("{e}"))?);
    }
    if args.no_due {
        patch.due_date = Some(None);
        patch.due_time = Some(None);
    } else if let Some(input) = args.due.as_deref() {
        patch.due_date = Some(Some(parse_due_input(input, now)?));
    }
    if let Some(time) = args.time {
        let time = time.trim().to_string();
        patch.due_time = Some((!time.is_empty()).then_some(time));
    }
    if patch.is_empty() {
        bail!("nothing to change; pass at least one field to edit");
    }

    let errors = validate_task_patch(&mut patch, local_today(now));
    if !errors.is_empty() {
        return Err(invalid_input(&errors));
    }

    load_tasks(app, &TaskQuery::default()).await?;
    let tasks = app.tasks.tasks();
    let id = tasks[resolve_task(&tasks, &args.task)?].id.clone();

    let task = app
        .tasks
        .update(&id, &patch)
        .await
        .map_err(|rejected| rejection("failed to update task", rejected))?;
    println!("Updated task {} ({}).", task.id, task.title);
    Ok(())
}

async fn cmd_set_completed(app: &App, references: &[String], completed: bool) -> anyhow::Result<()> {
    info!(completed, "command done/undone");

    load_tasks(app, &TaskQuery::default()).await?;
    let tasks = app.tasks.tasks();
    let ids = references
        .iter()
        .map(|reference| resolve_task(&tasks, reference).map(|idx| tasks[idx].id.clone()))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut changed = 0_usize;
    for id in ids {
        let task = app
            .tasks
            .toggle_completion(&id, completed)
            .await
            .map_err(|rejected| rejection("failed to update task", rejected))?;
        debug!(id = %task.id, completed = task.completed, "task status saved");
        changed += 1;
    }

    let verb = if completed { "Completed" } else { "Reopened" };
    println!("{verb} {changed} task(s).");
    Ok(())
}

async fn cmd_rm(app: &App, reference: &str) -> anyhow::Result<()> {
    info!("command rm");

    load_tasks(app, &TaskQuery::default()).await?;
    let tasks = app.tasks.tasks();
    let task = &tasks[resolve_task(&tasks, reference)?];

    app.tasks
        .delete(&task.id)
        .await
        .map_err(|rejected| rejection("failed to delete task", rejected))?;
    println!("Deleted task {} ({}).", task.id, task.title);
    Ok(())
}

async fn cmd_move(app: &App, reference: &str, to: usize) -> anyhow::Result<()> {
    info!("command move");

    load_tasks(app, &TaskQuery::default()).await?;
    let tasks = app.tasks.tasks();
    let from = resolve_task(&tasks, reference)?;
    let to = to
        .checked_sub(1)
        .ok_or_else(|| anyhow!("rows are numbered from 1"))?;

    match keyboard_move(tasks, from, to)? {
        DragOutcome::Reordered(ordered) => {
            let changed = app
                .tasks
                .reorder(ordered)
                .await
                .context("task order save did not run to completion")?
                .map_err(|err| api_failure("failed to save task order", &err))?;
            println!("Moved row {} to row {}; {changed} task(s) renumbered.", from + 1, to + 1);
        }
        DragOutcome::Unchanged | DragOutcome::Cancelled => println!("Nothing to move."),
    }
    Ok(())
}

async fn cmd_stats(app: &App, now: DateTime<Utc>) -> anyhow::Result<()> {
    load_tasks(app, &TaskQuery::default()).await?;
    let stats = app.tasks.stats(now, app.due_soon_window);
    app.renderer.print_stats(&stats)?;

    let pending = filter::group_by_status(&app.tasks.tasks()).pending;
    let groups = filter::group_by_priority(&pending);
    println!(
        "\nPending by priority: high {}, medium {}, low {}",
        groups.high.len(),
        groups.medium.len(),
        groups.low.len()
    );
    Ok(())
}

async fn cmd_due(app: &App, hours: u32, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!(hours, "command due");

    let (due, overdue) = futures::join!(app.client.due_soon(hours), app.client.overdue_count());
    let due = due.map_err(|err| api_failure("failed to load due tasks", &err))?;
    let overdue = overdue.map_err(|err| api_failure("failed to load overdue count", &err))?;

    load_tasks(app, &TaskQuery::default()).await?;
    let numbers = row_numbers(&app.tasks.tasks());
    let rows = rows_for(&due, &numbers);

    if rows.is_empty() {
        println!("Nothing due in the next {hours} hour(s).");
    } else {
        app.renderer
            .print_task_table(&rows, now, Duration::hours(i64::from(hours)))?;
    }
    if overdue > 0 {
        println!("\n{overdue} task(s) overdue.");
    }
    Ok(())
}

async fn cmd_export(app: &App, args: ExportArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command export");

    load_tasks(app, &TaskQuery::default()).await?;
    let spec = FilterSpec {
        status: parse_opt(args.status.as_deref())?.unwrap_or_default(),
        priority: parse_opt(args.priority.as_deref())?.unwrap_or_default(),
        search: args.search.unwrap_or_default(),
        ..FilterSpec::default()
    };
    let tasks = filter::apply(&app.tasks.tasks(), &spec);
    let format = export_format(args.format);

    app.renderer.print_export_stats(&export_stats(&tasks, now))?;
    let document = export(&tasks, format, local_today(now))?;
    write_document(&document, format, args.output.as_deref())
}

async fn cmd_bulk(app: &App, args: BulkArgs, now: DateTime<Utc>) -> anyhow::Result<()> {
    info!(action = ?args.action, "command bulk");

    load_tasks(app, &TaskQuery::default()).await?;
    let tasks = app.tasks.tasks();

    let mut selection = Selection::for_tasks(&tasks);
    selection.toggle_selection_mode();
    if args.all {
        let pending_only = args.action == BulkAction::Complete;
        selection.select_all(
            tasks
                .iter()
                .filter(|t| !(pending_only && t.completed))
                .map(|t| t.id.clone()),
        );
    } else {
        for reference in &args.tasks {
            let id = &tasks[resolve_task(&tasks, reference)?].id;
            if !selection.is_selected(id) {
                selection.toggle_select(id);
            }
        }
    }
    if selection.is_empty() {
        bail!("no tasks selected");
    }

    let report = match args.action {
        BulkAction::Complete => bulk::complete_selected(&app.tasks, &mut selection).await,
        BulkAction::Delete => bulk::delete_selected(&app.tasks, &mut selection).await,
        BulkAction::Export => {
            let format = export_format(args.format);
            let document =
                bulk::export_selected(&app.tasks, &mut selection, format, local_today(now))?;
            return write_document(&document, format, args.output.as_deref());
        }
    };

    let action = match args.action {
        BulkAction::Complete => "complete",
        BulkAction::Delete => "delete",
        BulkAction::Export => "export",
    };
    app.renderer.print_batch_report(action, &report)?;
    if !report.is_success() {
        bail!("{} of {} task(s) failed", report.failed.len(), report.total());
    }
    Ok(())
}

async fn cmd_todo(app: &App, command: TodoCommand) -> anyhow::Result<()> {
    info!(?command, "command todo");

    app.todos
        .fetch_all()
        .await
        .map_err(|err| api_failure("failed to load todos", &err))?;

    match command {
        TodoCommand::List => {}
        TodoCommand::Add { text } => {
            app.todos
                .create(&text)
                .await
                .map_err(|rejected| rejection("failed to add row", rejected))?;
        }
        TodoCommand::Edit { row, text } => {
            let id = todo_id(app, row)?;
            app.todos
                .set_text(&id, &text)
                .await
                .map_err(|rejected| rejection("failed to save row", rejected))?;
        }
        TodoCommand::Toggle { row } => {
            let id = todo_id(app, row)?;
            app.todos
                .toggle(&id)
                .await
                .map_err(|rejected| rejection("failed to toggle row", rejected))?;
        }
        TodoCommand::Rm { row } => {
            let id = todo_id(app, row)?;
            app.todos
                .delete(&id)
                .await
                .map_err(|rejected| rejection("failed to delete row", rejected))?;
        }
        TodoCommand::Move { from, to } => {
            let from = from
                .checked_sub(1)
                .ok_or_else(|| anyhow!("rows are numbered from 1"))?;
            let to = to
                .checked_sub(1)
                .ok_or_else(|| anyhow!("rows are numbered from 1"))?;
            app.todos
                .move_row(from, to)
                .await
                .map_err(|rejected| rejection("failed to move row", rejected))?;
        }
    }

    app.renderer.print_todos(&app.todos.todos())
}

async fn load_tasks(app: &App, query: &TaskQuery) -> anyhow::Result<usize> {
    app.tasks
        .fetch_all(query)
        .await
        .map_err(|err| api_failure("failed to load tasks", &err))
}

fn todo_id(app: &App, row: usize) -> anyhow::Result<String> {
    let todos = app.todos.todos();
    row.checked_sub(1)
        .and_then(|idx| todos.get(idx))
        .map(|todo| todo.id.clone())
        .ok_or_else(|| anyhow!("row {row} does not exist (1-{})", todos.len()))
}

/// A task reference is a 1-based row number in collection order, a full
/// id, or an unambiguous id prefix.
fn resolve_task(tasks: &[Task], reference: &str) -> anyhow::Result<usize> {
    let reference = reference.trim();
    if reference.is_empty() {
        bail!("empty task reference");
    }

    if let Ok(number) = reference.parse::<usize>()
        && (1..=tasks.len()).contains(&number)
    {
        return Ok(number - 1);
    }

    if let Some(idx) = tasks.iter().position(|t| t.id == reference) {
        return Ok(idx);
    }

    let mut matches = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.id.starts_with(reference))
        .map(|(idx, _)| idx);
    match (matches.next(), matches.next()) {
        (Some(idx), None) => Ok(idx),
        (Some(_), Some(_)) => Err(anyhow!("task reference {reference:?} is ambiguous")),
        (None, _) => Err(anyhow!("no task matches {reference:?}")),
    }
}

fn row_numbers(tasks: &[Task]) -> HashMap<String, usize> {
    tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| (task.id.clone(), idx + 1))
        .collect()
}

/// Rows for tasks present in the loaded collection; anything outside the
/// current page has no number to show.
fn rows_for<'a>(tasks: &'a [Task], numbers: &HashMap<String, usize>) -> Vec<Row<'a>> {
    tasks
        .iter()
        .filter_map(|task| match numbers.get(&task.id) {
            Some(&number) => Some(Row { number, task }),
            None => {
                debug!(id = %task.id, "task outside the loaded page");
                None
            }
        })
        .collect()
}

fn parse_opt<T>(raw: Option<&str>) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    raw.map(str::parse).transpose()
}

fn export_format(format: FormatArg) -> ExportFormat {
    match format {
        FormatArg::Json => ExportFormat::Json,
        FormatArg::Csv => ExportFormat::Csv,
        FormatArg::Markdown => ExportFormat::Markdown,
    }
}

/// Writes to stdout, to `output`, or into `output` under the format's
/// default file name when it names a directory.
fn write_document(document: &str, format: ExportFormat, output: Option<&Path>) -> anyhow::Result<()> {
    let Some(output) = output else {
        let mut out = io::stdout().lock();
        writeln!(out, "{document}")?;
        return Ok(());
    };

    let path: PathBuf = if output.is_dir() {
        output.join(format.default_filename())
    } else {
        output.to_path_buf()
    };
    fs::write(&path, document).with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("Wrote {}.", path.display());
    Ok(())
}

fn read_password(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn invalid_input(errors: &[FieldError]) -> anyhow::Error {
    let mut message = String::from("invalid input");
    for error in errors {
        message.push_str(&format!("\n  {}: {}", error.field, error.message));
    }
    anyhow!(message)
}

fn api_failure(action: &str, err: &ApiError) -> anyhow::Error {
    if err.is_unauthorized() {
        warn!("server rejected the session; it has been cleared");
    }
    let mut message = format!("{action}: {}", err.message());
    for field in err.field_errors() {
        message.push_str(&format!("\n  {}: {}", field.field, field.message));
    }
    anyhow!(message)
}

fn rejection<T>(action: &str, rejected: Rejected<T>) -> anyhow::Error {
    if rejected.restored.is_some() {
        debug!(action, "local change rolled back");
    }
    api_failure(action, &rejected.error)
}

fn auth_failure(action: &str, err: AuthError) -> anyhow::Error {
    match err {
        AuthError::Api(api) => api_failure(action, &api),
        other => anyhow::Error::new(other).context(action.to_string()),
    }
}
