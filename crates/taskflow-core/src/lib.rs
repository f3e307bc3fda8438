pub mod board;
pub mod cli;
pub mod config;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod projection;
pub mod render;
pub mod stats;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io::{
  self,
  Write
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::board::{
  Notice,
  TaskBoard
};
use crate::cli::{
  BoardCommand,
  Command
};
use crate::config::Config;
use crate::datetime::parse_due_input;
use crate::filter::CategorySelection;
use crate::render::Renderer;
use crate::store::Backend;
use crate::task::{
  Priority,
  TaskDraft
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskflow CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = Config::load(
    cli.taskflowrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre
      .rc_overrides
      .into_iter()
      .chain(cli.overrides())
  );

  let renderer = Renderer::new(&cfg)?;
  let command =
    match cli.command.unwrap_or_default() {
      | Command::Config => {
        return renderer.print_config(
          io::stdout().lock(),
          &cfg
        );
      }
      | Command::Board(command) => command
    };

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let backend =
    Backend::from_config(
      &cfg, &data_dir
    )
    .context(
      "failed to open task store"
    )?;
  info!(backend = backend.name(), data = %data_dir.display(), "store ready");

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(dispatch(
    backend, &cfg, &renderer, command
  ))?;

  info!("done");
  Ok(())
}

#[tracing::instrument(skip(
  backend, cfg, renderer
))]
async fn dispatch(
  backend: Backend,
  cfg: &Config,
  renderer: &Renderer,
  command: BoardCommand
) -> anyhow::Result<()> {
  let tz = cfg.timezone();
  let mut board =
    TaskBoard::new(backend, tz);

  if !board.load().await {
    let detail = board
      .load_error()
      .unwrap_or("unknown error")
      .to_string();
    report(renderer, board.take_notices())?;
    bail!(
      "could not load tasks: {detail}"
    );
  }

  let now = Utc::now();
  let mut out = io::stdout().lock();

  match command {
    | BoardCommand::List {
      category,
      search
    } => {
      board.select_category(
        CategorySelection::parse(
          &category
        )
      );
      board.set_search(search);
      renderer.print_view(
        &mut out,
        &board.view(now)
      )?;
    }
    | BoardCommand::Add {
      title,
      category,
      priority,
      due
    } => {
      let priority =
        Priority::parse(&priority);
      if priority == Priority::Unknown {
        bail!(
          "priority must be high, \
           medium or low"
        );
      }
      let due_date = due
        .map(|raw| {
          parse_due_input(&raw, now, &tz)
        })
        .transpose()?;
      let draft = TaskDraft {
        category_id: category,
        priority: Some(priority),
        due_date,
        ..TaskDraft::new(title.join(" "))
      };
      if let Some(task) =
        board.create_task(draft).await
      {
        writeln!(
          out,
          "Created task {}.",
          task.id
        )?;
      }
    }
    | BoardCommand::Done { id } => {
      board
        .toggle_complete(&id, true)
        .await;
    }
    | BoardCommand::Reopen { id } => {
      if board
        .toggle_complete(&id, false)
        .await
        .is_some()
      {
        writeln!(
          out,
          "Reopened task {id}."
        )?;
      }
    }
    | BoardCommand::Delete { id } => {
      board.delete_task(&id).await;
    }
    | BoardCommand::Categories => {
      let view = board.view(now);
      renderer.print_categories(
        &mut out,
        &view.categories,
        view.all_count
      )?;
    }
    | BoardCommand::Stats => {
      renderer
        .print_stats(&mut out, &board.view(now))?;
    }
  }

  drop(out);
  report(renderer, board.take_notices())
}

/// Prints success notices and turns the first error notice into the
/// command's error.
fn report(
  renderer: &Renderer,
  notices: Vec<Notice>
) -> anyhow::Result<()> {
  let (errors, successes): (
    Vec<Notice>,
    Vec<Notice>
  ) = notices
    .into_iter()
    .partition(Notice::is_error);

  renderer.print_notices(
    io::stdout().lock(),
    &successes
  )?;

  match errors.first() {
    | Some(notice) => {
      Err(anyhow!(
        "{}",
        notice.message()
      ))
    }
    | None => Ok(())
  }
}
