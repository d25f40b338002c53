use std::{ops::Range, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    load_settings, presenter::Body, DragEnd, FetchCompletion, Frame, HttpListApi,
    ListController, ListPresenter, ListSnapshot, PersistenceMode, Viewport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{parse_command, Command, HELP};

#[derive(Parser, Debug)]
#[command(about = "Browse a remote list with search, multi-select and manual ordering")]
struct Args {
    /// Overrides the resolved API root, e.g. http://localhost:5000/api
    #[arg(long)]
    api_base_url: Option<String>,
    /// fire-and-forget | coalescing
    #[arg(long)]
    persistence: Option<PersistenceMode>,
    #[arg(long)]
    restore_sort_order: bool,
    /// Rows shown per screen.
    #[arg(long, default_value_t = 15)]
    rows: usize,
}

enum Event {
    Fetched(FetchCompletion),
    Input(Option<String>),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.api_base_url {
        settings.api_base_url = Some(url);
    }
    if let Some(mode) = args.persistence {
        settings.persistence = mode;
    }
    if args.restore_sort_order {
        settings.restore_sort_order = true;
    }

    let base_url = settings.api_base_url()?;
    let api = HttpListApi::with_timeout(&base_url, settings.request_timeout())
        .context("failed to build list api client")?;
    tracing::info!(base_url = %base_url, persistence = ?settings.persistence, "starting list browser");

    let mut controller = ListController::from_settings(Arc::new(api), &settings);
    let mut presenter = ListPresenter::default();
    let mut viewport = Viewport::new(args.rows);

    controller.initialize().await;
    println!("{HELP}\n");
    redraw(&mut controller, &mut presenter, &viewport, false);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let mut user_scrolled = false;
        let event = tokio::select! {
            completion = controller.next_completion() => Event::Fetched(completion),
            line = lines.next_line() => Event::Input(line.context("failed to read stdin")?),
        };

        match event {
            Event::Fetched(completion) => {
                controller.apply_completion(completion);
            }
            Event::Input(None) => break,
            Event::Input(Some(line)) => {
                let snapshot = controller.snapshot();
                match parse_command(&line, viewport.height) {
                    Command::Quit => break,
                    Command::Help => println!("{HELP}"),
                    Command::Render => user_scrolled = true,
                    Command::Search(term) => {
                        viewport.reset();
                        controller.dispatch(presenter.search(&term));
                    }
                    Command::Toggle(row) => match presenter.toggle(row, &snapshot) {
                        Some(intent) => controller.dispatch(intent),
                        None => println!("no row {}", row + 1),
                    },
                    Command::Move { from, to } => {
                        if let Some(intent) = presenter.drag_end(DragEnd {
                            source: from,
                            destination: Some(to),
                        }) {
                            controller.dispatch(intent);
                        }
                    }
                    Command::Scroll(delta) => {
                        viewport.scroll_by(delta, snapshot.items.len());
                        user_scrolled = true;
                    }
                    Command::Invalid(message) => println!("{message}"),
                }
            }
        }

        redraw(&mut controller, &mut presenter, &viewport, user_scrolled);
    }

    presenter.detach();
    Ok(())
}

/// Renders the current snapshot and fires `LoadMore` when the last row is on
/// screen. After a failed fetch only a user scroll or redraw asks again.
fn redraw(
    controller: &mut ListController,
    presenter: &mut ListPresenter,
    viewport: &Viewport,
    user_scrolled: bool,
) {
    let snapshot = controller.snapshot();
    let frame = presenter.render(&snapshot);
    let visible = viewport.visible_range(snapshot.items.len());
    print_frame(&snapshot, &frame, visible.clone());

    let intent = if user_scrolled {
        presenter.scrolled(visible, &snapshot)
    } else {
        presenter.viewport_changed(visible, &snapshot)
    };
    if let Some(intent) = intent {
        controller.dispatch(intent);
    }
}

fn print_frame(snapshot: &ListSnapshot, frame: &Frame, visible: Range<usize>) {
    if snapshot.search_term.is_empty() {
        println!("── all items");
    } else {
        println!("── search: {:?}", snapshot.search_term);
    }

    match &frame.body {
        Body::Placeholder(text) => println!("   {text}"),
        Body::Rows(rows) => {
            for row in &rows[visible.clone()] {
                let mark = if row.selected { "x" } else { " " };
                println!("{:>5} [{mark}] ≡ {}", row.index + 1, row.value);
            }
            if visible.end < rows.len() {
                println!("      … {} more loaded below", rows.len() - visible.end);
            }
        }
    }

    if frame.loading {
        println!("      loading…");
    }
    if let Some(err) = &snapshot.last_error {
        println!("      last request failed: {err}");
    }
    println!("{}", frame.status_line);
}
