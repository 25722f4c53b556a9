//! Streaming handlers: print every push until interrupted, then leave the
//! channel.

use std::collections::BTreeMap;

use owo_colors::OwoColorize;

use devconsole_core::{ComponentItem, DependencyGraph, LogEntry, LogLevel, Session};

use crate::cli::{GlobalOpts, WatchArgs, WatchCommand};
use crate::error::CliError;
use crate::output;

use super::components::ComponentRow;
use super::util;

pub async fn handle(session: &Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let format = global.output;
    let quiet = global.quiet;
    let color = output::should_color(global.color);

    let subscription = match args.command {
        WatchCommand::Components => {
            session
                .subscribe_component_list(move |list| {
                    let mut list = list.to_vec();
                    list.sort_by(|a, b| a.name.cmp(&b.name));
                    emit(
                        output::render_list(format, &list, |c| ComponentRow::new(c, color)),
                        quiet,
                    );
                })
                .await?
        }
        WatchCommand::Graph => {
            session
                .subscribe_dependency_graph(move |graph| {
                    emit(output::render_single(format, graph, render_graph), quiet);
                })
                .await?
        }
        WatchCommand::Component { name } => {
            session
                .subscribe_component(&name, move |item| {
                    emit(output::render_event(format, item, |c| status_line(c, color)), quiet);
                })
                .await?
        }
        WatchCommand::Logs { name, level } => {
            let floor = LogLevel::from(level);
            session
                .subscribe_component_logs(&name, move |entry| {
                    if entry.level >= floor {
                        emit(output::render_event(format, entry, |e| log_line(e, color)), quiet);
                    }
                })
                .await?
        }
    };

    tracing::info!(channel = %subscription.channel(), "watching, Ctrl-C to stop");
    let waited = util::until_interrupted(session).await;
    if session.state().is_open() {
        session.unsubscribe(subscription).await?;
    }
    waited
}

fn emit(rendered: Result<String, CliError>, quiet: bool) {
    match rendered {
        Ok(text) => output::print_output(&text, quiet),
        Err(e) => tracing::warn!(error = %e, "could not render push"),
    }
}

fn status_line(c: &ComponentItem, color: bool) -> String {
    format!("{} {}", c.name, output::paint_status(&c.status, color))
}

fn log_line(e: &LogEntry, color: bool) -> String {
    let level = format!("{:<5}", e.level.to_string());
    let level = if color {
        match e.level {
            LogLevel::Error => level.red().to_string(),
            LogLevel::Warn => level.yellow().to_string(),
            LogLevel::Info => level.green().to_string(),
            _ => level.dimmed().to_string(),
        }
    } else {
        level
    };
    format!("{level} {}", e.log)
}

/// One line per component: its dependencies, hard ones marked with `!`.
fn render_graph(graph: &DependencyGraph) -> String {
    let sorted: BTreeMap<_, _> = graph.iter().collect();
    sorted
        .into_iter()
        .map(|(name, deps)| {
            if deps.is_empty() {
                return name.clone();
            }
            let deps: Vec<String> = deps
                .iter()
                .map(|d| if d.hard { format!("{}!", d.name) } else { d.name.clone() })
                .collect();
            format!("{name} -> {}", deps.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use devconsole_core::Dependency;

    #[test]
    fn graph_lines_mark_hard_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.insert(
            "main".into(),
            vec![
                Dependency {
                    name: "nucleus".into(),
                    hard: true,
                },
                Dependency {
                    name: "logger".into(),
                    hard: false,
                },
            ],
        );
        graph.insert("logger".into(), Vec::new());

        assert_eq!(render_graph(&graph), "logger\nmain -> nucleus!, logger");
    }

    #[test]
    fn log_line_without_color() {
        let entry = LogEntry {
            name: "main".into(),
            level: LogLevel::Warn,
            log: "disk almost full".into(),
        };
        assert_eq!(log_line(&entry, false), "WARN  disk almost full");
    }
}
