//! Component command handlers.

use tabled::Tabled;

use devconsole_core::{ComponentItem, Session};

use crate::cli::{ComponentsArgs, ComponentsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(super) struct ComponentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Origin")]
    origin: String,
    #[tabled(rename = "Actions")]
    actions: String,
}

impl ComponentRow {
    pub(super) fn new(c: &ComponentItem, color: bool) -> Self {
        Self {
            name: c.name.clone(),
            version: c.version.clone(),
            status: output::paint_status(&c.status, color),
            origin: c.origin.clone(),
            actions: actions(c),
        }
    }
}

fn actions(c: &ComponentItem) -> String {
    match (c.can_start, c.can_stop) {
        (true, true) => "start, stop".into(),
        (true, false) => "start".into(),
        (false, true) => "stop".into(),
        (false, false) => "-".into(),
    }
}

pub(super) fn detail(c: &ComponentItem, color: bool) -> String {
    [
        format!("Name:    {}", c.name),
        format!("Version: {}", if c.version.is_empty() { "-" } else { &c.version }),
        format!("Status:  {}", output::paint_status(&c.status, color)),
        format!("Origin:  {}", if c.origin.is_empty() { "-" } else { &c.origin }),
        format!("Actions: {}", actions(c)),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: ComponentsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        ComponentsCommand::List => {
            let mut components = session.component_list().await?;
            components.sort_by(|a, b| a.name.cmp(&b.name));
            let out = output::render_list(global.output, &components, |c| ComponentRow::new(c, color))?;
            output::print_output(&out, global.quiet);
        }
        ComponentsCommand::Get { name } => {
            let component = session.component(&name).await?;
            let out = output::render_single(global.output, &component, |c| detail(c, color))?;
            output::print_output(&out, global.quiet);
        }
        ComponentsCommand::Start { name } => {
            session.start_component(&name).await?;
            acknowledge(global, &format!("start requested for {name}"));
        }
        ComponentsCommand::Stop { name } => {
            session.stop_component(&name).await?;
            acknowledge(global, &format!("stop requested for {name}"));
        }
        ComponentsCommand::Reinstall { name } => {
            session.reinstall_component(&name).await?;
            acknowledge(global, &format!("reinstall requested for {name}"));
        }
    }
    Ok(())
}

/// Confirmation for commands with nothing to render.
pub(super) fn acknowledge(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("✓ {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_reflect_lifecycle_flags() {
        let item = ComponentItem {
            name: "main".into(),
            can_stop: true,
            ..ComponentItem::default()
        };
        assert_eq!(actions(&item), "stop");
        assert!(detail(&item, false).contains("Version: -"));
    }
}
