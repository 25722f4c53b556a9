//! Device details handler.

use devconsole_core::{DeviceDetails, Session};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn detail(d: &DeviceDetails) -> String {
    [
        format!("Thing:      {}", if d.thing_name.is_empty() { "-" } else { &d.thing_name }),
        format!("Registered: {}", if d.registered { "yes" } else { "no" }),
        format!("Version:    {}", d.version),
        format!("OS:         {}", d.os),
        format!("CPU:        {}", d.cpu),
        format!("Root:       {}", d.root_path),
        format!("Logs:       {}", d.log_store),
    ]
    .join("\n")
}

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let details = session.device_details().await?;
    let out = output::render_single(global.output, &details, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
