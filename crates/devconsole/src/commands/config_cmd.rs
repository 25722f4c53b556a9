//! Component configuration handlers.

use devconsole_core::Session;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::components::acknowledge;
use super::util;

pub async fn handle(session: &Session, args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Get { name } => {
            let yaml = session.component_config(&name).await?;
            let out = match global.output {
                // the backend already answers in YAML
                OutputFormat::Table | OutputFormat::Yaml => yaml.trim_end().to_owned(),
                format => {
                    let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).map_err(|e| CliError::UnexpectedResponse {
                        call: "getConfig".into(),
                        payload: e.to_string(),
                    })?;
                    output::render_single(format, &parsed, |_| String::new())?
                }
            };
            output::print_output(&out, global.quiet);
        }
        ConfigCommand::Update { name, file } => {
            let yaml = util::read_text(&file)?;
            util::validate_yaml("file", &yaml)?;
            session.update_config(&name, &yaml).await?;
            acknowledge(global, &format!("configuration of {name} updated"));
        }
    }
    Ok(())
}
