//! Command dispatch: bridges CLI args -> session calls -> output formatting.

pub mod components;
pub mod config_cmd;
pub mod device;
pub mod pubsub;
pub mod streams;
pub mod util;
pub mod watch;

use devconsole_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Ping(args) => {
            let answer = session.ping(&args.message).await?;
            let text = output::render_single(global.output, &answer, |a| {
                if a.as_bool() == Some(true) {
                    "pong".into()
                } else {
                    a.to_string()
                }
            })?;
            output::print_output(&text, global.quiet);
            Ok(())
        }
        Command::Device => device::handle(session, global).await,
        Command::Components(args) => components::handle(session, args, global).await,
        Command::Config(args) => config_cmd::handle(session, args, global).await,
        Command::Watch(args) => watch::handle(session, args, global).await,
        Command::Pubsub(args) => pubsub::handle(session, args, global).await,
        Command::Streams(args) => streams::handle(session, args, global).await,
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated without a session".into(),
        )),
    }
}
