//! Pub/sub handlers.

use devconsole_core::{CommunicationMessage, PubSubSource, Session};

use crate::cli::{GlobalOpts, PubsubArgs, PubsubCommand};
use crate::error::CliError;
use crate::output;

use super::components::acknowledge;
use super::util;

fn message_line(m: &CommunicationMessage) -> String {
    format!("{} {}", m.topic, m.payload)
}

pub async fn handle(session: &Session, args: PubsubArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        PubsubCommand::Subscribe { topic, source } => {
            let format = global.output;
            let quiet = global.quiet;
            let handle = session
                .subscribe_topic(PubSubSource::from(source), &topic, move |message| {
                    match output::render_event(format, message, message_line) {
                        Ok(text) => output::print_output(&text, quiet),
                        Err(e) => tracing::warn!(error = %e, "could not render message"),
                    }
                })
                .await?;

            tracing::info!(sub_id = handle.sub_id(), "subscribed, Ctrl-C to stop");
            let waited = util::until_interrupted(session).await;
            if session.state().is_open() {
                session.unsubscribe_topic(handle).await?;
            }
            waited
        }
        PubsubCommand::Publish {
            topic,
            payload,
            destination,
        } => {
            let destination = PubSubSource::from(destination);
            session.publish(destination, &topic, &payload).await?;
            acknowledge(global, &format!("published to {destination}:{topic}"));
            Ok(())
        }
    }
}
