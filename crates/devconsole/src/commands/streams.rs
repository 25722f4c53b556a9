//! Stream manager handlers.

use chrono::DateTime;
use tabled::Tabled;

use devconsole_core::{MessageStreamDefinition, MessageStreamInfo, ReadMessagesOptions, Session, StreamMessage};

use crate::cli::{GlobalOpts, StreamDefinitionArgs, StreamsArgs, StreamsCommand};
use crate::error::CliError;
use crate::output;

use super::components::acknowledge;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct StreamRow {
    #[tabled(rename = "Name")]
    name: String,
}

#[derive(Tabled)]
struct MessageRow {
    #[tabled(rename = "Seq")]
    sequence: String,
    #[tabled(rename = "Ingested")]
    ingested: String,
    #[tabled(rename = "Payload (base64)")]
    payload: String,
}

impl From<&StreamMessage> for MessageRow {
    fn from(m: &StreamMessage) -> Self {
        Self {
            sequence: m.sequence_number.map_or_else(|| "-".into(), |n| n.to_string()),
            ingested: m.ingest_time.map_or_else(|| "-".into(), format_millis),
            payload: m.payload.clone().unwrap_or_default(),
        }
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
}

fn optional(value: Option<i64>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn detail(info: &MessageStreamInfo) -> String {
    let d = &info.definition;
    let s = &info.storage_status;
    [
        format!("Name:         {}", d.name),
        format!("Max size:     {}", optional(d.max_size)),
        format!("Segment size: {}", optional(d.stream_segment_size)),
        format!("TTL (ms):     {}", optional(d.time_to_live_millis)),
        format!("On full:      {}", d.strategy_on_full),
        format!("Persistence:  {}", d.persistence),
        format!(
            "Flush:        {}",
            d.flush_on_write.map_or_else(|| "-".into(), |f| f.to_string())
        ),
        format!("Oldest seq:   {}", optional(s.oldest_sequence_number)),
        format!("Newest seq:   {}", optional(s.newest_sequence_number)),
        format!("Total bytes:  {}", optional(s.total_bytes)),
        format!("Exports:      {}", info.export_statuses.len()),
    ]
    .join("\n")
}

fn definition(args: StreamDefinitionArgs) -> MessageStreamDefinition {
    MessageStreamDefinition {
        max_size: args.max_size,
        stream_segment_size: args.segment_size,
        time_to_live_millis: args.ttl,
        strategy_on_full: args.strategy.into(),
        persistence: args.persistence.into(),
        flush_on_write: args.flush_on_write,
        ..MessageStreamDefinition::named(args.name)
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: StreamsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        StreamsCommand::List => {
            let mut names = session.list_streams().await?;
            names.sort();
            let out = output::render_list(global.output, &names, |n| StreamRow { name: n.clone() })?;
            output::print_output(&out, global.quiet);
        }
        StreamsCommand::Describe { name } => {
            let info = session.describe_stream(&name).await?;
            let out = output::render_single(global.output, &info, detail)?;
            output::print_output(&out, global.quiet);
        }
        StreamsCommand::Delete { name } => {
            session.delete_stream(&name).await?;
            acknowledge(global, &format!("stream {name} deleted"));
        }
        StreamsCommand::Read {
            name,
            start,
            min,
            max,
            read_timeout,
        } => {
            if min < 1 || max < min {
                return Err(CliError::Validation {
                    field: "min/max".into(),
                    reason: format!("need 1 <= min <= max, got min={min} max={max}"),
                });
            }
            let options = ReadMessagesOptions {
                desired_start_sequence_number: start,
                min_message_count: min,
                max_message_count: max,
                read_timeout_millis: read_timeout,
            };
            let messages = session.read_messages(&name, options).await?;
            let out = output::render_list(global.output, &messages, |m| MessageRow::from(m))?;
            output::print_output(&out, global.quiet);
        }
        StreamsCommand::Append { name, payload } => {
            session.append_message(&name, &payload).await?;
            acknowledge(global, &format!("appended to {name}"));
        }
        StreamsCommand::Create(args) => {
            let def = definition(args);
            session.create_stream(&def).await?;
            acknowledge(global, &format!("stream {} created", def.name));
        }
        StreamsCommand::Update(args) => {
            let def = definition(args);
            session.update_stream(&def).await?;
            acknowledge(global, &format!("stream {} updated", def.name));
        }
    }
    Ok(())
}
