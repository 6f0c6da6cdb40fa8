//! Line commands read from stdin.

use std::path::Path;

use anyhow::bail;
use chrono::Utc;
use scan_core::{JobId, JobKind, Msg};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dispatch(Msg),
    List,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  web <url>        start a web scan
  doc <file>       start a document scan
  cancel <job-id>  cancel a running scan
  dismiss <job-id> remove a row
  list             show all tracked scans
  quit";

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "web" => Command::Dispatch(Msg::SubmitRequested {
            kind: JobKind::Web,
            subject_label: rest.to_string(),
            payload: String::new(),
            now: Utc::now(),
        }),
        "doc" | "document" => {
            let path = Path::new(rest);
            let label = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| rest.to_string());
            Command::Dispatch(Msg::SubmitRequested {
                kind: JobKind::Document,
                subject_label: label,
                payload: rest.to_string(),
                now: Utc::now(),
            })
        }
        "cancel" => Command::Dispatch(Msg::CancelRequested {
            job_id: job_id_arg(verb, rest)?,
        }),
        "dismiss" => Command::Dispatch(Msg::Dismissed {
            job_id: job_id_arg(verb, rest)?,
        }),
        "list" | "ls" => Command::List,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command {other:?}; type `help`"),
    };
    Ok(Some(command))
}

fn job_id_arg(verb: &str, rest: &str) -> anyhow::Result<JobId> {
    if rest.is_empty() {
        bail!("{verb} needs a job id");
    }
    Ok(JobId::from(rest))
}
