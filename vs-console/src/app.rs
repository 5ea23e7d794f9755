//! Console shell for the trace timeline
//!
//! Owns the accumulated event list and bridges poller deliveries into the
//! timeline view. The interactive loop reads line commands mirroring the
//! service control surface: `reset`, `sim start`, `sim stop`, `quit`.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;

use crate::api::ApiClient;
use crate::poller::EventPoller;
use crate::timeline;
use trace_types::TraceEvent;

/// Merge a delivered batch into the held list. Events whose `id` is already
/// held are dropped; survivors are prepended in batch order, so a
/// newest-first batch keeps the list newest-first.
pub fn merge_events(held: &mut Vec<TraceEvent>, batch: Vec<TraceEvent>) {
    let seen: HashSet<String> = held.iter().map(|event| event.id.clone()).collect();
    let fresh: Vec<TraceEvent> = batch
        .into_iter()
        .filter(|event| !seen.contains(&event.id))
        .collect();
    held.splice(0..0, fresh);
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct ConsoleApp {
    client: Arc<ApiClient>,
    poller: EventPoller,
    events: Vec<TraceEvent>,
}

impl ConsoleApp {
    pub fn new(client: Arc<ApiClient>, poller: EventPoller) -> Self {
        Self {
            client,
            poller,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Merge one poller delivery into the held list.
    pub fn ingest_batch(&mut self, batch: Vec<TraceEvent>) {
        merge_events(&mut self.events, batch);
    }

    /// Reset server-side state, then clear the held list and the poll floor
    /// regardless of the server call outcome. A failed call is only logged;
    /// there is no transactional grouping of the three steps.
    pub async fn reset(&mut self) {
        if let Err(err) = self.client.reset_system().await {
            tracing::warn!(error = %err, "Reset request failed");
        }
        self.events.clear();
        self.poller.reset();
    }

    /// Ask the server to start the simulated stream. No local state change;
    /// resulting events arrive through polling.
    pub async fn start_sim(&self) {
        if let Err(err) = self.client.start_sim().await {
            tracing::warn!(error = %err, "Sim start request failed");
        }
    }

    /// Ask the server to stop a running simulation.
    pub async fn stop_sim(&self) {
        if let Err(err) = self.client.stop_sim().await {
            tracing::warn!(error = %err, "Sim stop request failed");
        }
    }

    /// Full frame: the header block followed by the timeline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(&mut out, "Team Assistant - VS Console");
        let _ = writeln!(&mut out, "commands: reset | sim start | sim stop | quit");
        let _ = writeln!(&mut out);
        out.push_str(&timeline::render_timeline(&self.events));
        out
    }

    fn redraw(&self) {
        // ANSI clear + cursor home, then the whole frame.
        print!("\x1b[2J\x1b[H{}", self.render());
        let _ = std::io::Write::flush(&mut std::io::stdout());
    }

    async fn handle_command(&mut self, command: &str) -> Flow {
        match command {
            "" => Flow::Continue,
            "quit" | "q" => Flow::Quit,
            "reset" => {
                self.reset().await;
                self.redraw();
                Flow::Continue
            }
            "sim start" => {
                self.start_sim().await;
                Flow::Continue
            }
            "sim stop" => {
                self.stop_sim().await;
                Flow::Continue
            }
            other => {
                tracing::info!(command = %other, "Unknown command");
                Flow::Continue
            }
        }
    }

    /// Run until `quit`, Ctrl-C, or stdin closes. Polling starts on entry
    /// and is stopped on every exit path; it never outlives the shell.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let Some(mut sub) = self.poller.start() else {
            anyhow::bail!("poller is already running");
        };
        self.redraw();

        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                batch = sub.recv() => match batch {
                    Some(batch) => {
                        self.ingest_batch(batch);
                        self.redraw();
                    }
                    None => break,
                },
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if self.handle_command(line.trim()).await == Flow::Quit {
                            break;
                        }
                    }
                    None => break,
                },
                _ = &mut ctrl_c => break,
            }
        }

        self.poller.stop();
        Ok(())
    }
}
