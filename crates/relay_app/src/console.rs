//! Console chat surface: stdin lines become inbound messages, replies are
//! printed to stdout.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use relay_engine::{
    ConnectorRegistry, Destination, EchoConnector, InboundMessage, Processor, RetryingConnector,
    SendError, Submission,
};
use relay_logging::{relay_error, relay_info, relay_warn};

use crate::config::{AppConfig, AppError};

/// Destination used for lines without a `who:` prefix.
pub(crate) const CONSOLE_DESTINATION: &str = "console";

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Status,
    Logs(Option<usize>),
    Clear,
    Stop,
    Start,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    Empty,
    Command(Command),
    Message {
        destination: String,
        sender: Option<String>,
        text: String,
    },
}

pub(crate) fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if let Some(command) = line.strip_prefix('/') {
        return Input::Command(parse_command(command));
    }

    if let Some((who, text)) = line.split_once(':') {
        let who = who.trim();
        let text = text.trim();
        if !who.is_empty() && !text.is_empty() && !who.contains(char::is_whitespace) {
            return Input::Message {
                destination: who.to_string(),
                sender: Some(who.to_string()),
                text: text.to_string(),
            };
        }
    }
    Input::Message {
        destination: CONSOLE_DESTINATION.to_string(),
        sender: None,
        text: line.to_string(),
    }
}

fn parse_command(command: &str) -> Command {
    let mut words = command.split_whitespace();
    match (words.next().unwrap_or_default(), words.next()) {
        ("status", None) => Command::Status,
        ("logs", None) => Command::Logs(None),
        ("logs", Some(count)) => match count.parse() {
            Ok(count) => Command::Logs(Some(count)),
            Err(_) => Command::Unknown(command.to_string()),
        },
        ("clear", None) => Command::Clear,
        ("stop", None) => Command::Stop,
        ("start", None) => Command::Start,
        ("quit" | "exit", None) => Command::Quit,
        _ => Command::Unknown(command.to_string()),
    }
}

pub(crate) fn format_reply(identity: &str, text: &str, mention: Option<&str>) -> String {
    match mention {
        Some(who) => format!("[{identity}] @{who}: {text}"),
        None => format!("[{identity}] {text}"),
    }
}

/// One named conversation printed to a shared writer.
pub(crate) struct ConsoleWindow<W> {
    identity: String,
    out: Arc<Mutex<W>>,
}

impl<W: Write + Send> ConsoleWindow<W> {
    pub fn new(identity: impl Into<String>, out: Arc<Mutex<W>>) -> Self {
        Self {
            identity: identity.into(),
            out,
        }
    }
}

impl<W: Write + Send> Destination for ConsoleWindow<W> {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn send(&self, text: &str, mention: Option<&str>) -> Result<(), SendError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| SendError::rejected(&self.identity, "console writer poisoned"))?;
        writeln!(out, "{}", format_reply(&self.identity, text, mention))
            .and_then(|()| out.flush())
            .map_err(|err| SendError::rejected(&self.identity, err.to_string()))
    }
}

/// Connector stack for the console: `echo` plus an echoing default, retried
/// on transient failures.
fn build_connector(config: &AppConfig) -> Arc<RetryingConnector> {
    let registry = ConnectorRegistry::new()
        .register("echo", Arc::new(EchoConnector::default()))
        .with_fallback(Arc::new(EchoConnector::new("echo: ")));
    relay_info!("connectors registered: {}", registry.platforms().join(", "));
    Arc::new(RetryingConnector::new(
        Arc::new(registry),
        config.retry_count,
        config.retry_pause(),
    ))
}

struct Console<W> {
    processor: Processor,
    config: AppConfig,
    out: Arc<Mutex<W>>,
    windows: HashMap<String, Arc<ConsoleWindow<W>>>,
}

impl<W: Write + Send + 'static> Console<W> {
    fn window(&mut self, identity: &str) -> Arc<ConsoleWindow<W>> {
        let out = &self.out;
        Arc::clone(
            self.windows
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(ConsoleWindow::new(identity, Arc::clone(out)))),
        )
    }

    fn print(&self, line: &str) -> io::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::other("console writer poisoned"))?;
        writeln!(out, "{line}")?;
        out.flush()
    }

    /// Handles one input line; returns false once the user asked to quit.
    fn handle(&mut self, line: &str) -> io::Result<bool> {
        match parse_line(line) {
            Input::Empty => {}
            Input::Message {
                destination,
                sender,
                text,
            } => {
                let params = self.config.params_for(&destination);
                let message = match sender {
                    Some(sender) => InboundMessage::from_sender(text, sender),
                    None => InboundMessage::new(text),
                };
                let window = self.window(&destination);
                if let Submission::Duplicate(id) =
                    self.processor.add_message(window, message, params, 0)
                {
                    self.print(&format!("(dropped duplicate {id})"))?;
                }
            }
            Input::Command(Command::Status) => {
                let status = self.processor.get_status();
                let pending = self.processor.pending_sends();
                self.print(&format!("{status} | pending sends: {pending}"))?;
            }
            Input::Command(Command::Logs(count)) => {
                for entry in self.processor.get_logs(count) {
                    self.print(&entry)?;
                }
            }
            Input::Command(Command::Clear) => {
                self.processor.clear_logs();
                self.print("logs cleared")?;
            }
            Input::Command(Command::Stop) => self.processor.stop(),
            Input::Command(Command::Start) => {
                if let Err(err) = self.processor.start() {
                    relay_error!("{err}");
                }
            }
            Input::Command(Command::Quit) => return Ok(false),
            Input::Command(Command::Unknown(command)) => {
                self.print(&format!(
                    "unknown command /{command} (try /status, /logs [n], /clear, /stop, /start, /quit)"
                ))?;
            }
        }
        Ok(true)
    }
}

/// Logs the processor status every `interval` while there is work pending.
fn spawn_status_ticker(
    processor: Processor,
    interval: Duration,
) -> (mpsc::Sender<()>, JoinHandle<()>) {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let handle = thread::spawn(move || loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let status = processor.get_status();
                if status.running && (!status.is_idle() || processor.pending_sends() > 0) {
                    relay_info!("{status}");
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    });
    (stop_tx, handle)
}

/// Waits for queued work to be delivered after stdin closes.
fn drain(processor: &Processor, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    let settled = || processor.get_status().is_idle() && processor.pending_sends() == 0;
    while Instant::now() < deadline {
        if settled() {
            // The sender may still hold the last segment it dequeued.
            thread::sleep(processor.config().send_delay + Duration::from_millis(100));
            if settled() {
                return;
            }
        }
        thread::sleep(Duration::from_millis(50));
    }
    relay_warn!("gave up waiting for pending replies after {:?}", timeout);
}

pub(crate) fn run(config: AppConfig) -> Result<(), AppError> {
    let connector = build_connector(&config);
    let processor = Processor::new(config.processor_config(), connector);
    processor.start()?;
    for route in &config.routes {
        relay_info!(
            "route {} -> {} ({})",
            route.destination,
            route.params.platform,
            route.params.name
        );
    }

    let (ticker_stop, ticker) = spawn_status_ticker(processor.clone(), config.status_interval());
    let mut console = Console {
        processor: processor.clone(),
        config,
        out: Arc::new(Mutex::new(io::stdout())),
        windows: HashMap::new(),
    };

    let mut quit = false;
    let result = (|| -> Result<(), AppError> {
        for line in io::stdin().lock().lines() {
            if !console.handle(&line?)? {
                quit = true;
                break;
            }
        }
        Ok(())
    })();

    if !quit && result.is_ok() {
        drain(&processor, DRAIN_TIMEOUT);
    }
    processor.stop();
    drop(ticker_stop);
    let _ = ticker.join();
    result
}
