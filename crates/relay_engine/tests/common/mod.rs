#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use relay_engine::{
    Connector, ConnectorError, ConnectorParams, Destination, ProcessorConfig, SendError,
};

pub fn init_logging() {
    relay_logging::initialize_for_tests();
}

/// Short waits everywhere; a strictly increasing clock so every submission
/// gets a distinct id.
pub fn fast_config() -> ProcessorConfig {
    let ticks = Arc::new(AtomicU64::new(1_700_000_000_000));
    ProcessorConfig {
        send_delay: Duration::from_millis(2),
        error_backoff: Duration::from_millis(20),
        idle_wait: Duration::from_millis(50),
        capacity_poll: Duration::from_millis(5),
        driver_backoff: Duration::from_millis(20),
        clock: Arc::new(move || ticks.fetch_add(1, Ordering::SeqCst)),
        ..ProcessorConfig::default()
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub destination: String,
    pub text: String,
    pub mention: Option<String>,
}

/// The shared external channel behind every `ChatWindow`. Records what was
/// sent and notices if two sends ever overlap.
#[derive(Default)]
pub struct ChatSurface {
    in_send: AtomicBool,
    overlapped: AtomicBool,
    deliveries: Mutex<Vec<Delivery>>,
    failures_left: AtomicUsize,
    send_pause: Mutex<Duration>,
}

impl ChatSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_send_pause(pause: Duration) -> Arc<Self> {
        let surface = Self::default();
        *surface.send_pause.lock().unwrap() = pause;
        Arc::new(surface)
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn window(self: &Arc<Self>, identity: &str) -> Arc<ChatWindow> {
        Arc::new(ChatWindow {
            identity: identity.to_string(),
            surface: Arc::clone(self),
        })
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn texts_for(&self, identity: &str) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.destination == identity)
            .map(|d| d.text)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

pub struct ChatWindow {
    identity: String,
    surface: Arc<ChatSurface>,
}

impl Destination for ChatWindow {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn send(&self, text: &str, mention: Option<&str>) -> Result<(), SendError> {
        let surface = &self.surface;
        if surface.in_send.swap(true, Ordering::SeqCst) {
            surface.overlapped.store(true, Ordering::SeqCst);
        }
        let pause = *surface.send_pause.lock().unwrap();
        thread::sleep(pause);

        let failing = surface
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        let result = if failing {
            Err(SendError::rejected(&self.identity, "window not found"))
        } else {
            surface.deliveries.lock().unwrap().push(Delivery {
                destination: self.identity.clone(),
                text: text.to_string(),
                mention: mention.map(str::to_string),
            });
            Ok(())
        };
        surface.in_send.store(false, Ordering::SeqCst);
        result
    }
}

/// Connector driven by a closure, tracking how many calls overlap.
pub struct ScriptedConnector {
    script: Box<dyn Fn(&str) -> Result<String, ConnectorError> + Send + Sync>,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    pause: Duration,
}

impl ScriptedConnector {
    pub fn new(
        pause: Duration,
        script: impl Fn(&str) -> Result<String, ConnectorError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            pause,
        })
    }

    pub fn replying(prefix: &'static str) -> Arc<Self> {
        Self::new(Duration::ZERO, move |text| Ok(format!("{prefix}{text}")))
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn call(&self, text: &str, _params: &ConnectorParams) -> Result<String, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.pause);
        let result = (self.script)(text);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Connector whose calls block until the test hands out permits.
#[derive(Default)]
pub struct GatedConnector {
    started: Mutex<Vec<String>>,
    permits: Mutex<usize>,
    opened: Condvar,
    /// Texts that pass straight through without waiting.
    ungated: Mutex<Vec<String>>,
}

impl GatedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn let_through(&self, text: &str) {
        self.ungated.lock().unwrap().push(text.to_string());
    }

    pub fn release(&self, count: usize) {
        *self.permits.lock().unwrap() += count;
        self.opened.notify_all();
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl Connector for GatedConnector {
    fn call(&self, text: &str, _params: &ConnectorParams) -> Result<String, ConnectorError> {
        self.started.lock().unwrap().push(text.to_string());
        if !self.ungated.lock().unwrap().iter().any(|t| t == text) {
            let mut permits = self.permits.lock().unwrap();
            while *permits == 0 {
                permits = self.opened.wait(permits).unwrap();
            }
            *permits -= 1;
        }
        Ok(format!("re: {text}"))
    }
}
