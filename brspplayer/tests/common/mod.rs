//! Doublures de test : plateforme audio et visualiseur enregistrant les appels

#![allow(dead_code)]

use async_trait::async_trait;
use brspplayer::{
    AudioHandle, AudioPlatform, BackendError, BackendKind, EndedSignal, OutputNode,
    PlayerStatus, VisualizerSink,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

/// How a handle opened for a given source behaves
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    /// `open_*` itself fails
    FailOpen,
    /// Opens, then reports an error instead of readiness
    FailReady,
    /// Never signals anything
    Hang,
    /// Becomes ready once notified
    Gate(Arc<Notify>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Buffered,
    Element,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Buffered => "buffered",
            Mode::Element => "element",
        }
    }
}

#[derive(Default)]
pub struct MockPlatform {
    behaviors: Mutex<HashMap<(Mode, String), Behavior>>,
    log: Arc<Mutex<Vec<String>>>,
    next_node: AtomicU64,
    ended: Mutex<Vec<EndedSignal>>,
    suspended: AtomicBool,
    resumes: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, mode: Mode, src: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert((mode, src.to_string()), behavior);
    }

    /// Every native path fails for `src`
    pub fn fail_everywhere(&self, src: &str) {
        self.set(Mode::Buffered, src, Behavior::FailOpen);
        self.set(Mode::Element, src, Behavior::FailReady);
    }

    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.log().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.log().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Position of the first entry equal to `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.log().iter().position(|e| e == entry)
    }

    pub fn position_prefix(&self, prefix: &str) -> Option<usize> {
        self.log().iter().position(|e| e.starts_with(prefix))
    }

    /// Ended callback of the most recently opened handle
    pub fn last_ended(&self) -> EndedSignal {
        self.ended
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no handle opened")
    }

    /// Polls the log until `entry` shows up
    pub async fn wait_for(&self, entry: &str) {
        for _ in 0..200 {
            if self.position(entry).is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("'{entry}' never logged, log = {:?}", self.log());
    }

    fn behavior(&self, mode: Mode, src: &str) -> Behavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(&(mode, src.to_string()))
            .cloned()
            .unwrap_or(Behavior::Succeed)
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn open(
        &self,
        mode: Mode,
        src: &str,
        ended: EndedSignal,
    ) -> Result<Box<dyn AudioHandle>, BackendError> {
        self.record(format!("open:{}:{}", mode.as_str(), src));
        let behavior = self.behavior(mode, src);

        if let Behavior::FailOpen = behavior {
            let kind = match mode {
                Mode::Buffered => BackendKind::Buffered,
                Mode::Element => BackendKind::Streaming,
            };
            return Err(BackendError::decode(kind, src, "unsupported format"));
        }

        self.ended.lock().unwrap().push(ended);
        Ok(Box::new(MockHandle {
            label: format!("{}:{}", mode.as_str(), src),
            behavior,
            log: self.log.clone(),
            node: self.next_node.fetch_add(1, Ordering::SeqCst),
            released: false,
        }))
    }
}

#[async_trait]
impl AudioPlatform for MockPlatform {
    async fn open_buffered(
        &self,
        url: &str,
        ended: EndedSignal,
    ) -> Result<Box<dyn AudioHandle>, BackendError> {
        self.open(Mode::Buffered, url, ended)
    }

    async fn open_element(
        &self,
        src: &str,
        ended: EndedSignal,
    ) -> Result<Box<dyn AudioHandle>, BackendError> {
        self.open(Mode::Element, src, ended)
    }

    fn output_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    async fn resume_output(&self) -> Result<(), BackendError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct MockHandle {
    label: String,
    behavior: Behavior,
    log: Arc<Mutex<Vec<String>>>,
    node: u64,
    released: bool,
}

impl MockHandle {
    fn record(&self, action: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", action, self.label));
    }
}

#[async_trait]
impl AudioHandle for MockHandle {
    async fn ready(&mut self) -> Result<(), BackendError> {
        match self.behavior.clone() {
            Behavior::Succeed | Behavior::FailOpen => Ok(()),
            Behavior::FailReady => Err(BackendError::platform(format!(
                "media error on {}",
                self.label
            ))),
            Behavior::Hang => std::future::pending().await,
            Behavior::Gate(gate) => {
                gate.notified().await;
                Ok(())
            }
        }
    }

    async fn play(&mut self) -> Result<(), BackendError> {
        self.record("play");
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), BackendError> {
        self.record("pause");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), BackendError> {
        self.record("stop");
        Ok(())
    }

    async fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.record("release");
        }
    }

    fn output(&self) -> OutputNode {
        OutputNode(self.node)
    }
}

#[derive(Default)]
pub struct MockVisualizer {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockVisualizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl VisualizerSink for MockVisualizer {
    fn connect(&self, _node: &OutputNode) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn disconnect(&self, _node: &OutputNode) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Statuses received so far, without waiting
pub fn drain(rx: &mut broadcast::Receiver<PlayerStatus>) -> Vec<PlayerStatus> {
    let mut statuses = Vec::new();
    while let Ok(status) = rx.try_recv() {
        statuses.push(status);
    }
    statuses
}
