#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use renderhost::{ProcessThread, RenderCallbacks, StereoBuffer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Setup(usize),
    Started(usize),
    Process(ProcessThread, usize),
    Ended(u64, usize),
}

/// Callbacks that log every invocation.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn setups(events: &[Event]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Setup(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// Process calls of one cycle's event slice, sorted by thread.
    pub fn process_threads(events: &[Event]) -> Vec<ProcessThread> {
        let mut threads: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Process(thread, _) => Some(*thread),
                _ => None,
            })
            .collect();
        threads.sort_by_key(|t| t.index());
        threads
    }
}

impl RenderCallbacks for Recorder {
    fn setup(&self, num_worker_threads: usize) {
        self.events.lock().unwrap().push(Event::Setup(num_worker_threads));
    }

    fn render_started(&self, num_frames: usize) {
        self.events.lock().unwrap().push(Event::Started(num_frames));
    }

    fn process(&self, thread: ProcessThread, num_frames: usize) {
        self.events.lock().unwrap().push(Event::Process(thread, num_frames));
    }

    fn render_ended(&self, output: &mut StereoBuffer<'_>, host_time: u64, num_frames: usize) {
        let (left, right) = output.channels_mut();
        left.iter_mut().for_each(|s| *s = 0.25);
        right.iter_mut().for_each(|s| *s = -0.25);
        self.events.lock().unwrap().push(Event::Ended(host_time, num_frames));
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn workers(indices: std::ops::Range<usize>) -> Vec<ProcessThread> {
    indices.map(ProcessThread::Worker).collect()
}
