//! In-memory transport that records every frame, for unit tests.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::connection::ConnectionId;
use crate::errors::TransportError;
use crate::transport::{Frame, Transport};

#[derive(Default)]
struct Slot {
    open: bool,
    frames: Vec<Frame>,
}

/// Transport double keeping per-connection outboxes.
#[derive(Default)]
pub struct RecordingTransport {
    slots: Mutex<BTreeMap<ConnectionId, Slot>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open connection.
    pub fn open(&self, id: &str) -> ConnectionId {
        let conn = ConnectionId::from(id);
        let _ = self.slots.lock().insert(
            conn.clone(),
            Slot {
                open: true,
                frames: Vec::new(),
            },
        );
        conn
    }

    pub fn raw_frames_for(&self, conn: &ConnectionId) -> Vec<Frame> {
        self.slots
            .lock()
            .get(conn)
            .map(|s| s.frames.clone())
            .unwrap_or_default()
    }

    pub fn frames_for(&self, conn: &ConnectionId) -> Vec<String> {
        self.raw_frames_for(conn)
            .iter()
            .map(|f| f.as_str().to_owned())
            .collect()
    }

    pub fn json_for(&self, conn: &ConnectionId) -> Vec<Value> {
        self.raw_frames_for(conn)
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    pub fn total_frames(&self) -> usize {
        self.slots.lock().values().map(|s| s.frames.len()).sum()
    }
}

impl Transport for RecordingTransport {
    fn send_to(&self, conn: &ConnectionId, frame: Frame) -> Result<(), TransportError> {
        let mut slots = self.slots.lock();
        match slots.get_mut(conn) {
            Some(slot) if slot.open => {
                slot.frames.push(frame);
                Ok(())
            }
            Some(_) => Err(TransportError::Closed(conn.to_string())),
            None => Err(TransportError::UnknownConnection(conn.to_string())),
        }
    }

    fn connections(&self) -> Vec<ConnectionId> {
        self.slots
            .lock()
            .iter()
            .filter(|(_, s)| s.open)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn is_open(&self, conn: &ConnectionId) -> bool {
        self.slots.lock().get(conn).is_some_and(|s| s.open)
    }

    fn close(&self, conn: &ConnectionId) {
        if let Some(slot) = self.slots.lock().get_mut(conn) {
            slot.open = false;
        }
    }
}
