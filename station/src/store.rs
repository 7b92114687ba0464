use core::cell::Cell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use shared::{Measurement, NetworkStatus, TelemetryRecord, TelemetrySnapshot};

/// The current measurement and network status shared by all tasks.
///
/// This is shared memory with last-writer-wins semantics, not a queue: the acquisition task
/// overwrites the measurement, the network handler overwrites the status, and readers copy
/// out whatever is current. Every access holds the critical section over the whole snapshot,
/// so a reader never sees fields from two different cycles.
pub struct TelemetryStore {
    state: CriticalSectionMutex<Cell<TelemetrySnapshot>>,
}

impl TelemetryStore {
    pub const fn new() -> Self {
        Self {
            state: CriticalSectionMutex::new(Cell::new(TelemetrySnapshot {
                measurement: None,
                network: NetworkStatus {
                    connected: false,
                    ip: [0; 4],
                    mac: [0; 6],
                    rssi: 0,
                },
            })),
        }
    }

    /// Replaces all three measured quantities at once.
    pub fn publish(&self, measurement: Measurement) {
        self.state.lock(|c| {
            let mut s = c.get();
            s.measurement = Some(measurement);
            c.set(s);
        });
    }

    pub fn set_network(&self, network: NetworkStatus) {
        self.state.lock(|c| {
            let mut s = c.get();
            s.network = network;
            c.set(s);
        });
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.state.lock(|c| c.get())
    }

    pub fn measurement(&self) -> Option<Measurement> {
        self.state.lock(|c| c.get().measurement)
    }

    pub fn network(&self) -> NetworkStatus {
        self.state.lock(|c| c.get().network)
    }

    /// The record served to the query and upload collaborators.
    pub fn record(&self) -> TelemetryRecord {
        self.snapshot().record()
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}
