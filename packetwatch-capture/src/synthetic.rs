//! Seeded synthetic traffic.
//!
//! Produces Ethernet/IPv4 frames with a mix of plain data segments, handshake
//! segments and UDP datagrams, at a steady rate. Useful for demos and soak
//! runs on hosts where live capture needs privileges the process lacks.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use etherparse::PacketBuilder;
use packetwatch_config::CaptureConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::capture::{CaptureBackend, FrameRead, PacketSource};
use crate::error::CaptureError;
use crate::packet::Frame;

pub const SYNTHETIC_INTERFACE: &str = "synthetic0";

/// Generator backend. Every open starts a fresh stream from the same seed.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    seed: u64,
    frame_interval: Duration,
}

impl SyntheticBackend {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            frame_interval: Duration::from_millis(20),
        }
    }

    /// Gap between generated frames.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }
}

impl CaptureBackend for SyntheticBackend {
    fn interface_names(&self) -> Result<Vec<String>, CaptureError> {
        Ok(vec![SYNTHETIC_INTERFACE.to_string()])
    }

    fn open(
        &self,
        interface: &str,
        config: &CaptureConfig,
    ) -> Result<Box<dyn PacketSource>, CaptureError> {
        info!(interface, seed = self.seed, "synthetic traffic started");
        Ok(Box::new(SyntheticSource {
            rng: StdRng::seed_from_u64(self.seed),
            frame_interval: self
                .frame_interval
                .min(Duration::from_millis(u64::from(config.read_timeout_ms))),
        }))
    }
}

struct SyntheticSource {
    rng: StdRng,
    frame_interval: Duration,
}

impl SyntheticSource {
    fn build_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
        let host = self.rng.random_range(2..250u8);
        let payload_len = self.rng.random_range(0..1400usize);
        let payload = vec![0u8; payload_len];
        let src_port = self.rng.random_range(32768..61000u16);

        let base = PacketBuilder::ethernet2([0x02, 0, 0, 0, 0, host], [0x02, 0, 0, 0, 0, 1])
            .ipv4([192, 168, 1, host], [192, 168, 1, 1], 64);

        let mut data = Vec::new();
        let written = if self.rng.random_bool(0.15) {
            let builder = base.udp(src_port, 53);
            data.reserve(builder.size(payload.len()));
            builder.write(&mut data, &payload)
        } else {
            let mut builder = base.tcp(src_port, 443, self.rng.random(), 64240);
            if self.rng.random_bool(0.2) {
                builder = builder.syn();
            }
            if self.rng.random_bool(0.7) {
                builder = builder.ack(self.rng.random());
            }
            if self.rng.random_bool(0.3) {
                builder = builder.psh();
            }
            if self.rng.random_bool(0.05) {
                builder = builder.fin();
            }
            data.reserve(builder.size(payload.len()));
            builder.write(&mut data, &payload)
        };
        written.map_err(|e| CaptureError::Read(e.to_string()))?;
        Ok(data)
    }
}

impl PacketSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<FrameRead, CaptureError> {
        thread::sleep(self.frame_interval);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Ok(FrameRead::Frame(Frame::new(self.build_frame()?, now)))
    }
}
