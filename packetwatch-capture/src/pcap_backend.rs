//! libpcap backends: live interfaces and saved capture files.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use packetwatch_config::CaptureConfig;
use pcap::{Activated, Active, Capture, Device, Offline};
use tracing::{debug, info};

use crate::capture::{CaptureBackend, FrameRead, PacketSource};
use crate::error::CaptureError;
use crate::packet::{Frame, LinkType};

/// Sleep between polls of a non-blocking handle.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

impl Frame {
    fn from_pcap(packet: &pcap::Packet<'_>, link: LinkType) -> Self {
        let ts = packet.header.ts;
        Frame {
            data: bytes::Bytes::copy_from_slice(packet.data),
            timestamp_seconds: ts.tv_sec as f64 + ts.tv_usec as f64 / 1_000_000.0,
            wire_length: packet.header.len,
            link,
        }
    }
}

/// Framing of an opened handle, or an open error for framings the decoder
/// does not understand.
fn link_type<T: Activated + ?Sized>(cap: &Capture<T>, interface: &str) -> Result<LinkType, CaptureError> {
    let datalink = cap.get_datalink();
    LinkType::from_dlt(datalink.0).ok_or_else(|| CaptureError::Open {
        interface: interface.to_string(),
        reason: format!(
            "unsupported datalink {}",
            datalink.get_name().unwrap_or_else(|_| datalink.0.to_string())
        ),
    })
}

/// Live capture through libpcap.
#[derive(Debug, Default, Clone, Copy)]
pub struct PcapBackend;

impl PcapBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for PcapBackend {
    fn interface_names(&self) -> Result<Vec<String>, CaptureError> {
        let devices = Device::list().map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        Ok(devices.into_iter().map(|d| d.name).collect())
    }

    fn open(
        &self,
        interface: &str,
        config: &CaptureConfig,
    ) -> Result<Box<dyn PacketSource>, CaptureError> {
        let open_error = |e: pcap::Error| CaptureError::Open {
            interface: interface.to_string(),
            reason: e.to_string(),
        };

        // Non-blocking handle: libpcap's own timeout does not fire on every
        // platform when the link is silent, so reads are bounded here.
        let mut cap = Capture::from_device(interface)
            .map_err(open_error)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen as i32)
            .timeout(config.read_timeout_ms as i32)
            .open()
            .map_err(open_error)?
            .setnonblock()
            .map_err(open_error)?;

        if let Some(filter) = &config.protocol_filter {
            cap.filter(filter, true).map_err(open_error)?;
            debug!(interface, filter = %filter, "capture filter installed");
        }

        let link = link_type(&cap, interface)?;
        info!(interface, promiscuous = config.promiscuous, ?link, "live capture opened");
        Ok(Box::new(LiveSource {
            cap,
            link,
            read_timeout: Duration::from_millis(u64::from(config.read_timeout_ms)),
        }))
    }
}

struct LiveSource {
    cap: Capture<Active>,
    link: LinkType,
    read_timeout: Duration,
}

impl PacketSource for LiveSource {
    fn next_frame(&mut self) -> Result<FrameRead, CaptureError> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            match self.cap.next_packet() {
                Ok(packet) => return Ok(FrameRead::Frame(Frame::from_pcap(&packet, self.link))),
                Err(pcap::Error::TimeoutExpired) => {
                    if Instant::now() >= deadline {
                        return Ok(FrameRead::Timeout);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(CaptureError::Read(e.to_string())),
            }
        }
    }
}

/// Replays a saved pcap file. Every interface name maps to the same file.
#[derive(Debug, Clone)]
pub struct PcapFileBackend {
    path: PathBuf,
}

impl PcapFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Name under which the file is listed as an interface.
    pub fn label(&self) -> String {
        self.path.display().to_string()
    }
}

impl CaptureBackend for PcapFileBackend {
    fn interface_names(&self) -> Result<Vec<String>, CaptureError> {
        Ok(vec![self.label()])
    }

    fn open(
        &self,
        _interface: &str,
        config: &CaptureConfig,
    ) -> Result<Box<dyn PacketSource>, CaptureError> {
        let open_error = |e: pcap::Error| CaptureError::Open {
            interface: self.label(),
            reason: e.to_string(),
        };

        let mut cap = Capture::from_file(&self.path).map_err(open_error)?;
        if let Some(filter) = &config.protocol_filter {
            cap.filter(filter, true).map_err(open_error)?;
        }

        let link = link_type(&cap, &self.label())?;
        info!(file = %self.path.display(), ?link, "replaying capture file");
        Ok(Box::new(FileSource { cap, link }))
    }
}

struct FileSource {
    cap: Capture<Offline>,
    link: LinkType,
}

impl PacketSource for FileSource {
    fn next_frame(&mut self) -> Result<FrameRead, CaptureError> {
        match self.cap.next_packet() {
            Ok(packet) => Ok(FrameRead::Frame(Frame::from_pcap(&packet, self.link))),
            Err(pcap::Error::NoMorePackets) => Ok(FrameRead::Exhausted),
            Err(e) => Err(CaptureError::Read(e.to_string())),
        }
    }
}
