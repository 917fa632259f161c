//! Packet types produced by capture.

use std::net::IpAddr;

use bytes::Bytes;
use serde::Serialize;

/// Link-layer framing of a capture source, from its libpcap datalink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkType {
    #[default]
    Ethernet,
    /// Bare IPv4/IPv6 with no link header (tun, wg, ppp).
    RawIp,
    /// Linux cooked capture, used by the `any` device.
    LinuxSll,
    /// BSD loopback: a 4 byte address family before the IP header.
    Null,
}

impl LinkType {
    /// Maps a libpcap `DLT_*` value. `None` for framings that cannot be
    /// decoded.
    pub fn from_dlt(dlt: i32) -> Option<Self> {
        match dlt {
            1 => Some(LinkType::Ethernet),
            // DLT_RAW differs between platforms; 228/229 are IPv4/IPv6 only.
            12 | 14 | 101 | 228 | 229 => Some(LinkType::RawIp),
            113 => Some(LinkType::LinuxSll),
            0 | 108 => Some(LinkType::Null),
            _ => None,
        }
    }
}

/// One undecoded frame as handed over by a backend.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Bytes,
    /// Capture time, seconds since the Unix epoch.
    pub timestamp_seconds: f64,
    /// Length on the wire; `data` may be shorter when truncated by snaplen.
    pub wire_length: u32,
    pub link: LinkType,
}

impl Frame {
    /// Creates an Ethernet frame whose wire length equals the captured length.
    pub fn new(data: impl Into<Bytes>, timestamp_seconds: f64) -> Self {
        let data = data.into();
        Frame {
            wire_length: data.len() as u32,
            data,
            timestamp_seconds,
            link: LinkType::Ethernet,
        }
    }

    pub fn with_link(mut self, link: LinkType) -> Self {
        self.link = link;
        self
    }
}

/// A decoded packet. Layers that were absent resolve to zero or `None` here,
/// once, so no consumer re-interprets the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPacket {
    pub length: u32,
    pub timestamp_seconds: f64,
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
    pub psh: bool,
    pub rst: bool,
    pub urg: bool,
    pub transport_header_length: u32,
    /// Highest decoded layer, e.g. `TCP`, `UDP`, `ARP`.
    pub protocol: String,
    pub source_address: Option<IpAddr>,
    pub dest_address: Option<IpAddr>,
}

impl RawPacket {
    /// A packet with only a length and timestamp, every other field absent.
    pub fn bare(length: u32, timestamp_seconds: f64) -> Self {
        RawPacket {
            length,
            timestamp_seconds,
            syn: false,
            ack: false,
            fin: false,
            psh: false,
            rst: false,
            urg: false,
            transport_header_length: 0,
            protocol: "UNKNOWN".to_string(),
            source_address: None,
            dest_address: None,
        }
    }
}
