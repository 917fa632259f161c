//! packetwatch‑capture
//!
//! Packet acquisition for Packetwatch: interface selection, capture sessions
//! over pluggable backends (live pcap, pcap file replay, synthetic traffic)
//! and decoding of raw frames into [`RawPacket`]s.

pub mod capture;
pub mod decode;
pub mod error;
pub mod interface;
pub mod packet;
pub mod pcap_backend;
pub mod synthetic;

pub use capture::{CaptureBackend, CaptureSession, CapturedBatch, CloseHandle, FrameRead, PacketSource};
pub use error::CaptureError;
pub use interface::{InterfaceDescriptor, InterfaceSelector, InterfaceSource, SelectError, SystemInterfaces};
pub use packet::{Frame, LinkType, RawPacket};
pub use pcap_backend::{PcapBackend, PcapFileBackend};
pub use synthetic::{SyntheticBackend, SYNTHETIC_INTERFACE};
