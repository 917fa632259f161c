//! Capture interface selection.
//!
//! Picks the interface to sniff on by intersecting the interfaces the OS
//! reports as up with the names the capture backend understands (which on
//! Windows are friendly aliases such as `Ethernet` or `Wi-Fi`), then scoring
//! the matches so physical NICs beat loopback and pseudo devices.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::capture::CaptureBackend;
use crate::error::CaptureError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("No active network interface found")]
    NoInterfaceFound,
}

/// A scored capture candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub is_up: bool,
    pub score: i32,
}

/// The two interface lists selection works from.
pub trait InterfaceSource: Send + Sync {
    /// Names of interfaces the OS reports as up, in OS order.
    fn up_interfaces(&self) -> Vec<String>;

    /// Names the capture backend can open, in backend order.
    fn backend_interfaces(&self) -> Result<Vec<String>, CaptureError>;
}

/// OS flags from `pnet`, names from the capture backend.
pub struct SystemInterfaces {
    backend: Arc<dyn CaptureBackend>,
}

impl SystemInterfaces {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self { backend }
    }
}

impl InterfaceSource for SystemInterfaces {
    fn up_interfaces(&self) -> Vec<String> {
        pnet::datalink::interfaces()
            .into_iter()
            .filter(|iface| iface.is_up())
            .map(|iface| iface.name)
            .collect()
    }

    fn backend_interfaces(&self) -> Result<Vec<String>, CaptureError> {
        self.backend.interface_names()
    }
}

const PSEUDO_MARKERS: [&str; 3] = ["loopback", "loop", "pseudo"];
const WIRELESS_MARKERS: [&str; 4] = ["wi", "wireless", "wifi", "wlan"];
const WIRED_MARKERS: [&str; 6] = ["eth", "ethernet", "local area connection", "enp", "eno", "ens"];

/// Ranks an interface name: wired 4, wireless 3, anything else 2,
/// loopback or pseudo 0.
pub fn score_name(name: &str) -> i32 {
    let name = name.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| name.contains(m));
    if has(&PSEUDO_MARKERS) {
        0
    } else if has(&WIRELESS_MARKERS) {
        3
    } else if has(&WIRED_MARKERS) {
        4
    } else {
        2
    }
}

fn is_pseudo(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("loop") || name.contains("pseudo") || name == "lo"
}

/// Lowercased name without its trailing unit number (`eth0` -> `eth`).
fn stem(name: &str) -> String {
    name.trim_end_matches(|c: char| c.is_ascii_digit())
        .to_lowercase()
}

/// True when an OS name and a backend name refer to the same device.
fn names_match(os_name: &str, backend_name: &str) -> bool {
    let os = os_name.to_lowercase();
    let backend = backend_name.to_lowercase();
    if os == backend || backend.contains(&os) || os.contains(&backend) {
        return true;
    }
    let os_stem = stem(os_name);
    !os_stem.is_empty() && backend.contains(&os_stem)
}

pub struct InterfaceSelector<S: InterfaceSource + ?Sized> {
    source: Arc<S>,
}

impl<S: InterfaceSource + ?Sized> InterfaceSelector<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Every OS/backend match with its score, in first-seen order.
    pub fn candidates(&self) -> Vec<InterfaceDescriptor> {
        let up = self.source.up_interfaces();
        let known = self.source.backend_interfaces().unwrap_or_else(|e| {
            warn!(error = %e, "capture backend could not list interfaces");
            Vec::new()
        });

        let mut candidates = Vec::new();
        for os_name in &up {
            for backend_name in &known {
                if names_match(os_name, backend_name) {
                    candidates.push(InterfaceDescriptor {
                        name: backend_name.clone(),
                        is_up: true,
                        score: score_name(backend_name),
                    });
                }
            }
        }
        candidates
    }

    /// Highest-scoring match, earliest on ties. Without any match, the first
    /// up interface that is not loopback or pseudo.
    pub fn select_interface(&self) -> Result<InterfaceDescriptor, SelectError> {
        let mut best: Option<InterfaceDescriptor> = None;
        for candidate in self.candidates() {
            if best.as_ref().is_none_or(|b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }

        if let Some(best) = best {
            debug!(interface = %best.name, score = best.score, "interface selected");
            return Ok(best);
        }

        self.source
            .up_interfaces()
            .into_iter()
            .find(|name| !is_pseudo(name))
            .map(|name| {
                debug!(interface = %name, "no backend match, using first up interface");
                InterfaceDescriptor {
                    score: score_name(&name),
                    name,
                    is_up: true,
                }
            })
            .ok_or(SelectError::NoInterfaceFound)
    }
}
