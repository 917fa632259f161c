//! Per-packet feature extraction.
//!
//! The classifier was fit on flow statistics; live capture labels packets one
//! at a time, so every packet is treated as a flow of one. Size statistics
//! collapse to the packet length, timing statistics to zero.

use packetwatch_capture::RawPacket;
use serde::ser::{Serialize, SerializeMap, Serializer};

pub const FEATURE_COUNT: usize = 13;

/// Column order the scaler and model were fit with.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "pkt_size_min",
    "pkt_size_max",
    "pkt_size_mean",
    "pkt_size_std",
    "flow_duration",
    "flow_iat_mean",
    "flow_iat_std",
    "syn_flag_count",
    "ack_flag_count",
    "fin_flag_count",
    "psh_flag_count",
    "fwd_header_length",
    "bwd_header_length",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of the named feature, `None` for an unknown name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

// Serialized as `{name: value}` so published records are self-describing.
impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Stateless packet-to-features mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn extract(packet: &RawPacket) -> FeatureVector {
        let size = f64::from(packet.length);
        let flag = |set: bool| if set { 1.0 } else { 0.0 };
        let header = f64::from(packet.transport_header_length);

        FeatureVector([
            size,
            size,
            size,
            0.0,
            0.0,
            0.0,
            0.0,
            flag(packet.syn),
            flag(packet.ack),
            flag(packet.fin),
            flag(packet.psh),
            header,
            header,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn syn_ack_segment() {
        let mut packet = RawPacket::bare(60, 0.0);
        packet.syn = true;
        packet.ack = true;
        packet.transport_header_length = 20;
        packet.protocol = "TCP".into();

        let features = FeatureExtractor::extract(&packet);
        assert_eq!(
            features.as_slice(),
            &[60.0, 60.0, 60.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 20.0, 20.0]
        );
        assert_eq!(features.get("syn_flag_count"), Some(1.0));
        assert_eq!(features.get("bwd_header_length"), Some(20.0));
        assert_eq!(features.get("nope"), None);
    }

    #[test]
    fn missing_transport_zeroes_flags_and_headers() {
        let features = FeatureExtractor::extract(&RawPacket::bare(42, 1.5));
        assert!(features.as_slice()[3..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn serializes_by_name() {
        let features = FeatureExtractor::extract(&RawPacket::bare(10, 0.0));
        let json = serde_json::to_value(features).unwrap();
        assert_eq!(json["pkt_size_max"], 10.0);
        assert_eq!(json.as_object().unwrap().len(), FEATURE_COUNT);
    }

    proptest! {
        #[test]
        fn extraction_is_total(
            length in any::<u32>(),
            flags in any::<[bool; 6]>(),
            header in 0u32..=60,
            ts in 0.0f64..4e9,
        ) {
            let mut packet = RawPacket::bare(length, ts);
            packet.syn = flags[0];
            packet.ack = flags[1];
            packet.fin = flags[2];
            packet.psh = flags[3];
            packet.rst = flags[4];
            packet.urg = flags[5];
            packet.transport_header_length = header;

            let v = FeatureExtractor::extract(&packet);
            let v = v.as_slice();
            prop_assert_eq!(v.len(), FEATURE_COUNT);
            prop_assert!(v.iter().all(|x| x.is_finite()));
            prop_assert_eq!(v[0], f64::from(length));
            prop_assert_eq!(v[1], v[0]);
            prop_assert_eq!(v[2], v[0]);
            prop_assert!(v[3..7].iter().all(|x| *x == 0.0));
            prop_assert_eq!(v[7], if flags[0] { 1.0 } else { 0.0 });
            prop_assert_eq!(v[10], if flags[3] { 1.0 } else { 0.0 });
            prop_assert_eq!(v[11], v[12]);
        }
    }
}
