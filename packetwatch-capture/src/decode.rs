//! Frame decoding.
//!
//! Turns a frame into a [`RawPacket`] with etherparse, starting at the layer
//! the frame's [`LinkType`] says it begins with. Only the fields the feature
//! extractor and the published records need are kept.

use std::net::IpAddr;

use etherparse::{EtherType, LinkSlice, NetSlice, SlicedPacket, TransportSlice};

use crate::error::CaptureError;
use crate::packet::{Frame, LinkType, RawPacket};

/// Address family word in front of BSD loopback packets.
const NULL_HEADER_LEN: usize = 4;

fn slice(frame: &Frame) -> Result<SlicedPacket<'_>, CaptureError> {
    let data = &frame.data[..];
    let sliced = match frame.link {
        LinkType::Ethernet => SlicedPacket::from_ethernet(data),
        LinkType::RawIp => SlicedPacket::from_ip(data),
        LinkType::LinuxSll => SlicedPacket::from_linux_sll(data),
        LinkType::Null => {
            let ip = data.get(NULL_HEADER_LEN..).ok_or_else(|| {
                CaptureError::Decode(format!("loopback frame of {} bytes", data.len()))
            })?;
            SlicedPacket::from_ip(ip)
        }
    };
    sliced.map_err(|e| CaptureError::Decode(e.to_string()))
}

/// Decodes one frame. Fails only when the link or network headers are
/// malformed; missing upper layers leave their fields at zero.
pub fn decode(frame: &Frame) -> Result<RawPacket, CaptureError> {
    let sliced = slice(frame)?;

    let mut packet = RawPacket::bare(frame.wire_length, frame.timestamp_seconds);
    let mut protocol = match &sliced.link {
        Some(LinkSlice::Ethernet2(eth)) if eth.ether_type() == EtherType::ARP => "ARP",
        Some(LinkSlice::LinuxSll(_)) => "SLL",
        Some(_) => "ETH",
        None => "UNKNOWN",
    };

    match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            packet.source_address = Some(IpAddr::V4(header.source_addr()));
            packet.dest_address = Some(IpAddr::V4(header.destination_addr()));
            protocol = "IPv4";
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            packet.source_address = Some(IpAddr::V6(header.source_addr()));
            packet.dest_address = Some(IpAddr::V6(header.destination_addr()));
            protocol = "IPv6";
        }
        _ => {}
    }

    match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            packet.syn = tcp.syn();
            packet.ack = tcp.ack();
            packet.fin = tcp.fin();
            packet.psh = tcp.psh();
            packet.rst = tcp.rst();
            packet.urg = tcp.urg();
            // data offset counts 32-bit words
            packet.transport_header_length = u32::from(tcp.data_offset()) * 4;
            protocol = "TCP";
        }
        Some(TransportSlice::Udp(_)) => protocol = "UDP",
        Some(TransportSlice::Icmpv4(_)) => protocol = "ICMP",
        Some(TransportSlice::Icmpv6(_)) => protocol = "ICMPv6",
        _ => {}
    }

    packet.protocol = protocol.to_string();
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;
    use std::net::Ipv4Addr;

    const SRC_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];
    const DST_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x02];

    fn tcp_frame(syn: bool, ack: bool, payload: &[u8]) -> Frame {
        let mut builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(40000, 443, 1, 64240);
        if syn {
            builder = builder.syn();
        }
        if ack {
            builder = builder.ack(1);
        }
        let mut data = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut data, payload).unwrap();
        Frame::new(data, 1_700_000_000.25)
    }

    #[test]
    fn decodes_tcp_flags_and_addresses() {
        let frame = tcp_frame(true, true, b"hello");
        let packet = decode(&frame).unwrap();

        assert_eq!(packet.protocol, "TCP");
        assert!(packet.syn && packet.ack);
        assert!(!packet.fin && !packet.psh && !packet.rst && !packet.urg);
        assert_eq!(packet.transport_header_length, 20);
        assert_eq!(packet.length, frame.data.len() as u32);
        assert_eq!(packet.timestamp_seconds, 1_700_000_000.25);
        assert_eq!(
            packet.source_address,
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
        );
        assert_eq!(
            packet.dest_address,
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
        );
    }

    #[test]
    fn udp_has_no_tcp_fields() {
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4([192, 168, 1, 10], [192, 168, 1, 1], 64)
            .udp(5353, 53);
        let mut data = Vec::new();
        builder.write(&mut data, b"q").unwrap();

        let packet = decode(&Frame::new(data, 0.0)).unwrap();
        assert_eq!(packet.protocol, "UDP");
        assert!(!packet.syn && !packet.ack);
        assert_eq!(packet.transport_header_length, 0);
    }

    #[test]
    fn wire_length_wins_over_captured_length() {
        let mut frame = tcp_frame(false, false, &[0u8; 32]);
        frame.wire_length = 1514;
        assert_eq!(decode(&frame).unwrap().length, 1514);
    }

    /// IPv4/TCP SYN with no link header.
    fn ip_syn() -> Vec<u8> {
        let builder = PacketBuilder::ipv4([10, 8, 0, 2], [10, 8, 0, 1], 64)
            .tcp(51000, 22, 7, 64240)
            .syn();
        let mut data = Vec::new();
        builder.write(&mut data, b"").unwrap();
        data
    }

    fn assert_syn_from_tunnel(packet: &RawPacket) {
        assert_eq!(packet.protocol, "TCP");
        assert!(packet.syn && !packet.ack);
        assert_eq!(packet.transport_header_length, 20);
        assert_eq!(
            packet.source_address,
            Some(IpAddr::V4(Ipv4Addr::new(10, 8, 0, 2)))
        );
    }

    #[test]
    fn raw_ip_frames_skip_the_link_layer() {
        let frame = Frame::new(ip_syn(), 0.0).with_link(LinkType::RawIp);
        assert_syn_from_tunnel(&decode(&frame).unwrap());
    }

    #[test]
    fn raw_ip_read_as_ethernet_loses_the_tcp_layer() {
        let packet = decode(&Frame::new(ip_syn(), 0.0)).unwrap();
        assert_ne!(packet.protocol, "TCP");
        assert!(!packet.syn);
    }

    #[test]
    fn null_loopback_frames() {
        // AF_INET in host byte order
        let mut data = 2u32.to_ne_bytes().to_vec();
        data.extend(ip_syn());
        let frame = Frame::new(data, 0.0).with_link(LinkType::Null);
        let packet = decode(&frame).unwrap();
        assert_syn_from_tunnel(&packet);
        assert_eq!(packet.length, frame.data.len() as u32);

        let short = Frame::new(vec![2, 0], 0.0).with_link(LinkType::Null);
        assert!(matches!(decode(&short), Err(CaptureError::Decode(_))));
    }

    #[test]
    fn linux_cooked_frames() {
        // packet type, ARPHRD_ETHER, address length, address, protocol
        let mut data = vec![0, 0, 0, 1, 0, 6];
        data.extend([0x02, 0, 0, 0, 0, 0x01, 0, 0]);
        data.extend(0x0800u16.to_be_bytes());
        data.extend(ip_syn());
        let frame = Frame::new(data, 0.0).with_link(LinkType::LinuxSll);
        assert_syn_from_tunnel(&decode(&frame).unwrap());
    }

    #[test]
    fn truncated_frame_is_a_decode_error() {
        let frame = tcp_frame(true, false, b"");
        let truncated = Frame::new(frame.data.slice(0..20), 0.0);
        assert!(matches!(decode(&truncated), Err(CaptureError::Decode(_))));
    }
}
