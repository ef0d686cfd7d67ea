//! Packet types and header parsing
//!
//! The classifier works on raw Ethernet frames. Parsing extracts a flat
//! header view (no copies, no allocation) that match rules select fields
//! from. A frame that fails parsing is not an error at the API level:
//! the engine steers it to the ingress interface's error class.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ethertype for IPv4
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// Ethertype for 802.1Q VLAN tagging
pub const ETHERTYPE_VLAN: u16 = 0x8100;
/// IP protocol number for TCP
pub const IPPROTO_TCP: u8 = 6;
/// IP protocol number for UDP
pub const IPPROTO_UDP: u8 = 17;

const ETH_HDR_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const IPV4_MIN_HDR_LEN: usize = 20;
const TCP_MIN_HDR_LEN: usize = 20;
const UDP_HDR_LEN: usize = 8;

/// Logical ingress interface identifier
///
/// Interned from interface names by the classifier; stable for the life
/// of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct InterfaceId(pub u32);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

/// A packet handle: the raw frame plus the interface it arrived on
///
/// Classification never mutates the frame. `Bytes` keeps queue handoff
/// to a refcount bump instead of a copy.
#[derive(Debug, Clone)]
pub struct RawPacket {
    /// Ingress interface
    pub iface: InterfaceId,
    /// Full frame, starting at the Ethernet header
    pub data: Bytes,
}

impl RawPacket {
    /// Wrap a frame received on `iface`
    pub fn new(iface: InterfaceId, data: impl Into<Bytes>) -> Self {
        Self {
            iface,
            data: data.into(),
        }
    }

    /// Frame length in bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-length frame
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// UDP payload of the frame, if it parses as UDP
    pub fn udp_payload(&self) -> Option<&[u8]> {
        let headers = parse_headers(&self.data).ok()?;
        if headers.protocol != Some(IPPROTO_UDP) {
            return None;
        }
        self.data.get(headers.payload_offset?..)
    }
}

/// Packet field a match rule can select on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    /// Ethertype after any VLAN tag
    EthType,
    /// 802.1Q VLAN identifier
    VlanId,
    /// IP protocol number
    IpProto,
    /// IPv4 source address
    Ipv4Src,
    /// IPv4 destination address
    Ipv4Dst,
    /// UDP source port
    UdpSrcPort,
    /// UDP destination port
    UdpDstPort,
    /// TCP source port
    TcpSrcPort,
    /// TCP destination port
    TcpDstPort,
}

impl MatchField {
    /// Fixed bit width of the field's value and mask
    pub const fn width_bits(self) -> u32 {
        match self {
            MatchField::EthType => 16,
            MatchField::VlanId => 12,
            MatchField::IpProto => 8,
            MatchField::Ipv4Src | MatchField::Ipv4Dst => 32,
            MatchField::UdpSrcPort
            | MatchField::UdpDstPort
            | MatchField::TcpSrcPort
            | MatchField::TcpDstPort => 16,
        }
    }

    /// All-ones mask at the field's width
    pub const fn full_mask(self) -> u64 {
        (1u64 << self.width_bits()) - 1
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchField::EthType => "eth_type",
            MatchField::VlanId => "vlan_id",
            MatchField::IpProto => "ip_proto",
            MatchField::Ipv4Src => "ipv4_src",
            MatchField::Ipv4Dst => "ipv4_dst",
            MatchField::UdpSrcPort => "udp_src_port",
            MatchField::UdpDstPort => "udp_dst_port",
            MatchField::TcpSrcPort => "tcp_src_port",
            MatchField::TcpDstPort => "tcp_dst_port",
        };
        f.write_str(name)
    }
}

/// Flat header view of a parsed frame
///
/// Fields are `None` when the frame does not carry that protocol layer.
/// A non-IP frame parses successfully with only the L2 fields set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketHeaders {
    /// Ethertype of the innermost Ethernet header
    pub ethertype: u16,
    /// VLAN identifier when 802.1Q tagged
    pub vlan_id: Option<u16>,
    /// IPv4 source address
    pub src_ip: Option<u32>,
    /// IPv4 destination address
    pub dst_ip: Option<u32>,
    /// IP protocol number
    pub protocol: Option<u8>,
    /// L4 source port (TCP or UDP)
    pub src_port: Option<u16>,
    /// L4 destination port (TCP or UDP)
    pub dst_port: Option<u16>,
    /// Byte offset of the L4 payload into the frame
    pub payload_offset: Option<usize>,
}

impl PacketHeaders {
    /// Extract `field` from the parsed headers
    ///
    /// Returns `None` when the packet does not carry the field, which a
    /// rule treats as a non-match. Port fields are protocol-qualified:
    /// `UdpDstPort` never matches a TCP segment.
    #[inline]
    pub fn field(&self, field: MatchField) -> Option<u64> {
        match field {
            MatchField::EthType => Some(self.ethertype as u64),
            MatchField::VlanId => self.vlan_id.map(u64::from),
            MatchField::IpProto => self.protocol.map(u64::from),
            MatchField::Ipv4Src => self.src_ip.map(u64::from),
            MatchField::Ipv4Dst => self.dst_ip.map(u64::from),
            MatchField::UdpSrcPort => match self.protocol {
                Some(IPPROTO_UDP) => self.src_port.map(u64::from),
                _ => None,
            },
            MatchField::UdpDstPort => match self.protocol {
                Some(IPPROTO_UDP) => self.dst_port.map(u64::from),
                _ => None,
            },
            MatchField::TcpSrcPort => match self.protocol {
                Some(IPPROTO_TCP) => self.src_port.map(u64::from),
                _ => None,
            },
            MatchField::TcpDstPort => match self.protocol {
                Some(IPPROTO_TCP) => self.dst_port.map(u64::from),
                _ => None,
            },
        }
    }
}

/// Why a frame failed header parsing
///
/// Parse failures are routed to the error class, not surfaced as
/// classification errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Frame shorter than an Ethernet header
    #[error("frame shorter than an Ethernet header")]
    TruncatedEthernet,
    /// 802.1Q tag announced but cut off
    #[error("802.1Q tag truncated")]
    TruncatedVlan,
    /// IPv4 header truncated, wrong version, or bad IHL
    #[error("IPv4 header truncated or invalid")]
    BadIpv4Header,
    /// TCP or UDP header truncated or bad data offset
    #[error("L4 header truncated or invalid")]
    BadL4Header,
}

/// Parse the L2/L3/L4 headers of an Ethernet frame
///
/// Checks that each announced header fits inside the frame. Payload
/// truncation beyond the headers is not validated here.
pub fn parse_headers(data: &[u8]) -> Result<PacketHeaders, ParseError> {
    if data.len() < ETH_HDR_LEN {
        return Err(ParseError::TruncatedEthernet);
    }

    let mut ethertype = u16::from_be_bytes([data[12], data[13]]);
    let mut l3_offset = ETH_HDR_LEN;
    let mut vlan_id = None;

    if ethertype == ETHERTYPE_VLAN {
        if data.len() < ETH_HDR_LEN + VLAN_TAG_LEN {
            return Err(ParseError::TruncatedVlan);
        }
        vlan_id = Some(u16::from_be_bytes([data[14], data[15]]) & 0x0FFF);
        ethertype = u16::from_be_bytes([data[16], data[17]]);
        l3_offset += VLAN_TAG_LEN;
    }

    let mut headers = PacketHeaders {
        ethertype,
        vlan_id,
        ..Default::default()
    };

    if ethertype != ETHERTYPE_IPV4 {
        // Non-IP frames classify on L2 fields only
        return Ok(headers);
    }

    if data.len() < l3_offset + IPV4_MIN_HDR_LEN {
        return Err(ParseError::BadIpv4Header);
    }
    let ver_ihl = data[l3_offset];
    if ver_ihl >> 4 != 4 {
        return Err(ParseError::BadIpv4Header);
    }
    let ihl = ((ver_ihl & 0x0F) as usize) * 4;
    if ihl < IPV4_MIN_HDR_LEN || data.len() < l3_offset + ihl {
        return Err(ParseError::BadIpv4Header);
    }

    let protocol = data[l3_offset + 9];
    headers.protocol = Some(protocol);
    headers.src_ip = Some(u32::from_be_bytes([
        data[l3_offset + 12],
        data[l3_offset + 13],
        data[l3_offset + 14],
        data[l3_offset + 15],
    ]));
    headers.dst_ip = Some(u32::from_be_bytes([
        data[l3_offset + 16],
        data[l3_offset + 17],
        data[l3_offset + 18],
        data[l3_offset + 19],
    ]));

    let l4_offset = l3_offset + ihl;
    match protocol {
        IPPROTO_TCP => {
            if data.len() < l4_offset + TCP_MIN_HDR_LEN {
                return Err(ParseError::BadL4Header);
            }
            headers.src_port = Some(u16::from_be_bytes([data[l4_offset], data[l4_offset + 1]]));
            headers.dst_port = Some(u16::from_be_bytes([
                data[l4_offset + 2],
                data[l4_offset + 3],
            ]));
            let data_offset = ((data[l4_offset + 12] >> 4) as usize) * 4;
            if data_offset < TCP_MIN_HDR_LEN || data.len() < l4_offset + data_offset {
                return Err(ParseError::BadL4Header);
            }
            headers.payload_offset = Some(l4_offset + data_offset);
        }
        IPPROTO_UDP => {
            if data.len() < l4_offset + UDP_HDR_LEN {
                return Err(ParseError::BadL4Header);
            }
            headers.src_port = Some(u16::from_be_bytes([data[l4_offset], data[l4_offset + 1]]));
            headers.dst_port = Some(u16::from_be_bytes([
                data[l4_offset + 2],
                data[l4_offset + 3],
            ]));
            headers.payload_offset = Some(l4_offset + UDP_HDR_LEN);
        }
        _ => {
            headers.payload_offset = Some(l4_offset);
        }
    }

    Ok(headers)
}
