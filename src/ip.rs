//! IP address families and prefixes.
//!
//! Addresses of both families are kept as right aligned `u128` values, so
//! that the IPv4 and IPv6 tries can share one prefix type.
use std::fmt;
use std::net::{AddrParseError, Ipv4Addr, Ipv6Addr};
use std::num::ParseIntError;
use std::str::FromStr;


//------------ AddressFamily -------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AddressFamily {
    Ipv4,
    Ipv6
}

impl AddressFamily {
    /// The number of bits in an address of this family.
    pub fn bits(self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128
        }
    }

    /// Parses an address of this family into its right aligned value.
    pub fn parse_address(self, s: &str) -> Result<u128, IpPrefixError> {
        match self {
            AddressFamily::Ipv4 => {
                let addr = Ipv4Addr::from_str(s)?;
                Ok(u128::from(u32::from(addr)))
            }
            AddressFamily::Ipv6 => {
                let addr = Ipv6Addr::from_str(s)?;
                Ok(u128::from(addr))
            }
        }
    }

    /// Formats a right aligned address value of this family.
    pub fn format_address(self, value: u128) -> String {
        match self {
            AddressFamily::Ipv4 => Ipv4Addr::from(value as u32).to_string(),
            AddressFamily::Ipv6 => Ipv6Addr::from(value).to_string()
        }
    }

    fn max_address(self) -> u128 {
        match self {
            AddressFamily::Ipv4 => u128::from(::std::u32::MAX),
            AddressFamily::Ipv6 => ::std::u128::MAX
        }
    }
}

impl FromStr for AddressFamily {
    type Err = IpPrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ipv4" => Ok(AddressFamily::Ipv4),
            "ipv6" => Ok(AddressFamily::Ipv6),
            f => Err(IpPrefixError::UnknownFamily(f.to_string()))
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6")
        }
    }
}


//------------ IpPrefix ------------------------------------------------------

/// A canonical CIDR prefix: no bits are set beyond the prefix length.
///
/// Prefixes of one family order by network address first and length
/// second, which is exactly the pre-order of a binary trie that visits the
/// 0-branch before the 1-branch.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct IpPrefix {
    family: AddressFamily,
    network: u128,
    length: u8
}

impl IpPrefix {
    pub fn new(
        family: AddressFamily,
        network: u128,
        length: u8
    ) -> Result<Self, IpPrefixError> {
        if length > family.bits() {
            return Err(IpPrefixError::LengthOutOfRange(family, length))
        }
        if network > family.max_address() {
            return Err(IpPrefixError::AddressOutOfRange(family))
        }
        if network & host_mask(family, length) != 0 {
            return Err(IpPrefixError::HostBitsSet(
                family.format_address(network), length
            ))
        }
        Ok(IpPrefix { family, network, length })
    }

    pub fn family(&self) -> AddressFamily { self.family }
    pub fn network(&self) -> u128 { self.network }
    pub fn length(&self) -> u8 { self.length }

    /// Returns the key bit at `pos`, counting from the most significant
    /// bit of the address.
    pub fn bit(&self, pos: u8) -> usize {
        let shift = self.family.bits() - 1 - pos;
        ((self.network >> shift) & 1) as usize
    }

    pub fn network_str(&self) -> String {
        self.family.format_address(self.network)
    }
}

/// Mask of the bits that must be zero in a network address with the given
/// prefix length.
fn host_mask(family: AddressFamily, length: u8) -> u128 {
    let free = family.bits() - length;
    if free >= 128 {
        ::std::u128::MAX
    } else {
        (1u128 << free) - 1
    }
}

impl FromStr for IpPrefix {
    type Err = IpPrefixError;

    /// Expects "address/length".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let addr_str = parts.next().ok_or(IpPrefixError::MissingLength)?;
        let len_str = parts.next().ok_or(IpPrefixError::MissingLength)?;

        let family = if addr_str.contains(':') {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Ipv4
        };
        let network = family.parse_address(addr_str)?;
        let length = u8::from_str(len_str)?;
        IpPrefix::new(family, network, length)
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.network_str(), self.length)
    }
}


//------------ IpPrefixError -------------------------------------------------

#[derive(Debug, Display)]
pub enum IpPrefixError {
    #[display(fmt = "unknown address family: {}", _0)]
    UnknownFamily(String),

    #[display(fmt = "cannot parse address: {}", _0)]
    ParseError(String),

    #[display(fmt = "prefix length missing")]
    MissingLength,

    #[display(fmt = "prefix length {} out of range for {}", _1, _0)]
    LengthOutOfRange(AddressFamily, u8),

    #[display(fmt = "address out of range for {}", _0)]
    AddressOutOfRange(AddressFamily),

    #[display(fmt = "host bits set in {}/{}", _0, _1)]
    HostBitsSet(String, u8),
}

impl From<AddrParseError> for IpPrefixError {
    fn from(e: AddrParseError) -> Self {
        IpPrefixError::ParseError(e.to_string())
    }
}

impl From<ParseIntError> for IpPrefixError {
    fn from(e: ParseIntError) -> Self {
        IpPrefixError::ParseError(e.to_string())
    }
}


//------------ Tests --------------------------------------------------------
