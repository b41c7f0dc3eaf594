//! Canonicalization of IPv4 delegation blocks.
//!
//! IPv4 delegations are expressed as a start address and an address count,
//! and that count need not be a power of two. This module splits such a
//! block into the minimal ascending sequence of aligned CIDR prefixes that
//! covers it exactly.
use std::fmt;
use crate::ip::{AddressFamily, IpPrefix, IpPrefixError};


//------------ Fragment ------------------------------------------------------

/// One canonical prefix cut from a delegated block, together with the
/// number of addresses of the block it accounts for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Fragment {
    prefix: IpPrefix,
    used: u64
}

impl Fragment {
    pub fn prefix(&self) -> IpPrefix { self.prefix }

    /// Always `2^(32 - prefix length)`.
    pub fn used(&self) -> u64 { self.used }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (count {})", self.prefix, self.used)
    }
}


//------------ decompose -----------------------------------------------------

const IPV4_SPACE: u64 = 1 << 32;

/// Splits `[start, start + count)` into aligned power-of-two prefixes in
/// ascending address order.
///
/// Each step takes the largest block that both fits in the remaining count
/// and is aligned at the current address: the bit length of the remaining
/// count bounds it from above, the trailing zeros of the address bound it
/// from the alignment side.
///
/// The whole block is validated before anything is returned, so a caller
/// that only attaches after a successful return never ends up with a
/// partially inserted block.
pub fn decompose(start: u32, count: u64) -> Result<Vec<Fragment>, Error> {
    if count == 0 {
        return Err(Error::EmptyBlock(start.into()))
    }
    if u64::from(start) + count > IPV4_SPACE {
        return Err(Error::BeyondAddressSpace(start.into(), count))
    }

    let mut fragments = Vec::new();
    let mut addr = u64::from(start);
    let mut remaining = count;

    while remaining > 0 {
        let fit_bits = 63 - remaining.leading_zeros();
        let align_bits = addr.trailing_zeros().min(32);
        let host_bits = fit_bits.min(align_bits);
        let used = 1u64 << host_bits;

        let prefix = IpPrefix::new(
            AddressFamily::Ipv4,
            u128::from(addr),
            (32 - host_bits) as u8
        )?;
        fragments.push(Fragment { prefix, used });

        addr += used;
        remaining -= used;
    }

    Ok(fragments)
}


//------------ Error --------------------------------------------------------

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "empty address block at {}", _0)]
    EmptyBlock(::std::net::Ipv4Addr),

    #[display(fmt = "block of {} addresses at {} exceeds the IPv4 space", _1, _0)]
    BeyondAddressSpace(::std::net::Ipv4Addr, u64),

    #[display(fmt = "{}", _0)]
    InvalidPrefix(IpPrefixError),
}

impl From<IpPrefixError> for Error {
    fn from(e: IpPrefixError) -> Self { Error::InvalidPrefix(e) }
}


//------------ Tests --------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn addr(s: &str) -> u32 {
        u32::from(Ipv4Addr::from_str(s).unwrap())
    }

    fn show(fragments: &[Fragment]) -> Vec<String> {
        fragments.iter().map(|f| f.to_string()).collect()
    }

    /// Checks that the fragments cover the block exactly, ascending and
    /// aligned.
    fn assert_exact_cover(start: u32, count: u64) {
        let fragments = decompose(start, count).unwrap();
        let mut next = u64::from(start);
        for fragment in &fragments {
            let network = fragment.prefix().network() as u64;
            assert_eq!(next, network, "gap or overlap at {}", fragment);
            assert_eq!(0, network % fragment.used(), "misaligned {}", fragment);
            assert_eq!(
                u128::from(fragment.used()),
                fragment.prefix().size()
            );
            next += fragment.used();
        }
        assert_eq!(u64::from(start) + count, next);
    }

    #[test]
    fn should_keep_power_of_two_block() {
        let fragments = decompose(addr("10.0.0.0"), 4).unwrap();
        assert_eq!(vec!["10.0.0.0/30 (count 4)"], show(&fragments));
    }

    #[test]
    fn should_split_odd_count() {
        let fragments = decompose(addr("10.0.0.0"), 3).unwrap();
        assert_eq!(
            vec!["10.0.0.0/31 (count 2)", "10.0.0.2/32 (count 1)"],
            show(&fragments)
        );
    }

    #[test]
    fn should_accept_aligned_offset() {
        let fragments = decompose(addr("10.0.0.4"), 4).unwrap();
        assert_eq!(vec!["10.0.0.4/30 (count 4)"], show(&fragments));
    }

    #[test]
    fn should_split_misaligned_block() {
        // A /24 worth of addresses starting half way through a /24.
        let fragments = decompose(addr("192.0.2.128"), 256).unwrap();
        assert_eq!(
            vec![
                "192.0.2.128/25 (count 128)",
                "192.0.3.0/25 (count 128)",
            ],
            show(&fragments)
        );
    }

    #[test]
    fn should_split_typical_registry_block() {
        let fragments = decompose(addr("41.0.0.0"), 1536).unwrap();
        assert_eq!(
            vec!["41.0.0.0/22 (count 1024)", "41.0.4.0/23 (count 512)"],
            show(&fragments)
        );
    }

    #[test]
    fn should_handle_whole_space() {
        let fragments = decompose(0, 1 << 32).unwrap();
        assert_eq!(vec!["0.0.0.0/0 (count 4294967296)"], show(&fragments));

        let fragments = decompose(addr("255.255.255.255"), 1).unwrap();
        assert_eq!(vec!["255.255.255.255/32 (count 1)"], show(&fragments));
    }

    #[test]
    fn should_reject_invalid_blocks() {
        assert!(decompose(addr("10.0.0.0"), 0).is_err());
        assert!(decompose(addr("255.255.255.255"), 2).is_err());
        assert!(decompose(0, (1 << 32) + 1).is_err());
    }

    #[test]
    fn should_cover_exactly() {
        let starts = [
            "0.0.0.0", "10.0.0.0", "10.0.0.1", "10.0.0.3", "10.0.0.6",
            "172.16.5.7", "192.0.2.255", "255.255.0.0",
        ];
        let counts = [1, 2, 3, 5, 7, 8, 255, 256, 257, 1000, 1536, 65535];
        for start in starts.iter() {
            for count in counts.iter() {
                assert_exact_cover(addr(start), *count);
            }
        }
    }

    #[test]
    fn should_use_minimal_fragments() {
        // Aligned power-of-two counts never need more than one prefix.
        for bits in 0..=24 {
            let count = 1u64 << bits;
            let fragments = decompose(addr("10.0.0.0"), count).unwrap();
            assert_eq!(1, fragments.len());
        }
    }
}
