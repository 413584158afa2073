//! Trusted proxy handling
//!
//! Forwarding headers are only believed when the direct peer is inside one
//! of the configured ranges.

use crate::{Error, Result};
use axum::http::HeaderMap;
use std::net::IpAddr;
use std::str::FromStr;

/// Headers consulted for the original client address, in order
pub const REMOTE_IP_HEADERS: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

/// An IP network in CIDR notation; a bare address is a single-host range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    network: IpAddr,
    prefix: u8,
}

impl IpRange {
    /// Whether `ip` falls inside this range
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl FromStr for IpRange {
    type Err = Error;

    fn from_str(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let (addr, prefix) = match entry.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (entry, None),
        };

        let network: IpAddr = addr
            .parse()
            .map_err(|e: std::net::AddrParseError| Error::invalid_proxy(entry, e.to_string().as_str()))?;
        let max = if network.is_ipv4() { 32 } else { 128 };

        let prefix = match prefix {
            Some(raw) => raw
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| Error::invalid_proxy(entry, "prefix length out of range"))?,
            None => max,
        };

        Ok(Self { network, prefix })
    }
}

/// Set of peers whose forwarding headers are trusted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies {
    ranges: Vec<IpRange>,
}

impl TrustedProxies {
    /// Parse every entry; the first invalid one rejects the whole set
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let ranges = entries
            .iter()
            .map(|entry| entry.as_ref().parse())
            .collect::<Result<Vec<IpRange>>>()?;
        Ok(Self { ranges })
    }

    /// Trust nobody
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether `ip` is a trusted proxy
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.ranges.iter().any(|range| range.contains(ip))
    }

    /// Number of configured ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no range is configured
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Resolve the client address for a request arriving from `remote`.
    ///
    /// When the peer is trusted, forwarding headers are walked right to left
    /// and the first hop that is not itself a trusted proxy wins.
    pub fn client_ip(&self, remote: Option<IpAddr>, headers: &HeaderMap) -> Option<IpAddr> {
        let remote = remote?;
        if !self.contains(remote) {
            return Some(remote);
        }

        for name in REMOTE_IP_HEADERS {
            let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
                continue;
            };
            if let Some(ip) = self.forwarded_client(value) {
                return Some(ip);
            }
        }

        Some(remote)
    }

    fn forwarded_client(&self, header: &str) -> Option<IpAddr> {
        let hops: Vec<&str> = header.split(',').map(str::trim).collect();
        for (i, hop) in hops.iter().enumerate().rev() {
            let ip: IpAddr = hop.parse().ok()?;
            if i == 0 || !self.contains(ip) {
                return Some(ip);
            }
        }
        None
    }
}
