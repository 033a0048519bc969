//! FTN-style address handling.
//!
//! Addresses look like `20000:20000/1234@wwivnet` or `1:369/23.5@fidonet`:
//! zone, net, node, an optional point, and the network domain. A peer may
//! advertise several addresses in one space-separated list; a node number
//! is only meaningful within a named domain.

use std::fmt;

/// Address parse errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    /// The address did not match `zone:net/node[.point][@domain]`.
    #[error("malformed address {0:?}")]
    Malformed(String),
}

/// A parsed `zone:net/node[.point][@domain]` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtnAddress {
    /// Zone number.
    pub zone: u16,
    /// Net number.
    pub net: u16,
    /// Node number within the net.
    pub node: u16,
    /// Optional point under the node.
    pub point: Option<u16>,
    /// Network domain, when given.
    pub domain: Option<String>,
}

impl FtnAddress {
    /// Parse a single textual address.
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let malformed = || AddressError::Malformed(text.to_string());

        let (body, domain) = match text.split_once('@') {
            Some((body, domain)) if !domain.is_empty() => (body, Some(domain.to_string())),
            Some(_) => return Err(malformed()),
            None => (text, None),
        };

        let (zone, rest) = body.split_once(':').ok_or_else(malformed)?;
        let (net, node_part) = rest.split_once('/').ok_or_else(malformed)?;
        let (node, point) = match node_part.split_once('.') {
            Some((node, point)) => (node, Some(point)),
            None => (node_part, None),
        };

        let parse_u16 = |s: &str| s.parse::<u16>().map_err(|_| malformed());
        Ok(Self {
            zone: parse_u16(zone)?,
            net: parse_u16(net)?,
            node: parse_u16(node)?,
            point: point.map(parse_u16).transpose()?,
            domain,
        })
    }
}

impl fmt::Display for FtnAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.zone, self.net, self.node)?;
        if let Some(point) = self.point {
            write!(f, ".{point}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "@{domain}")?;
        }
        Ok(())
    }
}

/// Find the node number advertised for `network_name` in a space-separated
/// address list. Tokens that do not parse, or whose domain does not match,
/// are skipped.
pub fn node_from_address_list(list: &str, network_name: &str) -> Option<u16> {
    list.split_whitespace()
        .filter_map(|token| FtnAddress::parse(token).ok())
        .find(|addr| addr.domain.as_deref() == Some(network_name))
        .map(|addr| addr.node)
}

/// The network name of a single address: the part after `@`.
pub fn network_name_from_single_address(address: &str) -> Option<String> {
    FtnAddress::parse(address).ok()?.domain
}
