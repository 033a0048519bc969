//! What we learn about the peer during a session.

use crate::address::node_from_address_list;

/// Peer-session information accumulated from M_NUL and M_ADR frames.
///
/// The informational lines (`SYS`, `ZYZ`, `VER`, `LOC`, `OPT`) are retained
/// for logging; the address list is what authentication resolves the peer's
/// node number from.
#[derive(Debug, Default, Clone)]
pub struct Remote {
    system_name: String,
    sysop_name: String,
    version: String,
    location: String,
    options: Vec<String>,
    address_list: String,
    node: Option<u16>,
}

impl Remote {
    /// Fresh, empty peer info.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one M_NUL line.
    pub fn handle_nul(&mut self, args: &str) {
        if let Some(value) = args.strip_prefix("SYS ") {
            self.system_name = value.to_string();
        } else if let Some(value) = args.strip_prefix("ZYZ ") {
            self.sysop_name = value.to_string();
        } else if let Some(value) = args.strip_prefix("VER ") {
            self.version = value.to_string();
        } else if let Some(value) = args.strip_prefix("LOC ") {
            self.location = value.to_string();
        } else if let Some(value) = args.strip_prefix("OPT ") {
            self.options.extend(value.split_whitespace().map(String::from));
        } else {
            tracing::debug!(args, "unrecognized M_NUL line");
        }
    }

    /// Record the peer's M_ADR address list.
    pub fn set_address_list(&mut self, list: &str) {
        self.address_list = list.trim().to_string();
    }

    /// The raw address list, empty until M_ADR arrives.
    pub fn address_list(&self) -> &str {
        &self.address_list
    }

    /// Resolve and remember the peer's node number within `network_name`.
    pub fn resolve_node(&mut self, network_name: &str) -> Option<u16> {
        self.node = node_from_address_list(&self.address_list, network_name);
        self.node
    }

    /// The node number resolved by [`resolve_node`](Self::resolve_node).
    pub fn node(&self) -> Option<u16> {
        self.node
    }

    /// Peer system name from `SYS`.
    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    /// Peer sysop name from `ZYZ`.
    pub fn sysop_name(&self) -> &str {
        &self.sysop_name
    }

    /// Peer software version from `VER`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Peer location from `LOC`.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Options the peer advertised via `OPT`.
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_lines_populate_fields() {
        let mut remote = Remote::new();
        remote.handle_nul("SYS My Test System");
        remote.handle_nul("ZYZ Some Sysop");
        remote.handle_nul("VER networkb/0.0 binkp/1.0");
        remote.handle_nul("LOC San Francisco, CA");
        remote.handle_nul("OPT CRAM-MD5 NDA");
        remote.handle_nul("XXX ignored");

        assert_eq!(remote.system_name(), "My Test System");
        assert_eq!(remote.sysop_name(), "Some Sysop");
        assert_eq!(remote.version(), "networkb/0.0 binkp/1.0");
        assert_eq!(remote.location(), "San Francisco, CA");
        assert_eq!(remote.options(), ["CRAM-MD5", "NDA"]);
    }

    #[test]
    fn node_resolution_uses_the_local_network() {
        let mut remote = Remote::new();
        remote.set_address_list("1:369/23@fidonet 20000:20000/1234@wwivnet");
        assert_eq!(remote.resolve_node("wwivnet"), Some(1234));
        assert_eq!(remote.node(), Some(1234));
        assert_eq!(remote.resolve_node("nonet"), None);
    }
}
