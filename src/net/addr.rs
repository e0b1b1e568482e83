/*!
 * Remote Addresses
 * Destination endpoints with optional resolved host names
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// A remote endpoint: an IP address plus the host name it resolved from,
/// when one is known.
///
/// The split matters at audit time: blocking connects record the resolved
/// name, non-blocking connects record the textual address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteAddr {
    ip: IpAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
}

impl RemoteAddr {
    /// Address without a resolved host name.
    #[must_use]
    pub fn new(ip: IpAddr) -> Self {
        Self { ip, hostname: None }
    }

    /// Address carrying a resolved host name. Empty names are dropped.
    #[must_use]
    pub fn with_hostname(ip: IpAddr, hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            ip,
            hostname: if hostname.is_empty() {
                None
            } else {
                Some(hostname)
            },
        }
    }

    /// The IPv4 loopback address.
    #[must_use]
    pub fn loopback() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[inline]
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Resolved host name, if known and non-empty.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Host name when known, textual IP otherwise.
    #[must_use]
    pub fn display_host(&self) -> String {
        match &self.hostname {
            Some(name) => name.clone(),
            None => self.ip.to_string(),
        }
    }
}

impl From<IpAddr> for RemoteAddr {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_host())
    }
}
