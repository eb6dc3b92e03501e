use {
    super::AddressError,
    serde::{Deserialize, Serialize},
    std::{fmt, str::FromStr},
};

/// Address family of a remote, numbered as the socket API does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    /// `AF_INET`.
    Inet,
    /// `AF_INET6`.
    Inet6,
}

impl AddressFamily {
    /// Numeric family, as written in `addr:port:family`.
    pub fn code(self) -> u16 {
        match self {
            AddressFamily::Inet => 2,
            AddressFamily::Inet6 => 10,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            2 => Some(AddressFamily::Inet),
            10 => Some(AddressFamily::Inet6),
            _ => None,
        }
    }
}

/// Seed node to poll for its routing table.
///
/// Written as `addr:port:family`, where family is 2 for IPv4 and 10 for IPv6.
/// The string is split from the right, so IPv6 addresses need no brackets:
/// `::1:1025:10`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteAddress {
    host: String,
    port: u16,
    family: AddressFamily,
}

impl RemoteAddress {
    pub fn new(host: impl Into<String>, port: u16, family: AddressFamily) -> Self {
        Self {
            host: host.into(),
            port,
            family,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }
}

impl FromStr for RemoteAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().rsplitn(3, ':');
        let (Some(family), Some(port), Some(host)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AddressError::Format(s.to_string()));
        };

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(AddressError::Format(s.to_string()));
        }

        let port = match port.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => return Err(AddressError::Port(s.to_string())),
        };

        let family = family
            .parse::<u16>()
            .ok()
            .and_then(AddressFamily::from_code)
            .ok_or_else(|| AddressError::Family(s.to_string()))?;

        Ok(Self::new(host, port, family))
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.port, self.family.code())
    }
}
