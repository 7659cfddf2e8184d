use crate::config::DEFAULT_PORT;
use crate::error::{NodeError, Result};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// A configured peer, `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn get_host(&self) -> &str {
        &self.host
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn resolve(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| NodeError::Network(format!("Cannot resolve {self}: {e}")))?
            .next()
            .ok_or_else(|| NodeError::Network(format!("{self} resolved to nothing")))
    }
}

impl FromStr for PeerAddress {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(NodeError::Config("Empty peer address".to_string()));
        }
        // [v6]:port, v6 without port, host:port, host
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| NodeError::Config(format!("Unclosed bracket in {s}")))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(s, port)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(NodeError::Config(format!("Bad peer address {s}"))),
            };
            return Ok(PeerAddress::new(host, port));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                Ok(PeerAddress::new(host, parse_port(s, port)?))
            }
            _ => Ok(PeerAddress::new(s, DEFAULT_PORT)),
        }
    }
}

fn parse_port(address: &str, port: &str) -> Result<u16> {
    port.parse()
        .map_err(|e| NodeError::Config(format!("Bad port in {address}: {e}")))
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_defaults_to_12200() -> Result<()> {
        assert_eq!("10.0.0.2".parse::<PeerAddress>()?, PeerAddress::new("10.0.0.2", 12200));
        assert_eq!(
            "seed.example.org:12300".parse::<PeerAddress>()?,
            PeerAddress::new("seed.example.org", 12300)
        );
        Ok(())
    }

    #[test]
    fn test_ipv6_forms() -> Result<()> {
        assert_eq!("[::1]:9".parse::<PeerAddress>()?, PeerAddress::new("::1", 9));
        assert_eq!("::1".parse::<PeerAddress>()?, PeerAddress::new("::1", 12200));
        assert_eq!(PeerAddress::new("::1", 9).to_string(), "[::1]:9");
        Ok(())
    }

    #[test]
    fn test_bad_inputs() {
        assert!("".parse::<PeerAddress>().is_err());
        assert!("host:port".parse::<PeerAddress>().is_err());
        assert!("[::1".parse::<PeerAddress>().is_err());
    }

    #[tokio::test]
    async fn test_resolves_loopback() -> Result<()> {
        let addr = PeerAddress::new("127.0.0.1", 12200).resolve().await?;
        assert_eq!(addr.port(), 12200);
        Ok(())
    }
}
