//! CIDR 子网匹配

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::errors::ShortenerError;

/// 可信子网，例如 `10.0.0.0/8` 或 `fd00::/8`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedSubnet {
    network: IpAddr,
    prefix_len: u8,
}

impl TrustedSubnet {
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (ip, self.network) {
            (IpAddr::V4(ip), IpAddr::V4(net)) => {
                let mask = u32::MAX
                    .checked_shl(32 - self.prefix_len as u32)
                    .unwrap_or(0);
                (u32::from(*ip) & mask) == (u32::from(net) & mask)
            }
            (IpAddr::V6(ip), IpAddr::V6(net)) => {
                let mask = u128::MAX
                    .checked_shl(128 - self.prefix_len as u32)
                    .unwrap_or(0);
                (u128::from(*ip) & mask) == (u128::from(net) & mask)
            }
            // IPv4 与 IPv6 不匹配
            _ => false,
        }
    }

    /// 解析请求头里的 IP 文本后判断（无法解析视为不在子网内）
    pub fn contains_str(&self, ip: &str) -> bool {
        ip.trim()
            .parse::<IpAddr>()
            .is_ok_and(|addr| self.contains(&addr))
    }
}

impl FromStr for TrustedSubnet {
    type Err = ShortenerError;

    fn from_str(cidr: &str) -> Result<Self, Self::Err> {
        let invalid = || ShortenerError::client_input(format!("无效的 CIDR: {}", cidr));

        let (network, prefix_len) = cidr.trim().split_once('/').ok_or_else(invalid)?;
        let network: IpAddr = network.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix_len.parse().map_err(|_| invalid())?;

        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix_len > max {
            return Err(invalid());
        }

        Ok(Self {
            network,
            prefix_len,
        })
    }
}

impl fmt::Display for TrustedSubnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}
