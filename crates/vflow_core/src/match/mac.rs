use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use super::MatchError;

pub const MAC_ADDRESS_LENGTH: usize = 6;

/// A hardware address as carried in `dl_src`/`dl_dst`.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; MAC_ADDRESS_LENGTH]);

impl MacAddr {
    pub const ZERO: MacAddr = MacAddr([0; MAC_ADDRESS_LENGTH]);
    pub const BROADCAST: MacAddr = MacAddr([0xff; MAC_ADDRESS_LENGTH]);

    /// Byte-wise comparison over the full hardware address length.
    #[inline]
    pub fn bytes_eq(&self, other: &MacAddr) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl From<[u8; MAC_ADDRESS_LENGTH]> for MacAddr {
    #[inline]
    fn from(value: [u8; MAC_ADDRESS_LENGTH]) -> Self {
        MacAddr(value)
    }
}

impl FromStr for MacAddr {
    type Err = MatchError;

    /// r"[0-9a-fA-F]{1,2}(:[0-9a-fA-F]{1,2}){5}"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; MAC_ADDRESS_LENGTH];
        let mut octets = s.split(':');
        for byte in bytes.iter_mut() {
            let octet = octets
                .next()
                .filter(|o| !o.is_empty() && o.len() <= 2)
                .ok_or_else(|| MatchError::InvalidMac(s.to_owned()))?;
            *byte =
                u8::from_str_radix(octet, 16).map_err(|_| MatchError::InvalidMac(s.to_owned()))?;
        }
        if octets.next().is_some() {
            return Err(MatchError::InvalidMac(s.to_owned()));
        }
        Ok(MacAddr(bytes))
    }
}

impl Display for MacAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Debug for MacAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
