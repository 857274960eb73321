//! # Match
//!
//! ## Relations of important structs
//! ```text
//!       Field ----> FieldSet
//!         |            |
//!         v            v
//! WildcardMatch -> classify -> Relation
//!         |
//!         v
//!     FlowEntry
//! ```
//!
//! ## Example
//! ```
//! use std::net::Ipv4Addr;
//! use vflow_core::r#match::WildcardMatch;
//! use vflow_core::relation::Relation;
//!
//! let any = WildcardMatch::new();
//! let web = WildcardMatch::new()
//!     .with_dl_type(0x0800)
//!     .with_nw_proto(6)
//!     .with_tp_dst(80);
//!
//! assert_eq!(any.relation_to(&web, true), Relation::Superset);
//! assert_eq!(web.relation_to(&any, true), Relation::Subset);
//! assert_eq!(web.to_string(), "dl_type=0x0800,nw_proto=6,tp_dst=80");
//! ```

pub mod field;
pub mod mac;

use std::{
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    net::Ipv4Addr,
};

use funty::Unsigned;

use crate::relation::{classify, Relation};
use field::{
    constant::{IPV4_ALL_BITS, OFPFW_ALL},
    Field,
};
use mac::MacAddr;

/// Errors raised while building a match from text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("invalid hardware address {0:?}")]
    InvalidMac(String),
    #[error("unknown match field {0:?}")]
    UnknownField(String),
    #[error("invalid IPv4 address {0:?}")]
    InvalidIpv4(String),
    #[error("invalid prefix length {0:?}")]
    InvalidPrefix(String),
    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: Field, value: String },
}

/// The OpenFlow 1.0 wildcard word.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Wildcards(pub u32);

impl Wildcards {
    pub const ALL: Wildcards = Wildcards(OFPFW_ALL);
    pub const NONE: Wildcards = Wildcards(0);

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True when the field is insignificant for matching. An IPv4 field counts as wildcarded
    /// only when all of its 32 bits are.
    #[inline]
    pub fn is_wildcarded(self, field: Field) -> bool {
        if field.is_prefix() {
            self.ipv4_wildcard_bits(field) == IPV4_ALL_BITS
        } else {
            self.0 & field.wildcard_mask() != 0
        }
    }

    /// Number of wildcarded low-order bits of an IPv4 field, clamped to 32. Single-bit fields
    /// report 32 when wildcarded and 0 otherwise.
    #[inline]
    pub fn ipv4_wildcard_bits(self, field: Field) -> u32 {
        let decl = field.declaration();
        let raw = (self.0 & field.wildcard_mask()) >> decl.shift;
        if decl.width == 1 {
            raw * IPV4_ALL_BITS
        } else {
            raw.min(IPV4_ALL_BITS)
        }
    }

    #[inline]
    pub fn set(&mut self, field: Field) {
        if field.is_prefix() {
            self.set_ipv4_wildcard_bits(field, IPV4_ALL_BITS);
        } else {
            self.0 |= field.wildcard_mask();
        }
    }

    #[inline]
    pub fn clear(&mut self, field: Field) {
        self.0 &= !field.wildcard_mask();
    }

    /// Sets the number of wildcarded bits of an IPv4 field; values above 32 are clamped.
    #[inline]
    pub fn set_ipv4_wildcard_bits(&mut self, field: Field, bits: u32) {
        debug_assert!(field.is_prefix(), "{field} has no prefix wildcard");
        self.clear(field);
        self.0 |= bits.min(IPV4_ALL_BITS) << field.declaration().shift;
    }

    /// Same word with every IPv4 count clamped to 32 and the bits above [OFPFW_ALL] cleared.
    pub fn canonical(self) -> Wildcards {
        let mut w = Wildcards(self.0 & OFPFW_ALL);
        for field in [Field::NwDst, Field::NwSrc] {
            w.set_ipv4_wildcard_bits(field, self.ipv4_wildcard_bits(field));
        }
        w
    }
}

impl Default for Wildcards {
    fn default() -> Self {
        Wildcards::ALL
    }
}

/// Significant-bit mask of an IPv4 address with `wildcard_bits` low-order bits wildcarded.
#[inline]
pub fn ipv4_mask(wildcard_bits: u32) -> u32 {
    if wildcard_bits >= IPV4_ALL_BITS {
        0
    } else {
        u32::MAX << wildcard_bits
    }
}

/// An OpenFlow 1.0 match: a wildcard word plus one value per field. The value of a wildcarded
/// field is carried but never compared; equality and hashing use [WildcardMatch::normalized].
#[derive(Copy, Clone, Debug)]
pub struct WildcardMatch {
    pub wildcards: Wildcards,
    pub in_port: u16,
    pub dl_dst: MacAddr,
    pub dl_src: MacAddr,
    pub dl_type: u16,
    pub dl_vlan: u16,
    pub dl_vlan_pcp: u8,
    pub nw_proto: u8,
    pub nw_tos: u8,
    pub nw_dst: Ipv4Addr,
    pub nw_src: Ipv4Addr,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl Default for WildcardMatch {
    fn default() -> Self {
        WildcardMatch {
            wildcards: Wildcards::ALL,
            in_port: 0,
            dl_dst: MacAddr::ZERO,
            dl_src: MacAddr::ZERO,
            dl_type: 0,
            dl_vlan: 0,
            dl_vlan_pcp: 0,
            nw_proto: 0,
            nw_tos: 0,
            nw_dst: Ipv4Addr::UNSPECIFIED,
            nw_src: Ipv4Addr::UNSPECIFIED,
            tp_src: 0,
            tp_dst: 0,
        }
    }
}

macro_rules! scalar_setter {
    ($with:ident, $set:ident, $field:ident, $variant:expr, $ty:ty) => {
        #[inline]
        pub fn $with(mut self, value: $ty) -> Self {
            self.$set(value);
            self
        }

        #[inline]
        pub fn $set(&mut self, value: $ty) -> &mut Self {
            self.$field = value;
            self.wildcards.clear($variant);
            self
        }
    };
}

impl WildcardMatch {
    /// A match with every field wildcarded.
    pub fn new() -> Self {
        Self::default()
    }

    /// A match with no field wildcarded and every value zero.
    pub fn exact() -> Self {
        WildcardMatch {
            wildcards: Wildcards::NONE,
            ..Self::default()
        }
    }

    scalar_setter!(with_in_port, set_in_port, in_port, Field::InPort, u16);
    scalar_setter!(with_dl_dst, set_dl_dst, dl_dst, Field::DlDst, MacAddr);
    scalar_setter!(with_dl_src, set_dl_src, dl_src, Field::DlSrc, MacAddr);
    scalar_setter!(with_dl_type, set_dl_type, dl_type, Field::DlType, u16);
    scalar_setter!(with_dl_vlan, set_dl_vlan, dl_vlan, Field::DlVlan, u16);
    scalar_setter!(with_dl_vlan_pcp, set_dl_vlan_pcp, dl_vlan_pcp, Field::DlVlanPcp, u8);
    scalar_setter!(with_nw_proto, set_nw_proto, nw_proto, Field::NwProto, u8);
    scalar_setter!(with_nw_tos, set_nw_tos, nw_tos, Field::NwTos, u8);
    scalar_setter!(with_tp_src, set_tp_src, tp_src, Field::TpSrc, u16);
    scalar_setter!(with_tp_dst, set_tp_dst, tp_dst, Field::TpDst, u16);

    #[inline]
    pub fn with_nw_dst(mut self, addr: Ipv4Addr, prefix_len: u8) -> Self {
        self.set_nw_dst(addr, prefix_len);
        self
    }

    #[inline]
    pub fn set_nw_dst(&mut self, addr: Ipv4Addr, prefix_len: u8) -> &mut Self {
        self.nw_dst = addr;
        self.set_prefix_len(Field::NwDst, prefix_len);
        self
    }

    #[inline]
    pub fn with_nw_src(mut self, addr: Ipv4Addr, prefix_len: u8) -> Self {
        self.set_nw_src(addr, prefix_len);
        self
    }

    #[inline]
    pub fn set_nw_src(&mut self, addr: Ipv4Addr, prefix_len: u8) -> &mut Self {
        self.nw_src = addr;
        self.set_prefix_len(Field::NwSrc, prefix_len);
        self
    }

    fn set_prefix_len(&mut self, field: Field, prefix_len: u8) {
        let prefix_len = u32::from(prefix_len).min(IPV4_ALL_BITS);
        self.wildcards
            .set_ipv4_wildcard_bits(field, IPV4_ALL_BITS - prefix_len);
    }

    #[inline]
    pub fn wildcard(&self, field: Field) -> bool {
        self.wildcards.is_wildcarded(field)
    }

    #[inline]
    pub fn set_wildcard(&mut self, field: Field) -> &mut Self {
        self.wildcards.set(field);
        self
    }

    /// Prefix length of `nw_dst`/`nw_src`: 0 when fully wildcarded, 32 for an exact address.
    #[inline]
    pub fn prefix_len(&self, field: Field) -> u32 {
        IPV4_ALL_BITS - self.wildcards.ipv4_wildcard_bits(field)
    }

    /// Relation of this match (the "own" side) to `other`.
    #[inline]
    pub fn relation_to(&self, other: &WildcardMatch, strict: bool) -> Relation {
        classify(self, other, strict)
    }

    /// Copy with the values of wildcarded fields zeroed, IPv4 addresses masked to their
    /// significant prefix and IPv4 wildcard counts clamped.
    pub fn normalized(&self) -> WildcardMatch {
        let wildcards = self.wildcards.canonical();
        let mut m = WildcardMatch {
            wildcards,
            ..*self
        };
        fn zero_if<U: Unsigned>(wildcarded: bool, value: &mut U) {
            if wildcarded {
                *value = U::ZERO;
            }
        }
        zero_if(self.wildcard(Field::InPort), &mut m.in_port);
        zero_if(self.wildcard(Field::DlType), &mut m.dl_type);
        zero_if(self.wildcard(Field::DlVlan), &mut m.dl_vlan);
        zero_if(self.wildcard(Field::DlVlanPcp), &mut m.dl_vlan_pcp);
        zero_if(self.wildcard(Field::NwProto), &mut m.nw_proto);
        zero_if(self.wildcard(Field::NwTos), &mut m.nw_tos);
        zero_if(self.wildcard(Field::TpSrc), &mut m.tp_src);
        zero_if(self.wildcard(Field::TpDst), &mut m.tp_dst);
        if self.wildcard(Field::DlDst) {
            m.dl_dst = MacAddr::ZERO;
        }
        if self.wildcard(Field::DlSrc) {
            m.dl_src = MacAddr::ZERO;
        }
        m.nw_dst = Ipv4Addr::from(
            u32::from(self.nw_dst) & ipv4_mask(wildcards.ipv4_wildcard_bits(Field::NwDst)),
        );
        m.nw_src = Ipv4Addr::from(
            u32::from(self.nw_src) & ipv4_mask(wildcards.ipv4_wildcard_bits(Field::NwSrc)),
        );
        m
    }

    /// Sets a field from its textual value, as written by [Display]: decimal or `0x` hex
    /// integers, `aa:bb:cc:dd:ee:ff` hardware addresses, `a.b.c.d[/len]` IPv4 prefixes.
    pub fn set_field_str(&mut self, field: Field, value: &str) -> Result<&mut Self, MatchError> {
        let invalid = || MatchError::InvalidValue {
            field,
            value: value.to_owned(),
        };
        match field {
            Field::InPort => self.set_in_port(parse_uint(value).ok_or_else(invalid)?),
            Field::DlDst => self.set_dl_dst(value.parse()?),
            Field::DlSrc => self.set_dl_src(value.parse()?),
            Field::DlType => self.set_dl_type(parse_uint(value).ok_or_else(invalid)?),
            Field::DlVlan => self.set_dl_vlan(parse_uint(value).ok_or_else(invalid)?),
            Field::DlVlanPcp => self.set_dl_vlan_pcp(parse_uint(value).ok_or_else(invalid)?),
            Field::NwProto => self.set_nw_proto(parse_uint(value).ok_or_else(invalid)?),
            Field::NwTos => self.set_nw_tos(parse_uint(value).ok_or_else(invalid)?),
            Field::NwDst => {
                let (addr, len) = parse_ipv4_prefix(value)?;
                self.set_nw_dst(addr, len)
            }
            Field::NwSrc => {
                let (addr, len) = parse_ipv4_prefix(value)?;
                self.set_nw_src(addr, len)
            }
            Field::TpSrc => self.set_tp_src(parse_uint(value).ok_or_else(invalid)?),
            Field::TpDst => self.set_tp_dst(parse_uint(value).ok_or_else(invalid)?),
        };
        Ok(self)
    }

    /// Same as [WildcardMatch::set_field_str] with the field given by name.
    pub fn set_named_str(&mut self, name: &str, value: &str) -> Result<&mut Self, MatchError> {
        let field = Field::from_name(name).ok_or_else(|| MatchError::UnknownField(name.to_owned()))?;
        self.set_field_str(field, value)
    }

    fn fmt_field(&self, field: Field, f: &mut Formatter<'_>) -> std::fmt::Result {
        match field {
            Field::InPort => write!(f, "{}", self.in_port),
            Field::DlDst => write!(f, "{}", self.dl_dst),
            Field::DlSrc => write!(f, "{}", self.dl_src),
            Field::DlType => write!(f, "{:#06x}", self.dl_type),
            Field::DlVlan => write!(f, "{}", self.dl_vlan),
            Field::DlVlanPcp => write!(f, "{}", self.dl_vlan_pcp),
            Field::NwProto => write!(f, "{}", self.nw_proto),
            Field::NwTos => write!(f, "{}", self.nw_tos),
            Field::NwDst | Field::NwSrc => {
                let addr = if field == Field::NwDst {
                    self.nw_dst
                } else {
                    self.nw_src
                };
                match self.prefix_len(field) {
                    IPV4_ALL_BITS => write!(f, "{addr}"),
                    len => write!(f, "{addr}/{len}"),
                }
            }
            Field::TpSrc => write!(f, "{}", self.tp_src),
            Field::TpDst => write!(f, "{}", self.tp_dst),
        }
    }
}

/// Decimal or `0x`-prefixed hexadecimal unsigned integer.
pub fn parse_uint<U: Unsigned>(s: &str) -> Option<U> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => U::from_str_radix(hex, 16),
        None => U::from_str_radix(s, 10),
    };
    parsed.ok()
}

/// r"[<=255].[<=255].[<=255].[<=255](/[<=32])?"
pub fn parse_ipv4_prefix(s: &str) -> Result<(Ipv4Addr, u8), MatchError> {
    let (addr, len) = match s.split_once('/') {
        Some((addr, len)) => {
            let len = len
                .parse::<u8>()
                .ok()
                .filter(|l| u32::from(*l) <= IPV4_ALL_BITS)
                .ok_or_else(|| MatchError::InvalidPrefix(s.to_owned()))?;
            (addr, len)
        }
        None => (s, IPV4_ALL_BITS as u8),
    };
    let addr = addr
        .parse::<Ipv4Addr>()
        .map_err(|_| MatchError::InvalidIpv4(s.to_owned()))?;
    Ok((addr, len))
}

impl PartialEq for WildcardMatch {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.normalized(), other.normalized());
        a.wildcards == b.wildcards
            && a.in_port == b.in_port
            && a.dl_dst.bytes_eq(&b.dl_dst)
            && a.dl_src.bytes_eq(&b.dl_src)
            && a.dl_type == b.dl_type
            && a.dl_vlan == b.dl_vlan
            && a.dl_vlan_pcp == b.dl_vlan_pcp
            && a.nw_proto == b.nw_proto
            && a.nw_tos == b.nw_tos
            && a.nw_dst == b.nw_dst
            && a.nw_src == b.nw_src
            && a.tp_src == b.tp_src
            && a.tp_dst == b.tp_dst
    }
}

impl Eq for WildcardMatch {}

impl Hash for WildcardMatch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let m = self.normalized();
        m.wildcards.hash(state);
        m.in_port.hash(state);
        m.dl_dst.hash(state);
        m.dl_src.hash(state);
        m.dl_type.hash(state);
        m.dl_vlan.hash(state);
        m.dl_vlan_pcp.hash(state);
        m.nw_proto.hash(state);
        m.nw_tos.hash(state);
        m.nw_dst.hash(state);
        m.nw_src.hash(state);
        m.tp_src.hash(state);
        m.tp_dst.hash(state);
    }
}

impl Display for WildcardMatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for field in Field::ALL {
            if self.wildcard(field) {
                continue;
            }
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{}=", field)?;
            self.fmt_field(field, f)?;
        }
        if first {
            write!(f, "any")?;
        }
        Ok(())
    }
}
