//! # Match field module
//!
//! ## What is a match field?
//! An OpenFlow 1.0 match has twelve header fields, each of which can be wildcarded on its own.
//! The wildcard state of every field lives in a single 32-bit wildcard word; most fields own one
//! bit of it, the two IPv4 address fields own a 6-bit count of wildcarded low-order bits.
//!
//! ## Where does the layout come from?
//! `build.rs` generates [FIELD_MAP](constant::FIELD_MAP) (name -> position, shift, width),
//! [FIELD_COUNT](constant::FIELD_COUNT) and [OFPFW_ALL](constant::OFPFW_ALL) from one table, so
//! the field enumeration and the "every field" constants cannot drift apart.
//!
//! ## Example
//! ```
//! use vflow_core::r#match::field::Field;
//!
//! let f = Field::from_name("nw_dst").unwrap();
//! assert_eq!(f, Field::NwDst);
//! assert!(f.is_prefix());
//! assert_eq!(f.wildcard_mask(), 0x3f << 14);
//! ```

use std::fmt::{Display, Formatter};

use bitvec::prelude::*;

use constant::{FIELD_COUNT, FIELD_MAP};

/// A match field, in the order the relation classifier visits them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    InPort,
    DlDst,
    DlSrc,
    DlType,
    DlVlan,
    DlVlanPcp,
    NwProto,
    NwTos,
    NwDst,
    NwSrc,
    TpSrc,
    TpDst,
}

impl Field {
    /// Every field, indexed by [Field::index]. The array length is the generated field count, so
    /// adding a field to the generated table without adding it here fails to compile.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::InPort,
        Field::DlDst,
        Field::DlSrc,
        Field::DlType,
        Field::DlVlan,
        Field::DlVlanPcp,
        Field::NwProto,
        Field::NwTos,
        Field::NwDst,
        Field::NwSrc,
        Field::TpSrc,
        Field::TpDst,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.declaration().name
    }

    pub fn from_name(name: &str) -> Option<Field> {
        FIELD_MAP
            .get_entry(name)
            .map(|(_, (idx, _, _))| Field::ALL[*idx])
    }

    #[inline]
    pub fn declaration(self) -> FieldDeclaration {
        // FIELD_MAP is generated in the same order as Field::ALL
        let (name, (_, shift, width)) = FIELD_MAP
            .index(self.index())
            .unwrap_or_else(|| unreachable!("field table out of sync"));
        FieldDeclaration {
            name: *name,
            shift: *shift,
            width: *width,
        }
    }

    /// Bits of the wildcard word owned by this field.
    #[inline]
    pub fn wildcard_mask(self) -> u32 {
        let decl = self.declaration();
        ((1u32 << decl.width) - 1) << decl.shift
    }

    /// IPv4 address fields carry a count of wildcarded bits rather than a single flag.
    #[inline]
    pub fn is_prefix(self) -> bool {
        self.declaration().width > 1
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Describes where a field lives in the wildcard word.
#[derive(Copy, Clone, Debug)]
pub struct FieldDeclaration {
    pub name: &'static str,
    pub shift: u32,
    pub width: u32,
}

/// A set of fields, one bit per [Field::index].
///
/// The backing store is wider than [FIELD_COUNT]; only the first `FIELD_COUNT` bits are
/// significant, so [FieldSet::is_full] never looks at the padding.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Debug)]
pub struct FieldSet(BitArr!(for FIELD_COUNT, in u16, Lsb0));

impl FieldSet {
    pub const EMPTY: FieldSet = FieldSet(BitArray::ZERO);

    #[inline]
    pub fn insert(&mut self, field: Field) {
        self.0.set(field.index(), true);
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.0[..FIELD_COUNT].all()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0[..FIELD_COUNT].count_ones()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0[..FIELD_COUNT].not_any()
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.0[..FIELD_COUNT].iter_ones().map(|idx| Field::ALL[idx])
    }
}

impl std::ops::BitOrAssign for FieldSet {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

pub mod constant {
    include!(concat!(env!("OUT_DIR"), "/codegen.rs"));

    pub const OFPFW_IN_PORT: u32 = 1 << 0;
    pub const OFPFW_DL_VLAN: u32 = 1 << 1;
    pub const OFPFW_DL_SRC: u32 = 1 << 2;
    pub const OFPFW_DL_DST: u32 = 1 << 3;
    pub const OFPFW_DL_TYPE: u32 = 1 << 4;
    pub const OFPFW_NW_PROTO: u32 = 1 << 5;
    pub const OFPFW_TP_SRC: u32 = 1 << 6;
    pub const OFPFW_TP_DST: u32 = 1 << 7;
    pub const OFPFW_NW_SRC_SHIFT: u32 = 8;
    pub const OFPFW_NW_SRC_MASK: u32 = 0x3f << OFPFW_NW_SRC_SHIFT;
    pub const OFPFW_NW_SRC_ALL: u32 = 32 << OFPFW_NW_SRC_SHIFT;
    pub const OFPFW_NW_DST_SHIFT: u32 = 14;
    pub const OFPFW_NW_DST_MASK: u32 = 0x3f << OFPFW_NW_DST_SHIFT;
    pub const OFPFW_NW_DST_ALL: u32 = 32 << OFPFW_NW_DST_SHIFT;
    pub const OFPFW_DL_VLAN_PCP: u32 = 1 << 20;
    pub const OFPFW_NW_TOS: u32 = 1 << 21;

    /// Number of wildcarded bits at which an IPv4 field matches every address.
    pub const IPV4_ALL_BITS: u32 = 32;
}
