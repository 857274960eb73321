//! # Relation
//!
//! Classifies how the packet space of one [WildcardMatch] relates to another's, field by field,
//! the way an OpenFlow 1.0 switch does for strict and non-strict flow-mods.
//!
//! For every field, in [Field::ALL] order:
//! - both sides agree on the wildcard and it is set: the field counts as equal, superset and
//!   subset at once;
//! - both sides agree and the field is significant: the values decide, equal values count as
//!   above, different values make the whole pair [Relation::Disjoint] right away;
//! - the sides disagree: the wildcarded side is the superset on that field alone.
//!
//! IPv4 prefixes compare the number of wildcarded bits first; the side with more wildcarded
//! bits is the superset on that field no matter the address values.
//!
//! ```
//! use vflow_core::r#match::WildcardMatch;
//! use vflow_core::relation::{classify, Relation};
//!
//! let a = WildcardMatch::new();
//! let b = WildcardMatch::new().with_in_port(3);
//! assert_eq!(classify(&a, &b, false), Relation::Superset);
//! assert_eq!(classify(&b, &a, false), Relation::Equal);
//! assert_eq!(classify(&b, &a, true), Relation::Subset);
//! ```

use std::fmt::{Display, Formatter};

use funty::Unsigned;

use crate::r#match::{
    field::{Field, FieldSet},
    ipv4_mask,
    mac::MacAddr,
    WildcardMatch,
};

/// Relation of an "own" match to an "other" match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Same packet space (non-strict: or contained in the other).
    Equal,
    /// Own match is more general.
    Superset,
    /// Own match is more specific.
    Subset,
    /// Mix of more general and more specific fields.
    Intersect,
    /// A significant field differs; no packet matches both.
    Disjoint,
}

impl Relation {
    /// Relation seen from the other side.
    #[inline]
    pub fn inverse(self) -> Relation {
        match self {
            Relation::Superset => Relation::Subset,
            Relation::Subset => Relation::Superset,
            r => r,
        }
    }

    #[inline]
    pub fn overlaps(self) -> bool {
        self != Relation::Disjoint
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Relation::Equal => "equal",
            Relation::Superset => "superset",
            Relation::Subset => "subset",
            Relation::Intersect => "intersect",
            Relation::Disjoint => "disjoint",
        };
        write!(f, "{}", s)
    }
}

/// Early exit marker: a significant field differs.
struct Disjoint;

/// Per-field outcome accumulators.
#[derive(Default, Debug)]
struct FieldRelations {
    equal: FieldSet,
    superset: FieldSet,
    subset: FieldSet,
}

impl FieldRelations {
    #[inline]
    fn absorb(&mut self, field: Field) {
        self.equal.insert(field);
        self.superset.insert(field);
        self.subset.insert(field);
    }

    /// Wildcard states differ: the wildcarded side is the more general one on this field.
    #[inline]
    fn mark_wider(&mut self, field: Field, own_wider: bool) {
        if own_wider {
            self.superset.insert(field);
        } else {
            self.subset.insert(field);
        }
    }

    fn scalar<U: Unsigned>(
        &mut self,
        field: Field,
        own: &WildcardMatch,
        other: &WildcardMatch,
        own_value: U,
        other_value: U,
    ) -> Result<(), Disjoint> {
        self.compare(field, own, other, || own_value == other_value)
    }

    fn hardware(
        &mut self,
        field: Field,
        own: &WildcardMatch,
        other: &WildcardMatch,
        own_value: &MacAddr,
        other_value: &MacAddr,
    ) -> Result<(), Disjoint> {
        self.compare(field, own, other, || own_value.bytes_eq(other_value))
    }

    #[inline]
    fn compare(
        &mut self,
        field: Field,
        own: &WildcardMatch,
        other: &WildcardMatch,
        values_eq: impl FnOnce() -> bool,
    ) -> Result<(), Disjoint> {
        let own_wc = own.wildcard(field);
        let other_wc = other.wildcard(field);
        if own_wc != other_wc {
            self.mark_wider(field, own_wc);
        } else if own_wc || values_eq() {
            self.absorb(field);
        } else {
            return Err(Disjoint);
        }
        Ok(())
    }

    fn prefix(
        &mut self,
        field: Field,
        own: &WildcardMatch,
        other: &WildcardMatch,
        own_addr: u32,
        other_addr: u32,
    ) -> Result<(), Disjoint> {
        let own_bits = own.wildcards.ipv4_wildcard_bits(field);
        let other_bits = other.wildcards.ipv4_wildcard_bits(field);
        if own_bits != other_bits {
            self.mark_wider(field, own_bits > other_bits);
            return Ok(());
        }
        let mask = ipv4_mask(own_bits);
        if own_addr & mask == other_addr & mask {
            self.absorb(field);
            Ok(())
        } else {
            Err(Disjoint)
        }
    }

    fn finish(mut self, strict: bool) -> Relation {
        if !strict {
            self.equal |= self.subset;
        }
        if self.equal.is_full() {
            Relation::Equal
        } else if self.superset.is_full() {
            Relation::Superset
        } else if self.subset.is_full() {
            Relation::Subset
        } else {
            Relation::Intersect
        }
    }
}

fn accumulate(own: &WildcardMatch, other: &WildcardMatch) -> Result<FieldRelations, Disjoint> {
    let mut rel = FieldRelations::default();

    // L1
    rel.scalar(Field::InPort, own, other, own.in_port, other.in_port)?;

    // L2
    rel.hardware(Field::DlDst, own, other, &own.dl_dst, &other.dl_dst)?;
    rel.hardware(Field::DlSrc, own, other, &own.dl_src, &other.dl_src)?;
    rel.scalar(Field::DlType, own, other, own.dl_type, other.dl_type)?;
    rel.scalar(Field::DlVlan, own, other, own.dl_vlan, other.dl_vlan)?;
    rel.scalar(Field::DlVlanPcp, own, other, own.dl_vlan_pcp, other.dl_vlan_pcp)?;

    // L3
    rel.scalar(Field::NwProto, own, other, own.nw_proto, other.nw_proto)?;
    rel.scalar(Field::NwTos, own, other, own.nw_tos, other.nw_tos)?;
    rel.prefix(Field::NwDst, own, other, own.nw_dst.into(), other.nw_dst.into())?;
    rel.prefix(Field::NwSrc, own, other, own.nw_src.into(), other.nw_src.into())?;

    // L4
    rel.scalar(Field::TpSrc, own, other, own.tp_src, other.tp_src)?;
    rel.scalar(Field::TpDst, own, other, own.tp_dst, other.tp_dst)?;

    Ok(rel)
}

/// Relation of `own` to `other`. `strict` is set when the comparison comes from a strict
/// flow-mod; otherwise an `own` contained in `other` is reported as [Relation::Equal].
pub fn classify(own: &WildcardMatch, other: &WildcardMatch, strict: bool) -> Relation {
    match accumulate(own, other) {
        Ok(rel) => rel.finish(strict),
        Err(Disjoint) => Relation::Disjoint,
    }
}
