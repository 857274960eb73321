//! # Statistics
//!
//! Bodies of OpenFlow 1.0 statistics requests and replies, and a static registry that maps the
//! numeric statistics tag to the constructors of its request and reply bodies.
//!
//! ```
//! use vflow_core::stats::{StatsBody, StatsDirection, StatsType};
//!
//! let ty = StatsType::from_tag(1).unwrap();
//! let body = ty.instantiate(StatsDirection::Reply);
//! assert!(matches!(body, StatsBody::FlowReply(ref flows) if flows.is_empty()));
//! assert_eq!(body.stats_type(), StatsType::Flow);
//! ```

use std::fmt::{Display, Formatter};

use crate::{
    action::{
        port::{OFPP_ALL, OFPP_NONE},
        FlowAction,
    },
    entry::FlowEntry,
    r#match::{WildcardMatch, Wildcards},
};

/// Table id addressing every table of a switch.
pub const OFPTT_ALL: u8 = 0xff;
/// Queue id addressing every queue of a port.
pub const OFPQ_ALL: u32 = 0xffff_ffff;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatsType {
    Desc = 0,
    Flow = 1,
    Aggregate = 2,
    Table = 3,
    Port = 4,
    Queue = 5,
    Vendor = 0xffff,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatsDirection {
    Request,
    Reply,
}

/// Switch description.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DescStats {
    pub mfr_desc: String,
    pub hw_desc: String,
    pub sw_desc: String,
    pub serial_num: String,
    pub dp_desc: String,
}

/// Selects the entries a flow or aggregate request reports on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FlowStatsRequest {
    pub rule_match: WildcardMatch,
    pub table_id: u8,
    pub out_port: u16,
}

impl Default for FlowStatsRequest {
    fn default() -> Self {
        FlowStatsRequest {
            rule_match: WildcardMatch::new(),
            table_id: OFPTT_ALL,
            out_port: OFPP_NONE,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowStatsReply {
    pub table_id: u8,
    pub rule_match: WildcardMatch,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub actions: Vec<FlowAction>,
}

impl From<&FlowEntry> for FlowStatsReply {
    fn from(entry: &FlowEntry) -> Self {
        let stats = entry.stats();
        FlowStatsReply {
            table_id: 0,
            rule_match: *entry.rule_match(),
            duration_sec: stats.duration_sec,
            duration_nsec: stats.duration_nsec,
            priority: entry.priority(),
            idle_timeout: entry.idle_timeout(),
            hard_timeout: entry.hard_timeout(),
            cookie: entry.cookie(),
            packet_count: stats.packet_count,
            byte_count: stats.byte_count,
            actions: entry.actions().to_vec(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateStatsReply {
    pub packet_count: u64,
    pub byte_count: u64,
    pub flow_count: u32,
}

impl<'a> FromIterator<&'a FlowEntry> for AggregateStatsReply {
    fn from_iter<T: IntoIterator<Item = &'a FlowEntry>>(iter: T) -> Self {
        iter.into_iter()
            .fold(AggregateStatsReply::default(), |mut acc, entry| {
                acc.packet_count = acc.packet_count.wrapping_add(entry.stats().packet_count);
                acc.byte_count = acc.byte_count.wrapping_add(entry.stats().byte_count);
                acc.flow_count = acc.flow_count.saturating_add(1);
                acc
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableStats {
    pub table_id: u8,
    pub name: String,
    pub wildcards: Wildcards,
    pub max_entries: u32,
    pub active_count: u32,
    pub lookup_count: u64,
    pub matched_count: u64,
}

impl Default for TableStats {
    fn default() -> Self {
        TableStats {
            table_id: 0,
            name: String::new(),
            wildcards: Wildcards::ALL,
            max_entries: 0,
            active_count: 0,
            lookup_count: 0,
            matched_count: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortStatsRequest {
    pub port_no: u16,
}

impl Default for PortStatsRequest {
    fn default() -> Self {
        PortStatsRequest { port_no: OFPP_NONE }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortStats {
    pub port_no: u16,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub collisions: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueStatsRequest {
    pub port_no: u16,
    pub queue_id: u32,
}

impl Default for QueueStatsRequest {
    fn default() -> Self {
        QueueStatsRequest {
            port_no: OFPP_ALL,
            queue_id: OFPQ_ALL,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub port_no: u16,
    pub queue_id: u32,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VendorStats {
    pub vendor: u32,
    pub data: Vec<u8>,
}

/// Body of a statistics message. Description and table requests carry no body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatsBody {
    DescRequest,
    DescReply(DescStats),
    FlowRequest(FlowStatsRequest),
    FlowReply(Vec<FlowStatsReply>),
    AggregateRequest(FlowStatsRequest),
    AggregateReply(AggregateStatsReply),
    TableRequest,
    TableReply(Vec<TableStats>),
    PortRequest(PortStatsRequest),
    PortReply(Vec<PortStats>),
    QueueRequest(QueueStatsRequest),
    QueueReply(Vec<QueueStats>),
    Vendor(StatsDirection, VendorStats),
}

impl StatsBody {
    pub fn stats_type(&self) -> StatsType {
        use StatsBody::*;
        match self {
            DescRequest | DescReply(_) => StatsType::Desc,
            FlowRequest(_) | FlowReply(_) => StatsType::Flow,
            AggregateRequest(_) | AggregateReply(_) => StatsType::Aggregate,
            TableRequest | TableReply(_) => StatsType::Table,
            PortRequest(_) | PortReply(_) => StatsType::Port,
            QueueRequest(_) | QueueReply(_) => StatsType::Queue,
            Vendor(..) => StatsType::Vendor,
        }
    }

    pub fn direction(&self) -> StatsDirection {
        use StatsBody::*;
        match self {
            DescRequest | FlowRequest(_) | AggregateRequest(_) | TableRequest
            | PortRequest(_) | QueueRequest(_) => StatsDirection::Request,
            DescReply(_) | FlowReply(_) | AggregateReply(_) | TableReply(_) | PortReply(_)
            | QueueReply(_) => StatsDirection::Reply,
            Vendor(dir, _) => *dir,
        }
    }
}

type BodyConstructor = fn() -> StatsBody;

struct StatsConstructors {
    ty: StatsType,
    request: BodyConstructor,
    reply: BodyConstructor,
}

static REGISTRY: [StatsConstructors; 7] = [
    StatsConstructors {
        ty: StatsType::Desc,
        request: || StatsBody::DescRequest,
        reply: || StatsBody::DescReply(DescStats::default()),
    },
    StatsConstructors {
        ty: StatsType::Flow,
        request: || StatsBody::FlowRequest(FlowStatsRequest::default()),
        reply: || StatsBody::FlowReply(vec![]),
    },
    StatsConstructors {
        ty: StatsType::Aggregate,
        request: || StatsBody::AggregateRequest(FlowStatsRequest::default()),
        reply: || StatsBody::AggregateReply(AggregateStatsReply::default()),
    },
    StatsConstructors {
        ty: StatsType::Table,
        request: || StatsBody::TableRequest,
        reply: || StatsBody::TableReply(vec![]),
    },
    StatsConstructors {
        ty: StatsType::Port,
        request: || StatsBody::PortRequest(PortStatsRequest::default()),
        reply: || StatsBody::PortReply(vec![]),
    },
    StatsConstructors {
        ty: StatsType::Queue,
        request: || StatsBody::QueueRequest(QueueStatsRequest::default()),
        reply: || StatsBody::QueueReply(vec![]),
    },
    StatsConstructors {
        ty: StatsType::Vendor,
        request: || StatsBody::Vendor(StatsDirection::Request, VendorStats::default()),
        reply: || StatsBody::Vendor(StatsDirection::Reply, VendorStats::default()),
    },
];

impl StatsType {
    pub const ALL: [StatsType; 7] = [
        StatsType::Desc,
        StatsType::Flow,
        StatsType::Aggregate,
        StatsType::Table,
        StatsType::Port,
        StatsType::Queue,
        StatsType::Vendor,
    ];

    #[inline]
    pub fn tag(self) -> u16 {
        self as u16
    }

    pub fn from_tag(tag: u16) -> Option<StatsType> {
        REGISTRY.iter().map(|c| c.ty).find(|ty| ty.tag() == tag)
    }

    /// A default body of this type for the given direction.
    pub fn instantiate(self, direction: StatsDirection) -> StatsBody {
        let constructors = &REGISTRY[self.slot()];
        match direction {
            StatsDirection::Request => (constructors.request)(),
            StatsDirection::Reply => (constructors.reply)(),
        }
    }

    #[inline]
    fn slot(self) -> usize {
        match self {
            StatsType::Vendor => REGISTRY.len() - 1,
            ty => ty.tag() as usize,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StatsType::Desc => "desc",
            StatsType::Flow => "flow",
            StatsType::Aggregate => "aggregate",
            StatsType::Table => "table",
            StatsType::Port => "port",
            StatsType::Queue => "queue",
            StatsType::Vendor => "vendor",
        }
    }
}

impl Display for StatsType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{FlowMod, FlowModCommand};

    #[test]
    fn test_registry_slots_match_tags() {
        for (slot, c) in REGISTRY.iter().enumerate() {
            assert_eq!(c.ty.slot(), slot);
        }
        for ty in StatsType::ALL {
            assert_eq!(StatsType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(StatsType::from_tag(6), None);
        assert_eq!(StatsType::from_tag(0xfffe), None);
    }

    #[test]
    fn test_instantiate_both_directions() {
        for ty in StatsType::ALL {
            for dir in [StatsDirection::Request, StatsDirection::Reply] {
                let body = ty.instantiate(dir);
                assert_eq!(body.stats_type(), ty, "{ty} {dir:?}");
                assert_eq!(body.direction(), dir, "{ty} {dir:?}");
            }
        }
        assert_eq!(
            StatsType::Queue.instantiate(StatsDirection::Request),
            StatsBody::QueueRequest(QueueStatsRequest {
                port_no: OFPP_ALL,
                queue_id: OFPQ_ALL,
            })
        );
    }

    #[test]
    fn test_flow_reply_from_entry() {
        let fm = FlowMod::new(FlowModCommand::Add, WildcardMatch::new().with_tp_dst(22))
            .with_priority(7)
            .with_cookie(9)
            .with_timeouts(1, 2)
            .with_actions([FlowAction::output(4)]);
        let mut entry = FlowEntry::new(&fm, 1);
        entry.stats_mut().packet_count = 3;
        entry.stats_mut().byte_count = 180;
        let reply = FlowStatsReply::from(&entry);
        assert_eq!(reply.priority, 7);
        assert_eq!(reply.cookie, 9);
        assert_eq!((reply.idle_timeout, reply.hard_timeout), (1, 2));
        assert_eq!((reply.packet_count, reply.byte_count), (3, 180));
        assert_eq!(reply.actions, vec![FlowAction::output(4)]);
        assert_eq!(reply.rule_match, *entry.rule_match());

        let agg: AggregateStatsReply = [&entry, &entry].into_iter().collect();
        assert_eq!(
            agg,
            AggregateStatsReply {
                packet_count: 6,
                byte_count: 360,
                flow_count: 2,
            }
        );
    }
}
