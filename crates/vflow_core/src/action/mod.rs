//! # Action
//! OpenFlow 1.0 actions carried by a flow entry. Actions are plain values: two entries with the
//! same match and priority are the same entry only if their action lists are equal too.
use std::{
    fmt::{Display, Formatter},
    net::Ipv4Addr,
};

use crate::r#match::mac::MacAddr;

/// Reserved port numbers.
pub mod port {
    pub const OFPP_IN_PORT: u16 = 0xfff8;
    pub const OFPP_TABLE: u16 = 0xfff9;
    pub const OFPP_NORMAL: u16 = 0xfffa;
    pub const OFPP_FLOOD: u16 = 0xfffb;
    pub const OFPP_ALL: u16 = 0xfffc;
    pub const OFPP_CONTROLLER: u16 = 0xfffd;
    pub const OFPP_LOCAL: u16 = 0xfffe;
    pub const OFPP_NONE: u16 = 0xffff;

    /// Name of a reserved port, if `port` is one.
    pub fn reserved_name(port: u16) -> Option<&'static str> {
        match port {
            OFPP_IN_PORT => Some("in_port"),
            OFPP_TABLE => Some("table"),
            OFPP_NORMAL => Some("normal"),
            OFPP_FLOOD => Some("flood"),
            OFPP_ALL => Some("all"),
            OFPP_CONTROLLER => Some("controller"),
            OFPP_LOCAL => Some("local"),
            OFPP_NONE => Some("none"),
            _ => None,
        }
    }

    pub fn from_reserved_name(name: &str) -> Option<u16> {
        match name {
            "in_port" => Some(OFPP_IN_PORT),
            "table" => Some(OFPP_TABLE),
            "normal" => Some(OFPP_NORMAL),
            "flood" => Some(OFPP_FLOOD),
            "all" => Some(OFPP_ALL),
            "controller" => Some(OFPP_CONTROLLER),
            "local" => Some(OFPP_LOCAL),
            "none" => Some(OFPP_NONE),
            _ => None,
        }
    }
}

/// Default number of bytes sent to the controller by an output action.
pub const DEFAULT_MISS_SEND_LEN: u16 = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FlowAction {
    Output { port: u16, max_len: u16 },
    SetVlanVid(u16),
    SetVlanPcp(u8),
    StripVlan,
    SetDlSrc(MacAddr),
    SetDlDst(MacAddr),
    SetNwSrc(Ipv4Addr),
    SetNwDst(Ipv4Addr),
    SetNwTos(u8),
    SetTpSrc(u16),
    SetTpDst(u16),
    Enqueue { port: u16, queue_id: u32 },
    Vendor { vendor: u32 },
}

impl FlowAction {
    #[inline]
    pub fn output(port: u16) -> Self {
        FlowAction::Output {
            port,
            max_len: DEFAULT_MISS_SEND_LEN,
        }
    }

    /// Port this action sends packets to, if any.
    #[inline]
    pub fn out_port(&self) -> Option<u16> {
        match self {
            FlowAction::Output { port, .. } | FlowAction::Enqueue { port, .. } => Some(*port),
            _ => None,
        }
    }
}

fn fmt_port(port: u16, f: &mut Formatter<'_>) -> std::fmt::Result {
    match port::reserved_name(port) {
        Some(name) => write!(f, "{}", name),
        None => write!(f, "{}", port),
    }
}

impl Display for FlowAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowAction::Output { port, .. } => {
                write!(f, "output:")?;
                fmt_port(*port, f)
            }
            FlowAction::SetVlanVid(v) => write!(f, "mod_vlan_vid:{}", v),
            FlowAction::SetVlanPcp(v) => write!(f, "mod_vlan_pcp:{}", v),
            FlowAction::StripVlan => write!(f, "strip_vlan"),
            FlowAction::SetDlSrc(mac) => write!(f, "mod_dl_src:{}", mac),
            FlowAction::SetDlDst(mac) => write!(f, "mod_dl_dst:{}", mac),
            FlowAction::SetNwSrc(ip) => write!(f, "mod_nw_src:{}", ip),
            FlowAction::SetNwDst(ip) => write!(f, "mod_nw_dst:{}", ip),
            FlowAction::SetNwTos(v) => write!(f, "mod_nw_tos:{}", v),
            FlowAction::SetTpSrc(v) => write!(f, "mod_tp_src:{}", v),
            FlowAction::SetTpDst(v) => write!(f, "mod_tp_dst:{}", v),
            FlowAction::Enqueue { port, queue_id } => {
                write!(f, "enqueue:")?;
                fmt_port(*port, f)?;
                write!(f, ":{}", queue_id)
            }
            FlowAction::Vendor { vendor } => write!(f, "vendor:{:#x}", vendor),
        }
    }
}

/// Formats an action list the way `ovs-ofctl` does; an empty list is `drop`.
pub struct DisplayActions<'a>(pub &'a [FlowAction]);

impl Display for DisplayActions<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "drop");
        }
        for (i, action) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", action)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let actions = [
            FlowAction::SetVlanVid(10),
            FlowAction::output(2),
            FlowAction::output(port::OFPP_FLOOD),
            FlowAction::Enqueue {
                port: 1,
                queue_id: 7,
            },
        ];
        assert_eq!(
            DisplayActions(&actions).to_string(),
            "mod_vlan_vid:10,output:2,output:flood,enqueue:1:7"
        );
        assert_eq!(DisplayActions(&[]).to_string(), "drop");
    }

    #[test]
    fn test_out_port() {
        assert_eq!(FlowAction::output(5).out_port(), Some(5));
        assert_eq!(FlowAction::StripVlan.out_port(), None);
        assert_eq!(port::from_reserved_name("controller"), Some(port::OFPP_CONTROLLER));
        assert_eq!(port::reserved_name(3), None);
    }
}
