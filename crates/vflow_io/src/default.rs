use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, line_ending, space0, space1},
    combinator::{all_consuming, eof, map, value},
    error::{ErrorKind, ParseError},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};
use tracing::debug;

use vflow_core::{
    action::FlowAction,
    entry::{FlowMod, FlowModCommand, FlowModFlags},
    r#match::{field::Field, WildcardMatch},
};

use crate::{
    basic::parser::{
        parse_blank, parse_comment, parse_dpid, parse_ipv4_dotted, parse_key, parse_mac,
        parse_number, parse_port_number, parse_value,
    },
    FlowLoader,
};

/// Loader of the default flow-file format:
///
/// ```text
/// dpid 00:00:00:00:00:00:00:01
/// # comment
/// add priority=100,idle_timeout=10,in_port=3,nw_dst=10.0.0.0/24,actions=output:2
/// delete_strict priority=100,in_port=3,nw_dst=10.0.0.0/24
/// ```
#[derive(Default)]
pub struct DefaultFlowLoader {}

impl FlowLoader for DefaultFlowLoader {
    fn _load<'x, E: ParseError<&'x str>>(
        &self,
        content: &'x str,
    ) -> IResult<(), (u64, Vec<FlowMod>), E> {
        let (rest, dpid) = preceded(parse_blank, parse_header)(content)?;
        let (rest, flow_mods) = parse_flow_lines(rest)?;
        let (_, _) = all_consuming(eof)(rest)?;
        debug!(dpid, flows = flow_mods.len(), "flow file loaded");
        Ok(((), (dpid, flow_mods)))
    }
}

/// One `key=value` pair, bare flag or action list of a flow line.
#[derive(Debug)]
enum Setting<'x> {
    Assign(&'x str, &'x str),
    Flag(&'x str),
    Actions(Vec<FlowAction>),
}

fn parse_header<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, u64, E> {
    terminated(
        preceded(pair(tag("dpid"), space1), parse_dpid),
        parse_line_end,
    )(input)
}

/// Trailing blanks, an optional comment, then a line break or the end of input.
fn parse_line_end<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
    value(
        (),
        tuple((
            space0,
            alt((
                value((), parse_comment),
                value((), line_ending),
                value((), eof),
            )),
        )),
    )(input)
}

fn parse_command<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, FlowModCommand, E> {
    // longer names first, `modify` is a prefix of `modify_strict`
    alt((
        value(FlowModCommand::ModifyStrict, tag("modify_strict")),
        value(FlowModCommand::DeleteStrict, tag("delete_strict")),
        value(FlowModCommand::Modify, tag("modify")),
        value(FlowModCommand::Delete, tag("delete")),
        value(FlowModCommand::Add, tag("add")),
    ))(input)
}

fn parse_action<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, FlowAction, E> {
    alt((
        map(preceded(tag("output:"), parse_port_number), FlowAction::output),
        map(
            preceded(tag("mod_vlan_vid:"), parse_number::<u16, E>),
            FlowAction::SetVlanVid,
        ),
        map(
            preceded(tag("mod_vlan_pcp:"), parse_number::<u8, E>),
            FlowAction::SetVlanPcp,
        ),
        value(FlowAction::StripVlan, tag("strip_vlan")),
        map(preceded(tag("mod_dl_src:"), parse_mac), FlowAction::SetDlSrc),
        map(preceded(tag("mod_dl_dst:"), parse_mac), FlowAction::SetDlDst),
        map(preceded(tag("mod_nw_src:"), parse_ipv4_dotted), FlowAction::SetNwSrc),
        map(preceded(tag("mod_nw_dst:"), parse_ipv4_dotted), FlowAction::SetNwDst),
        map(
            preceded(tag("mod_nw_tos:"), parse_number::<u8, E>),
            FlowAction::SetNwTos,
        ),
        map(
            preceded(tag("mod_tp_src:"), parse_number::<u16, E>),
            FlowAction::SetTpSrc,
        ),
        map(
            preceded(tag("mod_tp_dst:"), parse_number::<u16, E>),
            FlowAction::SetTpDst,
        ),
        map(
            preceded(
                tag("enqueue:"),
                separated_pair(parse_port_number, char(':'), parse_number::<u32, E>),
            ),
            |(port, queue_id)| FlowAction::Enqueue { port, queue_id },
        ),
    ))(input)
}

fn parse_actions<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<FlowAction>, E> {
    alt((
        value(vec![], tag("drop")),
        separated_list1(char(','), parse_action),
    ))(input)
}

fn parse_setting<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Setting<'a>, E> {
    alt((
        map(preceded(tag("actions="), parse_actions), Setting::Actions),
        map(
            separated_pair(parse_key, char('='), parse_value),
            |(key, value)| Setting::Assign(key, value),
        ),
        map(parse_key, Setting::Flag),
    ))(input)
}

/// Applies one setting to the request; `None` when the key, flag or value is not valid.
fn apply_setting(fm: &mut FlowMod, setting: Setting) -> Option<()> {
    fn number<U: funty::Unsigned>(value: &str) -> Option<U> {
        let (rest, num) = parse_number::<U, nom::error::Error<&str>>(value).ok()?;
        rest.is_empty().then_some(num)
    }

    match setting {
        Setting::Actions(actions) => fm.actions = actions,
        Setting::Assign("priority", v) => fm.priority = number(v)?,
        Setting::Assign("cookie", v) => fm.cookie = number(v)?,
        Setting::Assign("idle_timeout", v) => fm.idle_timeout = number(v)?,
        Setting::Assign("hard_timeout", v) => fm.hard_timeout = number(v)?,
        Setting::Assign("out_port", v) => {
            let (rest, port) = parse_port_number::<nom::error::Error<&str>>(v).ok()?;
            if !rest.is_empty() {
                return None;
            }
            fm.out_port = port;
        }
        Setting::Assign(key, v) => {
            let field = Field::from_name(key)?;
            fm.rule_match.set_field_str(field, v).ok()?;
        }
        Setting::Flag("check_overlap") => fm.flags |= FlowModFlags::CHECK_OVERLAP,
        Setting::Flag("send_flow_rem") => fm.flags |= FlowModFlags::SEND_FLOW_REM,
        Setting::Flag("emerg") => fm.flags |= FlowModFlags::EMERG,
        Setting::Flag(_) => return None,
    }
    Some(())
}

/// r"<command>( <setting>(,<setting>)*)?"
fn parse_flow_mod<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, FlowMod, E> {
    let (mut rest, command) = parse_command(input)?;
    let mut fm = FlowMod::new(command, WildcardMatch::new());
    let Ok((mut cursor, _)) = space1::<&str, E>(rest) else {
        return Ok((rest, fm));
    };
    loop {
        let (after, setting) = match parse_setting(cursor) {
            Ok(parsed) => parsed,
            // whatever follows is left to the line terminator
            Err(nom::Err::Error(_)) => return Ok((rest, fm)),
            Err(e) => return Err(e),
        };
        if apply_setting(&mut fm, setting).is_none() {
            return Err(nom::Err::Failure(E::from_error_kind(
                cursor,
                ErrorKind::Verify,
            )));
        }
        rest = after;
        match char::<&str, E>(',')(after) {
            Ok((next, _)) => cursor = next,
            Err(_) => return Ok((rest, fm)),
        }
    }
}

fn parse_flow_line<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, FlowMod, E> {
    terminated(parse_flow_mod, parse_line_end)(input)
}

fn parse_flow_lines<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Vec<FlowMod>, E> {
    delimited(
        parse_blank,
        many0(preceded(parse_blank, parse_flow_line)),
        parse_blank,
    )(input)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use vflow_core::{action::port, r#match::mac::MacAddr};

    use super::*;

    #[test]
    fn test_load_flow_file() {
        let loader = DefaultFlowLoader::default();
        let content = r#"
        # virtual switch 1
        dpid 00:00:00:00:00:00:00:01
        add priority=100,cookie=0x1,idle_timeout=10,in_port=3,nw_dst=10.0.0.0/24,actions=output:2
        add priority=200,dl_type=0x0800,nw_proto=6,tp_dst=80,check_overlap,actions=mod_vlan_vid:10,output:controller # web

        delete_strict priority=100,in_port=3,nw_dst=10.0.0.0/24
        delete out_port=2
        modify_strict in_port=1,actions=drop
        "#;
        let (dpid, flows) = loader.load(content).unwrap();
        assert_eq!(dpid, 1);
        assert_eq!(flows.len(), 5);

        let f0 = &flows[0];
        assert_eq!(f0.command, FlowModCommand::Add);
        assert_eq!(f0.priority, 100);
        assert_eq!(f0.cookie, 1);
        assert_eq!(f0.idle_timeout, 10);
        assert_eq!(f0.hard_timeout, 0);
        assert_eq!(
            f0.rule_match,
            WildcardMatch::new()
                .with_in_port(3)
                .with_nw_dst(Ipv4Addr::new(10, 0, 0, 0), 24)
        );
        assert_eq!(f0.actions, vec![FlowAction::output(2)]);
        assert!(f0.flags.is_empty());

        let f1 = &flows[1];
        assert!(f1.flags.contains(FlowModFlags::CHECK_OVERLAP));
        assert_eq!(f1.rule_match.to_string(), "dl_type=0x0800,nw_proto=6,tp_dst=80");
        assert_eq!(
            f1.actions,
            vec![
                FlowAction::SetVlanVid(10),
                FlowAction::output(port::OFPP_CONTROLLER)
            ]
        );

        assert_eq!(flows[2].command, FlowModCommand::DeleteStrict);
        assert!(flows[2].actions.is_empty());
        assert_eq!(flows[3].command, FlowModCommand::Delete);
        assert_eq!(flows[3].out_port, 2);
        assert_eq!(flows[3].rule_match, WildcardMatch::new());
        assert_eq!(flows[4].command, FlowModCommand::ModifyStrict);
        assert!(flows[4].actions.is_empty());
        assert_eq!(flows[4].out_port, port::OFPP_NONE);
    }

    #[test]
    fn test_every_action() {
        let loader = DefaultFlowLoader::default();
        let content = "dpid 0x2a\nadd actions=mod_vlan_pcp:3,strip_vlan,\
            mod_dl_src:00:00:00:00:00:01,mod_dl_dst:00:00:00:00:00:02,mod_nw_src:10.0.0.1,\
            mod_nw_dst:10.0.0.2,mod_nw_tos:4,mod_tp_src:1000,mod_tp_dst:2000,enqueue:1:7,\
            output:flood\n";
        let (dpid, flows) = loader.load(content).unwrap();
        assert_eq!(dpid, 0x2a);
        assert_eq!(
            flows[0].actions,
            vec![
                FlowAction::SetVlanPcp(3),
                FlowAction::StripVlan,
                FlowAction::SetDlSrc(MacAddr([0, 0, 0, 0, 0, 1])),
                FlowAction::SetDlDst(MacAddr([0, 0, 0, 0, 0, 2])),
                FlowAction::SetNwSrc(Ipv4Addr::new(10, 0, 0, 1)),
                FlowAction::SetNwDst(Ipv4Addr::new(10, 0, 0, 2)),
                FlowAction::SetNwTos(4),
                FlowAction::SetTpSrc(1000),
                FlowAction::SetTpDst(2000),
                FlowAction::Enqueue {
                    port: 1,
                    queue_id: 7
                },
                FlowAction::output(port::OFPP_FLOOD),
            ]
        );
    }

    #[test]
    fn test_flags_and_bare_command() {
        let loader = DefaultFlowLoader::default();
        let content = "dpid 1\nadd send_flow_rem,emerg,hard_timeout=30,priority=0x10\ndelete\n";
        let (_, flows) = loader.load(content).unwrap();
        assert_eq!(flows.len(), 2);
        assert_eq!(
            flows[0].flags,
            FlowModFlags::SEND_FLOW_REM | FlowModFlags::EMERG
        );
        assert_eq!(flows[0].hard_timeout, 30);
        assert_eq!(flows[0].priority, 16);
        assert_eq!(flows[1].command, FlowModCommand::Delete);
        assert_eq!(flows[1].rule_match, WildcardMatch::new());
    }

    #[test]
    fn test_rejects_malformed() {
        let loader = DefaultFlowLoader::default();
        // missing header
        assert!(loader.load("add in_port=1\n").is_err());
        // unknown field
        assert!(loader.load("dpid 1\nadd dip=1\n").is_err());
        // out of range
        assert!(loader.load("dpid 1\nadd priority=70000\n").is_err());
        assert!(loader.load("dpid 1\nadd nw_dst=10.0.0.0/40\n").is_err());
        // unknown flag
        assert!(loader.load("dpid 1\nadd overlap\n").is_err());
        // unknown command
        assert!(loader.load("dpid 1\nremove in_port=1\n").is_err());
        // trailing garbage on a line
        assert!(loader.load("dpid 1\nadd in_port=1 in_port=2\n").is_err());
        // bad action
        assert!(loader.load("dpid 1\nadd actions=output:nowhere\n").is_err());
        // dpid wider than 64 bits
        assert!(loader.load("dpid 00:00:00:00:00:00:00:00:01\n").is_err());
    }

    #[test]
    fn test_error_points_at_bad_setting() {
        let loader = DefaultFlowLoader::default();
        let content = "dpid 1\nadd in_port=1,tp_dst=http\n";
        let err = loader.load(content).unwrap_err();
        assert!(err.input.starts_with("tp_dst=http"), "{:?}", err.input);
        assert_eq!(err.code, ErrorKind::Verify);
    }

    #[test]
    fn test_flow_lines_without_header() {
        let (rest, flows) =
            parse_flow_lines::<nom::error::Error<&str>>("\n add in_port=1\n# x\n delete\n")
                .unwrap();
        assert!(rest.is_empty());
        assert_eq!(flows.len(), 2);
    }
}
