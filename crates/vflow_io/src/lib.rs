//! This module provides parsing of flow files in the default format (.flows), an
//! `ovs-ofctl`-like text form of OpenFlow 1.0 flow-mod requests for one datapath.
mod default;

use nom::{
    error::{Error, ParseError},
    {Finish, IResult},
};

use vflow_core::entry::FlowMod;

pub use default::DefaultFlowLoader;

/// [FlowLoader] parses the content of a flow file into the datapath id it addresses and its
/// flow-mod requests, in file order.
///
/// ***The trait and the format are manufacture-specific.***
pub trait FlowLoader {
    // Required method
    fn _load<'x, Err: ParseError<&'x str>>(
        &self,
        content: &'x str,
    ) -> IResult<(), (u64, Vec<FlowMod>), Err>;

    // Provided method
    fn load<'x>(&self, content: &'x str) -> Result<(u64, Vec<FlowMod>), Error<&'x str>> {
        let res = self._load(content).finish();
        match res {
            Ok((_, flows)) => Ok(flows),
            Err(e) => Err(e),
        }
    }
}

/// Basics for io
pub mod basic {
    /// Basic helper functions for parsing
    pub mod parser {
        use std::net::Ipv4Addr;

        use funty::Unsigned;
        use nom::branch::alt;
        use nom::bytes::complete::{tag, take_while1};
        use nom::character::complete::{char, digit1, hex_digit1, multispace1, not_line_ending};
        use nom::combinator::{map, map_opt, opt, recognize};
        use nom::error::{ErrorKind, ParseError};
        use nom::multi::many0_count;
        use nom::sequence::{pair, preceded, tuple};
        use nom::Err::Error;
        use nom::IResult;

        use vflow_core::{
            action::port,
            r#match::{mac::MacAddr, parse_uint},
        };

        fn is_key(chr: char) -> bool {
            chr.is_ascii_alphanumeric() || chr == '_'
        }

        fn is_value(chr: char) -> bool {
            !chr.is_whitespace() && chr != ',' && chr != '#'
        }

        /// r"[a-zA-Z0-9_]+"
        pub fn parse_key<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, &'a str, E> {
            take_while1(is_key)(input)
        }

        /// r"[^\s,#]+"
        pub fn parse_value<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, &'a str, E> {
            take_while1(is_value)(input)
        }

        /// r"(0x[0-9a-fA-F]+)|[0-9]+", checked against the range of `U`
        pub fn parse_number<'a, U: Unsigned, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, U, E> {
            let (rest, digits) = alt((recognize(preceded(tag("0x"), hex_digit1)), digit1))(input)?;
            match parse_uint::<U>(digits) {
                Some(num) => Ok((rest, num)),
                None => Err(Error(E::from_error_kind(input, ErrorKind::Digit))),
            }
        }

        /// A reserved port name (`controller`, `flood`, ...) or a port number.
        pub fn parse_port_number<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, u16, E> {
            alt((
                map_opt(take_while1(|c: char| c.is_ascii_lowercase() || c == '_'), |s| {
                    port::from_reserved_name(s)
                }),
                parse_number::<u16, E>,
            ))(input)
        }

        /// r"[0-9a-fA-F]{1,2}(:[0-9a-fA-F]{1,2}){5}"
        pub fn parse_mac<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, MacAddr, E> {
            map_opt(
                take_while1(|c: char| c.is_ascii_hexdigit() || c == ':'),
                |s: &str| s.parse::<MacAddr>().ok(),
            )(input)
        }

        /// r"[<=255].[<=255].[<=255].[<=255]"
        pub fn parse_ipv4_dotted<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, Ipv4Addr, E> {
            let (rest, (o1, _, o2, _, o3, _, o4)) = tuple((
                parse_number::<u8, E>,
                char('.'),
                parse_number::<u8, E>,
                char('.'),
                parse_number::<u8, E>,
                char('.'),
                parse_number::<u8, E>,
            ))(input)?;
            Ok((rest, Ipv4Addr::new(o1, o2, o3, o4)))
        }

        /// Datapath id: r"(0x)?[0-9a-fA-F]{1,16}" or colon-separated hex bytes.
        pub fn parse_dpid<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, u64, E> {
            let (rest, digits) = preceded(
                opt(tag("0x")),
                take_while1(|c: char| c.is_ascii_hexdigit() || c == ':'),
            )(input)?;
            let hex: String = digits.chars().filter(|c| *c != ':').collect();
            if hex.is_empty() || hex.len() > 16 || digits.starts_with(':') || digits.ends_with(':')
            {
                return Err(Error(E::from_error_kind(input, ErrorKind::HexDigit)));
            }
            match u64::from_str_radix(&hex, 16) {
                Ok(dpid) => Ok((rest, dpid)),
                Err(_) => Err(Error(E::from_error_kind(input, ErrorKind::HexDigit))),
            }
        }

        /// r"#[^\n]*"
        pub fn parse_comment<'a, E: ParseError<&'a str>>(
            input: &'a str,
        ) -> IResult<&'a str, &'a str, E> {
            recognize(pair(char('#'), not_line_ending))(input)
        }

        /// Whitespace and comments, possibly none.
        pub fn parse_blank<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, (), E> {
            map(many0_count(alt((multispace1, parse_comment))), |_| ())(input)
        }
    }
}

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{DefaultFlowLoader, FlowLoader};
}
