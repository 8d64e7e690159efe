//! Submodule bundling all code for exit policy parsing in descriptors

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::consensus::ExitPolicyType;
use crate::error::DocumentParseError;
use crate::meta::Item;

use super::ServerDescriptorBuilder;

use ipnet::IpNet;

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum ExitPolicyAddress {
    Wildcard,
    Address(IpNet),
}

impl fmt::Display for ExitPolicyAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitPolicyAddress::Wildcard => write!(f, "*"),
            ExitPolicyAddress::Address(IpNet::V6(net)) => write!(f, "[{}]", net),
            ExitPolicyAddress::Address(net) => write!(f, "{}", net),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum ExitPortRange<T> {
    Single(T),
    Interval(T, T),
}

impl<T: fmt::Display> fmt::Display for ExitPortRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitPortRange::Single(num) => write!(f, "{}", num),
            ExitPortRange::Interval(from, to) => write!(f, "{}-{}", from, to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitPolicyPort {
    Wildcard,
    Port(ExitPortRange<u16>),
}

impl ExitPolicyPort {
    pub fn contains(&self, port: u16) -> bool {
        match self {
            ExitPolicyPort::Wildcard => true,
            ExitPolicyPort::Port(ExitPortRange::Single(v)) => *v == port,
            ExitPolicyPort::Port(ExitPortRange::Interval(from, to)) => *from <= port && port <= *to,
        }
    }
}

impl fmt::Display for ExitPolicyPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitPolicyPort::Wildcard => write!(f, "*"),
            ExitPolicyPort::Port(port) => write!(f, "{}", port),
        }
    }
}

/// One `accept`/`reject` (or `accept6`/`reject6`) line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorExitPolicyRule {
    pub ep_type: ExitPolicyType,
    /// True for `accept6`/`reject6`.
    pub ipv6_only: bool,
    pub address: ExitPolicyAddress,
    pub port: ExitPolicyPort,
}

impl fmt::Display for DescriptorExitPolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{} {}:{}",
            self.ep_type,
            if self.ipv6_only { "6" } else { "" },
            self.address,
            self.port
        )
    }
}

/// The full exit policy of a descriptor, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorExitPolicy {
    pub rules: Vec<DescriptorExitPolicyRule>,
}

impl DescriptorExitPolicy {
    pub(super) fn add_rule(&mut self, epr: DescriptorExitPolicyRule) {
        self.rules.push(epr);
    }

    /// Return the first rule matching `addr:port`, if any.
    pub fn first_match(&self, addr: IpAddr, port: u16) -> Option<&DescriptorExitPolicyRule> {
        self.rules.iter().find(|r| {
            let addr_ok = match &r.address {
                ExitPolicyAddress::Wildcard => !r.ipv6_only || addr.is_ipv6(),
                ExitPolicyAddress::Address(net) => net.contains(&addr),
            };
            addr_ok && r.port.contains(port)
        })
    }
}

fn parse_exit_policy_address(addr_str: &str) -> Result<ExitPolicyAddress, DocumentParseError> {
    if addr_str == "*" || addr_str == "*4" || addr_str == "*6" {
        return Ok(ExitPolicyAddress::Wildcard);
    }
    let unbracketed = addr_str
        .strip_prefix('[')
        .map(|s| s.replacen(']', "", 1))
        .unwrap_or_else(|| addr_str.to_string());
    let network = if unbracketed.contains('/') {
        IpNet::from_str(&unbracketed)
            .map_err(|_| DocumentParseError::IpParseError(addr_str.to_string()))?
    } else {
        let addr = unbracketed
            .parse::<IpAddr>()
            .map_err(|_| DocumentParseError::IpParseError(addr_str.to_string()))?;
        let prefix = if addr.is_ipv4() { 32 } else { 128 };
        IpNet::new(addr, prefix)
            .map_err(|_| DocumentParseError::IpParseError(addr_str.to_string()))?
    };
    Ok(ExitPolicyAddress::Address(network))
}

pub(super) fn parse_exit_policy_port(port_str: &str) -> Result<ExitPolicyPort, DocumentParseError> {
    match port_str {
        "*" => Ok(ExitPolicyPort::Wildcard),
        _ => Ok(ExitPolicyPort::Port(parse_range(port_str)?)),
    }
}

/// Handle an `accept`, `reject`, `accept6` or `reject6` item.
pub(super) fn parse_exit_policy_rule(
    descriptor: &mut ServerDescriptorBuilder,
    item: &Item<'_>,
) -> Result<(), DocumentParseError> {
    let (ep_type, ipv6_only) = match item.keyword {
        "accept" => (ExitPolicyType::Accept, false),
        "reject" => (ExitPolicyType::Reject, false),
        "accept6" => (ExitPolicyType::Accept, true),
        "reject6" => (ExitPolicyType::Reject, true),
        other => return Err(DocumentParseError::PolicyParseError(other.to_string())),
    };
    let arg = item.required_arg(0)?;
    // IPv6 addresses contain colons themselves, so split at the last one.
    match arg.rsplit_once(':') {
        Some((address, port)) => {
            descriptor.add_exit_policy_rule(DescriptorExitPolicyRule {
                ep_type,
                ipv6_only,
                address: parse_exit_policy_address(address)?,
                port: parse_exit_policy_port(port)?,
            });
            Ok(())
        }
        None => Err(DocumentParseError::args_missing(item.keyword)),
    }
}

fn parse_range<T: FromStr>(input: &str) -> Result<ExitPortRange<T>, DocumentParseError> {
    let parse = |v: &str| {
        v.parse::<T>()
            .map_err(|_| DocumentParseError::RangeParseError(v.to_string()))
    };
    match input.split_once('-') {
        Some((min, max)) => Ok(ExitPortRange::Interval(parse(min)?, parse(max)?)),
        None => Ok(ExitPortRange::Single(parse(input)?)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn addresses() {
        assert_eq!(
            parse_exit_policy_address("*").unwrap(),
            ExitPolicyAddress::Wildcard
        );
        let a = parse_exit_policy_address("10.0.0.0/8").unwrap();
        assert_eq!(a.to_string(), "10.0.0.0/8");
        let a = parse_exit_policy_address("[2001:db8::]/32").unwrap();
        assert_eq!(a.to_string(), "[2001:db8::/32]");
        let a = parse_exit_policy_address("192.168.0.1").unwrap();
        assert_eq!(a.to_string(), "192.168.0.1/32");
        assert!(parse_exit_policy_address("nonsense").is_err());
    }

    #[test]
    fn ports() {
        assert!(parse_exit_policy_port("*").unwrap().contains(1));
        let p = parse_exit_policy_port("80-88").unwrap();
        assert!(p.contains(80) && p.contains(88) && !p.contains(89));
        assert_eq!(p.to_string(), "80-88");
        assert!(parse_exit_policy_port("80-x").is_err());
        assert!(parse_exit_policy_port("70000").is_err());
    }

    #[test]
    fn matching() {
        let policy = DescriptorExitPolicy {
            rules: vec![
                DescriptorExitPolicyRule {
                    ep_type: ExitPolicyType::Reject,
                    ipv6_only: false,
                    address: parse_exit_policy_address("10.0.0.0/8").unwrap(),
                    port: ExitPolicyPort::Wildcard,
                },
                DescriptorExitPolicyRule {
                    ep_type: ExitPolicyType::Accept,
                    ipv6_only: false,
                    address: ExitPolicyAddress::Wildcard,
                    port: parse_exit_policy_port("443").unwrap(),
                },
            ],
        };
        let inside: IpAddr = "10.1.2.3".parse().unwrap();
        let outside: IpAddr = "8.8.8.8".parse().unwrap();
        assert_eq!(
            policy.first_match(inside, 443).unwrap().ep_type,
            ExitPolicyType::Reject
        );
        assert_eq!(
            policy.first_match(outside, 443).unwrap().ep_type,
            ExitPolicyType::Accept
        );
        assert!(policy.first_match(outside, 80).is_none());
        assert_eq!(policy.rules[1].to_string(), "accept *:443");
    }
}
