//! Structured name types: X.500 distinguished names, RFC 822 mailboxes,
//! IP addresses with optional mask and port range, and DNS names.

use std::fmt;
use std::net::IpAddr;

use warden_core::DataType;

use crate::error::ValueError;

// ---------------------------------------------------------------------------
// X.500 names
// ---------------------------------------------------------------------------

/// A distinguished name. RDNs are kept in written order (most specific first);
/// attribute types and values are normalized to lower case with collapsed
/// whitespace so equality is case-insensitive.
#[derive(Debug, Clone)]
pub struct X500Name {
    raw: String,
    rdns: Vec<Vec<(String, String)>>,
}

impl X500Name {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: &str| ValueError::new(DataType::X500Name, raw, reason);
        let mut rdns = Vec::new();
        if raw.trim().is_empty() {
            return Ok(Self {
                raw: raw.to_string(),
                rdns,
            });
        }
        for rdn in split_unescaped(raw, &[',', ';']) {
            let mut avas = Vec::new();
            for ava in split_unescaped(&rdn, &['+']) {
                let (kind, value) = ava
                    .split_once('=')
                    .ok_or_else(|| err("attribute without '='"))?;
                let kind = kind.trim().to_ascii_lowercase();
                if kind.is_empty() {
                    return Err(err("empty attribute type"));
                }
                avas.push((kind, normalize_dn_value(value)));
            }
            avas.sort();
            rdns.push(avas);
        }
        Ok(Self {
            raw: raw.to_string(),
            rdns,
        })
    }

    /// True when `self` is a terminal sequence of `other`'s RDNs.
    pub fn is_suffix_of(&self, other: &X500Name) -> bool {
        other.rdns.ends_with(&self.rdns)
    }
}

impl PartialEq for X500Name {
    fn eq(&self, other: &Self) -> bool {
        self.rdns == other.rdns
    }
}

impl fmt::Display for X500Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split on any of `separators` that is not backslash-escaped or quoted.
/// Escapes are left in place for the value normalizer.
fn split_unescaped(input: &str, separators: &[char]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut quoted = false;
    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                quoted = !quoted;
            }
            c if !quoted && separators.contains(&c) => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn normalize_dn_value(value: &str) -> String {
    let trimmed = value.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(trimmed);
    let mut out = String::new();
    let mut chars = unquoted.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// RFC 822 names
// ---------------------------------------------------------------------------

/// `local@domain`. The local part is case-sensitive, the domain is not.
#[derive(Debug, Clone)]
pub struct Rfc822Name {
    raw: String,
    local: String,
    domain: String,
}

impl Rfc822Name {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: &str| ValueError::new(DataType::Rfc822Name, raw, reason);
        if raw.chars().any(char::is_whitespace) {
            return Err(err("whitespace not allowed"));
        }
        let (local, domain) = raw.rsplit_once('@').ok_or_else(|| err("missing '@'"))?;
        if local.is_empty() || domain.is_empty() {
            return Err(err("empty local part or domain"));
        }
        Ok(Self {
            raw: raw.to_string(),
            local: local.to_string(),
            domain: domain.to_ascii_lowercase(),
        })
    }

    pub fn local_part(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `rfc822Name-match` pattern semantics:
    /// - `user@host` matches that exact mailbox (domain case-insensitive);
    /// - `host` matches every mailbox at exactly that host;
    /// - `.domain` matches every mailbox in a subdomain of `domain`.
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if let Some((local, domain)) = pattern.rsplit_once('@') {
            return local == self.local && domain.eq_ignore_ascii_case(&self.domain);
        }
        let pattern = pattern.to_ascii_lowercase();
        if pattern.starts_with('.') {
            self.domain.ends_with(&pattern)
        } else {
            self.domain == pattern
        }
    }
}

impl PartialEq for Rfc822Name {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.domain == other.domain
    }
}

impl fmt::Display for Rfc822Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// Port ranges
// ---------------------------------------------------------------------------

/// `80`, `80-`, `-80` or `80-90`. Open ends are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub low: Option<u16>,
    pub high: Option<u16>,
}

impl PortRange {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let port = |s: &str| -> Result<Option<u16>, String> {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<u16>()
                    .map(Some)
                    .map_err(|_| format!("invalid port '{}'", s))
            }
        };
        let range = match raw.split_once('-') {
            Some((low, high)) => Self {
                low: port(low)?,
                high: port(high)?,
            },
            None => {
                let single = port(raw)?;
                if single.is_none() {
                    return Err("empty port range".to_string());
                }
                Self {
                    low: single,
                    high: single,
                }
            }
        };
        if let (Some(low), Some(high)) = (range.low, range.high) {
            if low > high {
                return Err(format!("port range {}-{} is inverted", low, high));
            }
        }
        Ok(range)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.low.map_or(true, |low| port >= low) && self.high.map_or(true, |high| port <= high)
    }
}

// ---------------------------------------------------------------------------
// IP addresses
// ---------------------------------------------------------------------------

/// `ipv4[/mask][:ports]` or `[ipv6][/[mask]][:ports]`.
#[derive(Debug, Clone)]
pub struct IpAddressValue {
    raw: String,
    pub address: IpAddr,
    pub mask: Option<IpAddr>,
    pub ports: Option<PortRange>,
}

impl IpAddressValue {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: String| ValueError::new(DataType::IpAddress, raw, reason);
        let (address, mask, ports) = if let Some(rest) = raw.strip_prefix('[') {
            let (addr, rest) = rest
                .split_once(']')
                .ok_or_else(|| err("unterminated IPv6 address".into()))?;
            let (mask, rest) = match rest.strip_prefix("/[") {
                Some(m) => {
                    let (mask, rest) = m
                        .split_once(']')
                        .ok_or_else(|| err("unterminated IPv6 mask".into()))?;
                    (Some(mask), rest)
                }
                None => (None, rest),
            };
            let ports = match rest {
                "" => None,
                r => Some(
                    r.strip_prefix(':')
                        .ok_or_else(|| err(format!("unexpected '{}'", r)))?,
                ),
            };
            (addr, mask, ports)
        } else {
            let (addr_mask, ports) = match raw.split_once(':') {
                Some((a, p)) => (a, Some(p)),
                None => (raw, None),
            };
            let (addr, mask) = match addr_mask.split_once('/') {
                Some((a, m)) => (a, Some(m)),
                None => (addr_mask, None),
            };
            (addr, mask, ports)
        };

        let address: IpAddr = address
            .parse()
            .map_err(|_| err(format!("invalid address '{}'", address)))?;
        let mask: Option<IpAddr> = mask
            .map(|m| {
                m.parse()
                    .map_err(|_| err(format!("invalid mask '{}'", m)))
            })
            .transpose()?;
        if let Some(m) = &mask {
            if m.is_ipv4() != address.is_ipv4() {
                return Err(err("mask and address families differ".into()));
            }
        }
        let ports = ports.map(PortRange::parse).transpose().map_err(err)?;
        Ok(Self {
            raw: raw.to_string(),
            address,
            mask,
            ports,
        })
    }
}

impl PartialEq for IpAddressValue {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.mask == other.mask && self.ports == other.ports
    }
}

impl fmt::Display for IpAddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// DNS names
// ---------------------------------------------------------------------------

/// `host[:ports]` where the leftmost label may be `*`.
#[derive(Debug, Clone)]
pub struct DnsNameValue {
    raw: String,
    pub host: String,
    pub ports: Option<PortRange>,
}

impl DnsNameValue {
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let err = |reason: String| ValueError::new(DataType::DnsName, raw, reason);
        let (host, ports) = match raw.split_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (raw, None),
        };
        if host.is_empty() {
            return Err(err("empty host".into()));
        }
        for (idx, label) in host.split('.').enumerate() {
            if idx == 0 && label == "*" {
                continue;
            }
            let valid = !label.is_empty()
                && label.len() <= 63
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-');
            if !valid {
                return Err(err(format!("invalid label '{}'", label)));
            }
        }
        let ports = ports.map(PortRange::parse).transpose().map_err(err)?;
        Ok(Self {
            raw: raw.to_string(),
            host: host.to_ascii_lowercase(),
            ports,
        })
    }
}

impl PartialEq for DnsNameValue {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.ports == other.ports
    }
}

impl fmt::Display for DnsNameValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x500_equality_ignores_case_and_spacing() {
        let a = X500Name::parse("CN=Alice Smith, O=Example,  C=US").unwrap();
        let b = X500Name::parse("cn=alice  smith,o=example,c=us").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "CN=Alice Smith, O=Example,  C=US");
    }

    #[test]
    fn test_x500_suffix_match() {
        let org = X500Name::parse("O=Medico Corp,C=US").unwrap();
        let person = X500Name::parse("cn=John Smith,o=Medico Corp, c=US").unwrap();
        assert!(org.is_suffix_of(&person));
        assert!(!person.is_suffix_of(&org));
        let other = X500Name::parse("O=Other,C=US").unwrap();
        assert!(!other.is_suffix_of(&person));
    }

    #[test]
    fn test_x500_escaped_comma_stays_in_value() {
        let n = X500Name::parse("CN=Smith\\, John,O=Example").unwrap();
        let m = X500Name::parse("cn=\"Smith, John\",o=example").unwrap();
        assert_eq!(n, m);
        assert!(X500Name::parse("no equals sign").is_err());
    }

    #[test]
    fn test_rfc822_equality_and_patterns() {
        let a = Rfc822Name::parse("Anderson@SUN.COM").unwrap();
        let b = Rfc822Name::parse("Anderson@sun.com").unwrap();
        let c = Rfc822Name::parse("anderson@sun.com").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        assert!(a.matches_pattern("Anderson@sun.com"));
        assert!(!a.matches_pattern("anderson@sun.com"));
        assert!(a.matches_pattern("sun.com"));
        assert!(!a.matches_pattern(".sun.com"));

        let sub = Rfc822Name::parse("smith@east.sun.com").unwrap();
        assert!(sub.matches_pattern(".sun.com"));
        assert!(sub.matches_pattern(".SUN.com"));
        assert!(!sub.matches_pattern("sun.com"));
    }

    #[test]
    fn test_rfc822_rejects_malformed() {
        assert!(Rfc822Name::parse("no-at-sign").is_err());
        assert!(Rfc822Name::parse("@example.com").is_err());
        assert!(Rfc822Name::parse("a b@example.com").is_err());
    }

    #[test]
    fn test_port_ranges() {
        let single = PortRange::parse("80").unwrap();
        assert!(single.contains(80) && !single.contains(81));
        let open_high = PortRange::parse("1024-").unwrap();
        assert!(open_high.contains(65535) && !open_high.contains(1023));
        let open_low = PortRange::parse("-1024").unwrap();
        assert!(open_low.contains(0) && !open_low.contains(1025));
        assert!(PortRange::parse("90-80").is_err());
        assert!(PortRange::parse("").is_err());
    }

    #[test]
    fn test_ip_address_forms() {
        let v4 = IpAddressValue::parse("10.0.0.1/255.0.0.0:80-90").unwrap();
        assert_eq!(v4.address, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(v4.mask, Some("255.0.0.0".parse().unwrap()));
        assert_eq!(v4.ports, Some(PortRange { low: Some(80), high: Some(90) }));

        let v6 = IpAddressValue::parse("[::1]/[ffff::]:443").unwrap();
        assert!(v6.address.is_ipv6());
        assert!(v6.mask.is_some());
        assert_eq!(v6.ports.unwrap().low, Some(443));

        assert!(IpAddressValue::parse("10.0.0.1/[ffff::]").is_err());
        assert!(IpAddressValue::parse("not-an-ip").is_err());
    }

    #[test]
    fn test_dns_names() {
        let a = DnsNameValue::parse("*.Example.com:8080").unwrap();
        assert_eq!(a.host, "*.example.com");
        let b = DnsNameValue::parse("*.example.COM:8080").unwrap();
        assert_eq!(a, b);
        assert!(DnsNameValue::parse("bad_label.com").is_err());
        assert!(DnsNameValue::parse("a.*.com").is_err());
    }
}
