//! Command matrix.
//!
//! Maps a (family, case) selection to the AT commands sent to the modem. Each
//! family has a fixed case table; families 0 and 1 also have a "run everything"
//! list used when no case is given. Rendering is plain formatting: fields are
//! joined with commas after `AT+NAME=`, in table order, with no escaping. The
//! firmware parses positionally, so the order here is the wire contract.

use crate::config::ParameterSet;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A value substituted into a command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Ssid,
    Country,
    Security,
    Password,
    TxPower,
    Dhcp,
    StaticIp,
    RemoteIp,
    Count,
    Interval,
    /// Sent verbatim.
    Literal(&'static str),
}

impl Field {
    fn render(self, params: &ParameterSet) -> String {
        match self {
            Field::Ssid => params.ssid.clone(),
            Field::Country => params.country.clone(),
            Field::Security => params.security.to_string(),
            Field::Password => params.password.clone(),
            Field::TxPower => params.tx_power.to_string(),
            Field::Dhcp => u8::from(params.dhcp).to_string(),
            Field::StaticIp => params.static_ip.clone(),
            Field::RemoteIp => params.remote_ip.clone(),
            Field::Count => params.count.to_string(),
            Field::Interval => params.interval_ms.to_string(),
            Field::Literal(text) => text.to_string(),
        }
    }
}

/// `AT+<name>=<fields...>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl Template {
    const fn new(name: &'static str, fields: &'static [Field]) -> Self {
        Self { name, fields }
    }

    pub fn render(&self, params: &ParameterSet) -> Command {
        let mut line = format!("AT+{}", self.name);
        if !self.fields.is_empty() {
            let values: Vec<String> = self.fields.iter().map(|f| f.render(params)).collect();
            line.push('=');
            line.push_str(&values.join(","));
        }
        Command(line)
    }
}

/// One selectable entry in a family's case table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseSpec {
    pub name: &'static str,
    pub template: Template,
}

const fn case(name: &'static str, template: Template) -> CaseSpec {
    CaseSpec { name, template }
}

use Field::*;

// Association parameters shared by almost every test.
const NET: &[Field] = &[Ssid, Country, Security, Password, TxPower, Dhcp, StaticIp];
const NET_REMOTE: &[Field] = &[
    Ssid, Country, Security, Password, TxPower, Dhcp, StaticIp, RemoteIp,
];
const NET_REMOTE_COUNT: &[Field] = &[
    Ssid, Country, Security, Password, TxPower, Dhcp, StaticIp, RemoteIp, Count,
];
const NET_COUNT_INTERVAL: &[Field] = &[
    Ssid, Country, Security, Password, TxPower, Dhcp, StaticIp, Count, Interval,
];
const NET_REMOTE_COUNT_INTERVAL: &[Field] = &[
    Ssid, Country, Security, Password, TxPower, Dhcp, StaticIp, RemoteIp, Count, Interval,
];
const LOOP: &[Field] = &[Count, Interval];

// The soft AP test takes a fixed flag and AP address.
const SOFTAP: &[Field] = &[
    Ssid,
    Country,
    Security,
    Password,
    TxPower,
    Literal("1"),
    Literal("192.168.200.1"),
    Count,
];

const APP_CASES: &[CaseSpec] = &[
    case("softap", Template::new("TSOFTAP", SOFTAP)),
    case("fota", Template::new("TFOTA", NET)),
    case("tcp_server", Template::new("TTCP_SERVER", NET)),
    case("udp_server", Template::new("TUDP_SERVER", NET)),
    case("uart", Template::new("TUART", NET_REMOTE)),
    case("i2c", Template::new("TI2C", LOOP)),
    case("spi", Template::new("TSPI", LOOP)),
    case("adc", Template::new("TADC", LOOP)),
    case("pwm", Template::new("TPWM", LOOP)),
    case("memory", Template::new("TMEMORY", LOOP)),
    case("gpio", Template::new("TGPIO", LOOP)),
    case("timer", Template::new("TTIMER", &[])),
    case("json", Template::new("TJSON", &[])),
    case("xml", Template::new("TXML", &[])),
];

const APP_RUN_ALL: &[Template] = &[
    Template::new("TWIFI_STATE", NET_COUNT_INTERVAL),
    Template::new("TTCP_CLIENT", NET_REMOTE_COUNT),
    Template::new("TUDP_CLIENT", NET_REMOTE_COUNT),
    Template::new("THTTP", NET),
];

const IOT_CASES: &[CaseSpec] = &[case("coap_server", Template::new("TCOAP_SERVER", NET))];

const IOT_RUN_ALL: &[Template] = &[
    Template::new("TAWS", NET_COUNT_INTERVAL),
    Template::new("TONEM2M", NET_COUNT_INTERVAL),
    Template::new("TMQTT", NET_COUNT_INTERVAL),
    Template::new("TCOAP_CLIENT", NET_REMOTE_COUNT_INTERVAL),
];

const SAMPLE_CASES: &[CaseSpec] = &[
    case("aging_tcp_client", Template::new("TAGING_TC", NET_REMOTE)),
    case("iperf_udp_client", Template::new("TIPERF_UC", NET_REMOTE_COUNT)),
    case("iperf_udp_server", Template::new("TIPERF_US", NET)),
    case("socket_client", Template::new("TSOCKET", NET_REMOTE)),
];

/// Test family selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TestFamily {
    /// Sample applications: sockets, peripherals, data formats.
    AppTest,
    /// IoT protocol samples.
    IotTest,
    /// Aging and throughput samples; a case is mandatory.
    Sample,
}

impl TestFamily {
    pub const ALL: [TestFamily; 3] = [TestFamily::AppTest, TestFamily::IotTest, TestFamily::Sample];

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u32 {
        match self {
            TestFamily::AppTest => 0,
            TestFamily::IotTest => 1,
            TestFamily::Sample => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TestFamily::AppTest => "SAMPLE_APP_TEST",
            TestFamily::IotTest => "SAMPLE_APP_IOT_TEST",
            TestFamily::Sample => "SAMPLE_TEST",
        }
    }

    pub fn cases(self) -> &'static [CaseSpec] {
        match self {
            TestFamily::AppTest => APP_CASES,
            TestFamily::IotTest => IOT_CASES,
            TestFamily::Sample => SAMPLE_CASES,
        }
    }

    /// The list run when no case is selected, if the family has one.
    pub fn run_all(self) -> Option<&'static [Template]> {
        match self {
            TestFamily::AppTest => Some(APP_RUN_ALL),
            TestFamily::IotTest => Some(IOT_RUN_ALL),
            TestFamily::Sample => None,
        }
    }
}

impl fmt::Display for TestFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index(), self.name())
    }
}

/// Rejected selector. Always raised before the port is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("unknown test family {0} (expected 0..=2)")]
    UnknownFamily(u32),

    #[error("unknown case {case} for {family} (expected 0..={max})")]
    UnknownCase {
        family: TestFamily,
        case: u32,
        max: usize,
    },

    #[error("{0} requires a test case")]
    CaseRequired(TestFamily),
}

/// A validated (family, case) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    family: TestFamily,
    /// `None` selects the family's run-everything list.
    case: Option<usize>,
}

impl Selection {
    /// Validate raw CLI indices against the tables.
    pub fn from_indices(family: u32, case: Option<u32>) -> Result<Self, UsageError> {
        let family = TestFamily::from_index(family).ok_or(UsageError::UnknownFamily(family))?;

        let case = match case {
            Some(index) => {
                let cases = family.cases();
                if index as usize >= cases.len() {
                    return Err(UsageError::UnknownCase {
                        family,
                        case: index,
                        max: cases.len() - 1,
                    });
                }
                Some(index as usize)
            }
            None if family.run_all().is_some() => None,
            None => return Err(UsageError::CaseRequired(family)),
        };

        Ok(Self { family, case })
    }

    pub fn family(&self) -> TestFamily {
        self.family
    }

    /// Index into the family's case table; `None` for run-everything.
    pub fn case(&self) -> Option<usize> {
        self.case
    }

    /// Case name, or `"all"` for the run-everything list.
    pub fn label(&self) -> &'static str {
        match self.case {
            Some(index) => self.family.cases()[index].name,
            None => "all",
        }
    }

    /// Render the command list for this selection.
    pub fn commands(&self, params: &ParameterSet) -> CommandList {
        let commands = match self.case {
            Some(index) => vec![self.family.cases()[index].template.render(params)],
            // from_indices only admits `None` for families with a run-all list
            None => self
                .family
                .run_all()
                .unwrap_or_default()
                .iter()
                .map(|t| t.render(params))
                .collect(),
        };
        CommandList(commands)
    }
}

/// Validate indices and render the command list in one step.
pub fn resolve(
    family: u32,
    case: Option<u32>,
    params: &ParameterSet,
) -> Result<CommandList, UsageError> {
    Ok(Selection::from_indices(family, case)?.commands(params))
}

/// One AT command line, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part between `AT+` and `=`.
    pub fn name(&self) -> &str {
        let body = self.0.strip_prefix("AT+").unwrap_or(&self.0);
        body.split_once('=').map_or(body, |(name, _)| name)
    }

    /// Comma-separated parameters after `=`; empty for bare commands.
    pub fn params(&self) -> Vec<&str> {
        match self.0.split_once('=') {
            Some((_, params)) => params.split(',').collect(),
            None => Vec::new(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commands for one run, in send order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandList(Vec<Command>);

impl CommandList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Command] {
        &self.0
    }
}

impl From<Vec<Command>> for CommandList {
    fn from(commands: Vec<Command>) -> Self {
        Self(commands)
    }
}

impl FromIterator<Command> for CommandList {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for CommandList {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Self(line.to_string())
    }
}

/// Human-readable table of families and cases.
pub fn usage() -> String {
    let mut out = String::from("Test families and cases:\n");
    for family in TestFamily::ALL {
        out.push_str(&format!("\n  {family}"));
        if family.run_all().is_some() {
            out.push_str("  (omit CASE to run the full sequence)");
        } else {
            out.push_str("  (CASE required)");
        }
        out.push('\n');
        for (index, spec) in family.cases().iter().enumerate() {
            out.push_str(&format!(
                "    {index:>2}: {:<18} AT+{}\n",
                spec.name, spec.template.name
            ));
        }
    }
    out
}
