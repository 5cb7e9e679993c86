//! Command matrix tests: every table entry, selector rejection and determinism.

use at_test_driver::config::{ParameterSet, SecurityMode};
use at_test_driver::matrix::{resolve, Selection, TestFamily, UsageError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// (family, case, command name, parameter count)
const CASE_TABLE: &[(u32, u32, &str, usize)] = &[
    (0, 0, "TSOFTAP", 8),
    (0, 1, "TFOTA", 7),
    (0, 2, "TTCP_SERVER", 7),
    (0, 3, "TUDP_SERVER", 7),
    (0, 4, "TUART", 8),
    (0, 5, "TI2C", 2),
    (0, 6, "TSPI", 2),
    (0, 7, "TADC", 2),
    (0, 8, "TPWM", 2),
    (0, 9, "TMEMORY", 2),
    (0, 10, "TGPIO", 2),
    (0, 11, "TTIMER", 0),
    (0, 12, "TJSON", 0),
    (0, 13, "TXML", 0),
    (1, 0, "TCOAP_SERVER", 7),
    (2, 0, "TAGING_TC", 8),
    (2, 1, "TIPERF_UC", 9),
    (2, 2, "TIPERF_US", 7),
    (2, 3, "TSOCKET", 8),
];

fn lab_params() -> ParameterSet {
    ParameterSet {
        ssid: "lab".to_string(),
        country: "KR".to_string(),
        security: SecurityMode::Open,
        password: "pw".to_string(),
        tx_power: 20,
        dhcp: true,
        static_ip: "10.0.0.2".to_string(),
        remote_ip: "10.0.0.1".to_string(),
        count: 3,
        interval_ms: 250,
    }
}

#[test]
fn test_every_case_has_expected_name_and_arity() {
    let params = ParameterSet::default();
    for &(family, case, name, count) in CASE_TABLE {
        let list = resolve(family, Some(case), &params).unwrap();
        assert_eq!(list.len(), 1, "family {family} case {case}");

        let command = &list.as_slice()[0];
        assert!(command.as_str().starts_with("AT+"));
        assert_eq!(command.name(), name, "family {family} case {case}");
        assert_eq!(command.params().len(), count, "{command}");
    }
}

#[test]
fn test_case_table_is_exhaustive() {
    for family in TestFamily::ALL {
        let listed = CASE_TABLE
            .iter()
            .filter(|(f, ..)| *f == family.index())
            .count();
        assert_eq!(listed, family.cases().len(), "{family}");
    }
}

#[test]
fn test_network_fields_keep_positional_order() {
    let list = resolve(2, Some(1), &lab_params()).unwrap();
    assert_eq!(
        list.as_slice()[0].as_str(),
        "AT+TIPERF_UC=lab,KR,0,pw,20,1,10.0.0.2,10.0.0.1,3"
    );
}

#[test]
fn test_peripheral_cases_use_count_and_interval() {
    let list = resolve(0, Some(9), &lab_params()).unwrap();
    assert_eq!(list.as_slice()[0].as_str(), "AT+TMEMORY=3,250");
}

#[test]
fn test_app_family_run_all_sequence() {
    let list = resolve(0, None, &ParameterSet::default()).unwrap();
    let lines: Vec<&str> = list.iter().map(|c| c.as_str()).collect();

    assert_eq!(
        lines,
        vec![
            "AT+TWIFI_STATE=halow_testing,US,1,12345678,17,0,192.168.200.12,10,500",
            "AT+TTCP_CLIENT=halow_testing,US,1,12345678,17,0,192.168.200.12,192.168.200.1,10",
            "AT+TUDP_CLIENT=halow_testing,US,1,12345678,17,0,192.168.200.12,192.168.200.1,10",
            "AT+THTTP=halow_testing,US,1,12345678,17,0,192.168.200.12",
        ]
    );
}

#[test]
fn test_iot_family_run_all_sequence() {
    let list = resolve(1, None, &ParameterSet::default()).unwrap();
    let names: Vec<&str> = list.iter().map(|c| c.name()).collect();
    let arity: Vec<usize> = list.iter().map(|c| c.params().len()).collect();

    assert_eq!(names, vec!["TAWS", "TONEM2M", "TMQTT", "TCOAP_CLIENT"]);
    assert_eq!(arity, vec![9, 9, 9, 10]);
}

#[test]
fn test_rejected_selectors() {
    let params = ParameterSet::default();

    assert_eq!(resolve(3, None, &params), Err(UsageError::UnknownFamily(3)));
    assert_eq!(
        resolve(0, Some(14), &params),
        Err(UsageError::UnknownCase {
            family: TestFamily::AppTest,
            case: 14,
            max: 13,
        })
    );
    assert_eq!(
        resolve(2, Some(4), &params),
        Err(UsageError::UnknownCase {
            family: TestFamily::Sample,
            case: 4,
            max: 3,
        })
    );
    assert_eq!(
        resolve(2, None, &params),
        Err(UsageError::CaseRequired(TestFamily::Sample))
    );
}

#[test]
fn test_selection_reports_case_name() {
    let selection = Selection::from_indices(0, Some(4)).unwrap();
    assert_eq!(selection.family(), TestFamily::AppTest);
    assert_eq!(selection.case(), Some(4));
    assert_eq!(selection.label(), "uart");
}

fn arb_params() -> impl Strategy<Value = ParameterSet> {
    (
        "[a-z_]{1,12}",
        "[A-Z]{2}",
        any::<bool>(),
        "[a-z0-9]{0,16}",
        any::<u8>(),
        any::<bool>(),
        any::<u32>(),
        any::<u32>(),
    )
        .prop_map(
            |(ssid, country, wpa2, password, tx_power, dhcp, count, interval_ms)| ParameterSet {
                ssid,
                country,
                security: if wpa2 {
                    SecurityMode::Wpa2
                } else {
                    SecurityMode::Open
                },
                password,
                tx_power,
                dhcp,
                count,
                interval_ms,
                ..ParameterSet::default()
            },
        )
}

fn arb_selector() -> impl Strategy<Value = (u32, Option<u32>)> {
    prop_oneof![
        (0u32..2).prop_map(|f| (f, None)),
        (0u32..14).prop_map(|c| (0, Some(c))),
        Just((1, Some(0))),
        (0u32..4).prop_map(|c| (2, Some(c))),
    ]
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(params in arb_params(), (family, case) in arb_selector()) {
        let first = resolve(family, case, &params).unwrap();
        let second = resolve(family, case, &params.clone()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_comma_free_params_keep_arity(params in arb_params(), (family, case) in arb_selector()) {
        let defaults = resolve(family, case, &ParameterSet::default()).unwrap();
        let custom = resolve(family, case, &params).unwrap();
        for (a, b) in defaults.iter().zip(custom.iter()) {
            prop_assert_eq!(a.name(), b.name());
            prop_assert_eq!(a.params().len(), b.params().len());
        }
    }

    #[test]
    fn prop_accepted_selection_is_never_empty(family in 0u32..5, case in proptest::option::of(0u32..20)) {
        if let Ok(selection) = Selection::from_indices(family, case) {
            let commands = selection.commands(&ParameterSet::default());
            prop_assert!(!commands.is_empty());
            if case.is_some() {
                prop_assert_eq!(commands.len(), 1);
                prop_assert_eq!(selection.case(), case.map(|c| c as usize));
            }
        }
    }
}
