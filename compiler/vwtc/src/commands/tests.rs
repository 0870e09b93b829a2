use pretty_assertions::assert_eq;
use vwt_layout::LayoutError;

use super::*;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

fn run(
    command: fn(&Shape, &Options) -> Result<String, CommandError>,
    list: &[&str],
) -> Result<String, CommandError> {
    let (shape, options) = parse_options(&args(list))?;
    command(&shape, &options)
}

fn rows(report: &str) -> Vec<Vec<&str>> {
    report.lines().map(|l| l.split_whitespace().collect()).collect()
}

#[test]
fn options_are_parsed() {
    let (shape, options) = parse_options(&args(&[
        "--no-spare-bits",
        "{A0c}",
        "--decl",
        "Pair/2={A0A1}",
        "--decl",
        "Unit={}",
    ]))
    .unwrap();
    assert_eq!(shape.to_string(), "{A0c}");
    assert!(!options.config.spare_bit_tags);
    assert!(options.config.extra_inhabitants);
    assert_eq!(options.decls.len(), 2);
    assert_eq!(options.decls[0].to_string(), "Pair/2 = {A0A1}");
    assert_eq!(options.decls[1].params, 0);
}

#[test]
fn bad_arguments_are_usage_errors() {
    for list in [
        &["--frobnicate", "c"][..],
        &["c", "s"],
        &[],
        &["c", "--decl"],
        &["c", "--decl", "Pair/x={A0}"],
        &["c", "--decl", "Pair"],
    ] {
        let err = parse_options(&args(list)).unwrap_err();
        assert!(matches!(err, CommandError::Usage(_)), "{list:?}: {err}");
    }
}

#[test]
fn shape_syntax_errors_are_reported() {
    let err = parse_options(&args(&["{c"])).unwrap_err();
    assert!(matches!(err, CommandError::Parse(_)));
}

#[test]
fn layout_prints_the_map() {
    let report = run(show_layout, &["{csN}"]).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "{csN}");
    assert_eq!(
        lines[1],
        "  size 16  align 8  stride 16  extra inhabitants 2147483647"
    );
    assert_eq!(rows(&report)[6], vec!["8", "8", "owned-reference", "2"]);
}

#[test]
fn layout_resolves_declarations() {
    let report = run(show_layout, &["@Opt<N>", "--decl", "Opt/1=[A0,_]"]).unwrap();
    assert_eq!(report.lines().next(), Some("[N,_]"));

    let explicit = run(
        show_layout,
        &["@Opt<N>", "--decl", "Opt/1=[A0,_]", "--no-extra-inhabitants"],
    )
    .unwrap();
    assert!(explicit.lines().nth(1).unwrap().starts_with("  size 9 "));
}

#[test]
fn undeclared_names_are_incomplete() {
    let err = run(show_layout, &["@Opt<N>"]).unwrap_err();
    assert!(matches!(
        err,
        CommandError::Resolve(ResolveError::Layout(LayoutError::IncompleteLayout { .. }))
    ));
}

#[test]
fn cases_of_a_no_payload_enum() {
    let report = run(show_cases, &["C3"]).unwrap();
    assert_eq!(
        rows(&report),
        vec![
            vec!["[_,_,_]"],
            vec!["tag", "no", "payload,", "1-byte", "tag"],
            vec!["0", "0", "00"],
            vec!["1", "1", "01"],
            vec!["2", "2", "02"],
        ]
    );
}

#[test]
fn cases_of_an_optional_reference() {
    let report = run(show_cases, &["[N,_]"]).unwrap();
    let rows = rows(&report);
    assert_eq!(rows[2], vec!["0", "0", "0000000000000000"]);
    assert_eq!(rows[3], vec!["1", "1", "0100000000000000"]);
}

#[test]
fn cases_of_a_zero_sized_enum() {
    let report = run(show_cases, &["C1"]).unwrap();
    assert_eq!(rows(&report)[2], vec!["0", "0", "(no", "bytes)"]);
}

#[test]
fn cases_needs_an_enum() {
    let err = run(show_cases, &["{cN}"]).unwrap_err();
    assert!(matches!(
        err,
        CommandError::Witness(WitnessError::NotAnEnum { .. })
    ));
}

#[test]
fn witness_reports_balance() {
    let report = run(check_witness, &["{NcW}"]).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "{NcW}");
    assert_eq!(
        lines[1],
        "  flags NON_POD | NON_BITWISE_TAKABLE | HAS_SPARE_BITS"
    );
    assert_eq!(lines[3], "  handle at 0 (strong)");
    assert_eq!(lines[4], "  handle at 16 (weak)");
    assert_eq!(lines[5], "  copy retained 2 of 2 handles, destroy balanced");
}

#[test]
fn witness_of_plain_integers() {
    let report = run(check_witness, &["{cs}"]).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[1], "  flags none");
    assert_eq!(lines[2], "  size 4  stride 4  extra inhabitants 0");
    assert_eq!(lines[3], "  copy retained 0 of 0 handles, destroy balanced");
}
