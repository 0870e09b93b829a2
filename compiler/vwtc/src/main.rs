//! `vwt` command-line tool.

use vwtc::commands::{check_witness, parse_options, show_cases, show_layout, CommandError};

fn main() {
    vwtc::init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    let result = match command.as_str() {
        "layout" | "cases" | "witness" => {
            if args.len() < 3 {
                eprintln!("Usage: vwt {command} <shape> [options]");
                eprintln!();
                print_options();
                std::process::exit(1);
            }
            parse_options(&args[2..]).and_then(|(shape, options)| match command.as_str() {
                "layout" => show_layout(&shape, &options),
                "cases" => show_cases(&shape, &options),
                _ => check_witness(&shape, &options),
            })
        }
        "help" | "--help" | "-h" => {
            print_usage();
            return;
        }
        "version" | "--version" | "-V" => {
            println!("vwt {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        _ => Err(CommandError::Usage(format!("unknown command `{command}`"))),
    };

    match result {
        Ok(report) => print!("{report}"),
        Err(err) => {
            eprintln!("error: {err}");
            if matches!(err, CommandError::Usage(_)) {
                eprintln!();
                print_usage();
            }
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("vwt: type layouts and value witnesses");
    println!();
    println!("Usage: vwt <command> [arguments]");
    println!();
    println!("Commands:");
    println!("  layout <shape>     Print the layout map of a shape");
    println!("  cases <shape>      Print the bytes of every case of an enum shape");
    println!("  witness <shape>    Print witness flags and check copy/destroy balance");
    println!("  help               Show this message");
    println!("  version            Show version information");
    println!();
    print_options();
    println!();
    println!("Shapes:");
    println!("  c s l L            8/16/32/64-bit integers");
    println!("  r N n W u w b B o  owned references");
    println!("  f                  thick function (function word + context)");
    println!("  {{...}}              struct of the shapes inside");
    println!("  [a,_,b]            enum; `_` is a case without payload");
    println!("  C3  e2(N)  E1(N,o) no-payload / single / multi-payload enums");
    println!("  A0  @Name<...>     parameter / declaration reference (see --decl)");
    println!();
    println!("Set RUST_LOG=debug to trace layout decisions; VWT_LOG_TREE=1 for a span tree.");
}

fn print_options() {
    println!("Options:");
    println!("  --no-spare-bits            Never store multi-payload tags in spare bits");
    println!("  --no-extra-inhabitants     Never store empty cases in extra inhabitants");
    println!("  --decl NAME[/N]=SHAPE      Declare a generic shape with N parameters");
}
