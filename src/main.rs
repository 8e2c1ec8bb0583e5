use clap::{App, Arg};
use lc3::Config;
use std::process;

fn main() {
    let matches = App::new("LC-3 Emulator")
        .arg(
            Arg::with_name("PROGRAM")
                .help("Image file(s) to load and run. Later files overwrite earlier ones on overlap.")
                .multiple(true)
                .index(1),
        )
        .get_matches();

    let images: Vec<String> = matches
        .values_of("PROGRAM")
        .map(|values| values.map(String::from).collect())
        .unwrap_or_default();

    if images.is_empty() {
        println!("usage: lc3-core <PROGRAM> [PROGRAM2 ...]");
        process::exit(2);
    }

    lc3::terminal::configure_terminal();
    lc3::terminal::install_interrupt_handler();

    let result = lc3::run(Config { images });

    lc3::terminal::restore_terminal();

    if let Err(e) = result {
        println!("{}", e);
        process::exit(1);
    }
}
