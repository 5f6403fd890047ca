/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The `loupe` command line tool
//!
//! Prints what the decoders know about each file given, the format,
//! canvas size, animation details and the layout of every frame.
use std::path::PathBuf;
use std::process::exit;

use log::{error, info};

use crate::cmd_parsers::global_options::CmdOptions;
use crate::probe_files::{probe_file, ImageReport};

mod cmd_args;
mod cmd_parsers;
mod probe_files;
mod serde;

pub fn main() {
    let cmd = cmd_args::create_cmd_args();
    let options = cmd.get_matches();

    cmd_parsers::global_options::setup_logger(&options);

    let parsed_opts = cmd_parsers::global_options::parse_options(&options);

    let mut failed = 0;

    for file in options.get_many::<PathBuf>("files").into_iter().flatten() {
        match probe_file(file, &parsed_opts) {
            Ok(report) => print_report(&report, &parsed_opts),
            Err(err) => {
                error!("{}: {err}", file.display());
                failed += 1;
            }
        }
    }
    if failed > 0 {
        error!("Could not probe {failed} file(s)");
        exit(1);
    }
    info!("Done");
}

fn print_report(report: &ImageReport, options: &CmdOptions) {
    if !options.json {
        print!("{report}");
        return;
    }
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(err) => error!("{}: could not serialize report, {err}", report.file)
    }
}
