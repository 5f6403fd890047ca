/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use clap::ArgMatches;
use log::{info, Level};
use loupe_core::options::DecoderOptions;

#[derive(Debug, Copy, Clone)]
pub struct CmdOptions {
    pub decoder: DecoderOptions,
    pub decode:  bool,
    pub json:    bool
}

pub fn parse_options(options: &ArgMatches) -> CmdOptions {
    let defaults = DecoderOptions::default();

    let width = options
        .get_one::<usize>("max-width")
        .copied()
        .unwrap_or(defaults.get_max_width());
    let height = options
        .get_one::<usize>("max-height")
        .copied()
        .unwrap_or(defaults.get_max_height());
    let frames = options
        .get_one::<usize>("max-frames")
        .copied()
        .unwrap_or(defaults.get_max_frames());
    let strict = options.get_flag("strict");

    if strict {
        info!("Strict mode enabled");
    }
    let decoder = defaults
        .set_max_width(width)
        .set_max_height(height)
        .set_max_frames(frames)
        .set_strict_mode(strict);

    CmdOptions {
        decoder,
        decode: options.get_flag("decode"),
        json: options.get_flag("json")
    }
}

/// The most verbose level asked for, warnings by default
pub fn log_level(options: &ArgMatches) -> Level {
    if options.get_flag("trace") {
        Level::Trace
    } else if options.get_flag("debug") {
        Level::Debug
    } else if options.get_flag("info") {
        Level::Info
    } else {
        Level::Warn
    }
}

/// Set up logging options
pub fn setup_logger(options: &ArgMatches) {
    let log_level = log_level(options);

    if let Err(err) = simple_logger::init_with_level(log_level) {
        eprintln!("Could not initialize logger: {err}");
        return;
    }
    info!("Initialized logger");
    info!("Log level :{}", log_level);
}
