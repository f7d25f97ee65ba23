//
// Copyright (C) 2022 Ariel Abreu
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//

use std::{ffi::OsString, fs, io, path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::{error, info, Level};

use z8_as::{Assembler, Config, IndirectStyle};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Assembly source file
	source: PathBuf,

	/// Output image (default: the source path with `.bin` appended)
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Write indirection as `[ptr]` instead of `(ptr)`
	#[arg(short, long)]
	brackets: bool,

	/// Predefined symbols (repeatable)
	#[arg(short = 'D', long, value_name = "NAME=VALUE", value_parser = parse_define)]
	define: Vec<(String, i64)>,

	/// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
	#[arg(short, long, default_value_t = Level::INFO)]
	log_level: Level,
}

fn parse_define(text: &str) -> Result<(String, i64), String> {
	let (name, value) = text
		.split_once('=')
		.ok_or_else(|| format!("expected NAME=VALUE, got \"{}\"", text))?;

	let value = match value.strip_prefix("0x").or_else(|| value.strip_prefix('$')) {
		Some(hex) => i64::from_str_radix(hex, 16),
		None => value.parse(),
	}
	.map_err(|err| format!("invalid value for {}: {}", name, err))?;

	Ok((name.to_owned(), value))
}

fn main() -> ExitCode {
	let cli = Args::parse();
	tracing_subscriber::fmt()
		.with_max_level(cli.log_level)
		.with_writer(io::stderr)
		.init();

	let input = match fs::read_to_string(&cli.source) {
		Ok(input) => input,
		Err(err) => {
			error!("Failed to read \"{}\": {}", cli.source.display(), err);
			return ExitCode::FAILURE;
		},
	};

	let output_path = cli.output.clone().unwrap_or_else(|| {
		cli.source.with_extension(match cli.source.extension() {
			Some(extension) => {
				let mut tmp = extension.to_owned();
				tmp.push(".bin");
				tmp
			},
			None => OsString::from("bin"),
		})
	});

	let config = Config {
		indirect: if cli.brackets {
			IndirectStyle::Brackets
		} else {
			IndirectStyle::Parentheses
		},
	};

	let mut assembler = Assembler::new(config);
	for (name, value) in &cli.define {
		if let Err(err) = assembler.define(name, *value) {
			error!("{}", err);
			return ExitCode::FAILURE;
		}
	}

	for (index, line) in input.lines().enumerate() {
		assembler.assemble_line(index + 1, line);
	}

	let program = match assembler.finish() {
		Ok(program) => program,
		Err(diagnostics) => {
			error!(
				"{}: {} error(s), no output written",
				cli.source.display(),
				diagnostics.len()
			);
			return ExitCode::FAILURE;
		},
	};

	if let Err(err) = program.write_file(&output_path) {
		error!("Failed to write \"{}\": {}", output_path.display(), err);
		return ExitCode::FAILURE;
	}

	info!(
		bytes = program.image().len(),
		"wrote \"{}\"",
		output_path.display()
	);
	ExitCode::SUCCESS
}
