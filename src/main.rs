// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

mod dos;

use coffread::cli::{self, get_binary_name, EncodingArg};
use coffread::NameEncoding;

/// Inspect COFF object files.
#[derive(Debug, Parser)]
#[clap(name = env!("CARGO_CRATE_NAME"), version)]
#[command(version, about, long_about = None)]
pub struct App {
    #[arg(required = false)]
    object: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<CLICommand>,
}

#[derive(Debug, Subcommand)]
enum CLICommand {
    /// List the header, sections, and symbols of an object
    List {
        /// a COFF object file
        #[arg(required = true)]
        object: PathBuf,

        /// enable a hex listing of section data and auxiliary records
        #[clap(short, long)]
        data: bool,

        /// decode multi-byte integers as big-endian
        #[clap(short, long)]
        big_endian: bool,

        /// the encoding of name bytes
        #[clap(short, long, value_enum, default_value = "latin1")]
        encoding: EncodingArg,
    },

    /// Print the symbols the object defines for other objects
    Exports {
        /// a COFF object file
        #[arg(required = true)]
        object: PathBuf,

        /// decode multi-byte integers as big-endian
        #[clap(short, long)]
        big_endian: bool,

        /// the encoding of name bytes
        #[clap(short, long, value_enum, default_value = "latin1")]
        encoding: EncodingArg,
    },

    /// Write the raw data of a section to a file
    Extract {
        /// a COFF object file
        #[arg(required = true)]
        object: PathBuf,

        /// the name of the section to extract
        #[arg(required = true)]
        section: String,

        /// the file to write the section data to
        #[arg(required = true)]
        output: PathBuf,

        /// decode multi-byte integers as big-endian
        #[clap(short, long)]
        big_endian: bool,

        /// the encoding of name bytes
        #[clap(short, long, value_enum, default_value = "latin1")]
        encoding: EncodingArg,
    },
}

fn main() -> Result<()> {
    if get_binary_name().as_str() == "dumpcoff" {
        return dos::dumpcoff_main();
    }

    let args = App::parse();

    match args.command {
        Some(command) => match command {
            CLICommand::List {
                object,
                data,
                big_endian,
                encoding,
            } => cli::info(
                &mut std::io::stdout(),
                &object,
                data,
                encoding.into(),
                cli::byte_order(big_endian),
            )?,
            CLICommand::Exports {
                object,
                big_endian,
                encoding,
            } => cli::exports(
                &mut std::io::stdout(),
                &object,
                encoding.into(),
                cli::byte_order(big_endian),
            )?,
            CLICommand::Extract {
                object,
                section,
                output,
                big_endian,
                encoding,
            } => cli::extract(
                &object,
                &section,
                &output,
                encoding.into(),
                cli::byte_order(big_endian),
            )?,
        },
        None => match args.object {
            Some(object) => cli::info(
                &mut std::io::stdout(),
                &object,
                false,
                NameEncoding::default(),
                cli::byte_order(false),
            )?,
            None => {
                let a = App::command().render_help();
                eprintln!("{}", a);
            }
        },
    }

    Ok(())
}
