use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::Verbosity;

mod commands;
mod error;

#[derive(Parser, Debug)]
#[command(name = "marrow")]
#[command(about = "Inspect native types, struct layouts and call interfaces", long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    #[command(flatten)]
    verbose: Verbosity,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// List the native type catalog
    Types {
        /// Also list the memory accessor names
        #[arg(short, long)]
        accessors: bool,
    },

    /// Compute a C struct layout
    Layout {
        /// Struct name
        #[arg(short, long, default_value = "anonymous")]
        name: String,
        /// Field as name:type or name:type:count, in declaration order
        #[arg(short, long = "field", value_name = "SPEC", required = true)]
        fields: Vec<String>,
    },

    /// Compile a call descriptor and show its exchange buffer
    Cif {
        /// Return type
        #[arg(short, long, default_value = "VOID")]
        ret: String,
        /// Argument type, in order
        #[arg(short, long = "arg", value_name = "TYPE")]
        args: Vec<String>,
        /// TOML file with call options
        #[arg(short, long, value_name = "FILE")]
        options: Option<PathBuf>,
    },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    match args.command {
        Command::Types { accessors } => commands::handle_types(accessors)?,
        Command::Layout { name, fields } => commands::handle_layout(&name, &fields)?,
        Command::Cif { ret, args, options } => commands::handle_cif(&ret, &args, options.as_deref())?,
    }
    Ok(())
}
