use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "meridian-node", about = "Slot-scheduled ledger node")]
pub struct Opt {
    #[arg(
        long,
        short,
        global = true,
        help = "Path to a TOML config file; defaults are used when omitted"
    )]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start", about = "Open storage, connect to peers and serve")]
    Start,
    #[command(name = "keygen", about = "Generate a signing key and print it with its address")]
    Keygen,
    #[command(name = "address", about = "Print the address of a hex-encoded signing key")]
    Address {
        #[arg(long, help = "Hex-encoded PKCS#8 signing key")]
        key: String,
    },
}
