use clap::Parser;
use log::{error, LevelFilter};
use meridian_node::{start_node, Command, Config, Credentials, Opt};
use std::process;

fn main() {
    // RUST_LOG still overrides the default level
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> meridian_node::Result<()> {
    match opt.command {
        Command::Start => {
            let config = Config::load(opt.config.as_deref())?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(start_node(config))?;
        }
        Command::Keygen => {
            let credentials = Credentials::generate()?;
            println!("Private key: {}", credentials.to_hex().as_str());
            println!("Address: {}", credentials.get_address());
        }
        Command::Address { key } => {
            let credentials = Credentials::from_hex(&key)?;
            println!("{}", credentials.get_address());
        }
    }
    Ok(())
}
