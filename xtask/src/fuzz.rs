use clap::Subcommand;
use duct::cmd;

#[derive(Subcommand)]
pub enum Fuzz {
    /// Run the configuration file parser
    Config,

    /// Run the kernel options file parser
    Options,

    /// Run the executable header check
    Header,

    /// Run the hidden entry list parser
    Hidden,

    /// Run the initrd matcher
    Initrd,
}

pub fn fuzz_parsers(command: Fuzz) -> anyhow::Result<()> {
    let mut args = vec!["fuzz", "run"];
    match command {
        Fuzz::Config => args.push("config"),
        Fuzz::Options => args.push("options"),
        Fuzz::Header => args.push("header"),
        Fuzz::Hidden => args.push("hidden"),
        Fuzz::Initrd => args.push("initrd"),
    }

    cmd!("cargo", "install", "cargo-fuzz").run()?; // will not install if its already installed
    cmd("cargo", args).run()?;
    Ok(())
}
