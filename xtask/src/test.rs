use clap::Subcommand;
use duct::cmd;

use crate::run::run_in_vm;

#[derive(Subcommand)]
pub enum Test {
    /// Run unit tests and clippy on host (the default)
    Host,

    /// Run the interactive integration tests in a VM
    Vm {
        /// Path to the OVMF code file
        #[arg(long)]
        ovmf_code: Option<String>,

        /// Add an additional file to the root of the image, like a shellx64.efi for the load image test
        #[arg(long)]
        add_file: Option<String>,
    },
}

pub fn test_on_host() -> anyhow::Result<()> {
    cmd!("cargo", "clippy", "-p", "bootscan-rs-core", "--all-targets").run()?;
    cmd!("cargo", "test", "-p", "bootscan-rs-core", "--lib").run()?;
    Ok(())
}

pub fn test_crate(command: Option<Test>) -> anyhow::Result<()> {
    match command.unwrap_or(Test::Host) {
        Test::Host => test_on_host(),
        Test::Vm {
            ovmf_code,
            add_file,
        } => run_in_vm(
            "bootscan-rs-tests",
            ovmf_code.as_deref(),
            false,
            add_file.as_deref(),
        ),
    }
}
