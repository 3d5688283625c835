use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ssm2_core::definitions::{CuIdentity, CuType, DefinitionLibrary, DefinitionProvider};
use ssm2_core::protocol::{
    DcGroups, ENGINE_ADDR_ISO14230, TRANSMISSION_ADDR_ISO14230, validate_vin,
};
use ssm2_core::query::{DcReadPlan, MbSwReadPlan, MbSwSelector};
use ssm2_core::session::{SessionConfig, Ssm2Session};
use ssm2_core::transport::{MockTransport, Protocol};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Subaru SSM2 diagnostic tool", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Control unit selection shared by the lookup commands.
#[derive(clap::Args, Debug)]
struct UnitArgs {
    /// Definition library (TOML)
    #[arg(short, long)]
    definitions: PathBuf,

    /// Control unit type (engine, transmission)
    #[arg(long, default_value = "engine")]
    cu_type: CuType,

    /// System ID as hex
    #[arg(long, default_value = "")]
    system_id: String,

    /// ROM ID as hex
    #[arg(long, default_value = "")]
    rom_id: String,
}

impl UnitArgs {
    fn identity(&self) -> Result<CuIdentity> {
        Ok(CuIdentity::new(
            &parse_hex(&self.system_id)?,
            &parse_hex(&self.rom_id)?,
            &[],
        ))
    }

    fn library(&self) -> Result<DefinitionLibrary> {
        DefinitionLibrary::load_from_file(&self.definitions)
            .with_context(|| format!("loading {}", self.definitions.display()))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the character set of a VIN
    Vin { vin: String },
    /// List the entries of a definition library
    Definitions { path: PathBuf },
    /// Resolve definitions for a control unit and show what a session offers
    Inspect {
        #[command(flatten)]
        unit: UnitArgs,
    },
    /// Print the address plan of a diagnostic-code read
    DcPlan {
        #[command(flatten)]
        unit: UnitArgs,

        /// Group mask (e.g. 0x03 for current and historic DTCs)
        #[arg(long, value_parser = parse_mask)]
        groups: u8,
    },
    /// Print the address plan of a live-data read
    LivePlan {
        #[command(flatten)]
        unit: UnitArgs,

        /// Measuring block indices
        #[arg(long, value_delimiter = ',')]
        blocks: Vec<usize>,

        /// Switch indices
        #[arg(long, value_delimiter = ',')]
        switches: Vec<usize>,
    },
    /// Write a session configuration file with default values
    InitConfig { path: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(e) = run(args.command) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Vin { vin } => {
            if !validate_vin(vin.as_bytes()) {
                bail!("invalid VIN: {}", vin);
            }
            println!("{}: valid", vin);
        }
        Command::Definitions { path } => {
            let library = DefinitionLibrary::load_from_file(&path)?;
            info!(path = %path.display(), entries = library.entries.len(), "Library loaded");
            for entry in &library.entries {
                println!(
                    "{:<13} sys={:<8} rom={:<12} {}",
                    entry.cu_type.to_string(),
                    entry.system_id.as_deref().unwrap_or("*"),
                    entry.rom_id.as_deref().unwrap_or("*"),
                    entry.description
                );
                println!(
                    "    {} DTC bytes, {} cancel-code bytes, {} blocks, {} switches, {} adjustments, {} actuators",
                    entry.diagnostic_codes.len(),
                    entry.cancel_codes.len(),
                    entry.measuring_blocks.len(),
                    entry.switches.len(),
                    entry.adjustments.len(),
                    entry.actuators.len()
                );
            }
        }
        Command::Inspect { unit } => inspect(&unit)?,
        Command::DcPlan { unit, groups } => {
            let Some(groups) = DcGroups::from_mask(groups) else {
                bail!("group mask 0x{:02X} out of range", groups);
            };
            let resolved = unit.library()?.resolve(unit.cu_type, &unit.identity()?);
            let plan = DcReadPlan::build(
                groups,
                unit.cu_type,
                resolved.capabilities,
                &resolved.definitions,
            )?;
            println!("{} ({})", resolved.description, plan.groups());
            print_addresses(plan.addresses());
        }
        Command::LivePlan {
            unit,
            blocks,
            switches,
        } => {
            let resolved = unit.library()?.resolve(unit.cu_type, &unit.identity()?);
            let selectors: Vec<MbSwSelector> = blocks
                .into_iter()
                .map(MbSwSelector::block)
                .chain(switches.into_iter().map(MbSwSelector::switch))
                .collect();
            let plan = MbSwReadPlan::build(&selectors, &resolved.definitions)?;
            println!("{}", resolved.description);
            print_addresses(plan.addresses());
        }
        Command::InitConfig { path } => {
            SessionConfig::default().save_to_file(&path)?;
            info!(path = %path.display(), "Configuration written");
        }
    }
    Ok(())
}

/// Set up a session against a simulated control unit with the given identity.
fn inspect(unit: &UnitArgs) -> Result<()> {
    let protocol = Protocol::Ssm2Iso14230;
    let transport = MockTransport::new(protocol);
    transport.add_identity(simulated_address(unit.cu_type), unit.identity()?);

    let mut session = Ssm2Session::new(transport, unit.library()?, SessionConfig::default());
    session.setup(unit.cu_type, true)?;

    let cu = session.control_unit()?;
    println!("{}", cu.description());
    println!("{}", cu.identity());
    let capabilities: Vec<String> = cu
        .capabilities()
        .list()
        .iter()
        .map(|c| c.to_string())
        .collect();
    println!("capabilities: {}", capabilities.join(", "));
    println!("diagnostic-code groups: {}", cu.supported_dc_groups());
    for (k, actuator) in cu.definitions().actuators.iter().enumerate() {
        println!(
            "actuator {}: {} (0x{:06X} bit {})",
            k, actuator.title, actuator.address, actuator.bit
        );
    }
    Ok(())
}

/// Address the simulated control unit answers on.
fn simulated_address(cu_type: CuType) -> u32 {
    match cu_type {
        CuType::Transmission => TRANSMISSION_ADDR_ISO14230,
        _ => ENGINE_ADDR_ISO14230,
    }
}

fn print_addresses(addresses: &[u32]) {
    for (k, address) in addresses.iter().enumerate() {
        println!("{:4}  0x{:06X}", k, address);
    }
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits in {:?}", text);
    }
    digits
        .chunks(2)
        .map(|pair| {
            let byte: String = pair.iter().collect();
            u8::from_str_radix(&byte, 16).with_context(|| format!("invalid hex byte {:?}", byte))
        })
        .collect()
}

fn parse_mask(text: &str) -> Result<u8, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| e.to_string())
}
