use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use axp_core::{FlatMemory, REGS_NUMBER};
use axp_decoder::InstructionDecoder;
use axpemu::{
    options::{parse_u64, EmuOptions},
    Driver, RunExit,
};
use clap::{CommandFactory, FromArgMatches, Parser};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run or disassemble a raw little-endian Alpha AXP image
#[derive(Parser, Debug)]
#[command(name = "axpemu", version, about, long_about = None)]
struct Cli {
    /// Raw image to load
    image: PathBuf,

    /// Address the image is loaded at
    #[arg(long, default_value = "0x10000", value_parser = parse_u64)]
    load_address: u64,

    /// First instruction executed; defaults to the load address
    #[arg(long, value_parser = parse_u64)]
    entry: Option<u64>,

    /// Bytes of guest memory, mapped from address zero
    #[arg(long, default_value = "0x100000", value_parser = parse_u64)]
    mem_size: u64,

    /// TOML file with emulator options; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the disassembly instead of running
    #[arg(long)]
    disasm: bool,

    /// Print the final state as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    options: EmuOptions,
}

#[derive(Serialize)]
struct Report<'a> {
    exit: RunExit,
    pc: u64,
    cycles: u64,
    int_regs: &'a [u64; REGS_NUMBER],
    fp_regs: &'a [u64; REGS_NUMBER],
    stats: &'a axpemu::DriverStats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let image = std::fs::read(&cli.image)
        .with_context(|| format!("failed to read image {}", cli.image.display()))?;

    if cli.disasm {
        return disassemble(&image, cli.load_address);
    }

    let options = match &cli.config {
        Some(path) => {
            let mut options = EmuOptions::from_file(path)?;
            options.override_from(&cli.options, &matches);
            options
        }
        None => cli.options.clone(),
    };
    options.validate()?;

    let mem_size = usize::try_from(cli.mem_size).context("memory size does not fit the host")?;
    let mut mem = FlatMemory::new(0, mem_size);
    mem.load_image(cli.load_address, &image)
        .with_context(|| format!("image does not fit at {:#x}", cli.load_address))?;

    let entry = cli.entry.unwrap_or(cli.load_address);
    let mut driver = Driver::new(mem, entry, options).context("failed to build dispatch tables")?;
    info!("running {} from {:#x}", cli.image.display(), entry);

    let exit = driver.run(None);
    driver.wait_for_compilations();

    let cpu = driver.cpu();
    if cli.json {
        let report = Report {
            exit,
            pc: cpu.pc,
            cycles: cpu.cycles,
            int_regs: cpu.regs.int_regs(),
            fp_regs: cpu.regs.fp_regs(),
            stats: driver.stats(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("exit: {exit:?}");
        println!("pc: {:#018x}  cycles: {}", cpu.pc, cpu.cycles);
        for (i, (int, fp)) in cpu.regs.int_regs().iter().zip(cpu.regs.fp_regs()).enumerate() {
            println!("r{i:<2} {int:#018x}    f{i:<2} {fp:#018x}");
        }
    }
    Ok(())
}

fn disassemble(image: &[u8], base: u64) -> Result<()> {
    if image.len() % 4 != 0 {
        bail!("image length {} is not a multiple of 4", image.len());
    }
    let decoder = InstructionDecoder::new();
    for (pc, insn) in decoder.decode_bytes(image, base)? {
        println!("{pc:#010x}:  {:08x}  {}", insn.raw(), insn.disassemble(pc));
    }
    Ok(())
}
