use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use peekle_analysis::{validation, Analyzer, StaticOracle};
use peekle_codegen::CodeGenerator;
use peekle_pass::PassManager;

/// Disassemble and decompile pickle files
#[derive(Parser)]
#[command(name = "peekle", version, about = "Disassemble and decompile pickle files")]
struct Args {
    /// The input file to disassemble/decompile
    input: PathBuf,
    /// The output file for the disassembled/decompiled code
    output: PathBuf,
    /// Output the lifted IL instead of decompiling
    #[arg(long)]
    il: bool,
    /// Do not run any analysis passes
    #[arg(long)]
    no_analysis: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let input = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    log::info!("lifting {} ({} bytes)", args.input.display(), input.len());
    let mut program = peekle_frontend_pickle::disassemble(&input);

    if !args.no_analysis {
        let oracle = StaticOracle;
        let analyzer = Analyzer::new(&oracle);
        let mut pipeline = peekle_transform::default_pipeline(&analyzer);
        let n = pipeline.run(&mut program, PassManager::DEFAULT_MAX_PASSES);
        validation::validate(&program)
            .context("analysis left the program in an inconsistent state; this is a bug")?;
        println!(
            "Analysis passes ran {} time{}.",
            n,
            if n == 1 { "" } else { "s" }
        );
    }

    let source = if args.il {
        program.to_string()
    } else {
        CodeGenerator::new().generate_source(&program)
    };
    fs::write(&args.output, source.as_bytes())
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    if program.poison {
        let action = if args.il { "Disassembled" } else { "Decompiled" };
        println!("{} pickle file, some errors encountered.", action);
    } else {
        let action = if args.il { "disassembled" } else { "decompiled" };
        println!("Successfully {} pickle file. Happy reversing!", action);
    }
    Ok(())
}
