use anyhow::*;
use clap::Parser;
use mrlocal::standalone::{Args, Commands, Job};
use mrlocal::workload::prefix::min_unique_prefix;
use mrlocal::{telemetry, workload, MapReduce};

fn parse_args() -> (u8, Commands) {
    let args = Args::parse();
    (args.verbose, args.command)
}

fn run_standalone_mr_job(job: Job) -> Result<()> {
    let mut engine = MapReduce::from_config(&job.config)?;
    engine.set_workload(workload::named(&job.workload, &job.args)?);

    let summary = engine.run(&job.input, &job.output, job.config.combine)?;
    println!(
        "{} blocks, {} map records, {} after combine, {} partitions ({} bytes)",
        summary.blocks,
        summary.map_records,
        summary.combined_records,
        summary.partitions,
        summary.shuffled_bytes
    );
    Ok(())
}

fn main() -> Result<()> {
    let (verbose, command) = parse_args();
    telemetry::init_tracing(verbose)?;

    match command {
        Commands::Submit {
            input,
            workload,
            engine,
            args,
        } => {
            let job = Job {
                input,
                workload,
                output: engine.output.clone(),
                args,
                config: engine.to_config()?,
            };
            run_standalone_mr_job(job)
        }
        Commands::Prefix {
            input,
            engine,
            max_len,
        } => {
            let config = engine.to_config()?;
            let mut mr = MapReduce::from_config(&config)?;
            match min_unique_prefix(&mut mr, &input, &engine.output, config.combine, max_len)? {
                Some(len) => println!("min prefix: {len}"),
                None => println!("min prefix: fail"),
            }
            Ok(())
        }
    }
}
