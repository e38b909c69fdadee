use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kira_encsim::cli::{Cli, Commands, RunArgs};
use kira_encsim::compare::CompareConfig;
use kira_encsim::ctx::{Ctx, StreamOptions};
use kira_encsim::input;
use kira_encsim::io;
use kira_encsim::pipeline::Pipeline;
use kira_encsim::pipeline::stage0_scaffold::Stage0Scaffold;
use kira_encsim::pipeline::stage1_input::Stage1Input;
use kira_encsim::pipeline::stage2_taxonomy::Stage2Taxonomy;
use kira_encsim::pipeline::stage3_encounters::Stage3Encounters;
use kira_encsim::pipeline::stage4_tfidf::Stage4Tfidf;
use kira_encsim::pipeline::stage5_compare::Stage5Compare;
use kira_encsim::pipeline::stage6_output::Stage6Output;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let mut ctx = build_run_ctx(args)?;
            let pipeline = Pipeline::new(vec![
                Box::new(Stage0Scaffold::new()),
                Box::new(Stage1Input::new()),
                Box::new(Stage2Taxonomy::new()),
                Box::new(Stage3Encounters::new()),
                Box::new(Stage4Tfidf::new()),
                Box::new(Stage5Compare::new()),
                Box::new(Stage6Output::new()),
            ]);
            pipeline.run(&mut ctx)?;

            print_summary(&ctx)?;
        }
        Commands::Validate(args) => {
            let mut ctx = Ctx::new(
                args.input,
                args.taxonomy,
                args.code_map,
                PathBuf::from("."),
                CompareConfig::default(),
            );

            let pipeline = Pipeline::new(vec![
                Box::new(Stage1Input::new()),
                Box::new(Stage2Taxonomy::new()),
                Box::new(Stage3Encounters::new()),
            ]);
            pipeline.run(&mut ctx)?;

            print_validate_summary(&ctx)?;
        }
    }

    Ok(())
}

fn build_run_ctx(args: RunArgs) -> Result<Ctx> {
    if args.stream && args.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }
    if !args.stream && args.start_batch > 0 {
        bail!("--start-batch requires --stream");
    }

    let weights = args.weights.to_weights();
    weights.validate()?;

    let config = CompareConfig {
        weights,
        aggregate: args.aggregate.into(),
        scale_by_distribution: !args.no_scale_by_distribution,
        normalize_categories: !args.no_normalize,
        ic_metric: args.ic_metric.into(),
        measure: args.measure.into(),
        with_ethnicity: args.with_ethnicity,
    };

    let mut ctx = Ctx::new(args.input, args.taxonomy, args.code_map, args.out, config);
    ctx.threads = args.threads;
    ctx.drop_incomplete = args.drop_incomplete;
    ctx.write_json = args.json;
    ctx.write_tsv = args.tsv;
    ctx.write_matrix = args.matrix;
    if args.stream {
        ctx.stream = Some(StreamOptions {
            batch_size: args.batch_size,
            start_batch: args.start_batch,
        });
    }
    if (weights.sum() - 1.0).abs() > 1e-6 {
        ctx.warnings.push(format!(
            "category weights sum to {:.4}, not 1",
            weights.sum()
        ));
    }
    Ok(ctx)
}

fn print_summary(ctx: &Ctx) -> Result<()> {
    let summary = io::summary::format_summary(ctx)?;
    print!("{}", summary);
    if !ctx.warnings.is_empty() {
        println!("warnings:");
        for warning in &ctx.warnings {
            println!("- {}", warning);
        }
    }
    Ok(())
}

fn print_validate_summary(ctx: &Ctx) -> Result<()> {
    let cohort = ctx.cohort()?;
    let taxonomy = ctx.taxonomy()?;
    println!("kira-encsim validate ok");
    println!("participants: {}", cohort.participants().len());
    println!("encounters: {}", cohort.encounters().len());
    println!(
        "complete encounters: {}",
        cohort.encounters().iter().filter(|e| e.is_complete()).count()
    );
    println!("taxonomy nodes: {}", taxonomy.len());
    if let Some(r) = &ctx.reconcile {
        println!(
            "diagnoses: {} kept, {} remapped, {} dropped",
            r.kept,
            r.remapped,
            r.dropped()
        );
    }
    if let Some(bundle) = &ctx.bundle {
        let with_records = input::records_per_admission(bundle);
        let empty = cohort
            .participants()
            .iter()
            .filter(|p| !with_records.contains_key(&p.hadm_id))
            .count();
        println!("participants without records: {}", empty);
    }
    let warnings: Vec<&String> = ctx
        .bundle
        .iter()
        .flat_map(|b| b.warnings.iter())
        .chain(ctx.warnings.iter())
        .collect();
    if !warnings.is_empty() {
        println!("warnings:");
        for warning in warnings {
            println!("- {}", warning);
        }
    }
    Ok(())
}
