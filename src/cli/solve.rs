use crate::cli::SolveArgs;
use crate::config::Config;
use crate::planner::{Planner, SolveOptions, SolveOutput};
use crate::task::Task;
use tracing::{info, warn};

pub async fn execute(args: SolveArgs) -> anyhow::Result<()> {
    info!("Loading config from {:?}", args.config);
    let mut config = Config::load(&args.config)?;

    // Apply CLI overrides
    if let Some(timeout) = args.timeout {
        config.timeout_sec = timeout;
    }
    if let Some(max_memory) = args.max_memory {
        config.max_memory_kb = max_memory;
    }
    if args.debug {
        config.debug = true;
    }

    config.validate()?;

    let task = Task::from_file(&args.task)?;
    let planner = Planner::new(config)?;
    let options = SolveOptions {
        parallel: args.parallel,
        bsig: args.bsig,
        raw_plan: args.raw,
        sequential_racer: args.sequential,
    };

    match planner.solve(&task, &options).await? {
        Some(SolveOutput::Raw(text)) => print!("{}", text),
        Some(output) => {
            let json = if args.pretty {
                serde_json::to_string_pretty(&output)?
            } else {
                serde_json::to_string(&output)?
            };
            println!("{}", json);
        }
        None => {
            warn!("no plan found for {:?}", args.task);
            std::process::exit(1);
        }
    }

    Ok(())
}
