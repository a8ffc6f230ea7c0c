use std::io::{Error, ErrorKind};

use parallel_suite_runner::config;
use parallel_suite_runner::scheduling::scheduler::ParallelScheduler;
use parallel_suite_runner::scheduling::summary::Summary;
use parallel_suite_runner::scheduling::{suite_reader, summary_output};

#[tokio::main]
async fn main() -> Result<(), Error> {
    match simple_logger::init() {
        Ok(_) => (),
        Err(error) => {
            return Err(Error::new(
                ErrorKind::Other,
                format!("failed to initialize logger: {}", error),
            ));
        }
    }

    let arguments: Vec<String> = std::env::args().collect();

    if arguments.len() != 2 {
        return Err(Error::new(ErrorKind::InvalidInput, "no suite file provided"));
    }

    log::info!("# executing suite runner with the following arguments #");
    for argument in arguments.as_slice() {
        log::info!("\t-> {}", argument);
    }

    let suite_files = match arguments.get(1) {
        Some(suite_files) => suite_files.split(':').collect::<Vec<&str>>(),
        None => {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "no suite files provided",
            ));
        }
    };

    let run_options = match config::scheduler_config::try_generate_config() {
        Ok(run_options) => run_options,
        Err(error) => {
            return Err(Error::new(
                ErrorKind::Other,
                format!("failed to generate scheduler config: {}", error),
            ));
        }
    };

    let suites = match suite_reader::read(suite_files.as_slice()).await {
        Ok(suites) => suites,
        Err(error) => {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("failed to read suite files: {}", error),
            ));
        }
    };

    let suites_length = suites.len();

    let (summary_sender, mut summary_receiver) = tokio::sync::mpsc::channel::<Summary>(4096);

    tokio::spawn(async move {
        for suite in suites {
            let mut scheduler = ParallelScheduler::new(run_options.clone(), summary_sender.clone());
            let suite_name = suite.name().to_string();

            tokio::spawn(async move {
                match scheduler.execute(suite).await {
                    Ok(()) => (),
                    Err(error) => {
                        log::error!("failed to run suite '{}': {}", suite_name, error);
                        std::process::exit(1);
                    }
                }
            });
        }
    });

    let mut exit_code = 0;
    let mut suite_count = 0;

    loop {
        match summary_receiver.recv().await {
            Some(summary) => {
                if summary.has_any_case_failed() {
                    exit_code = 1;
                }

                match summary_output::output(summary) {
                    Ok(()) => (),
                    Err(error) => {
                        log::error!("failed to output suite summary: {}", error);
                        std::process::exit(1);
                    }
                }
                suite_count += 1;
            }
            None => break,
        };

        if suite_count >= suites_length {
            break;
        }
    }

    std::process::exit(exit_code);
}
