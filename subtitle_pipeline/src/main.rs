// /////////////////////////////////////////////////////////////////////////////
// Subtitle Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Binary entry point: parse the CLI, wire signals to the shutdown
//! coordinator, dispatch to the use case, exit with the contract code.

use clap::Parser;
use subtitle_pipeline::application::use_cases::{
    CacheGcUseCase, PrepareJobParams, PrepareJobUseCase, RunJobUseCase, ShowStatusUseCase,
};
use subtitle_pipeline::infrastructure::config::ConfigLoader;
use subtitle_pipeline::infrastructure::logging;
use subtitle_pipeline_bootstrap::{create_signal_handler, Cli, Commands, ExitCode, ShutdownCoordinator};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let defaults_file = cli.config.clone().or_else(ConfigLoader::find_defaults_file);

    let exit_code = match cli.command {
        Commands::Prepare {
            media,
            workflow,
            source_language,
            target_languages,
            user,
            start,
            end,
            duration,
            debug,
        } => {
            logging::init_process_logging(cli.verbose);
            let params = PrepareJobParams {
                media,
                workflow,
                source_language,
                target_languages,
                user,
                start,
                end,
                duration,
                debug,
            };
            match PrepareJobUseCase::execute(defaults_file.as_deref(), params) {
                Ok(job_id) => {
                    println!("{}", job_id);
                    ExitCode::Completed
                }
                Err(e) => {
                    eprintln!("error: {:#}", e);
                    ExitCode::InputInvalid
                }
            }
        }

        Commands::Run { job_id, debug, resume } => {
            // Signal handling belongs to the run: forward the first
            // SIGINT/SIGTERM into the orchestrator's cancellation token.
            let coordinator = ShutdownCoordinator::new();
            let token = coordinator.token();
            tokio::spawn(async move {
                let handler = create_signal_handler();
                let signal = handler.wait_for_signal().await;
                coordinator.request_shutdown(signal);
            });

            RunJobUseCase::execute(defaults_file.as_deref(), &job_id, debug, resume, token).await
        }

        Commands::Status { job_id } => {
            logging::init_process_logging(cli.verbose);
            match ShowStatusUseCase::execute(defaults_file.as_deref(), &job_id) {
                Ok(()) => ExitCode::Completed,
                Err(e) => {
                    eprintln!("error: {:#}", e);
                    ExitCode::Error
                }
            }
        }

        Commands::CacheGc => {
            logging::init_process_logging(cli.verbose);
            match CacheGcUseCase::execute(defaults_file.as_deref()) {
                Ok(()) => ExitCode::Completed,
                Err(e) => {
                    eprintln!("error: {:#}", e);
                    ExitCode::Error
                }
            }
        }
    };

    std::process::exit(exit_code.as_i32());
}
