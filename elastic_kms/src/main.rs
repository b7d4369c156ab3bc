// /////////////////////////////////////////////////////////////////////////////
// Elastic KMS
// Copyright (c) 2025 Elastic KMS Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process entry: parse arguments, load configuration, initialize
//! logging, wire the application and serve until a signal or the admin
//! shutdown endpoint stops it.

use std::sync::Arc;

use elastic_kms::lifecycle::Application;
use elastic_kms_bootstrap::signals::create_signal_handler;
use elastic_kms_bootstrap::{ExitCode, KmsArgs, KmsConfig, ShutdownCoordinator};
use elastic_kms_domain::KmsError;

#[tokio::main]
async fn main() {
    let args = KmsArgs::parse_args();

    let config = match KmsConfig::load(&args.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("elastic-kms: {error}");
            ExitCode::ConfigError.exit();
        }
    };

    if let Err(error) =
        elastic_kms_bootstrap::logger::init_logging(args.log_filter.as_deref(), config.log_filter.as_deref())
    {
        eprintln!("elastic-kms: {error}");
        ExitCode::Error.exit();
    }

    let coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown_grace()));

    // Signal handling drives the same coordinator as the admin endpoint.
    {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let handler = create_signal_handler();
            handler
                .wait_for_signal(Box::new(move || coordinator.initiate_shutdown()))
                .await;
        });
    }

    let exit = match Application::build(config, coordinator).await {
        Ok(application) => match application.run().await {
            Ok(()) => ExitCode::Success,
            Err(error) => {
                tracing::error!(%error, "service terminated abnormally");
                exit_code_for(&error)
            }
        },
        Err(error) => {
            tracing::error!(%error, "startup failed");
            exit_code_for(&error)
        }
    };
    exit.exit();
}

fn exit_code_for(error: &KmsError) -> ExitCode {
    match error {
        KmsError::Validation(_) => ExitCode::ConfigError,
        KmsError::Upstream(_) | KmsError::Transient(_) => ExitCode::Unavailable,
        _ => ExitCode::Software,
    }
}
