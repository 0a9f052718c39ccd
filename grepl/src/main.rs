//! # Grepl CLI Entry Point
//!
//! The main executable for the Grepl tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Installs the tracing subscriber and parses command-line arguments
//!    using [`cli::Cli`].
//! 2. **Schema**: Loads descriptors from a file, or from the server's reflection service.
//! 3. **Execution**: Lists or describes symbols, or runs a call through a `grepl_core` session.
//! 4. **Presentation**: Responses go to standard output, errors to standard error.

mod cli;
mod formatter;
mod prompt;

use clap::Parser;
use cli::{Cli, Commands, ListCommands};
use formatter::{FormattedString, PackageList, ServiceList};
use grepl_core::{
    descriptor::{DescriptorSource, PoolSource},
    fill::{Fill, FillOptions, InteractiveFiller, JsonFiller},
    grpc::client::{self, GrpcClient},
    present::JsonPresenter,
    reflection::client::ReflectionClient,
    session::Session,
    tokio_util::sync::CancellationToken,
    tonic::transport::Channel,
};
use prompt::TerminalPrompt;
use std::path::Path;
use std::process;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Cli::parse();

    let code = match run(args).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    };

    // A prompt may still be blocked on the terminal after a cancelled call, so the runtime
    // is not waited for.
    process::exit(code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(args: Cli) -> Result<(), FormattedString> {
    let mut channel = None;
    let source = match args.file_descriptor_set.as_deref() {
        Some(path) => load_file(path)?,
        None => {
            let connected = client::connect(&args.url).await?;
            channel = Some(connected.clone());
            load_reflected(connected).await?
        }
    };

    match args.command {
        Commands::List {
            sub: ListCommands::Services,
        } => println!("{}", FormattedString::from(ServiceList(source.service_names()))),
        Commands::List {
            sub: ListCommands::Packages,
        } => println!("{}", FormattedString::from(PackageList(source.package_names()))),
        Commands::Describe { symbol } => {
            println!("{}", FormattedString::from(source.find_symbol(&symbol)?))
        }
        Commands::Call {
            rpc,
            package,
            service,
            json,
            bytes_from_file,
            emit_defaults,
        } => {
            let filler: Box<dyn Fill + Send> = if json {
                Box::new(JsonFiller::new(std::io::stdin()))
            } else {
                let options = FillOptions { bytes_from_file };
                Box::new(InteractiveFiller::with_options(
                    TerminalPrompt::spawn()?,
                    options,
                ))
            };
            let channel = match channel {
                Some(channel) => channel,
                None => client::connect(&args.url).await?,
            };
            let presenter = JsonPresenter::new().emit_defaults(emit_defaults);
            let mut session = Session::new(source, GrpcClient::new(channel), filler, presenter);

            if let Some(package) = package {
                session.use_package(&package)?;
            }
            if let Some(service) = service {
                session.use_service(&service)?;
            }
            for (key, value) in args.headers {
                session.headers_mut().add(&key, &value)?;
            }

            let token = CancellationToken::new();
            cancel_on_ctrl_c(token.clone());

            session
                .call_rpc(&token, &mut std::io::stdout(), &rpc)
                .await?;
        }
    }

    Ok(())
}

fn load_file(path: &Path) -> Result<PoolSource, FormattedString> {
    let bytes = std::fs::read(path)?;
    Ok(PoolSource::decode(&bytes)?)
}

async fn load_reflected(channel: Channel) -> Result<PoolSource, FormattedString> {
    tracing::debug!("loading descriptors through server reflection");
    let mut reflection = ReflectionClient::new(channel);
    Ok(reflection.pool_source().await?)
}

/// Ctrl-C while no prompt is reading the terminal cancels the running call.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, cancelling the call");
            token.cancel();
        }
    });
}
