//! Binary entry point for the vbridge CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use vbridge::lifecycle::LifecycleOrchestrator;
use vbridge::telemetry::init_tracing;
use vbridge::{
    BucketRequest, ClientError, ConfigError, DiskSpec, HttpApi, LifecycleError, ManifestError,
    MoRef, ProviderConfig, ValidationError, VmId, load_manifest,
};

mod cli;

use cli::{AddDiskCommand, BucketTarget, Cli, CreateBucketCommand, ShowDiskCommand, VmCommand};

type Orchestrator = LifecycleOrchestrator<HttpApi>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Manifest(#[from] ManifestError),
    #[error("invalid argument: {0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Lifecycle(Box<LifecycleError<ClientError>>),
    #[error("failed to write output: {0}")]
    Output(String),
}

impl From<LifecycleError<ClientError>> for CliError {
    fn from(value: LifecycleError<ClientError>) -> Self {
        Self::Lifecycle(Box::new(value))
    }
}

#[tokio::main]
async fn main() {
    init_tracing("vbridge=info");
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Provision(command) => {
            let mut machine = load_manifest(&command.manifest)?;
            let vm_id = orchestrator()?.provision(&mut machine).await?;
            write_line(vm_id.as_str())
        }
        Cli::AddDisk(command) => add_disk(command).await,
        Cli::Decommission(VmCommand { vm_id }) => {
            orchestrator()?.decommission(&VmId::new(vm_id)).await?;
            Ok(())
        }
        Cli::Show(VmCommand { vm_id }) => {
            let detail = orchestrator()?.inspect(&VmId::new(vm_id)).await?;
            write_json(&detail)
        }
        Cli::ShowDisk(ShowDiskCommand { vm_id, mo_ref }) => {
            let disk = orchestrator()?
                .additional_disk(&VmId::new(vm_id), &MoRef::new(mo_ref))
                .await?;
            write_json(&disk)
        }
        Cli::CreateBucket(CreateBucketCommand {
            target,
            object_lock,
        }) => {
            let request = bucket_request(target, object_lock)?;
            let name = orchestrator()?.provision_bucket(&request).await?;
            write_line(&name)
        }
        Cli::DeleteBucket(target) => {
            let request = bucket_request(target, false)?;
            orchestrator()?.decommission_bucket(&request).await?;
            Ok(())
        }
    }
}

async fn add_disk(command: AddDiskCommand) -> Result<(), CliError> {
    let disk = DiskSpec::new(command.capacity, command.storage_profile)?;
    let mo_ref = orchestrator()?
        .add_disk(&VmId::new(command.vm_id), &disk)
        .await?;
    write_line(mo_ref.as_str())
}

fn bucket_request(target: BucketTarget, object_lock: bool) -> Result<BucketRequest, CliError> {
    BucketRequest::new(
        target.tenant_id,
        target.canonical_user_id,
        target.name,
        object_lock,
    )
    .map_err(CliError::from)
}

fn orchestrator() -> Result<Orchestrator, CliError> {
    let config = ProviderConfig::load_without_cli_args()?;
    let timings = config.timings()?;
    let ambiguity = config.ambiguity()?;
    let api = HttpApi::connect(
        config.api_url.trim(),
        config.api_key.trim(),
        config.user_email.trim(),
    );
    let lifecycle = LifecycleOrchestrator::new(api, timings).with_ambiguity(ambiguity);

    let cancel = lifecycle.cancellation_token().clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, cancelling in-flight operation");
                cancel.cancel();
            }
            Err(err) => warn!(error = %err, "failed to listen for interrupt"),
        }
    });

    Ok(lifecycle)
}

fn write_line(text: &str) -> Result<(), CliError> {
    writeln!(io::stdout(), "{text}").map_err(|err| CliError::Output(err.to_string()))
}

fn write_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    write_line(&rendered)
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
