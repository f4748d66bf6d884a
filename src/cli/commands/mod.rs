//! Command execution for release operations.
//!
//! Each subcommand resolves the configuration once, checks that the tools it
//! drives are installed and runs its stage through the [`Pipeline`]. Stage
//! commands race against Ctrl-C; dropping the interrupted future releases any
//! mounted volume.

use super::args::{Args, Command, VersionAction};
use crate::{
    bundler::{
        Pipeline, ReleaseConfig, ReleaseConfigBuilder, SystemRunner, TransportProtocol,
        builder::tool_detection::{
            OPTIONAL_PACKAGING_TOOLS, PACKAGING_TOOLS, RSYNC_TOOLS, SCP_TOOLS, missing_tools,
        },
        publish::resolve_artifacts,
    },
    error::{CliError, Result},
    metadata,
};
use serde::Serialize;
use std::future::Future;

/// Executes the parsed command.
pub async fn execute(args: &Args) -> Result<()> {
    if let Command::Version {
        action: VersionAction::Bump { part },
    } = &args.command
    {
        let builder = builder(args).await?;
        let version = metadata::bump_version(&builder.info_plist_path(), *part).await?;
        return print_result(args, &version, &version);
    }

    let config = builder(args).await?.build()?;
    let runner = SystemRunner;
    let pipeline = Pipeline::new(&config, &runner);

    match &args.command {
        Command::Dmg => {
            preflight_packaging();
            let artifacts = interruptible(args, pipeline.assemble()).await?;
            print_result(args, &artifacts, &artifacts.disk_image.display())
        }
        Command::Feed => {
            let feed = interruptible(args, pipeline.update_feed(&config.artifact_set())).await?;
            let latest = feed.latest().map(|item| item.version.clone());
            let summary = format!(
                "{} lists {} release(s), latest {}",
                config.feed_path().display(),
                feed.items().len(),
                latest.as_deref().unwrap_or("none")
            );
            print_result(args, &latest, &summary)
        }
        Command::Upload { feed } => {
            let target = config.transport()?;
            preflight_transport(target.protocol);
            let (artifacts, feed_path) = match feed {
                Some(path) => (config.artifact_set(), args.project_dir.join(path)),
                None => {
                    let artifacts = resolve_artifacts(&config)?;
                    let feed_path = artifacts.feed_file.clone();
                    (artifacts, feed_path)
                }
            };
            let report =
                interruptible(args, pipeline.publish(&artifacts, &feed_path, target)).await?;
            print_report(args, &report)
        }
        Command::Release => {
            preflight_packaging();
            preflight_transport(config.transport()?.protocol);
            let report = interruptible(args, pipeline.run()).await?;
            print_report(args, &report)
        }
        Command::Version {
            action: VersionAction::Current,
        } => print_current_version(args, &config),
        Command::Version {
            action: VersionAction::Bump { .. },
        } => Ok(()),
    }
}

async fn builder(args: &Args) -> Result<ReleaseConfigBuilder> {
    let file = metadata::load_config_file(&args.config_path()).await?;
    let builder = ReleaseConfigBuilder::new(&args.project_dir)
        .config_file(file)
        .build_type(args.build_type.clone());
    let info = metadata::read_bundle_info(&builder.info_plist_path())?;
    Ok(builder.bundle_info(info))
}

/// Runs `fut` unless Ctrl-C arrives first.
async fn interruptible<T, F>(args: &Args, fut: F) -> Result<T>
where
    F: Future<Output = crate::bundler::Result<T>>,
{
    tokio::select! {
        result = fut => Ok(result?),
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, cleaning up");
            Err(CliError::Interrupted {
                command: args.command.name().to_string(),
            }
            .into())
        }
    }
}

fn preflight_packaging() {
    for tool in missing_tools(PACKAGING_TOOLS) {
        log::warn!("{} not found in PATH; DMG assembly will fail", tool);
    }
    for tool in missing_tools(OPTIONAL_PACKAGING_TOOLS) {
        log::warn!("{} not found in PATH; the volume icon will not be marked", tool);
    }
}

fn preflight_transport(protocol: TransportProtocol) {
    let tools = match protocol {
        TransportProtocol::Rsync => RSYNC_TOOLS,
        TransportProtocol::Scp => SCP_TOOLS,
    };
    for tool in missing_tools(tools) {
        log::warn!("{} not found in PATH; uploads will fail", tool);
    }
}

fn print_current_version(args: &Args, config: &ReleaseConfig) -> Result<()> {
    #[derive(Serialize)]
    struct Current<'a> {
        name: &'a str,
        version: Option<&'a str>,
        package: String,
    }

    if args.json {
        let current = Current {
            name: config.name(),
            version: config.version(),
            package: config.package().pkg_name(),
        };
        println!("{}", serde_json::to_string_pretty(&current)?);
    } else {
        match config.version() {
            Some(version) => println!("{}", version),
            None => println!("{} has no version", config.name()),
        }
    }
    Ok(())
}

fn print_report(args: &Args, report: &crate::bundler::PublishReport) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

fn print_result<T: Serialize>(args: &Args, value: &T, human: &dyn std::fmt::Display) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human);
    }
    Ok(())
}
