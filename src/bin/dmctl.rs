//! dmctl: query and modify a configuration daemon.
//!
//! Part of the async-dmconfig CLI utilities.

use async_dmconfig::cli::args::{CommonArgs, OutputArgs, TypeArg, parse_value};
use async_dmconfig::codes::session;
use async_dmconfig::decode::Node;
use async_dmconfig::{Connection, Error, FeedbackEvent, Result, ValueType};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::Instant;

/// Query and modify a dmconfig configuration daemon.
#[derive(Debug, Parser)]
#[command(name = "dmctl", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read one or more parameters.
    Get {
        /// Expected value type.
        #[arg(short = 'T', long = "type", default_value = "unknown")]
        ty: TypeArg,
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<String>,
    },
    /// Write a parameter and commit.
    Set {
        /// Value type.
        #[arg(short = 'T', long = "type", default_value = "string")]
        ty: TypeArg,
        path: String,
        value: String,
    },
    /// List the nodes below a path.
    List {
        /// Depth, 0 for unlimited.
        #[arg(short = 'l', long = "level", default_value = "1")]
        level: u16,
        #[arg(default_value = "")]
        path: String,
    },
    /// Print the configuration below a path.
    Dump {
        #[arg(default_value = "")]
        path: String,
    },
    /// Commit pending changes of the configuration session.
    Commit,
    /// Ping a host from the device.
    Ping {
        host: String,
        #[arg(short = 'c', long = "count", default_value = "4")]
        count: u32,
        /// Per-probe timeout in milliseconds.
        #[arg(short = 'W', long = "wait", default_value = "1000")]
        wait: u32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.output.init_tracing();

    let start = Instant::now();
    let result = run(&args).await;
    let elapsed = start.elapsed();

    if args.output.timing {
        eprintln!("elapsed: {:.3}s", elapsed.as_secs_f64());
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            write_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn write_error(e: &Error) {
    eprintln!("Error: {} ({})", e, e.result_code());
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}

fn print_nodes(nodes: &[Node], indent: usize) {
    for node in nodes {
        match (&node.value, node.datatype, node.size) {
            (Some(value), _, _) => println!("{:indent$}{} = {}", "", node.name, value),
            (None, Some(datatype), _) => {
                let ty = ValueType::from_code(datatype)
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| datatype.to_string());
                println!("{:indent$}{} ({})", "", node.name, ty)
            }
            (None, None, Some(size)) => println!("{:indent$}{}. [{}]", "", node.name, size),
            (None, None, None) => println!("{:indent$}{}. ({})", "", node.name, node.kind),
        }
        print_nodes(&node.children, indent + 2);
    }
}

async fn run(args: &Args) -> Result<()> {
    let mut conn = Connection::builder(args.common.endpoint.clone())
        .config(args.common.client_config())
        .connect()
        .await?;

    match &args.command {
        Command::Get { ty, paths } => {
            conn.start_session(session::READ, None, None).await?;
            let request: Vec<(ValueType, &str)> = paths
                .iter()
                .map(|p| (ValueType::from(*ty), p.as_str()))
                .collect();
            let values = conn.get(&request).await?;
            for (path, value) in paths.iter().zip(&values) {
                println!("{} = {}", path, value);
            }
            conn.end_session().await?;
        }
        Command::Set { ty, path, value } => {
            let value = parse_value(ValueType::from(*ty), value)
                .map_err(|e| Error::Config(e.into()).boxed())?;
            conn.start_session(session::READ | session::WRITE, None, None)
                .await?;
            conn.set(&[(path.as_str(), value)]).await?;
            conn.commit().await?;
            conn.end_session().await?;
        }
        Command::List { level, path } => {
            conn.start_session(session::READ, None, None).await?;
            let nodes = conn.list(path, *level).await?;
            print_nodes(&nodes, 0);
            conn.end_session().await?;
        }
        Command::Dump { path } => {
            conn.start_session(session::READ, None, None).await?;
            println!("{}", conn.dump(path).await?);
            conn.end_session().await?;
        }
        Command::Commit => {
            conn.start_session(session::READ | session::WRITE | session::CONFIGURE, None, None)
                .await?;
            conn.commit().await?;
            conn.end_session().await?;
        }
        Command::Ping { host, count, wait } => {
            conn.start_session(session::READ, None, None).await?;
            conn.ping(host, *count, *wait, |feedback| {
                if let Some(e) = &feedback.error {
                    eprintln!("malformed ping report: {}", e);
                }
                match feedback.event {
                    FeedbackEvent::PingSample(s) => {
                        let from = s.address.map(|a| a.to_string()).unwrap_or_default();
                        println!("{} bytes from {}: seq={} time={} ms", s.bytes, from, s.sequence, s.rtt);
                    }
                    FeedbackEvent::PingCompleted(s) => {
                        println!(
                            "{} received, {} lost, rtt min/avg/max = {}/{}/{} ms",
                            s.succeeded, s.failed, s.min, s.avg, s.max
                        );
                    }
                    _ => {}
                }
            })
            .await?;
            conn.run().await?;
            conn.end_session().await?;
        }
    }
    Ok(())
}
