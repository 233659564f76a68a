use anyhow::Context;
use beacon_arrow_hdf5::{Hdf5ArrowReader, ReaderOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str =
    "usage: beacon-arrow-hdf5-inspect <file> [--root PATH] [--exclude PATH]... [--rows N] [--columns a,b]";

#[derive(Debug, Default)]
struct Args {
    path: String,
    root: Option<String>,
    exclude: Vec<String>,
    rows: Option<usize>,
    columns: Option<Vec<String>>,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> anyhow::Result<Args> {
    let mut parsed = Args::default();
    let mut path = None;

    while let Some(arg) = args.next() {
        if !arg.starts_with("--") {
            if path.is_some() {
                anyhow::bail!("unexpected argument {}\n{}", arg, USAGE);
            }
            path = Some(arg);
            continue;
        }

        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| anyhow::anyhow!("missing value for {}\n{}", flag, USAGE))
        };
        match arg.as_str() {
            "--root" => parsed.root = Some(value("--root")?),
            "--exclude" => parsed.exclude.push(value("--exclude")?),
            "--rows" => {
                parsed.rows = Some(
                    value("--rows")?
                        .parse()
                        .context("--rows expects a non-negative integer")?,
                )
            }
            "--columns" => {
                parsed.columns = Some(
                    value("--columns")?
                        .split(',')
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            }
            flag => anyhow::bail!("unknown option {}\n{}", flag, USAGE),
        }
    }

    parsed.path = path.ok_or_else(|| anyhow::anyhow!(USAGE))?;
    Ok(parsed)
}

fn setup_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}={level},beacon_arrow_hdf5={level}",
                    env!("CARGO_CRATE_NAME"),
                    level = beacon_config::CONFIG.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    setup_tracing();
    let args = parse_args(std::env::args().skip(1))?;

    let mut options = ReaderOptions::default().with_exclude(args.exclude);
    if let Some(root) = args.root {
        options = options.with_root(root);
    }

    let reader = Hdf5ArrowReader::try_new(&args.path, options)
        .with_context(|| format!("Failed to open {}", args.path))?;
    tracing::info!("Opened {} with {} columns", args.path, reader.ncol());

    println!("file: {}", reader.path().display());
    println!("root: {}", reader.root());
    println!("rows: {}", reader.row_count());
    println!("schema:");
    for field in reader.schema().fields() {
        println!("  {}: {}", field.name(), field.data_type());
    }
    println!(
        "attributes:\n{}",
        serde_json::to_string_pretty(reader.attributes())?
    );

    let columns = args
        .columns
        .unwrap_or_else(|| reader.columns().into_iter().map(str::to_string).collect());
    let rows = args.rows.unwrap_or(beacon_config::CONFIG.hdf5_preview_rows);
    let preview = reader.read(&columns, 0, rows, 1)?;
    println!("{}", arrow::util::pretty::pretty_format_batches(&[preview])?);

    Ok(())
}
