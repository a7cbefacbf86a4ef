//! Administrative table command: create or drop the benchmark table.
//!
//! ```text
//! dingo-table -p coordinator.host=lmdb:///var/lib/dingo -n usertable -f 10
//! dingo-table -c command=drop -p coordinator.host=lmdb:///var/lib/dingo -n usertable
//! ```
//!
//! Usage errors print help and exit 0. A missing table name, a bad field
//! count, or a failed create/drop exits 1.

use std::collections::HashMap;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use dingo_binding::{init_tracing, TelemetryConfig};
use dingo_core::{
    build_schema, BindingConfig, BindingError, TableCommand, FIELD_COUNT_PROPERTY, TABLE_PROPERTY,
};
use dingo_storage::{Connector, EndpointConnector};

const RULE: &str = "=========================================================";

/// Do Table Command (create/drop) Client.
#[derive(Parser, Debug)]
#[command(name = "dingo-table", version)]
struct Args {
    /// Command, e.g. `command=drop` (default create)
    #[arg(short = 'c', value_name = "KEY=VALUE", value_parser = parse_key_value)]
    commands: Vec<(String, String)>,

    /// Property, e.g. `coordinator.host=lmdb:///tmp/dingo`
    #[arg(short = 'p', value_name = "KEY=VALUE", value_parser = parse_key_value)]
    properties: Vec<(String, String)>,

    /// Name of the table
    #[arg(short = 'n', value_name = "TABLE")]
    table: Option<String>,

    /// Number of fields (default 10)
    #[arg(short = 'f', value_name = "COUNT")]
    field_count: Option<String>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("table name missing")]
    MissingTable,

    #[error("Invalid number for field count: {0}")]
    InvalidFieldCount(String),

    #[error("{0}")]
    Binding(#[from] BindingError),

    #[error("Failed to render schema: {0}")]
    Render(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Merge flags into a validated configuration.
fn build_config(args: &Args) -> Result<BindingConfig, CliError> {
    let table = args.table.clone().ok_or(CliError::MissingTable)?;

    let mut props: HashMap<String, String> = args
        .commands
        .iter()
        .chain(&args.properties)
        .cloned()
        .collect();
    if let Some(raw) = &args.field_count {
        let count: i64 = raw
            .trim()
            .parse()
            .map_err(|_| CliError::InvalidFieldCount(raw.clone()))?;
        props.insert(FIELD_COUNT_PROPERTY.to_string(), count.to_string());
    }
    props.insert(TABLE_PROPERTY.to_string(), table);

    let config = BindingConfig::from_properties(&props)?;
    config.validate()?;
    Ok(config)
}

/// Connect, run the command, and close the client.
fn run(
    config: &BindingConfig,
    connector: &dyn Connector,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let client = connector.connect(config)?;

    let result = match config.command {
        TableCommand::Drop => client
            .drop_table(&config.table)
            .map(|existed| {
                if existed {
                    tracing::info!(table = %config.table, "Dropped table");
                } else {
                    tracing::warn!(table = %config.table, "Table did not exist");
                }
            })
            .map_err(CliError::from),
        TableCommand::Create => create(config, client.as_ref(), out),
    };

    if let Err(e) = client.close() {
        tracing::warn!(error = %e, "Failed to close storage client");
    }
    result
}

fn create(
    config: &BindingConfig,
    client: &dyn dingo_storage::StorageClient,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let schema = build_schema(&config.table, config.field_count)?;

    writeln!(out, "{}", RULE)?;
    writeln!(out, "{}", schema.to_json()?)?;
    writeln!(out, "{}", RULE)?;

    client.create_table(&schema)?;
    tracing::info!(table = %config.table, columns = schema.width(), "Created table");
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = init_tracing(&TelemetryConfig::from_env()) {
        eprintln!("{}", e);
    }

    if std::env::args_os().len() <= 1 {
        let _ = <Args as clap::CommandFactory>::command().print_help();
        return ExitCode::SUCCESS;
    }

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            let _ = <Args as clap::CommandFactory>::command().print_help();
            return ExitCode::FAILURE;
        }
    };

    let stdout = std::io::stdout();
    match run(&config, &EndpointConnector, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error in {} table {}. {}", config.command, config.table, e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dingo_core::{ConfigError, ConnectionError, StorageError};
    use dingo_storage::{MockConnector, MockStorage, StorageClient};
    use std::sync::Arc;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("dingo-table").chain(argv.iter().copied()))
    }

    #[test]
    fn test_parse_flags() {
        let args = parse(&[
            "-c",
            "command=drop",
            "-p",
            "coordinator.host=mem://x",
            "-p",
            "dingo.user=root",
            "-n",
            "t",
            "-f",
            "3",
        ])
        .unwrap();
        assert_eq!(args.commands, vec![("command".to_string(), "drop".to_string())]);
        assert_eq!(args.properties.len(), 2);
        assert_eq!(args.table.as_deref(), Some("t"));

        let config = build_config(&args).unwrap();
        assert_eq!(config.command, TableCommand::Drop);
        assert_eq!(config.table, "t");
        assert_eq!(config.field_count, 3);
        assert_eq!(config.credentials.unwrap().user, "root");
    }

    #[test]
    fn test_property_without_equals_is_usage_error() {
        assert!(parse(&["-p", "coordinator.host"]).is_err());
        assert!(parse(&["-x"]).is_err());
        assert!(parse(&["-n"]).is_err());
    }

    #[test]
    fn test_missing_table() {
        let args = parse(&["-p", "coordinator.host=mem://x"]).unwrap();
        assert!(matches!(build_config(&args), Err(CliError::MissingTable)));
    }

    #[test]
    fn test_non_numeric_field_count() {
        let args = parse(&["-p", "coordinator.host=mem://x", "-n", "t", "-f", "ten"]).unwrap();
        assert!(matches!(build_config(&args), Err(CliError::InvalidFieldCount(_))));
    }

    #[test]
    fn test_missing_coordinator() {
        let args = parse(&["-n", "t"]).unwrap();
        assert!(matches!(
            build_config(&args),
            Err(CliError::Binding(BindingError::Config(ConfigError::MissingRequired { .. })))
        ));
    }

    #[test]
    fn test_create_prints_schema_and_creates_table() {
        let storage = Arc::new(MockStorage::new());
        let connector = MockConnector::new(storage.clone());
        let config = BindingConfig::new("mem://x").with_table("t").with_field_count(2);

        let mut out = Vec::new();
        run(&config, &connector, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], RULE);
        assert_eq!(
            lines[1],
            r#"{"YCSB_KEY":"varchar","FIELD0":"varchar","FIELD1":"varchar"}"#
        );
        assert_eq!(lines[2], RULE);

        storage.reopen();
        assert_eq!(storage.table("t").unwrap().unwrap().width(), 3);
        assert_eq!(storage.close_count(), 1);
    }

    #[test]
    fn test_create_existing_table_fails() {
        let storage = Arc::new(MockStorage::new());
        storage.create_table(&build_schema("t", 1).unwrap()).unwrap();
        let connector = MockConnector::new(storage);
        let config = BindingConfig::new("mem://x").with_table("t").with_field_count(1);

        let err = run(&config, &connector, &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Binding(BindingError::Storage(StorageError::TableExists { .. }))
        ));
    }

    #[test]
    fn test_drop_prints_nothing() {
        let storage = Arc::new(MockStorage::new());
        storage.create_table(&build_schema("t", 1).unwrap()).unwrap();
        let connector = MockConnector::new(storage.clone());
        let mut config = BindingConfig::new("mem://x").with_table("t");
        config.command = TableCommand::Drop;

        let mut out = Vec::new();
        run(&config, &connector, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(storage.table_count(), 0);
    }

    #[test]
    fn test_connection_failure() {
        let connector = MockConnector::new(Arc::new(MockStorage::new())).unreachable();
        let config = BindingConfig::new("mem://x").with_table("t");
        assert!(matches!(
            run(&config, &connector, &mut Vec::new()),
            Err(CliError::Binding(BindingError::Connection(ConnectionError::Unreachable { .. })))
        ));
    }
}
