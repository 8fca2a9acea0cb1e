//! waste-report CLI
//!
//! Browse Peru's municipal solid-waste dataset (2014-2021) in the terminal,
//! or render any menu page headlessly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use waste_report::dispatch::{Dispatcher, SelectionCache};
use waste_report::error::ConfigurationError;
use waste_report::logging::{self, LogTarget};
use waste_report::navigation::{MenuConfig, NavigationTree};
use waste_report::report::{
    emit, emit_text, format_summary, format_tree, DatasetSummary, RenderSink, Rendered, WriterSink,
};
use waste_report::store::{CsvSource, DataStore, Dataset};
use waste_report::tui;
use waste_report::types::{DataConfig, Encoding, OutputFormat, Year};
use waste_report::views::{ViewInput, ViewRegistry};

#[derive(Parser)]
#[command(name = "waste-report")]
#[command(about = "Municipal solid-waste report for Peru, 2014-2021")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Primary waste table
    #[arg(long, global = true, default_value = "residuos_municipales.csv")]
    data: PathBuf,

    /// Ubigeo coordinates table
    #[arg(long, global = true, default_value = "TB_UBIGEOS.csv")]
    geo: PathBuf,

    /// Field delimiter of both tables
    #[arg(long, global = true, default_value_t = ';')]
    delimiter: char,

    /// Text encoding of both tables
    #[arg(long, global = true, value_enum, default_value = "latin1")]
    encoding: EncodingArg,

    /// Menu definition (JSON); the built-in menu is used when absent
    #[arg(long, global = true)]
    menu: Option<PathBuf>,

    /// Log file for the dashboard (default: user data directory)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive dashboard
    Browse,

    /// Render the page reached by a menu path, e.g. `Inicio "Gráfico 3"`
    Render {
        /// Menu labels from the root down; missing levels use their defaults
        labels: Vec<String>,

        /// Year for views with a period selector
        #[arg(long)]
        period: Option<i32>,

        /// Department for the district drill-down
        #[arg(long)]
        department: Option<String>,

        /// Province for the district drill-down
        #[arg(long)]
        province: Option<String>,

        /// District for the district drill-down
        #[arg(long)]
        district: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },

    /// Show record counts, periods and totals of the input tables
    Summary {
        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },

    /// Validate the menu definition and print its tree
    CheckMenu {
        /// Print the built-in menu as JSON instead
        #[arg(long)]
        dump: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum EncodingArg {
    Latin1,
    Utf8,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Latin1 => Encoding::Latin1,
            EncodingArg::Utf8 => Encoding::Utf8,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Browse => cmd_browse(&cli.global),
        Commands::Render {
            labels,
            period,
            department,
            province,
            district,
            format,
        } => {
            let input = ViewInput {
                period: period.map(Year),
                department,
                province,
                district,
            };
            cmd_render(&cli.global, &labels, input, format.into())
        }
        Commands::Summary { format } => cmd_summary(&cli.global, format.into()),
        Commands::CheckMenu { dump } => cmd_check_menu(&cli.global, dump),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// SETUP
// ============================================================================

fn data_config(args: &GlobalArgs) -> Result<DataConfig, String> {
    if !args.delimiter.is_ascii() {
        return Err(format!(
            "delimiter must be a single ASCII character, got '{}'",
            args.delimiter
        ));
    }
    Ok(DataConfig {
        primary_path: args.data.clone(),
        geo_path: args.geo.clone(),
        delimiter: args.delimiter as u8,
        encoding: args.encoding.into(),
    })
}

/// Load the menu and check every bound view has an implementation.
fn load_tree(menu: Option<&Path>, registry: &ViewRegistry) -> Result<NavigationTree, String> {
    let tree = match menu {
        Some(path) => NavigationTree::load(path),
        None => NavigationTree::builtin(),
    }
    .map_err(|e| e.to_string())?;

    if let Some(missing) = tree.bound_views().into_iter().find(|v| !registry.contains(*v)) {
        let err = ConfigurationError::new(&[], format!("view '{}' is not registered", missing));
        return Err(err.to_string());
    }
    Ok(tree)
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn cmd_browse(args: &GlobalArgs) -> Result<(), String> {
    let log_file = args
        .log_file
        .clone()
        .or_else(logging::default_log_file)
        .ok_or("no data directory for the log file; pass --log-file")?;
    logging::init(args.verbose, &LogTarget::File(log_file))?;

    let registry = ViewRegistry::standard();
    let tree = load_tree(args.menu.as_deref(), &registry)?;
    let store = DataStore::new(CsvSource::new(data_config(args)?));

    // Load before raw mode so read errors print normally.
    let pb = spinner("Loading tables...");
    let loaded = store.dataset();
    pb.finish_and_clear();
    let data = loaded.map_err(|e| e.to_string())?;

    tui::run(data, &tree, &registry).map_err(|e| e.to_string())
}

fn cmd_render(
    args: &GlobalArgs,
    labels: &[String],
    input: ViewInput,
    format: OutputFormat,
) -> Result<(), String> {
    logging::init(args.verbose, &LogTarget::Stderr)?;

    let registry = ViewRegistry::standard();
    let tree = load_tree(args.menu.as_deref(), &registry)?;
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();

    let store = DataStore::new(CsvSource::new(data_config(args)?));
    let data = match format {
        OutputFormat::Human => {
            let pb = spinner("Loading tables...");
            let loaded = store.dataset();
            pb.finish_and_clear();
            loaded
        }
        OutputFormat::Json => store.dataset(),
    }
    .map_err(|e| e.to_string())?;

    let mut sink = WriterSink::new(io::stdout().lock(), format);
    render_page(&mut sink, data, &tree, &registry, &labels, &input)
}

/// Navigate `labels` from the root, run the bound views and hand the page
/// to `sink`. Only an unknown label is an error; sink failures are logged.
fn render_page<S: RenderSink>(
    sink: &mut S,
    data: Dataset<'_>,
    tree: &NavigationTree,
    registry: &ViewRegistry,
    labels: &[&str],
    input: &ViewInput,
) -> Result<(), String> {
    let dispatcher = Dispatcher::new(tree);
    let mut cache = SelectionCache::new();
    let active = dispatcher
        .select_path(&mut cache, labels)
        .map_err(|e| e.to_string())?;

    let rendered: Vec<Rendered> = active
        .invocations()
        .into_iter()
        .map(|id| (id, registry.invoke(id, &data, input)))
        .collect();
    info!(views = rendered.len(), "page rendered");

    emit(sink, &active.labels(), &rendered);
    Ok(())
}

fn cmd_summary(args: &GlobalArgs, format: OutputFormat) -> Result<(), String> {
    logging::init(args.verbose, &LogTarget::Stderr)?;

    let store = DataStore::new(CsvSource::new(data_config(args)?));
    let data = store.dataset().map_err(|e| e.to_string())?;

    let config = store.source().config();
    let summary = DatasetSummary {
        primary_bytes: fs::metadata(&config.primary_path).ok().map(|m| m.len()),
        geo_bytes: fs::metadata(&config.geo_path).ok().map(|m| m.len()),
        ..DatasetSummary::from_dataset(&data)
    };
    emit_text(&mut io::stdout().lock(), &format_summary(&summary, format));
    Ok(())
}

fn cmd_check_menu(args: &GlobalArgs, dump: bool) -> Result<(), String> {
    logging::init(args.verbose, &LogTarget::Stderr)?;

    if dump {
        let json = serde_json::to_string_pretty(&MenuConfig::builtin())
            .map_err(|e| format!("cannot serialize menu: {}", e))?;
        emit_text(&mut io::stdout().lock(), &json);
        return Ok(());
    }

    let registry = ViewRegistry::standard();
    let tree = load_tree(args.menu.as_deref(), &registry)?;
    let text = format!(
        "{}\nOK: {} levels deep, {} views bound.",
        format_tree(&tree),
        tree.depth(),
        tree.bound_views().len()
    );
    emit_text(&mut io::stdout().lock(), &text);
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use waste_report::types::{GeoCode, GeoLocation, Record, Table};

    /// Stdout after the reading end of a pipe has gone away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn tables() -> (Table<Record>, Table<GeoLocation>) {
        let record = |period, dep: &str, mun: f64| Record {
            ubigeo: GeoCode(150101),
            period: Year(period),
            department: dep.into(),
            province: dep.into(),
            district: dep.into(),
            domestic_waste: mun,
            non_domestic_waste: 0.0,
            municipal_waste: mun,
            per_capita_domestic: 0.0,
        };
        (
            Table::new(vec![record(2014, "LIMA", 10.0), record(2015, "LIMA", 30.0)]),
            Table::new(vec![]),
        )
    }

    #[test]
    fn render_page_writes_path_and_views() {
        let (records, geo) = tables();
        let data = Dataset { records: &records, geo: &geo };
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();

        let mut sink = WriterSink::new(Vec::new(), OutputFormat::Json);
        let input = ViewInput {
            period: Some(Year(2015)),
            ..ViewInput::default()
        };
        let labels = ["Inicio", "Gráfico 3"];
        render_page(&mut sink, data, &tree, &registry, &labels, &input).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();
        assert_eq!(parsed["path"][1], "Gráfico 3");
        assert_eq!(parsed["views"][0]["view"], "period-department-line");
    }

    #[test]
    fn closed_stdout_does_not_fail_the_command() {
        let (records, geo) = tables();
        let data = Dataset { records: &records, geo: &geo };
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();

        let mut sink = WriterSink::new(ClosedPipe, OutputFormat::Human);
        let input = ViewInput::default();
        let result = render_page(&mut sink, data, &tree, &registry, &["Inicio"], &input);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn unknown_label_is_an_error() {
        let (records, geo) = tables();
        let data = Dataset { records: &records, geo: &geo };
        let tree = NavigationTree::builtin().unwrap();
        let registry = ViewRegistry::standard();

        let mut sink = WriterSink::new(Vec::new(), OutputFormat::Human);
        let input = ViewInput::default();
        let err = render_page(&mut sink, data, &tree, &registry, &["Salir"], &input).unwrap_err();
        assert!(err.contains("Salir"));
        assert!(sink.into_inner().is_empty());
    }
}
