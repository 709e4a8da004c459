use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;

use table_charts::dom::{Document, Selector};
use table_charts::export::{export_graphic, DirectoryHost};
use table_charts::renderer::{RenderOutcome, RenderRequest, RendererRegistry};
use table_charts::settings::{ChartSettings, ExportFormat, ExportSettings, PageSettings};
use table_charts::table::parse_table;
use table_charts::{init_default_tracing, PageController};

#[derive(Parser, Debug)]
#[command(name = "table-charts")]
#[command(version, about = "Turn HTML tables into chart data and export chart graphics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print parsed data, setting issues and chart options for each table
    Parse(ParseArgs),

    /// Add charts to the tables of a page
    Attach(AttachArgs),

    /// Export an SVG graphic as a standalone SVG or PNG file
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// (X)HTML page to read
    page: PathBuf,

    /// Tables to parse
    #[arg(long, default_value = "table")]
    selector: String,
}

#[derive(Args, Debug)]
struct AttachArgs {
    /// (X)HTML page to read
    page: PathBuf,

    /// JSON page settings
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Tables to chart; adds to the selectors from the settings file
    #[arg(long = "selector")]
    selectors: Vec<String>,

    /// Write the page here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Format {
    #[default]
    Svg,
    Png,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Svg => ExportFormat::Svg,
            Format::Png => ExportFormat::Png,
        }
    }
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// SVG file, or markup with a single svg child
    svg: PathBuf,

    #[arg(long, value_enum, default_value = "svg")]
    format: Format,

    /// File name without extension
    #[arg(long, default_value = "chart")]
    filename: String,

    /// Raster width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Raster height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Leave out the compatibility style block
    #[arg(long)]
    no_compat_styles: bool,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> ExitCode {
    let _ = init_default_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse(args) => run_parse(&args),
        Commands::Attach(args) => run_attach(&args),
        Commands::Export(args) => run_export(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_parse(args: &ParseArgs) -> table_charts::Result<()> {
    let document = Document::parse(&fs::read_to_string(&args.page)?)?;
    let selector = Selector::parse(&args.selector)?;
    let renderers = RendererRegistry::default();

    let mut reports = Vec::new();
    let tables = document
        .descendants()
        .into_iter()
        .filter(|el| el.is("table") && selector.matches(el));
    for (index, table) in tables.enumerate() {
        let parsed = ChartSettings::from_element(table);
        let data = parse_table(table);
        let container_id = format!("{}-{}", parsed.settings.component, index + 1);
        let request = RenderRequest {
            container_id: &container_id,
            settings: &parsed.settings,
            data: &data,
        };
        let options = match renderers.render(&parsed.settings.renderer, &request) {
            RenderOutcome::Rendered(handle) => handle.options,
            RenderOutcome::NotFound { message, .. } | RenderOutcome::Failed { message, .. } => {
                json!({ "error": message })
            }
        };
        let issues: Vec<String> = parsed.issues.iter().map(ToString::to_string).collect();
        reports.push(json!({
            "settings": parsed.settings,
            "data": data,
            "issues": issues,
            "options": options,
        }));
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn run_attach(args: &AttachArgs) -> table_charts::Result<()> {
    let mut settings = match &args.settings {
        Some(path) => PageSettings::from_json(&fs::read_to_string(path)?)?,
        None => PageSettings::default(),
    };
    settings.table_chart_selectors.extend(args.selectors.iter().cloned());

    let mut document = Document::parse(&fs::read_to_string(&args.page)?)?;
    let host = DirectoryHost::new(".");
    let mut controller = PageController::new(settings);
    let ids = controller.attach(&mut document, &host)?;

    for chart in controller.charts().iter() {
        for issue in &chart.issues {
            eprintln!("chart {}: {issue}", chart.id);
        }
    }

    let markup = document.to_markup();
    match &args.out {
        Some(path) => fs::write(path, markup)?,
        None => println!("{markup}"),
    }
    eprintln!("attached {} chart(s)", ids.len());
    Ok(())
}

fn run_export(args: &ExportArgs) -> table_charts::Result<()> {
    let markup = fs::read_to_string(&args.svg)?;
    let settings = ExportSettings {
        format: args.format.into(),
        filename: args.filename.clone(),
        width: args.width,
        height: args.height,
        include_compat_styles: !args.no_compat_styles,
        ..ExportSettings::default()
    };
    let mut host = DirectoryHost::new(&args.out_dir);
    let file = export_graphic(&markup, settings, &mut host)?;
    println!("{}", host.dir().join(&file.filename).display());
    Ok(())
}
