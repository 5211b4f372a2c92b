//! mermaidview - build, validate and render Mermaid diagrams.
//!
//! # Usage
//!
//! ```bash
//! mermaidview generate flow.mmd --format svg --theme dark
//! mermaidview validate flow.mmd --strict
//! mermaidview quick -s "Collect data" -s "Analyse" -s "Report" --decision
//! mermaidview template show sequence
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use mermaidview::builder::{FlowchartBuilder, quick_flowchart};
use mermaidview::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_file_flags, local_override_path,
    save_config_flags,
};
use mermaidview::diagram::{Direction, parse_flowchart};
use mermaidview::enhance::{OllamaClient, enhance_diagram};
use mermaidview::generate::{Generator, default_output_path, renderer_for};
use mermaidview::interchange::{ExchangeFormat, export_file, import_file};
use mermaidview::templates::{TemplateManager, find_diagram_template};
use mermaidview::validate::{DiagramKind, validate, validate_diagram};

/// Build, validate and render Mermaid diagrams
#[derive(Parser, Debug)]
#[command(name = "mermaidview", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a Mermaid file to an image
    Generate(GenerateArgs),

    /// Check Mermaid syntax and print a report
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },

    /// Create a linear flowchart from steps
    Create {
        /// Process steps, in order
        #[arg(short, long, num_args = 1.., required = true)]
        steps: Vec<String>,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long, default_value = "TD")]
        direction: Direction,

        /// Output .mmd file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Quickly create a process flowchart and print it
    Quick {
        #[arg(short, long, num_args = 1.., required = true)]
        steps: Vec<String>,

        /// Include a decision point
        #[arg(short, long)]
        decision: bool,

        #[arg(short, long, default_value = "Quick Process")]
        title: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Template management
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Show information about a Mermaid file
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Export a flowchart's structure
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// json, yaml or csv
        #[arg(short, long, default_value = "json")]
        format: ExchangeFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a flowchart from JSON, YAML or CSV
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output .mmd file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ask a local Ollama model to improve a diagram
    Enhance {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long)]
        model: Option<String>,

        /// Ollama base URL
        #[arg(long)]
        url: Option<String>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    /// List diagram types and flowchart templates
    List,

    /// Create a flowchart from a template
    Create {
        name: String,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        direction: Option<Direction>,
    },

    /// Print the example for a diagram type
    Show {
        #[arg(value_name = "TYPE")]
        kind: String,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Output path (defaults to FILE with the format's extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// png, svg, pdf or jpeg
    #[arg(short, long)]
    format: Option<String>,

    /// default, dark, forest, neutral or base
    #[arg(short, long)]
    theme: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    scale: Option<f64>,

    /// Background color
    #[arg(short, long)]
    background: Option<String>,

    /// browser (Mermaid CLI) or remote (HTTP service)
    #[arg(long)]
    renderer: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Path to the mmdc executable
    #[arg(long, value_name = "PATH")]
    mmdc: Option<PathBuf>,

    /// Base URL of the remote render service
    #[arg(long, value_name = "URL")]
    render_url: Option<String>,

    /// Skip syntax validation before rendering
    #[arg(long)]
    no_validate: bool,

    /// Save these flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

impl GenerateArgs {
    fn flags(&self, verbose: bool) -> ConfigFlags {
        ConfigFlags {
            verbose,
            theme: self.theme.clone(),
            format: self.format.clone(),
            width: self.width,
            height: self.height,
            scale: self.scale,
            background: self.background.clone(),
            renderer: self.renderer.clone(),
            timeout: self.timeout,
            mmdc: self.mmdc.clone(),
            render_url: self.render_url.clone(),
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn timestamped(prefix: &str) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    PathBuf::from(format!("{prefix}_{secs}.mmd"))
}

fn save_builder(builder: &FlowchartBuilder, path: &Path) -> Result<()> {
    builder
        .save_to_file(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn run_generate(
    args: GenerateArgs,
    file_flags: ConfigFlags,
    global_path: &Path,
    verbose: bool,
) -> Result<ExitCode> {
    let cli_flags = args.flags(verbose);
    if args.clear {
        clear_config_flags(global_path)?;
    }
    let base = if args.clear {
        ConfigFlags::default()
    } else {
        file_flags
    };
    let effective = base.union(&cli_flags);
    let config = effective.generation_config()?;
    let kind = effective.renderer_kind()?;
    let timeout = effective.timeout()?;
    if args.save {
        save_config_flags(global_path, &cli_flags)?;
        println!("Saved defaults to {}", global_path.display());
    }

    let source = read_source(&args.file)?;
    if !args.no_validate {
        let result = validate(&source);
        if !result.is_valid() {
            eprint!("{}", result.report());
            return Ok(ExitCode::FAILURE);
        }
        for warning in result.warnings() {
            eprintln!("warning: {warning}");
        }
    }

    let renderer = renderer_for(
        kind,
        effective.mmdc_command().as_deref(),
        effective.render_url().as_deref(),
    )?;
    let generator = Generator::new(renderer).with_timeout(timeout);
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.file, config.format()));

    let bytes = generator.generate(&source, &config, Some(&output)).await?;
    println!("Diagram generated: {}", output.display());
    if verbose && let Some(record) = generator.history().last() {
        println!(
            "  Renderer: {} ({} attempt(s), {:.2}s)",
            record.renderer,
            record.attempts,
            record.elapsed.as_secs_f64()
        );
        println!("  Output size: {} bytes", bytes.len());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(file: &Path, strict: bool) -> Result<ExitCode> {
    let result = validate(&read_source(file)?);
    print!("{}", result.report());
    let failed = !result.is_valid() || (strict && !result.warnings().is_empty());
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_template(command: TemplateCommand) -> Result<ExitCode> {
    let manager = TemplateManager::default();
    match command {
        TemplateCommand::List => {
            println!("Diagram types:");
            for kind in DiagramKind::ALL {
                println!("  {kind}");
            }
            println!("Flowchart templates:");
            for name in manager.list() {
                match manager.load(&name) {
                    Ok(template) => println!("  {name}: {}", template.description),
                    Err(err) => println!("  {name}: (error loading: {err})"),
                }
            }
        }
        TemplateCommand::Create {
            name,
            output,
            title,
            direction,
        } => {
            let builder = manager.create_flowchart(&name, title.as_deref(), direction)?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{name}_flowchart.mmd")));
            save_builder(&builder, &output)?;
            println!("Created flowchart from template: {}", output.display());
        }
        TemplateCommand::Show { kind } => {
            let Some(text) = find_diagram_template(&kind) else {
                bail!("Unknown diagram type: {kind}");
            };
            println!("{text}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_info(file: &Path) -> Result<ExitCode> {
    let source = read_source(file)?;
    let result = validate(&source);
    println!("File: {}", file.display());
    println!(
        "Type: {}",
        result.kind().map_or("unknown", DiagramKind::name)
    );
    println!(
        "Validation: {} error(s), {} warning(s)",
        result.errors().len(),
        result.warnings().len()
    );

    if result.kind() == Some(DiagramKind::Flowchart) {
        let diagram = parse_flowchart(&source)?;
        println!("Title: {}", diagram.title().unwrap_or("None"));
        println!("Direction: {}", diagram.direction());
        println!("Nodes: {}", diagram.node_count());
        println!("Connections: {}", diagram.connections().len());
        println!("Subgraphs: {}", diagram.subgraph_count());
        println!();
        print!("{}", validate_diagram(&diagram).report());
        if !diagram.is_empty() {
            println!();
            println!("Nodes:");
            for node in diagram.nodes() {
                println!("  {}: {} ({})", node.id, node.label, node.shape);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_export(file: &Path, format: ExchangeFormat, output: Option<PathBuf>) -> Result<ExitCode> {
    let diagram = parse_flowchart(&read_source(file)?)?;
    let output = output.unwrap_or_else(|| file.with_extension(format.extension()));
    export_file(&diagram, &output, format)?;
    println!("Exported to: {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn run_import(file: &Path, output: Option<PathBuf>) -> Result<ExitCode> {
    let builder = import_file(file)?;
    let output = output.unwrap_or_else(|| file.with_extension("mmd"));
    save_builder(&builder, &output)?;
    println!("Imported flowchart saved: {}", output.display());
    Ok(ExitCode::SUCCESS)
}

async fn run_enhance(
    file: &Path,
    model: Option<&str>,
    url: Option<&str>,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let source = read_source(file)?;
    let client = OllamaClient::from_env(url, model)?;
    let enhanced = enhance_diagram(&client, &source).await?;

    let result = validate(&enhanced);
    if !result.is_valid() {
        eprintln!("warning: the enhanced diagram does not validate");
        eprint!("{}", result.report());
    }
    match output {
        Some(path) => {
            fs::write(path, format!("{enhanced}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Enhanced diagram saved: {}", path.display());
        }
        None => println!("{enhanced}"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(cli: Cli, file_flags: ConfigFlags, global_path: PathBuf) -> Result<ExitCode> {
    let verbose = cli.verbose || file_flags.verbose;
    match cli.command {
        Command::Generate(args) => run_generate(args, file_flags, &global_path, verbose).await,
        Command::Validate { file, strict } => run_validate(&file, strict),
        Command::Create {
            steps,
            title,
            direction,
            output,
        } => {
            let mut builder = quick_flowchart(title.as_deref().unwrap_or_default(), &steps, false)?;
            builder.set_direction(direction);
            let output = output.unwrap_or_else(|| timestamped("flowchart"));
            save_builder(&builder, &output)?;
            println!("Flowchart saved: {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Quick {
            steps,
            decision,
            title,
            output,
        } => {
            let builder = quick_flowchart(&title, &steps, decision)?;
            let output = output.unwrap_or_else(|| timestamped("quick_flowchart"));
            save_builder(&builder, &output)?;
            println!("Quick flowchart created: {}", output.display());
            println!();
            println!("Preview:");
            println!("{}", "-".repeat(40));
            println!("{}", builder.build());
            Ok(ExitCode::SUCCESS)
        }
        Command::Template(command) => run_template(command),
        Command::Info { file } => run_info(&file),
        Command::Export {
            file,
            format,
            output,
        } => run_export(&file, format, output),
        Command::Import { file, output } => run_import(&file, output),
        Command::Enhance {
            file,
            model,
            url,
            output,
        } => run_enhance(&file, model.as_deref(), url.as_deref(), output.as_deref()).await,
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let file_flags = load_file_flags(&global_path, &local_path)?;

    // Initialize logging
    let level = if cli.verbose || file_flags.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(cli, file_flags, global_path))
}
