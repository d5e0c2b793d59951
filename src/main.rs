use clap::{Parser, Subcommand};
use dci_bundle::document::Document;
use dci_bundle::export::{Collaborators, OverwritePolicy, Prompter};
use dci_bundle::palette::{PaletteRole, PaletteSetting};
use dci_bundle::render::SourceImageRenderer;
use dci_bundle::tools::{DciImageConverter, DciTool};
use dci_bundle::{config, export, output, palette, template};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("DCI_BUNDLE_ON_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("DCI_BUNDLE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "dci-bundle")]
#[command(about = "Export themeable DCI icon bundles from an artboard document")]
#[command(long_about = "\
Export themeable DCI icon bundles from an artboard document

Icons are artboards named D/<icon>/<Mode>[/Light|/Dark][/Background], with
Mode one of Normal, Hover, Pressed, Disabled. The artboard background picks
the theme:

  #e0e0e0  generic   → <mode>.light, with <mode>.dark linked to it
  #f0f0f0  light     → <mode>.light
  #1f1f1f  dark      → <mode>.dark

Export formats sized like 1x, 2x, 3x become scale directories. Bundles are
built by the external 'dci' tool; palette roles additionally use
'dci-image-converter' for alpha8 renditions.

Logging goes to stderr; set RUST_LOG=debug to see tool invocations.
Run 'dci-bundle gen-config' to generate a documented dci-bundle.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Artboard document (JSON)
    #[arg(long, default_value = "icons.json", global = true)]
    document: PathBuf,

    /// Config file [default: dci-bundle.toml next to the document]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Which artboards a command works on.
#[derive(clap::Args, Clone)]
struct Selection {
    /// Only artboards on this page
    #[arg(long, conflicts_with = "ids")]
    page: Option<String>,

    /// Only these artboard ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,
}

/// Artboard ids a settings command edits.
#[derive(clap::Args, Clone)]
struct Ids {
    /// Artboard ids (comma separated)
    #[arg(long, value_delimiter = ',', required = true)]
    ids: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Build one <icon>.dci bundle per icon
    Export {
        /// Destination directory (must exist)
        #[arg(long)]
        dest: PathBuf,

        #[command(flatten)]
        selection: Selection,

        /// Replace existing bundles without asking
        #[arg(long, conflicts_with = "skip_existing")]
        overwrite: bool,

        /// Keep existing bundles without asking
        #[arg(long)]
        skip_existing: bool,
    },
    /// Unpack a bundle and write its preview layout
    Open {
        /// Bundle to open (*.dci)
        bundle: PathBuf,

        /// Where to write <icon>.preview.json/png [default: next to the bundle]
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Add the artboards of a new icon to a page
    New {
        /// Icon name (no '/', '.', or spaces)
        name: String,

        /// Page to add the artboards to
        #[arg(long, default_value = "Icons")]
        page: String,

        /// Separate light and dark artboards instead of one generic row
        #[arg(long)]
        theme_sensitive: bool,
    },
    /// Rename the icon the selected artboards belong to
    Rename {
        /// New icon name
        name: String,

        #[command(flatten)]
        ids: Ids,
    },
    /// Show or set palette roles and color adjustments
    #[command(subcommand)]
    Palette(PaletteCommand),
    /// Set artboard padding
    #[command(subcommand)]
    Padding(PaddingCommand),
    /// Print a stock dci-bundle.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum PaletteCommand {
    /// Print the palette of each artboard
    Show {
        #[command(flatten)]
        ids: Ids,
    },
    /// Write one palette to every selected artboard
    Set {
        #[command(flatten)]
        ids: Ids,

        /// none, foreground, background, highlight-foreground, highlight (or -1..3)
        #[arg(long, allow_hyphen_values = true)]
        role: PaletteRole,

        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        hue: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        saturation: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        lightness: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        red: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        green: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        blue: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        alpha: i32,

        /// Override artboards whose palettes differ
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PaddingCommand {
    /// Write one padding to every selected artboard
    Set {
        #[command(flatten)]
        ids: Ids,

        /// Inset in points on each side
        value: i64,
    },
}

/// Asks on the terminal before replacing a bundle.
struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm_overwrite(&self, bundle: &Path) -> bool {
        eprint!("{} already exists. Override? [y/N] ", bundle.display());
        std::io::stderr().flush().ok();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(|| {
        cli.document
            .parent()
            .unwrap_or(Path::new(""))
            .join(config::CONFIG_FILENAME)
    });

    match cli.command {
        Command::Export {
            dest,
            selection,
            overwrite,
            skip_existing,
        } => {
            let bundle_config = config::load_config(&config_path)?;
            let document = Document::load(&cli.document)?;
            let layers = if let Some(page) = &selection.page {
                document.page_layers(page)?
            } else if !selection.ids.is_empty() {
                document.layers_by_id(&selection.ids)
            } else {
                document.all_layers()
            };

            let renderer = SourceImageRenderer::new(&document.base_dir);
            let packager = DciTool::new(&bundle_config.tools.dci);
            let converter = DciImageConverter::new(&bundle_config.tools.converter);
            let prompter: Box<dyn Prompter> = if overwrite {
                Box::new(OverwritePolicy::Always)
            } else if skip_existing {
                Box::new(OverwritePolicy::Never)
            } else {
                Box::new(StdinPrompter)
            };
            let tools = Collaborators {
                renderer: &renderer,
                packager: &packager,
                converter: &converter,
                prompter: prompter.as_ref(),
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_export_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = export::export_icons(
                &layers,
                &document,
                &dest,
                &bundle_config,
                &tools,
                Some(tx),
            );
            printer.join().ok();
            let report = result?;
            for line in output::format_export_summary(&report) {
                println!("{}", line);
            }
            if report.failed() > 0 {
                std::process::exit(1);
            }
        }
        Command::Open { bundle, out } => {
            let bundle_config = config::load_config(&config_path)?;
            let out_dir = out.unwrap_or_else(|| {
                bundle
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
            });
            let packager = DciTool::new(&bundle_config.tools.dci);
            let report = export::open_bundle(&bundle, &out_dir, &bundle_config, &packager)?;
            for line in output::format_preview(&bundle, &report) {
                println!("{}", line);
            }
        }
        Command::New {
            name,
            page,
            theme_sensitive,
        } => {
            let bundle_config = config::load_config(&config_path)?;
            let mut document = Document::load(&cli.document)?;
            let ids = template::new_icon(&mut document, &page, &name, theme_sensitive, &bundle_config)?;
            document.save(&cli.document)?;
            println!("Added {} artboards for {name} to {page}", ids.len());
        }
        Command::Rename { name, ids } => {
            let mut document = Document::load(&cli.document)?;
            let renamed = template::rename_artboards(&mut document, &ids.ids, &name)?;
            document.save(&cli.document)?;
            println!("Renamed {renamed} artboards to {name}");
        }
        Command::Palette(PaletteCommand::Show { ids }) => {
            let document = Document::load(&cli.document)?;
            let layers = document.layers_by_id(&ids.ids);
            let rows: Vec<_> = layers
                .into_iter()
                .map(|l| (l, palette::resolve_palette(&document, &l.id)))
                .collect();
            for line in output::format_palette_table(&rows) {
                println!("{}", line);
            }
        }
        Command::Palette(PaletteCommand::Set {
            ids,
            role,
            hue,
            saturation,
            lightness,
            red,
            green,
            blue,
            alpha,
            yes,
        }) => {
            let mut document = Document::load(&cli.document)?;
            let setting = PaletteSetting::new(
                role,
                [hue, saturation, lightness, red, green, blue, alpha],
            );
            palette::apply_palette(&mut document, &ids.ids, &setting, yes)?;
            document.save(&cli.document)?;
            println!("Palette set on {} artboards", ids.ids.len());
        }
        Command::Padding(PaddingCommand::Set { ids, value }) => {
            let mut document = Document::load(&cli.document)?;
            for id in &ids.ids {
                palette::store_padding(&mut document, id, value);
            }
            document.save(&cli.document)?;
            println!("Padding {value} set on {} artboards", ids.ids.len());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
