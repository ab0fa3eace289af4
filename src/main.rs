use clap::{Parser, Subcommand};
use log::Level;
use resume_press::context::{BuildMode, EnvSnapshot};
use resume_press::imaging::{RustBackend, derive_images};
use resume_press::pipeline::{self, BuildOptions, CheckStatus, load_project};
use resume_press::{config, output, qr};
use std::io::Write;
use std::path::PathBuf;

/// Shared flags for commands that derive images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the derivative cache and re-encode every image
    #[arg(long)]
    no_cache: bool,
}

#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Draft renders HTML only; production adds photos, QR codes and PDFs
    #[arg(long, value_enum, env = "BUILD_MODE", default_value_t = BuildMode::Production)]
    mode: BuildMode,

    #[command(flatten)]
    cache: CacheArgs,
}

#[derive(clap::Args, Clone)]
struct ImagesArgs {
    /// PNG derivatives only, no AVIF
    #[arg(long)]
    draft: bool,

    #[command(flatten)]
    cache: CacheArgs,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "resume-press")]
#[command(about = "Build a résumé web page and its PDFs from a JSON profile")]
#[command(long_about = "\
Build a résumé web page and its PDFs from a JSON profile

Project structure:

  ./
  ├── resume.toml          # Config (optional, see gen-config)
  ├── resume.json          # Profile document
  ├── template.html        # Handlebars template
  ├── assets/profile.jpg   # Profile photo (optional)
  └── static/              # Copied verbatim into the output (optional)

Output:

  dist/
  ├── index.html
  ├── resume.pdf           # Screen variant
  ├── resume-print.pdf     # Print variant
  ├── resume-ats.pdf       # Plain variant for applicant tracking systems
  └── assets/images/       # Photo derivatives and QR codes

Running without a subcommand is the same as 'build'.
Set RESUME_LOG=debug for more detail.

Run 'resume-press gen-config' to generate a documented resume.toml.")]
#[command(version = version_string())]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Output directory (overrides paths.output)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Config file (defaults to <root>/resume.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    build: BuildArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Render index.html and, in production mode, the three PDFs
    Build(BuildArgs),
    /// Derive the profile photo sizes only
    Images(ImagesArgs),
    /// Generate the QR code images only
    Qr {
        /// URL to encode (defaults to the resolved build URL)
        url: Option<String>,
    },
    /// Print the resolved build context
    Context,
    /// Validate config, profile document and template without building
    Check,
    /// Print a stock resume.toml with all options documented
    GenConfig,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RESUME_LOG", "info"))
        .format(|buf, record| {
            let marker = match record.level() {
                Level::Error => "❌",
                Level::Warn => "⚠️",
                Level::Info => "ℹ️",
                Level::Debug | Level::Trace => "🔍",
            };
            writeln!(buf, "{marker} {}", record.args())
        })
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logger();

    let project = || load_project(&cli.root, cli.config.as_deref(), cli.output.as_deref());

    match cli.command.unwrap_or(Command::Build(cli.build.clone())) {
        Command::Build(args) => {
            let project = project()?;
            let report = pipeline::build(
                &project,
                BuildOptions {
                    mode: args.mode,
                    use_cache: !args.cache.no_cache,
                },
            )?;
            output::print_build_report(&report);
            println!("✅ Build complete: {}", project.paths.output.display());
        }
        Command::Images(args) => {
            let project = project()?;
            let mode = if args.draft {
                BuildMode::Draft
            } else {
                BuildMode::Production
            };
            let options = project.derive_options(mode, !args.cache.no_cache);
            let set = derive_images(&project.paths.photo, &project.paths.output, &options)?;
            output::print_image_set(&set);
        }
        Command::Qr { url } => {
            let project = project()?;
            let url = url.unwrap_or_else(|| {
                project
                    .context(&EnvSnapshot::capture(), BuildMode::Production)
                    .url
            });
            let images =
                qr::try_generate_qr_images(&url, &project.paths.output, &project.config.qr)?;
            output::print_qr(&images);
        }
        Command::Context => {
            let project = project()?;
            let ctx = project.context(&EnvSnapshot::capture(), cli.build.mode);
            output::print_context(&ctx);
        }
        Command::Check => {
            let project = project()?;
            println!("🔍 Checking {}", project.root.display());
            let items = pipeline::check_project(&project, &RustBackend::new());
            output::print_check(&items);
            let errors = items
                .iter()
                .filter(|i| i.status == CheckStatus::Error)
                .count();
            if errors > 0 {
                return Err(format!("{errors} check(s) failed").into());
            }
            println!("✅ Project is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
