use clap::Parser;
use crusher::codec::RustCodec;
use crusher::confirm::{AssumeYes, TerminalPrompt};
use crusher::crush::{CrushSettings, crush};
use crusher::params::RunRequest;
use crusher::quality::QualitySequence;
use crusher::{config, output};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn version_string() -> &'static str {
    let on_tag = env!("CRUSHER_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("CRUSHER_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "crusher")]
#[command(about = "Crush an image into glitch art by re-encoding it as JPEG over and over")]
#[command(long_about = "\
Crush an image into glitch art by re-encoding it as JPEG over and over

Each pass decodes the previous pass's output and saves it again at the next
quality on a curve, so artifacts compound far beyond a single low-quality save.

  crusher photo.png                  # 50 passes, 100 → 2
  crusher photo.png -i 10 -e 3       # 10-step curve, run three times
  crusher photo.png -r -c 2.5 -p     # rising curve, oversaturated first
  crusher photo.png -o out.jpg -y    # explicit output, overwrite silently

Without -o the output goes to compressions/<name>_i<n>_e<m>[_rev][_pre][_c<color>].jpg.
Defaults for -i, -e and -c come from crusher.toml when present.

Run 'crusher --gen-config' to print a documented crusher.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Image to crush (jpg, png, tiff, webp, bmp, pnm)
    #[arg(required_unless_present = "gen_config")]
    input: Option<PathBuf>,

    /// Output file (always JPEG data)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of re-encode steps in one pass of the quality curve
    #[arg(short, long, allow_negative_numbers = true)]
    iterations: Option<i64>,

    /// Number of times the quality curve is repeated
    #[arg(short, long, allow_negative_numbers = true)]
    extra: Option<i64>,

    /// Saturation factor: 0.0 greyscale, 1.0 unchanged, above 1.0 boosted
    #[arg(short, long, allow_negative_numbers = true)]
    color: Option<f64>,

    /// Rising quality curve (0 → 100) instead of falling
    #[arg(short, long)]
    reverse: bool,

    /// Apply the color change before compression instead of after
    #[arg(short, long)]
    preprocess: bool,

    /// Overwrite an existing output without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Directory containing crusher.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Print a stock crusher.toml with all options documented
    #[arg(long)]
    gen_config: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "crusher=warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr).without_time())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }
    let Some(input) = cli.input else {
        return Err("an input image is required".into());
    };

    let config = config::load_config(&cli.config_dir)?;
    let request = RunRequest {
        input,
        output: cli.output,
        iterations: cli
            .iterations
            .unwrap_or_else(|| i64::from(config.defaults.iterations)),
        extra: cli.extra.unwrap_or_else(|| i64::from(config.defaults.extra)),
        color: cli.color.unwrap_or(config.defaults.color),
        reverse: cli.reverse,
        preprocess: cli.preprocess,
    };
    let settings = CrushSettings::from_config(&config, std::env::current_dir()?);

    let params = request.clone().validate()?;
    let qualities = QualitySequence::new(params.iterations, params.extra, params.reverse);
    output::print_plan(&params, qualities.as_slice());

    let codec = RustCodec::new();
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event);
        }
    });
    let result = if cli.yes {
        crush(&codec, request, &settings, &mut AssumeYes, Some(tx))
    } else {
        crush(&codec, request, &settings, &mut TerminalPrompt::stdio(), Some(tx))
    };
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;

    let outcome = result?;
    output::print_outcome(&outcome);
    Ok(())
}
