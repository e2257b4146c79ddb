use clap::{Parser, Subcommand};
use photocrop::bridge::{BridgeClient, CropSpec};
use photocrop::config::{self, BridgeConfig, CONFIG_FILE_NAME};
use photocrop::dispatch::{FallbackDispatcher, SourceImage};
use photocrop::helper::HelperHandle;
use image::Rgba;
use photocrop::imaging::{self, EnhanceParams, Quality, RustBackend};
use photocrop::naming::{OutputSuffix, derived_output_path};
use photocrop::output::{self, HelperStatus};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "photocrop")]
#[command(about = "Photo enhance, resize and crop with an optional native accelerator")]
#[command(long_about = "\
Photo enhance, resize and crop with an optional native accelerator

Operations are delegated to the FastImageOps helper when it is installed,
and run in-process otherwise. Results are the same either way; only batch
crop requires the helper.

Helper search order (relative to the photocrop binary):
  FastImageOps
  helpers/FastImageOps
  FastImageOps/bin/Release/net8.0/publish/FastImageOps
  ../FastImageOps/bin/Release/net8.0/publish/FastImageOps

Set RUST_LOG=debug to see cache hits and helper invocations.

Run 'photocrop gen-config' to generate a documented photocrop.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// Helper executable (skips the search)
    #[arg(long, global = true)]
    helper: Option<PathBuf>,

    /// Never use the helper
    #[arg(long, global = true)]
    no_helper: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Adjust contrast and brightness of one image
    Enhance {
        image: PathBuf,
        /// Contrast factor (1.0 = unchanged)
        #[arg(long, default_value_t = 1.0)]
        contrast: f64,
        /// Brightness factor (1.0 = unchanged)
        #[arg(long, default_value_t = 1.0)]
        brightness: f64,
        /// Output quality 1-100; below 100 applies JPEG compression
        #[arg(long, default_value_t = 100)]
        quality: u32,
        /// Output file (default: <stem>_enhanced.<ext> next to the source)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Black frame around the saved image, in pixels
        #[arg(long, default_value_t = 0)]
        border: u32,
    },
    /// Resize images or directories of images by a scale factor
    Resize {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Scale factor, e.g. 0.5 for half size
        #[arg(long)]
        scale: f64,
    },
    /// Crop one image to a 3:4 portrait (requires the helper)
    Crop {
        path: PathBuf,
        #[arg(long)]
        x: i32,
        #[arg(long)]
        y: i32,
        #[arg(long)]
        width: i32,
        #[arg(long)]
        height: i32,
        /// Send the rectangle as given instead of clamping it to the image
        /// and narrowing it to 3:4
        #[arg(long)]
        free_aspect: bool,
    },
    /// Show where the helper was found and the cache settings
    Helper,
    /// Print a stock photocrop.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = load_settings(&cli)?;
    init_thread_pool(&config.processing);

    let bridge = BridgeClient::from_config(&config);
    let backend = RustBackend::new();
    let dispatcher = FallbackDispatcher::new(&bridge, &backend).with_helper(config.helper.enabled);

    match cli.command {
        Command::Enhance {
            image,
            contrast,
            brightness,
            quality,
            output: output_path,
            border,
        } => {
            let source = SourceImage::open(&backend, &image)?;
            let params = EnhanceParams {
                contrast,
                brightness,
                quality: Quality::new(quality),
            };
            let mut enhanced = dispatcher.enhance(&source, &params)?;
            if border > 0 {
                enhanced = imaging::add_border(&enhanced, border, Rgba([0, 0, 0, 255]))?;
            }
            let out = output_path.unwrap_or_else(|| derived_output_path(&image, OutputSuffix::Enhanced));
            imaging::save_image(&enhanced, &out)?;
            output::print_enhance_result(&image, &out, (enhanced.width(), enhanced.height()));
        }
        Command::Resize { paths, scale } => {
            let inputs = expand_inputs(&paths);
            let scales = vec![scale; inputs.len()];
            let outputs = dispatcher.batch_resize(&inputs, &scales)?;
            output::print_batch_results("Resized", &inputs, &outputs);
        }
        Command::Crop {
            path,
            x,
            y,
            width,
            height,
            free_aspect,
        } => {
            let mut spec = CropSpec {
                path: path.to_string_lossy().into_owned(),
                x,
                y,
                width,
                height,
            };
            if !free_aspect {
                spec = spec.portrait(image::image_dimensions(&path)?);
                info!(
                    "Crop framed to {}x{} at ({}, {})",
                    spec.width, spec.height, spec.x, spec.y
                );
            }
            let outputs = dispatcher.batch_crop(&[spec])?;
            output::print_batch_results("Cropped", &[path], &outputs);
        }
        Command::Helper => {
            let not_probed = HelperHandle::Unavailable;
            let handle = if config.helper.enabled {
                bridge.helper()
            } else {
                &not_probed
            };
            output::print_helper_status(&HelperStatus {
                enabled: config.helper.enabled,
                handle,
                candidates: bridge.locator().candidates(),
                timeout: bridge.timeout(),
                cache: bridge.cache_stats(),
            });
        }
        // Printed above, before any config is loaded.
        Command::GenConfig => {}
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default
/// `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Load the config file and apply command-line overrides on top.
fn load_settings(cli: &Cli) -> Result<BridgeConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(path) = &cli.helper {
        config.helper.path = Some(path.clone());
    }
    if cli.no_helper {
        config.helper.enabled = false;
    }
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Files stay as given; directories expand to their supported images,
/// sorted by path. Earlier resize outputs found in a directory are skipped.
fn expand_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && imaging::is_supported_image(e.path()))
                .filter(|e| !is_resize_output(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.to_path_buf());
        }
    }
    inputs
}

fn is_resize_output(path: &Path) -> bool {
    let suffix = format!("_{}", OutputSuffix::Resized);
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(&suffix))
}
