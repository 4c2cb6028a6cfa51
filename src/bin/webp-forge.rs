//! Command-line front end for the batch converter

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use webp_forge::{BatchConfig, BatchConverter, WebPConfig};

#[derive(Parser, Debug)]
#[command(name = "webp-forge", version, about = "Convert JPG/PNG images to WebP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert every image in a directory
    Convert {
        #[arg(long, default_value = "./images")]
        input: PathBuf,
        #[arg(long, default_value = "./images/webp")]
        output: PathBuf,
        /// Quality 0-100
        #[arg(long, default_value_t = 85)]
        quality: u8,
        /// Compression effort 0-6
        #[arg(long, default_value_t = 6)]
        effort: u8,
    },
    /// Write 400/800/1200/1600px variants of one image
    Responsive {
        file: PathBuf,
        #[arg(long, default_value = "./images/webp")]
        output: PathBuf,
    },
    /// Print <picture> markup for the images in a directory
    Markup {
        #[arg(long, default_value = "./images")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Convert {
        input: PathBuf::from("./images"),
        output: PathBuf::from("./images/webp"),
        quality: 85,
        effort: 6,
    }) {
        Command::Convert {
            input,
            output,
            quality,
            effort,
        } => {
            let config = BatchConfig {
                webp: WebPConfig {
                    quality,
                    method: effort,
                    lossless: false,
                },
                ..BatchConfig::new(input, output)
            };
            if let Err(e) = config.validate() {
                bail!("invalid settings: {}", e);
            }
            let summary = BatchConverter::new(config).convert_all();
            log::info!("Success: {}", summary.succeeded);
            log::info!("Failed: {}", summary.failed);
        }
        Command::Responsive { file, output } => {
            let outcomes = BatchConverter::default().generate_responsive_images(&file, &output);
            let generated = outcomes.iter().filter(|o| o.is_success()).count();
            log::info!("Generated {} of {} variants", generated, outcomes.len());
        }
        Command::Markup { input } => {
            let converter = BatchConverter::new(BatchConfig {
                input_dir: input,
                ..Default::default()
            });
            let files: Vec<String> = converter
                .image_files()
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect();
            println!("{}", converter.generate_picture_elements(&files));
        }
    }
    Ok(())
}
