use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};
use rtx_settings::Settings;
use rtx_settings_tool::{
    generate_image_file,
    newest_readable,
    scan_image_file,
    write_csv_file,
};

#[derive(Parser)]
#[command(name = "rtx-settings-tool")]
#[command(about = "Settings partition image inspector and generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List and validate the frames of a settings partition image
    Inspect {
        /// Input binary image path
        input: PathBuf,

        /// Also write the frame list to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Generate a fresh image holding one settings frame
    Generate {
        /// Output binary image path
        output: PathBuf,

        /// Image size in bytes, decimal or 0x-prefixed hex
        #[arg(short, long, value_parser = parse_size)]
        size: usize,

        /// Callsign to store instead of the default (empty)
        #[arg(long)]
        callsign: Option<String>,

        /// M17 destination to store instead of the default (empty)
        #[arg(long)]
        destination: Option<String>,

        /// Display brightness to store instead of the default
        #[arg(long)]
        brightness: Option<u8>,
    },
}

fn parse_size(s: &str) -> Result<usize, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<usize>().map_err(|e| e.to_string())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { input, csv } => {
            println!("Parsing image file: {}", input.display());
            let records = scan_image_file(&input)?;
            println!("Found {} frames", records.len());

            for record in &records {
                println!(
                    "  {:#07x}  counter {:>5}  length {:>3}  {:<7}  callsign '{}'",
                    record.offset,
                    record.counter,
                    record.length,
                    record.integrity,
                    record.settings.callsign_str()
                );
            }

            match newest_readable(&records) {
                Some(newest) => println!(
                    "Newest readable frame at {:#07x} (counter {})",
                    newest.offset, newest.counter
                ),
                None => println!("No readable frame, the firmware would fall back to defaults"),
            }

            if let Some(path) = csv {
                write_csv_file(&records, &path)?;
                println!("Wrote CSV: {}", path.display());
            }

            Ok(())
        }
        Commands::Generate {
            output,
            size,
            callsign,
            destination,
            brightness,
        } => {
            let mut settings = Settings::default();
            if let Some(callsign) = callsign {
                settings.set_callsign(&callsign)?;
            }
            if let Some(destination) = destination {
                settings.set_m17_dest(&destination)?;
            }
            if let Some(brightness) = brightness {
                settings.brightness = brightness;
            }

            generate_image_file(&output, &settings, size)?;
            println!(
                "Generated settings image: {} ({} bytes)",
                output.display(),
                size
            );

            Ok(())
        }
    }
}
