use clap::{Arg, ArgAction, ArgMatches, Command};
use env_logger::Builder;
use log::error;
use shp2geojson::reproject::{DEFAULT_SOURCE_CRS, DEFAULT_TARGET_CRS};
use shp2geojson::{process_files, ConvertOptions, OutputFormat};
use std::env;
use std::path::PathBuf;

fn init_logger(matches: &ArgMatches) {
    let mut builder = Builder::new();
    let rust_log = match (matches.get_one::<String>("loglevel"), env::var("RUST_LOG")) {
        (Some(level), _) => level.clone(),
        (None, Ok(env_level)) => env_level,
        (None, Err(_)) => "info".to_string(),
    };
    builder.parse_filters(&rust_log);
    builder.init();
}

fn main() {
    let matches = Command::new("shp2geojson")
        .version("0.1")
        .author("Jesper Fjellin")
        .about("Converts shapefiles to GeoJSON, reprojecting to longitude/latitude")
        .arg(
            Arg::new("files")
                .short('f')
                .long("files")
                .num_args(1..)
                .required(true)
                .help("Input .shp files (or base names of .shp/.dbf pairs)"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .num_args(1)
                .default_value("output")
                .help("Directory for converted files"),
        )
        .arg(
            Arg::new("from-crs")
                .long("from-crs")
                .num_args(1)
                .default_value(DEFAULT_SOURCE_CRS)
                .help("CRS of the input coordinates"),
        )
        .arg(
            Arg::new("to-crs")
                .long("to-crs")
                .num_args(1)
                .default_value(DEFAULT_TARGET_CRS)
                .help("CRS of the output coordinates"),
        )
        .arg(
            Arg::new("ts")
                .long("ts")
                .action(ArgAction::SetTrue)
                .help("Write TypeScript modules instead of .geojson files"),
        )
        .arg(
            Arg::new("ts-const")
                .long("ts-const")
                .num_args(1..)
                .help("Exported constant name per input file (implies --ts; default derived from the file name)"),
        )
        .arg(
            Arg::new("loglevel")
                .long("loglevel")
                .num_args(1)
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .help("Log level (overrides RUST_LOG)"),
        )
        .get_matches();

    init_logger(&matches);

    let files: Vec<PathBuf> = matches
        .get_many::<String>("files")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();

    let mut options = ConvertOptions::default();
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        options.output_dir = PathBuf::from(dir);
    }
    if let Some(crs) = matches.get_one::<String>("from-crs") {
        options.source_crs = crs.clone();
    }
    if let Some(crs) = matches.get_one::<String>("to-crs") {
        options.target_crs = crs.clone();
    }
    let constants: Vec<String> = matches
        .get_many::<String>("ts-const")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    if matches.get_flag("ts") || !constants.is_empty() {
        options.format = OutputFormat::TypeScript { constants };
    }

    match process_files(&files, &options) {
        Ok(written) => println!(
            "Converted {} datasets into {}",
            written.len(),
            options.output_dir.display()
        ),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error converting files: {}", e);
            std::process::exit(1);
        }
    }
}
