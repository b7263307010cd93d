use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process;

use geo2osm::{convert_file, ConvertError, ConvertOptions, SourceCrs, DRIVERS};

fn main() {
    let matches = Command::new("geo2osm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts a vector geodata file into an OSM XML file of nodes and ways")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .required(true)
                .help("Input vector dataset"),
        )
        .arg(
            Arg::new("epsg")
                .short('e')
                .long("epsg")
                .value_name("CODE")
                .value_parser(clap::value_parser!(u32))
                .conflicts_with("proj4")
                .help("Numeric EPSG code of the source projection (e.g. 4326, not 'epsg:4326')"),
        )
        .arg(
            Arg::new("proj4")
                .short('p')
                .long("proj4")
                .value_name("STRING")
                .help("PROJ4 string of the source projection"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Print per-layer and per-feature progress"),
        )
        .get_matches();

    let file = PathBuf::from(matches.get_one::<String>("file").unwrap());
    let source_crs = if let Some(code) = matches.get_one::<u32>("epsg") {
        Some(SourceCrs::Epsg(*code))
    } else {
        matches
            .get_one::<String>("proj4")
            .map(|definition| SourceCrs::Proj4(definition.clone()))
    };
    let options = ConvertOptions {
        source_crs,
        verbose: matches.get_flag("verbose"),
    };

    match convert_file(&file, &options) {
        Ok(summary) => {
            println!(
                "All done: {} nodes and {} ways written to {}",
                summary.nodes,
                summary.ways,
                summary.output.display()
            );
        }
        Err(err @ (ConvertError::UnsupportedFormat(_) | ConvertError::OpenFailed { .. })) => {
            eprintln!("FAILURE:\n{}", err);
            eprintln!("Available drivers:");
            for driver in DRIVERS {
                eprintln!("  -> {} ({})", driver.name, driver.extensions.join(", "));
            }
            process::exit(1);
        }
        Err(err) => {
            eprintln!("Error converting {}: {}", file.display(), err);
            process::exit(1);
        }
    }
}
