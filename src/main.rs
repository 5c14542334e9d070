extern crate bsem;

use bsem::read_climate_file::read_climate_file;
use bsem::{run_simulation, BuildingStock, FuelType, RunContext, RunInput};
use clap::Parser;
use csv::WriterBuilder;
use std::fs::File;
use std::io::BufReader;
use strum::IntoEnumIterator;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct BsemArgs {
    /// JSON file holding buildings, boundaries, dwellings and parameters
    input_file: String,
    /// EPW climate file for the simulated year
    #[arg(long, short)]
    epw_file: String,
    /// Where to write the per-building results CSV
    #[arg(long, short, default_value = "results.csv")]
    output_file: String,
    /// Reference altitude of the buildings, in m (defaults to the
    /// weather station elevation)
    #[arg(long)]
    building_altitude: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = BsemArgs::parse();

    let input: RunInput =
        serde_json::from_reader(BufReader::new(File::open(&args.input_file)?))?;
    let (climate, mut metadata) =
        read_climate_file(BufReader::new(File::open(&args.epw_file)?))?;
    if let Some(altitude) = args.building_altitude {
        metadata.building_altitude = altitude;
    }

    let stock = BuildingStock::new(input.buildings, input.boundaries)?;
    let mut context = RunContext::new(
        stock,
        input.dwellings,
        climate,
        metadata,
        input.parameters,
    )?;

    run_simulation(&mut context)?;

    write_results(&context, &args.output_file)?;
    info!(output = %args.output_file, "results written");
    Ok(())
}

fn write_results(context: &RunContext, output_file: &str) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new().from_path(output_file)?;

    let mut header = vec![
        "building_id".to_string(),
        "annual_thermal_losses".to_string(),
        "annual_solar_gains".to_string(),
        "annual_heating_needs".to_string(),
        "conventional_heating_needs".to_string(),
        "peak_heating_needs".to_string(),
    ];
    for fuel in FuelType::iter() {
        header.push(format!("annual_{fuel}_consumption"));
    }
    header.extend([
        "total_final_consumption".to_string(),
        "total_primary_consumption".to_string(),
        "total_co2_emission".to_string(),
        "diagnosis_class".to_string(),
    ]);
    writer.write_record(&header)?;

    for building in context.stock.buildings() {
        let results = &building.results;
        let mut record = vec![
            building.id.to_string(),
            results.annual_thermal_losses.to_string(),
            results.annual_solar_gains.to_string(),
            results.annual_heating_needs.to_string(),
            results.conventional_heating_needs.to_string(),
            results.peak_heating_needs.to_string(),
        ];
        for fuel in FuelType::iter() {
            record.push(results.energy.annual_consumption(fuel).to_string());
        }
        record.extend([
            results.indicators.total_final_consumption.to_string(),
            results.indicators.total_primary_consumption.to_string(),
            results.indicators.total_co2_emission.to_string(),
            results
                .diagnosis_class
                .map(|class| class.to_string())
                .unwrap_or_default(),
        ]);
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
