//! Aggregation walkthrough - run with: cargo run --example aggregate [data.csv] [geo.csv]

use std::env;
use std::path::PathBuf;

use waste_report::pipeline::{
    cascading_filter, departments, join_with_geo, sum_by_department, sum_by_period,
};
use waste_report::store::{read_geo, read_primary};
use waste_report::types::Encoding;

fn main() {
    let args: Vec<String> = env::args().collect();
    let arg = |i: usize, default: &str| PathBuf::from(args.get(i).map_or(default, String::as_str));
    let data = arg(1, "residuos_municipales.csv");
    let geo = arg(2, "TB_UBIGEOS.csv");

    let records =
        read_primary(&data, b';', Encoding::Latin1).expect("Failed to read waste table");
    let locations = read_geo(&geo, b';', Encoding::Latin1).expect("Failed to read geo table");
    println!("Loaded {} records, {} locations", records.len(), locations.len());
    println!();

    println!("=== Municipal waste per period (Ton) ===");
    for (period, total) in sum_by_period(&records) {
        println!("  {}  {:>14.2}", period, total);
    }
    println!();

    println!("=== Top departments (Ton) ===");
    let mut by_department = sum_by_department(&records);
    by_department.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (department, total) in by_department.iter().take(5) {
        println!("  {:<16} {:>14.2}", department, total);
    }
    println!();

    // Drill into the first department, first province.
    let Some(department) = departments(&records).into_iter().next() else {
        println!("No records.");
        return;
    };
    let view =
        cascading_filter(&records, &department, None, None).expect("department is in data");
    let province = view.provinces.first().cloned();
    let view = cascading_filter(&records, &department, province.as_deref(), None)
        .expect("province comes from the legal set");
    let joined = join_with_geo(&view, &locations);

    println!("=== {} ===", view.describe());
    println!("Rows: {}  with coordinates: {}", view.rows.len(), joined.rows.len());
    match joined.center() {
        Some((lat, lon)) => println!("Map center: {:.4}, {:.4}", lat, lon),
        None => println!("No data found for {}", view.describe()),
    }
}
