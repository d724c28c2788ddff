use anyhow::{Context, Result};
use serde::Serialize;

use gcode_document::config::{Config, FilamentSettings};
use gcode_document::{open, Aabb, AggregateQueries, DocumentError, GcodeDocument};

#[derive(Debug, Serialize)]
struct Summary {
    file: String,
    streamed: bool,
    lines: usize,
    estimated_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    aggregates: Option<AggregateSummary>,
}

#[derive(Debug, Serialize)]
struct AggregateSummary {
    layer_count: usize,
    layer_height: f64,
    first_layer_height: f64,
    bounds: Aabb,
    center: [f64; 2],
    filament_mm: f64,
    filament_cubic_mm: f64,
    filament_grams: f64,
}

impl AggregateSummary {
    fn from_queries(queries: &dyn AggregateQueries, filament: &FilamentSettings) -> Self {
        let center = queries.weighted_center();
        Self {
            layer_count: queries.layer_count(),
            layer_height: queries.layer_height(),
            first_layer_height: queries.first_layer_height(),
            bounds: queries.bounds(),
            center: [center.x, center.y],
            filament_mm: queries.filament_used_mm(filament.diameter),
            filament_cubic_mm: queries.filament_cubic_mm(filament.diameter),
            filament_grams: queries.filament_weight_grams(filament.diameter, filament.density),
        }
    }
}

fn main() -> Result<()> {
    let config = Config::from_args_and_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let mut document = open(&config.file, &config.document)
        .with_context(|| format!("failed to open {}", config.file.display()))?;

    if let Some(index) = config.line {
        let instruction = document.instruction(index)?;
        println!("{}", serde_json::to_string_pretty(instruction)?);
        return Ok(());
    }

    let summary = summarize(&config, document.as_mut())?;
    if config.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn summarize(config: &Config, document: &mut dyn GcodeDocument) -> Result<Summary> {
    let file = config.file.display().to_string();

    if let Ok(queries) = document.aggregates() {
        return Ok(Summary {
            file,
            streamed: false,
            lines: document.line_count(),
            estimated_seconds: queries.total_seconds(),
            aggregates: Some(AggregateSummary::from_queries(queries, &config.filament)),
        });
    }

    log::info!("streaming {}, only line count and time are reported", file);
    let (lines, estimated_seconds) = walk_stream(document)?;
    Ok(Summary {
        file,
        streamed: true,
        lines,
        estimated_seconds,
        aggregates: None,
    })
}

/// Read a streamed document to the end, summing per-line time
fn walk_stream(document: &mut dyn GcodeDocument) -> Result<(usize, f64)> {
    let mut seconds = 0.0;
    let mut index = 0;
    loop {
        match document.instruction(index) {
            Ok(instruction) => seconds += instruction.seconds_this_line(),
            Err(DocumentError::IndexOutOfRange { .. }) => break,
            Err(e) => return Err(e.into()),
        }
        index += 1;
    }
    Ok((index, seconds))
}

fn print_summary(summary: &Summary) {
    println!("File:            {}", summary.file);
    println!("Lines:           {}", summary.lines);
    println!("Estimated time:  {}", format_duration(summary.estimated_seconds));

    let Some(aggregates) = &summary.aggregates else {
        println!("(streamed, layer and filament data not available)");
        return;
    };

    println!("Layers:          {}", aggregates.layer_count);
    println!("Layer height:    {:.3} mm", aggregates.layer_height);
    println!("First layer:     {:.3} mm", aggregates.first_layer_height);
    if aggregates.bounds.is_empty() {
        println!("Bounds:          (none)");
    } else {
        println!(
            "Bounds:          X {:.2}..{:.2}  Y {:.2}..{:.2}",
            aggregates.bounds.min_x,
            aggregates.bounds.max_x,
            aggregates.bounds.min_y,
            aggregates.bounds.max_y
        );
    }
    println!(
        "Center:          X {:.2}  Y {:.2}",
        aggregates.center[0], aggregates.center[1]
    );
    println!(
        "Filament:        {:.1} mm, {:.1} mm³, {:.2} g",
        aggregates.filament_mm, aggregates.filament_cubic_mm, aggregates.filament_grams
    );
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, secs)
    } else {
        format!("{}m {:02}s", minutes, secs)
    }
}
