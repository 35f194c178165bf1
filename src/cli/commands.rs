use crate::analyzers::{load_records, BikeAnalyzer, DatasetLocator};
use crate::cli::args::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::ingest::{DataSource, Ingestor, RawStore};
use crate::pipeline::{build_daily_dag, DagRunner, DagSchedule, Scheduler, TaskState};
use crate::processors::{CountsJob, IntegrityChecker, SyntheticGenerator};
use crate::readers::{DatasetKind, DatasetReader};
use crate::utils::progress::ProgressReporter;
use crate::writers::{CsvWriter, ParquetWriter};
use chrono::{TimeZone, Utc};
use std::path::Path;
use tracing::info;

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Ingest { url, file, remote } => {
            let source = match (url, file) {
                (Some(url), _) => DataSource::Url(url),
                (None, Some(file)) => DataSource::File(file),
                (None, None) if remote => DataSource::remote(&config.ingest)?,
                (None, None) => DataSource::from_config(&config.ingest),
            };
            println!("Ingesting from: {}", source);

            let progress = ProgressReporter::new_spinner("Ingesting source...", quiet);
            let ingestor = Ingestor::from_config(&config.paths, &config.ingest);
            let outcome = ingestor.ingest(&source, Utc::now()).await?;
            progress.finish_with_message(&format!("Ingested {} rows", outcome.rows));

            println!("Columns: {}", outcome.columns.join(", "));
            println!("Wrote {} ({} rows)", outcome.path.display(), outcome.rows);
        }

        Commands::Transform {
            input,
            output_dir,
            compression,
            max_workers,
        } => {
            let input = match input {
                Some(path) => path,
                None => RawStore::latest(&config.paths.raw_dir)?,
            };
            let output_dir = output_dir.unwrap_or_else(|| config.paths.curated_dir.clone());
            if let Some(compression) = compression {
                config.transform.compression = compression;
            }
            if let Some(workers) = max_workers {
                config.transform.max_workers = workers.max(1);
            }

            println!("Transforming raw counts...");
            println!("Input file: {}", input.display());
            println!("Output directory: {}", output_dir.display());
            println!(
                "Workers: {}, Batch size: {}",
                config.transform.max_workers, config.transform.batch_size
            );

            let progress = ProgressReporter::new_spinner("Processing data...", quiet);
            let job = CountsJob::new(&config.transform)?;
            let summary = job.run(&input, &output_dir, Some(&progress))?;
            progress.finish_with_message(&format!("Wrote {} daily rows", summary.daily_rows));

            println!(
                "\nLayout: {}, rows read: {}, kept: {}, dropped: {}",
                summary.normalize.layout,
                summary.normalize.rows_in,
                summary.normalize.rows_kept,
                summary.normalize.rows_dropped()
            );
            let file_info = ParquetWriter::new().get_file_info(&summary.output)?;
            println!("\n{}", file_info.summary());
            println!("Processing complete!");
        }

        Commands::Prepare {
            input,
            weather,
            output_dir,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| config.paths.curated_dir.clone());
            let progress = ProgressReporter::new_spinner("Preparing dataset...", quiet);
            let job = CountsJob::new(&config.transform)?;
            let summary = job.prepare(&input, weather.as_deref(), &output_dir, Some(&progress))?;
            progress.finish_with_message(&format!("Prepared {} rows", summary.rows));

            println!("Records: {}", summary.rows);
            if let (Some(first), Some(last)) = (summary.first_day, summary.last_day) {
                println!("Date range: {} to {}", first, last);
            }
            println!("Total rides: {}", summary.total_rides);
            println!("Locations: {}", summary.locations);
            println!("Saved to: {}", summary.output.display());
        }

        Commands::Generate {
            output,
            start,
            end,
            seed,
        } => {
            let records = SyntheticGenerator::new(seed).generate(start, end)?;
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            if DatasetReader::is_parquet(&output) {
                ParquetWriter::new()
                    .with_row_group_size(config.transform.row_group_size)
                    .write_enriched(&records, &output)?;
            } else {
                CsvWriter::new().write_enriched(&records, &output)?;
            }
            println!(
                "Generated {} records ({} to {}) in {}",
                records.len(),
                start,
                end,
                output.display()
            );
        }

        Commands::RunDag { date } => {
            let dag = build_daily_dag(&config)?;
            let logical_date = match date {
                Some(day) => Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN)),
                None => Utc::now(),
            };
            let run_id = DagRunner::run_id(logical_date, true);
            let report = DagRunner::new()
                .run_with_id(&dag, logical_date, &run_id)
                .await?;
            println!("{}", report.summary());

            if let Some(failed) = report
                .tasks
                .iter()
                .find(|t| t.state != TaskState::Success)
            {
                return Err(PipelineError::TaskFailed {
                    task_id: failed.task_id.clone(),
                    attempts: failed.attempts,
                    message: failed
                        .error
                        .clone()
                        .unwrap_or_else(|| format!("{:?}", failed.state)),
                });
            }
        }

        Commands::Schedule => {
            let dag = build_daily_dag(&config)?;
            let schedule = DagSchedule::new(
                &config.schedule.cron,
                config.schedule.start_date,
                config.schedule.catchup,
            )?;
            println!(
                "Scheduling {} with '{}' (UTC), catchup={}. Press Ctrl-C to stop.",
                dag.dag_id(),
                schedule.expression(),
                schedule.catchup()
            );

            let reports = Scheduler::new(schedule, DagRunner::new())
                .run_forever(&dag)
                .await?;
            let failed = reports.iter().filter(|r| !r.is_success()).count();
            println!("Scheduler stopped after {} run(s), {} failed", reports.len(), failed);
        }

        Commands::NextRuns { count } => {
            let schedule = DagSchedule::new(
                &config.schedule.cron,
                config.schedule.start_date,
                config.schedule.catchup,
            )?;
            println!(
                "Next {} run(s) of {} ('{}', UTC):",
                count,
                config.schedule.dag_id,
                schedule.expression()
            );
            for (i, slot) in schedule.upcoming(Utc::now(), count).iter().enumerate() {
                println!("  {}. {}", i + 1, slot.to_rfc3339());
            }
        }

        Commands::Report { dataset, month } => {
            let (label, records) = match dataset {
                Some(path) => (path.display().to_string(), load_records(&path)?),
                None => {
                    let loaded = DatasetLocator::load(&config.paths.curated_dir)?;
                    (loaded.label, loaded.records)
                }
            };
            let analyzer = BikeAnalyzer::new(records);
            println!("Dataset: {}", label);

            match month {
                Some(month) => print_month(&analyzer, &month)?,
                None => print_report(&analyzer)?,
            }
        }

        Commands::Validate { dataset } => {
            println!("Validating dataset: {}", dataset.display());
            let progress = ProgressReporter::new_spinner("Validating data...", quiet);
            let records = load_records(&dataset)?;
            let checker = IntegrityChecker::new();
            let report = checker.check(&records);
            progress.finish_with_message("Validation complete");

            println!("\n{}", checker.generate_summary(&report));
            if report.is_clean() {
                println!("All data passed validation checks");
            } else {
                println!("Found {} validation issues", report.violations.len());
            }
        }

        Commands::Info { file, sample } => {
            println!("Analyzing Parquet file: {}", file.display());
            let writer = ParquetWriter::new();
            let file_info = writer.get_file_info(&file)?;
            println!("\n{}", file_info.summary());

            if sample > 0 {
                print_sample(&writer, &file, sample)?;
            }
        }

        Commands::Serve {
            port,
            bind,
            data_dir,
        } => {
            let port = port.unwrap_or(config.dashboard.port);
            let bind = bind.unwrap_or_else(|| config.dashboard.bind.clone());
            let data_dir = data_dir.unwrap_or_else(|| config.paths.curated_dir.clone());

            info!(
                scheduler_ui_port = config.dashboard.scheduler_ui_port,
                engine_ui_port = config.dashboard.engine_ui_port,
                "configured service ports"
            );
            println!("Dashboard API on http://{}:{}/api", bind, port);
            crate::server::serve(data_dir, &bind, port).await?;
        }
    }

    Ok(())
}

fn print_report(analyzer: &BikeAnalyzer) -> Result<()> {
    let overview = analyzer.overview();
    println!("\n=== Overview ===");
    println!("Total records: {}", overview.total_records);
    println!("Unique locations: {}", overview.unique_locations);
    if let (Some(first), Some(last)) = (overview.first_day, overview.last_day) {
        println!("Date range: {} to {}", first, last);
    }
    println!("Total rides: {}", overview.total_rides);
    println!(
        "Years: {}, Seasons: {}, Months: {}",
        overview.years, overview.seasons, overview.months
    );
    println!("Avg daily rides: {:.0}", overview.avg_daily_rides);

    println!("\n=== Seasons ===");
    for season in analyzer.seasonal_summary() {
        println!(
            "  {:<8} avg/day {:>10.0}  total {:>12}  days {:>5}",
            season.season.as_str(),
            season.avg_daily_rides,
            season.total_rides,
            season.days
        );
    }

    println!("\n=== Weather ===");
    for weather in analyzer.weather_summary() {
        println!(
            "  {:<8} avg/day {:>10.0}  total {:>12}  days {:>5}  temp {:>5.1}°C  precip {:>4.1}mm",
            weather.condition.as_str(),
            weather.avg_daily_rides,
            weather.total_rides,
            weather.days,
            weather.mean_temperature,
            weather.mean_precipitation
        );
    }

    println!("\n=== Temperature vs usage ===");
    for bin in analyzer.temperature_bins(8)? {
        match bin.mean_total {
            Some(mean) => println!("  {:<18} avg rides {:>8.0}", bin.label, mean),
            None => println!("  {:<18} no data", bin.label),
        }
    }

    println!("\n=== Top locations ===");
    for (i, location) in analyzer.top_locations(10).iter().enumerate() {
        println!("  {:>2}. {:<30} {:>12}", i + 1, location.counter_key, location.total);
    }

    if !analyzer.is_empty() {
        println!("\n=== Key insights ===");
        for line in analyzer.insights()?.lines() {
            println!("  {}", line);
        }
    }
    Ok(())
}

fn print_month(analyzer: &BikeAnalyzer, month: &str) -> Result<()> {
    let invalid = || PipelineError::InvalidParameter {
        name: "month".to_string(),
        reason: format!("'{}' is not YYYY-MM", month),
    };
    let (year, month) = month.split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.trim().parse().map_err(|_| invalid())?;
    let month: u32 = month.trim().parse().map_err(|_| invalid())?;

    let analysis = analyzer.month_analysis(year, month)?;
    println!("\n=== {} {} ===", analysis.month_name, analysis.year);
    println!("Total rides: {}", analysis.total_rides);
    println!("Avg daily rides: {:.0}", analysis.avg_daily_rides);
    println!("Days with data: {}", analysis.days);
    println!("Top location: {}", analysis.top_location);

    println!("\nTop locations:");
    for stats in analysis.location_stats.iter().take(10) {
        println!(
            "  {:<30} total {:>10}  avg {:>8.0}  std {:>8}  days {:>3}",
            stats.counter_key,
            stats.total,
            stats.mean,
            stats
                .std
                .map(|s| format!("{:.0}", s))
                .unwrap_or_else(|| "-".to_string()),
            stats.days
        );
    }

    println!("\nWeather impact:");
    for impact in &analysis.weather_impact {
        println!(
            "  {:<8} avg {:>8.0}  total {:>10}  days {:>3}",
            impact.condition.as_str(),
            impact.mean_total,
            impact.total_rides,
            impact.days
        );
    }
    Ok(())
}

fn print_sample(writer: &ParquetWriter, file: &Path, sample: usize) -> Result<()> {
    println!("\nSample Records (showing up to {} records):", sample);
    match DatasetReader::new().kind(file)? {
        DatasetKind::Enriched => {
            for (i, r) in writer.read_enriched(file)?.iter().take(sample).enumerate() {
                println!(
                    "{}. {} on {}: {} rides, {:.1}°C, {} ({})",
                    i + 1,
                    r.counter_key,
                    r.day,
                    r.total,
                    r.temperature,
                    r.weather_condition,
                    r.season
                );
            }
        }
        DatasetKind::DailyCounts => {
            for (i, r) in writer.read_daily_counts(file)?.iter().take(sample).enumerate() {
                println!("{}. {} on {}: {} rides", i + 1, r.counter_key, r.day, r.total);
            }
        }
    }
    Ok(())
}
