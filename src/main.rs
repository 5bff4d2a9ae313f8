use clap::Parser;
use models_extract::{
    Cli, ExtractError, Extractor, OutputFormatter, OutputMode, RunOutcome, UserFriendlyError,
};
use std::process;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let extractor = match Extractor::from_cli(&cli) {
        Ok(extractor) => extractor,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&extractor);
    }

    match extractor.run() {
        Ok(RunOutcome::Completed(report)) => {
            extractor.output_formatter().print_extraction_report(&report);
            0
        }
        Ok(RunOutcome::InputMissing { .. }) => 0,
        Err(e) => {
            extractor.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &ExtractError) -> i32 {
    match error {
        ExtractError::Config { .. } => 2,
        ExtractError::InvalidPath { .. } => 3,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "models-extract.toml".to_string());

    match Extractor::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  models-extract --config {}", config_path);
            0
        }
        Err(e) => {
            eprintln!(
                "Failed to generate configuration file: {}",
                e.user_message()
            );
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(extractor: &Extractor) -> i32 {
    let formatter = extractor.output_formatter();
    let config = extractor.config();

    formatter.info("DRY RUN MODE - nothing will be read or written");
    formatter.print_separator();

    let root = &config.scan.root;
    if root.is_dir() {
        formatter.success(&format!("Input root found: {}", root.display()));
    } else {
        formatter.warning(&format!(
            "Input root not found: {} (a real run would stop here)",
            root.display()
        ));
    }

    if !formatter.is_quiet() {
        println!("  Extensions: {}", config.scan.extensions.join(", "));
        println!("  Exclude directories: {}", config.scan.exclude_dirs.join(", "));
        println!("  Max file size: {} bytes", config.scan.max_file_size);
        println!("  Output directory: {}", config.output.directory.display());
        println!("  Parquet file: {}", config.output.parquet_path().display());
        println!("  CSV file: {}", config.output.csv_path().display());
        println!("  Metadata file: {}", config.output.metadata_path().display());
        println!(
            "  Source repository: {}",
            config.provenance.source_repository
        );
    }

    formatter.print_separator();
    formatter.info("Run without --dry-run to perform the extraction");

    0
}

fn print_startup_error(error: &ExtractError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use models_extract::Config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let cli = Cli::try_parse_from([
            "models-extract",
            "--generate-config",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(handle_generate_config(&cli), 0);
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[scan]"));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("data");
        let config = Config::with_paths(temp_dir.path().join("external-repo"), &output);
        let extractor = Extractor::new(config, OutputMode::Plain, 0, true);

        assert_eq!(handle_dry_run(&extractor), 0);
        assert!(!output.exists());
    }

    #[test]
    fn test_exit_codes() {
        let config_error = ExtractError::Config {
            message: "bad".to_string(),
        };
        let path_error = ExtractError::InvalidPath {
            path: "data".to_string(),
        };
        let io_error = ExtractError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ));

        assert_eq!(exit_code_for(&config_error), 2);
        assert_eq!(exit_code_for(&path_error), 3);
        assert_eq!(exit_code_for(&io_error), 1);
    }
}
