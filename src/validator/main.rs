//! Standalone validator for game profile files.
//!
//! Checks that a profile JSON file parses, that its URLs are well formed and
//! that no endpoint is missing, then prints the resolved endpoint table.

use std::process::ExitCode;

use clap::Parser;

use farm_user_bot::config::{GameProfile, ProfileError};

/// Game profile validator.
#[derive(Parser, Debug)]
#[command(name = "validate_profile")]
#[command(about = "Validates game profile files for the farm bot")]
#[command(version)]
struct Args {
    /// Path to the JSON profile to validate.
    #[arg(short, long, default_value = "profile.json")]
    file: String,

    /// Generate an example profile at the specified path.
    #[arg(long)]
    generate_example: Option<String>,

    /// Print every resolved endpoint URL.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(output_path) = args.generate_example {
        return generate_example(&output_path);
    }

    validate_profile(&args.file, args.verbose)
}

fn generate_example(output_path: &str) -> ExitCode {
    match GameProfile::example().save_to_file(output_path) {
        Ok(()) => {
            println!("✓ Example profile written to: {output_path}");
            println!("\nEdit the endpoints and bot username to point at another game.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to write example file: {e}");
            ExitCode::FAILURE
        }
    }
}

fn validate_profile(path: &str, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    let profile = match GameProfile::load_from_file(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("✗ Failed to load profile: {e}");
            return ExitCode::FAILURE;
        }
    };

    let issues = profile.validate_all();
    for issue in &issues {
        println!("  ✗ Error: {issue}");
    }

    if verbose {
        print_endpoints(&profile);
    }

    println!();

    if issues.is_empty() {
        println!("✓ Profile {} for @{} is valid!", profile.name, profile.bot_username);
        if profile.prediction.is_none() {
            println!("  (no prediction endpoints - AUTO_PREDICT will be ignored)");
        }
        ExitCode::SUCCESS
    } else {
        println!("✗ Validation failed: {} error(s)", issues.len());
        ExitCode::FAILURE
    }
}

fn print_endpoints(profile: &GameProfile) {
    let mut table = profile.endpoints.fields().to_vec();
    if let Some(prediction) = &profile.prediction {
        table.push(("prediction.state", prediction.state.as_str()));
        table.push(("prediction.price", prediction.price.as_str()));
        table.push(("prediction.bet", prediction.bet.as_str()));
    }

    println!("\nEndpoints:");
    for (name, path) in table {
        match profile.endpoint_url(path) {
            Ok(url) => println!("  {name:<18} {url}"),
            Err(e) => println!("  {name:<18} ✗ {}", ProfileError::InvalidUrl {
                field: "api_base",
                value: profile.api_base.clone(),
                source: e,
            }),
        }
    }
}
