#![forbid(unsafe_code)]

use anyhow::Result;
use emoboard_sim::campaign::{CampaignConfig, run_campaign};

fn main() -> Result<()> {
    let report = run_campaign(&CampaignConfig::default())?;

    println!(
        "campaign complete: seeds={} passed={} interesting={}",
        report.seeds_run, report.seeds_passed, report.interesting_states_reached
    );
    if let Some(seed) = report.first_failure {
        println!("first failing seed: {seed}");
        for failure in &report.failures {
            for violation in &failure.violations {
                println!("  seed {}: {violation}", failure.seed);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
