use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use crate::session::SessionSummary;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    passed: bool,
    sessions: &'a [SessionSummary],
}

/// Human-readable summary of every session.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[SessionSummary],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Session Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "==================".cyan())?;

    let passed = results.iter().filter(|r| r.passed()).count();
    writeln!(out, "Seeds: {}", results.len())?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", (results.len() - passed).to_string().red())?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed() {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        let preset = result.preset.as_deref().unwrap_or("none");
        writeln!(
            out,
            "{status} seed {} ({preset}, {} min)",
            result.seed.to_string().bold(),
            result.minutes
        )?;
        writeln!(
            out,
            "   Level {} | {} lifetime exp | {:.0} gold",
            result.level, result.lifetime_experience, result.gold
        )?;
        let skills: Vec<String> = result
            .skills
            .iter()
            .map(|(id, level)| format!("{id} {level}"))
            .collect();
        writeln!(out, "   Skills: {}", list_or_dash(&skills))?;
        writeln!(out, "   Spells: {}", list_or_dash(&result.spells))?;
        writeln!(out, "   Classes: {}", list_or_dash(&result.classes))?;
        writeln!(
            out,
            "   Activities: {} | Explorations: {} | Combats: {} won / {} lost",
            result.activities_completed,
            result.explorations,
            result.combats_won,
            result.combats_lost
        )?;
        let round_trip = if result.round_trip_ok {
            "ok".green()
        } else {
            "MISMATCH".red()
        };
        writeln!(out, "   Save round trip: {round_trip} ({:?})", result.wall_time)?;
        for failure in &result.failures {
            writeln!(out, "     • {}", failure.red())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn list_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn generate_json_report(out: &mut dyn Write, results: &[SessionSummary]) -> Result<()> {
    let report = JsonReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        passed: results.iter().all(SessionSummary::passed),
        sessions: results,
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(failures: Vec<String>) -> SessionSummary {
        SessionSummary {
            seed: 42,
            preset: Some("fire".to_string()),
            minutes: 5,
            level: 3,
            lifetime_experience: 260,
            skills: vec![("fire_affinity".to_string(), 2)],
            spells: vec!["spark".to_string()],
            classes: vec!["apprentice".to_string()],
            gold: 37.0,
            activities_completed: 12,
            explorations: 4,
            combats_won: 6,
            combats_lost: 1,
            round_trip_ok: failures.is_empty(),
            failures,
            wall_time: Duration::from_millis(3),
        }
    }

    #[test]
    fn json_report_flags_failures() {
        let mut buffer = Vec::new();
        let results = [summary(Vec::new()), summary(vec!["boom".to_string()])];
        generate_json_report(&mut buffer, &results).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["passed"], false);
        assert_eq!(value["sessions"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["sessions"][0]["spells"][0], "spark");
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn console_report_lists_progress() {
        let mut buffer = Vec::new();
        generate_console_report(&mut buffer, &[summary(Vec::new())], Duration::ZERO).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Session Summary"));
        assert!(text.contains("fire_affinity 2"));
        assert!(text.contains("Classes: apprentice"));
    }
}
