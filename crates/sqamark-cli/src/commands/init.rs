//! The `sqamark init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_absent(Path::new("sqamark.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("exams")?;
    write_if_absent(Path::new("exams/example.json"), EXAMPLE_EXAM)?;

    std::fs::create_dir_all("submissions")?;
    write_if_absent(Path::new("submissions/example.json"), EXAMPLE_SUBMISSION)?;

    println!("\nNext steps:");
    println!("  1. Add an LLM judge to sqamark.toml, or keep the built-in rules judge");
    println!("  2. Run: sqamark validate --exam exams/example.json --submission submissions/example.json");
    println!("  3. Run: sqamark evaluate --exam exams/example.json --submission submissions/example.json");

    Ok(())
}

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# sqamark configuration

default_judge = "rules"
default_model = "claude-sonnet-4-20250514"
judge_timeout_secs = 30
parallelism = 4
full_topic_coverage = false
output_dir = "./sqamark-results"

# [judges.anthropic]
# type = "anthropic"
# api_key = "${ANTHROPIC_API_KEY}"

# [judges.openai]
# type = "openai"
# api_key = "${OPENAI_API_KEY}"

# [judges.local]
# type = "ollama"
# base_url = "http://localhost:11434"
# model = "llama3.1"

[grade_bands.default]
A = 70.0
B = 60.0
C = 50.0
D = 40.0

[mastery]
secure = 0.8
developing = 0.5
"#;

const EXAMPLE_EXAM: &str = include_str!("../../../../fixtures/exams/nat5-maths-001.json");
const EXAMPLE_SUBMISSION: &str = include_str!("../../../../fixtures/submissions/sub-001.json");
