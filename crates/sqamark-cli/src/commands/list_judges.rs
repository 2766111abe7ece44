//! The `sqamark list-judges` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use sqamark_judges::config::{load_config_from, JudgeConfig, RULES_JUDGE};
use sqamark_judges::ollama::OllamaJudge;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let mut table = Table::new();
    table.set_header(vec!["Name", "Type", "Model", "Default"]);
    let is_default = |name: &str| if name == config.default_judge { "*" } else { "" };

    for (name, judge) in &config.judges {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(judge.kind()),
            Cell::new(judge.model().unwrap_or(&config.default_model)),
            Cell::new(is_default(name.as_str())),
        ]);
    }
    if !config.judges.contains_key(RULES_JUDGE) {
        table.add_row(vec![
            Cell::new(RULES_JUDGE),
            Cell::new("rules"),
            Cell::new("-"),
            Cell::new(is_default(RULES_JUDGE)),
        ]);
    }
    println!("{table}");

    for (name, judge) in &config.judges {
        let JudgeConfig::Ollama { base_url, .. } = judge else {
            continue;
        };
        let ollama = OllamaJudge::new(base_url, config.default_model.clone());
        match ollama.list_models().await {
            Ok(models) if models.is_empty() => println!("{name}: no models pulled"),
            Ok(models) => println!("{name}: {}", models.join(", ")),
            Err(e) => println!("{name}: {e}"),
        }
    }

    Ok(())
}
