use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

use memoria_core::progression::QUESTLINES;
use memoria_core::{
    BucketReader, CompletionOracle, DeltaReport, DisplayFilter, NodeId, Progression, QuestId,
    QuestTracker, Settings, UnlockState, display_text, overall_progress, percent,
    questline_totals, visible_quests,
};

#[derive(Debug, Serialize)]
pub struct QuestSummary {
    pub title: String,
    pub ids: Vec<QuestId>,
    pub complete: bool,
}

#[derive(Debug, Serialize)]
pub struct NodeSummary {
    pub path: String,
    pub depth: usize,
    pub label: String,
    pub complete: u32,
    pub total: u32,
    pub percent: u32,
    pub visible: bool,
    pub loaded: bool,
    pub placeholder: Option<String>,
    pub quests: Vec<QuestSummary>,
}

#[derive(Debug, Serialize)]
pub struct QuestlineSummary {
    pub name: String,
    pub expansion: String,
    pub state: UnlockState,
    pub complete: u32,
    pub total: u32,
    pub percent: String,
}

#[derive(Debug, Serialize)]
pub struct TrackerSummary {
    pub generated_at: String,
    pub filter: DisplayFilter,
    pub overall_complete: u32,
    pub overall_total: u32,
    pub overall_percent: u32,
    pub start_area: Option<String>,
    pub grand_company: Option<String>,
    pub start_class: String,
    pub active_bucket: Option<String>,
    pub delta: DeltaReport,
    pub nodes: Vec<NodeSummary>,
    pub questlines: Vec<QuestlineSummary>,
}

pub struct SummaryOptions<'a> {
    pub include_quests: bool,
    pub search: Option<&'a str>,
    pub progression: Option<&'a Progression>,
}

pub fn build_summary<R: BucketReader>(
    tracker: &QuestTracker<R>,
    settings: &Settings,
    oracle: &dyn CompletionOracle,
    delta: DeltaReport,
    options: &SummaryOptions<'_>,
) -> TrackerSummary {
    let catalog = tracker.catalog();
    let mut nodes = Vec::new();
    let mut stack: Vec<(NodeId, usize, String)> = catalog
        .node(catalog.root())
        .children
        .iter()
        .rev()
        .map(|id| (*id, 0, catalog.node(*id).title.clone()))
        .collect();

    while let Some((id, depth, path)) = stack.pop() {
        let node = catalog.node(id);
        let quests = if options.include_quests {
            visible_quests(node, options.search)
                .map(|quest| QuestSummary {
                    title: quest.title.clone(),
                    ids: quest.ids.to_vec(),
                    complete: quest.is_complete(oracle),
                })
                .collect()
        } else {
            Vec::new()
        };
        nodes.push(NodeSummary {
            path: path.clone(),
            depth,
            label: display_text(node, settings),
            complete: node.complete,
            total: node.total,
            percent: percent(node.complete, node.total),
            visible: node.visible,
            loaded: !node.is_unloaded_stub(),
            placeholder: node.placeholder_message().map(str::to_string),
            quests,
        });
        for child in node.children.iter().rev() {
            let title = &catalog.node(*child).title;
            stack.push((*child, depth + 1, format!("{path}/{title}")));
        }
    }

    let questlines = options
        .progression
        .map(|progression| {
            QUESTLINES
                .iter()
                .map(|questline| {
                    let state = progression.unlock_state(
                        questline,
                        settings.free_trial_mode,
                        settings.spoiler_mode,
                        oracle,
                    );
                    let stats = questline_totals(tracker.cache(), questline, oracle);
                    QuestlineSummary {
                        name: questline.name.to_string(),
                        expansion: questline.expansion.to_string(),
                        state,
                        complete: stats.complete,
                        total: stats.total,
                        percent: stats.percent_label(),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let (overall_complete, overall_total) = overall_progress(catalog, settings);
    TrackerSummary {
        generated_at: chrono::Utc::now().to_rfc3339(),
        filter: settings.display_filter,
        overall_complete,
        overall_total,
        overall_percent: percent(overall_complete, overall_total),
        start_area: settings.profile.start_area.map(|area| area.to_string()),
        grand_company: settings.profile.faction.map(|faction| faction.to_string()),
        start_class: settings.profile.start_class_name().to_string(),
        active_bucket: tracker.cache().active().map(ToString::to_string),
        delta,
        nodes,
        questlines,
    }
}

pub fn generate_console_report(out: &mut dyn Write, summary: &TrackerSummary) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Quest Progress".bright_cyan().bold())?;
    writeln!(out, "{}", "=================".cyan())?;
    writeln!(out, "Filter: {}", summary.filter.label())?;
    writeln!(
        out,
        "Overall: {}/{} ({}%)",
        summary.overall_complete.to_string().green(),
        summary.overall_total,
        summary.overall_percent
    )?;
    writeln!(
        out,
        "Profile: {} / {} / {}",
        summary.start_area.as_deref().unwrap_or("Unknown"),
        summary.grand_company.as_deref().unwrap_or("Unknown"),
        summary.start_class
    )?;
    if let Some(active) = &summary.active_bucket {
        writeln!(out, "Active bucket: {}", active.yellow())?;
    }
    if summary.delta.new_completions() > 0 {
        writeln!(out, "New completions: {}", summary.delta.new_completions())?;
    }
    writeln!(out)?;

    for node in summary.nodes.iter().filter(|node| node.visible) {
        let indent = "  ".repeat(node.depth);
        let label = if node.total > 0 && node.complete >= node.total {
            node.label.green()
        } else if node.loaded {
            node.label.yellow()
        } else {
            node.label.normal()
        };
        writeln!(out, "{indent}{label}")?;
        if let Some(message) = &node.placeholder {
            writeln!(out, "{indent}  {}", message.dimmed())?;
        }
        for quest in &node.quests {
            let mark = if quest.complete { "✅".normal() } else { "•".dimmed() };
            writeln!(out, "{indent}  {mark} {}", quest.title)?;
        }
    }

    if !summary.questlines.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "📚 Questlines".bright_yellow().bold())?;
        writeln!(out, "{}", "=============".yellow())?;
        for questline in &summary.questlines {
            let name = match questline.state {
                UnlockState::Unlocked => questline.name.normal(),
                UnlockState::SpoilerLocked | UnlockState::FreeTrialLocked => questline.name.dimmed(),
            };
            writeln!(out, "{name:30} {:>5}  {:?}", questline.percent, questline.state)?;
        }
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, summary: &TrackerSummary) -> Result<()> {
    let json_output = serde_json::to_string_pretty(summary)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, summary: &TrackerSummary) -> Result<()> {
    writeln!(out, "# Time Memoria Progress Report\n")?;
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Filter**: {}", summary.filter.label())?;
    writeln!(
        out,
        "- **Overall**: {}/{} ({}%)",
        summary.overall_complete, summary.overall_total, summary.overall_percent
    )?;
    writeln!(
        out,
        "- **Start area**: {}",
        summary.start_area.as_deref().unwrap_or("Unknown")
    )?;
    writeln!(
        out,
        "- **Grand company**: {}",
        summary.grand_company.as_deref().unwrap_or("Unknown")
    )?;
    writeln!(out, "- **Start class**: {}\n", summary.start_class)?;

    writeln!(out, "## Categories\n")?;
    writeln!(out, "| Category | Complete | Total | % |")?;
    writeln!(out, "|---|---:|---:|---:|")?;
    for node in summary.nodes.iter().filter(|node| node.visible) {
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            node.path, node.complete, node.total, node.percent
        )?;
    }

    if !summary.questlines.is_empty() {
        writeln!(out, "\n## Questlines\n")?;
        for questline in &summary.questlines {
            writeln!(
                out,
                "- {} ({}): {} {:?}",
                questline.name, questline.expansion, questline.percent, questline.state
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::{BucketError, BucketKey, Catalog, MemoryStore, PassContext, QuestRecord};
    use std::collections::HashSet;

    struct OneBucket;

    impl BucketReader for OneBucket {
        fn read_bucket(&self, key: &BucketKey) -> Result<Vec<QuestRecord>, BucketError> {
            if key.as_str() == "2.x/2.0/msq" {
                Ok(vec![
                    QuestRecord::new("Close to Home", &[1]),
                    QuestRecord::new("To the Bannock", &[2]),
                ])
            } else {
                Err(BucketError::Missing(key.as_str().into()))
            }
        }
    }

    fn summary(include_quests: bool) -> TrackerSummary {
        let manifest = r#"{
            "Title": "Quests",
            "Categories": [
                { "Title": "A Realm Reborn", "Categories": [
                    { "Title": "Main Scenario", "BucketPath": "2.x/2.0/msq", "TotalQuests": 2 },
                    { "Title": "Side Quests", "BucketPath": "2.x/2.0/other", "TotalQuests": 6 }
                ] }
            ]
        }"#;
        let mut tracker = QuestTracker::new(Catalog::from_json(manifest).unwrap(), OneBucket);
        let oracle: HashSet<QuestId> = [1].into_iter().collect();
        let mut settings = Settings::default();
        let store = MemoryStore::new();
        let mut ctx = PassContext::new(&oracle, &mut settings, &store);
        tracker.open_bucket(&BucketKey::new("2.x/2.0/msq"), false, &mut ctx);
        let delta = tracker.recompute(&mut ctx);
        let options = SummaryOptions {
            include_quests,
            search: None,
            progression: None,
        };
        build_summary(&tracker, &settings, &oracle, delta, &options)
    }

    #[test]
    fn summary_walks_catalog_in_order() {
        let summary = summary(true);
        let paths: Vec<_> = summary.nodes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "A Realm Reborn",
                "A Realm Reborn/Main Scenario",
                "A Realm Reborn/Side Quests"
            ]
        );
        assert_eq!((summary.overall_complete, summary.overall_total), (1, 8));
        assert_eq!(summary.nodes[1].label, "Main Scenario 1/2");
        assert_eq!(summary.nodes[1].quests.len(), 2);
        assert!(!summary.nodes[2].loaded);
        assert_eq!(summary.active_bucket.as_deref(), Some("2.x/2.0/msq"));
    }

    #[test]
    fn markdown_and_json_reports_render() {
        let summary = summary(false);
        let mut markdown = Vec::new();
        generate_markdown_report(&mut markdown, &summary).unwrap();
        let markdown = String::from_utf8(markdown).unwrap();
        assert!(markdown.contains("# Time Memoria Progress Report"));
        assert!(markdown.contains("| A Realm Reborn/Main Scenario | 1 | 2 | 50 |"));

        let mut json = Vec::new();
        generate_json_report(&mut json, &summary).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["overall_total"], 8);
        assert_eq!(value["nodes"][1]["quests"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn console_report_lists_visible_nodes() {
        colored::control::set_override(false);
        let summary = summary(true);
        let mut out = Vec::new();
        generate_console_report(&mut out, &summary).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Overall: 1/8 (12%)"));
        assert!(text.contains("  Main Scenario 1/2"));
        assert!(text.contains("To the Bannock"));
    }
}
