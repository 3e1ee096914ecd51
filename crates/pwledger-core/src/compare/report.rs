//! Line-oriented compare report

use super::model::{CompareItem, CompareResult};
use crate::backends::ReportSink;

fn describe(item: &CompareItem) -> String {
    let mut line = item.gtu.to_string();
    if !item.diffs.is_empty() {
        let names: Vec<&str> = item.diffs.iter().map(|f| f.name()).collect();
        line.push_str(&format!(" differs in: {}", names.join(", ")));
    }
    if item.unknown_current || item.unknown_comp {
        line.push_str(" (has unknown fields)");
    }
    line
}

fn section(sink: &mut dyn ReportSink, heading: &str, items: &[CompareItem]) {
    if items.is_empty() {
        return;
    }
    sink.write_line(&format!("{} ({}):", heading, items.len()));
    for item in items {
        sink.write_line(&format!("  {}", describe(item)));
    }
}

/// Write `result` to `sink`, one line per entry
pub fn write_report(result: &CompareResult, current_name: &str, comp_name: &str, sink: &mut dyn ReportSink) {
    sink.write_line(&format!("Comparing '{}' with '{}'", current_name, comp_name));
    if result.is_identical() {
        sink.write_line(&format!(
            "Databases are identical ({} entries)",
            result.identical.len()
        ));
        return;
    }
    section(sink, &format!("Only in '{}'", current_name), &result.only_in_current);
    section(sink, &format!("Only in '{}'", comp_name), &result.only_in_comp);
    section(sink, "Conflicts", &result.conflicts);
    sink.write_line(&format!("Identical: {}", result.identical.len()));
}
