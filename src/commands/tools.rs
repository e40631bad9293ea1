//! Tool listing command

use crate::commands::build_tool_registry;
use crate::config::Config;
use crate::tools::ToolSummary;
use prettytable::{cell, row, Table};

/// Print the available tools as a table
pub fn list_tools(config: &Config) {
    let registry = build_tool_registry(config);
    output_tools_table(&registry.list());
}

fn output_tools_table(tools: &[ToolSummary]) {
    if tools.is_empty() {
        println!("No tools are available.");
        return;
    }

    let mut table = Table::new();
    table.add_row(row!["Tool", "Description"]);
    for tool in tools {
        table.add_row(row![tool.name, tool.description]);
    }

    println!("\nAvailable tools:\n");
    table.printstd();
    println!();
}
