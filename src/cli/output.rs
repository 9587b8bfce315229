//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::backup::{RestoreReport, SkippedItem};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print what a restore did, with a table of skipped organization items.
pub fn print_restore_report(report: &RestoreReport) {
    success(&format!(
        "Restored {} folder(s), {} item(s) and {} attachment(s).",
        report.folders_created, report.items_created, report.attachments_uploaded
    ));

    if report.skipped_items.is_empty() {
        return;
    }

    warning(&format!(
        "{} organization item(s) were not restored:",
        report.skipped_items.len()
    ));
    println!("{}", skipped_items_table(&report.skipped_items));
    tip("Organization items belong to the organization's vault and must be restored there.");
}

fn skipped_items_table(items: &[SkippedItem]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Item ID", "Organization ID"]);

    for item in items {
        table.add_row(vec![
            item.name.clone(),
            item.id.clone(),
            item.organization_id.clone(),
        ]);
    }
    table
}
