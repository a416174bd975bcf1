//! Status table printed every tick

use crate::scheduler::calculator::Decision;

/// One line of the status table
#[derive(Debug, Clone)]
pub struct StatusRow {
    pub site: String,
    pub decision: Decision,
    /// Excluded from automatic scheduling
    pub ignored: bool,
}

/// Renders the status table
pub fn format_status_table(rows: &[StatusRow]) -> String {
    let site_width = rows
        .iter()
        .map(|r| r.site.len())
        .max()
        .unwrap_or(0)
        .max("SITE".len());

    let mut out = format!(
        "{:<site_width$}  {:<16}  {:<10}  {:<12}  {}\n",
        "SITE",
        "STATUS",
        "NEXT RUN",
        "CADENCY",
        "INTERVAL",
        site_width = site_width
    );

    for row in rows {
        let status = if row.ignored {
            "Ignored".to_string()
        } else {
            row.decision.status.to_string()
        };
        out.push_str(&format!(
            "{:<site_width$}  {:<16}  {:<10}  {:<12}  {}\n",
            row.site,
            status,
            row.decision.display,
            row.decision.cadency_label,
            row.decision.cadency_duration,
            site_width = site_width
        ));
    }

    out
}

/// Prints the status table to stdout
pub fn print_status_table(rows: &[StatusRow]) {
    println!();
    print!("{}", format_status_table(rows));
    println!();
}
