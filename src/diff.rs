use std::path::Path;

use colored::Colorize;
use similar::TextDiff;

#[derive(Debug, Clone, Copy)]
pub struct DiffConfig {
    pub context: usize,
    pub colorize: bool,
}

pub fn render_unified(old: &str, new: &str, path: &Path, context: usize) -> String {
    let label = path.display().to_string();
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(context)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string()
}

pub fn print_unified(old: &str, new: &str, path: &Path, config: &DiffConfig) {
    let unified = render_unified(old, new, path, config.context);
    for line in unified.lines() {
        if !config.colorize {
            println!("{line}");
        } else if line.starts_with("+++") || line.starts_with("---") {
            println!("{}", line.bold());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
}
