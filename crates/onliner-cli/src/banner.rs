//! Startup banner.

use crossterm::style::Stylize;

const LOGO: &str = r"
 ██████╗ ███╗   ██╗██╗     ██╗███╗   ██╗███████╗██████╗
██╔═══██╗████╗  ██║██║     ██║████╗  ██║██╔════╝██╔══██╗
██║   ██║██╔██╗ ██║██║     ██║██╔██╗ ██║█████╗  ██████╔╝
██║   ██║██║╚██╗██║██║     ██║██║╚██╗██║██╔══╝  ██╔══██╗
╚██████╔╝██║ ╚████║███████╗██║██║ ╚████║███████╗██║  ██║
 ╚═════╝ ╚═╝  ╚═══╝╚══════╝╚═╝╚═╝  ╚═══╝╚══════╝╚═╝  ╚═╝";

/// Headline with the number of accounts about to go online.
pub fn headline(accounts: usize) -> String {
    format!(
        "{} {} {}",
        "Onliner".green(),
        "[Multiple Accounts]".cyan(),
        format!("Total Accounts: {accounts}").red()
    )
}

pub fn print(accounts: usize) {
    println!("{}", headline(accounts));
    println!("{}", LOGO.trim_start_matches('\n'));
    println!();
}
