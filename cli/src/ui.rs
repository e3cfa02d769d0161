//! UI utilities for pretty printing

use beacon_core::IdentityRecord;
use colored::Colorize;

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".bright_red(), msg.red());
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".bright_green(), msg.bright_green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".bright_blue(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".bright_yellow(), msg.yellow());
}

pub fn print_identities(records: &[IdentityRecord]) {
    if records.is_empty() {
        print_info("No identities registered");
        return;
    }

    println!();
    println!("  {:<40} {:<10} {}", "Mail".bright_cyan().bold(), "Admin".bright_cyan().bold(), "Public key".bright_cyan().bold());
    for record in records {
        let admin = if record.admin { "yes" } else { "no" };
        println!("  {:<40} {:<10} {}", record.identity.to_string().bright_green(), admin, record.public_key.to_hex());
    }
    println!();
}

pub fn print_response(status: u16, body: &str) {
    let status_text = status.to_string();
    let status_text = if (200..300).contains(&status) {
        status_text.bright_green()
    } else {
        status_text.bright_red()
    };
    println!("{} {}", "Response code:".bright_white(), status_text);
    if !body.is_empty() {
        println!("{}", body);
    }
}
