//! Interactive terminal input.

use std::io::{self, Write};

use anyhow::{bail, Result};

/// Read one trimmed line after printing `label`.
pub fn line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Ask for a username, offering the last one used as the default.
pub fn username(last: Option<&str>) -> Result<String> {
    let username = match last {
        Some(last) => {
            let input = line(&format!("Username [{}]: ", last))?;
            if input.is_empty() {
                last.to_string()
            } else {
                input
            }
        }
        None => line("Username: ")?,
    };
    if username.is_empty() {
        bail!("Username is required");
    }
    Ok(username)
}

pub fn password() -> Result<String> {
    Ok(rpassword::prompt_password("Password: ")?)
}

/// Ask for a new password twice.
pub fn new_password() -> Result<String> {
    let first = rpassword::prompt_password("Password: ")?;
    let second = rpassword::prompt_password("Confirm password: ")?;
    if first != second {
        bail!("Passwords do not match");
    }
    Ok(first)
}

pub fn otp(label: &str) -> Result<String> {
    line(label)
}

pub fn confirm(question: &str) -> Result<bool> {
    let answer = line(&format!("{} [y/N]: ", question))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}
