//! Subcommand implementations. Each one dispatches library calls and prints
//! the result.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::warn;

use sharebox_core::models::{
    AdminUserUpdate, DownloadedFile, EmailRequest, FileId, PublicShareRequest, RegisterRequest,
    ShareRequest, UploadRequest, UserUpdate,
};
use sharebox_core::{ClientConfig, LoginOutcome, SessionStatus, ShareboxClient};

use crate::prompt;
use crate::{AccountCommand, AdminCommand, Command, FilesCommand, ShareArgs};

pub async fn run(command: Command, config: ClientConfig, json: bool) -> Result<()> {
    let client = ShareboxClient::new(&config)?;
    let out = Output { json };

    match command {
        Command::Login { username } => login(&client, &config, username).await,
        Command::Logout => {
            client.session().logout().await;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => {
            let user = client.session().load_user().await?;
            out.show(&user, || {
                println!("{} <{}>", user.display_name(), user.email);
                if let Some(role) = user.role {
                    println!("Role: {:?}", role);
                }
            })
        }
        Command::Status => {
            let status = match client.status() {
                SessionStatus::Authenticated => "logged in",
                SessionStatus::Anonymous => "logged out",
                SessionStatus::MfaPending => "waiting for one-time code",
                SessionStatus::MfaSetupPending { .. } => "waiting for authenticator enrollment",
            };
            println!("Server:      {}", config.api_base_url);
            println!("Session:     {}", status);
            println!("Persistence: {:?}", config.persistence);
            Ok(())
        }
        Command::Register(args) => {
            let request = RegisterRequest {
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                password: prompt::new_password()?,
            };
            let user = client.session().register(&request).await?;
            out.show(&user, || {
                println!("Account created for {}.", user.email);
                println!("Check your inbox for the verification link before logging in.");
            })
        }
        Command::VerifyEmail { uid, token } => {
            let message = client.session().verify_email(&uid, &token).await?;
            println!("{}", message);
            Ok(())
        }
        Command::Account(cmd) => account(&client, &out, cmd).await,
        Command::Files(cmd) => files(&client, &out, cmd).await,
        Command::Share(args) => share(&client, &out, args).await,
        Command::SharePublic {
            id,
            share_type,
            expires_in,
        } => {
            let request = PublicShareRequest {
                file_id: FileId::new(id),
                share_type,
                expires_in,
            };
            let link = client.files().share_public(&request).await?;
            out.show(&link, || {
                println!("Link:       {}", link.shared_link);
                if let Some(ref passphrase) = link.passphrase {
                    println!("Passphrase: {}", passphrase);
                }
                if let Some(expires) = link.expires_at {
                    println!("Expires:    {}", expires.format("%Y-%m-%d %H:%M UTC"));
                }
            })
        }
        Command::PublicLink { id } => {
            let link = client.files().public_share_details(&FileId::new(id)).await?;
            out.show(&link, || {
                println!("Link:       {}", link.shared_link);
                if let Some(ref passphrase) = link.passphrase {
                    println!("Passphrase: {}", passphrase);
                }
            })
        }
        Command::FetchShared { link, output } => {
            let file = client.files().access_shared(&link).await?;
            save_file(&file, output.as_deref())
        }
        Command::FetchPublic {
            link,
            passphrase,
            output,
        } => {
            let file = client.files().access_public_shared(&link, &passphrase).await?;
            save_file(&file, output.as_deref())
        }
        Command::Email {
            to,
            subject,
            message,
        } => {
            let reply = client
                .files()
                .send_email(&EmailRequest { to, subject, message })
                .await?;
            println!("{}", reply);
            Ok(())
        }
        Command::Admin(cmd) => admin(&client, &out, cmd).await,
    }
}

/// Password, then either the one-time code or authenticator enrollment.
async fn login(client: &ShareboxClient, config: &ClientConfig, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => prompt::username(config.last_username.as_deref())?,
    };
    let password = prompt::password()?;

    println!("\nAuthenticating...");
    match client.session().login(&username, &password).await? {
        LoginOutcome::MfaRequired => {
            let code = prompt::otp("One-time code: ")?;
            let user = client.session().verify_otp(&code).await?;
            remember_username(&username);
            match user {
                Some(user) => println!("Logged in as {}.", user.display_name()),
                None => println!("Login successful!"),
            }
        }
        LoginOutcome::MfaSetupRequired { otp_url } => {
            println!("\nThis account needs an authenticator app before it can log in.");
            println!("Add this URI to your authenticator (or render it as a QR code):\n");
            println!("  {}\n", otp_url);
            let code = prompt::otp("Code shown by the authenticator: ")?;
            client.session().enable_mfa(&code).await?;
            remember_username(&username);
            println!("Authenticator enrolled. Run `sharebox login` again to sign in.");
        }
    }
    Ok(())
}

/// Saved to the on-disk config only, so env and flag overrides stay out of it.
fn remember_username(username: &str) {
    let result = ClientConfig::load().and_then(|mut stored| {
        stored.last_username = Some(username.to_string());
        stored.save()
    });
    if let Err(e) = result {
        warn!(error = %e, "Failed to save last username");
    }
}

async fn account(client: &ShareboxClient, out: &Output, cmd: AccountCommand) -> Result<()> {
    match cmd {
        AccountCommand::Update {
            first_name,
            last_name,
            email,
        } => {
            let update = UserUpdate {
                first_name,
                last_name,
                email,
            };
            let user = client.session().update_user(&update).await?;
            out.show(&user, || println!("Updated: {} <{}>", user.display_name(), user.email))
        }
        AccountCommand::Delete { yes } => {
            if !yes && !prompt::confirm("Delete your account and all of its files?")? {
                bail!("Aborted");
            }
            client.session().delete_account().await?;
            println!("Account deleted.");
            Ok(())
        }
    }
}

async fn files(client: &ShareboxClient, out: &Output, cmd: FilesCommand) -> Result<()> {
    match cmd {
        FilesCommand::List => {
            let files = client.files().my_files().await?;
            out.show(&files, || {
                if files.is_empty() {
                    println!("No files.");
                }
                for file in &files {
                    let uploaded = file
                        .uploaded_at
                        .map(|t| t.format("%Y-%m-%d").to_string())
                        .unwrap_or_default();
                    println!("{:<38} {:<30} {}", file.id, file.name, uploaded);
                }
            })
        }
        FilesCommand::Shared => {
            let entries = client.files().shared_with_me().await?;
            out.show(&entries, || {
                if entries.is_empty() {
                    println!("Nothing shared with you.");
                }
                for entry in &entries {
                    println!(
                        "{:<30} {:<9} from {:<28} link {}",
                        entry.file_name,
                        entry.share_type.as_str(),
                        entry.shared_by,
                        entry.shared_link
                    );
                }
            })
        }
        FilesCommand::Upload {
            path,
            name,
            description,
        } => {
            let data = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("Upload path has no file name")?;
            let name = name.unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file_name.clone())
            });

            let upload = UploadRequest::new(name, file_name, data).description(description);
            let record = client.files().upload(&upload).await?;
            out.show(&record, || println!("Uploaded {} as {}.", record.name, record.id))
        }
        FilesCommand::Download { id, output } => {
            let file = client.files().download(&FileId::new(id)).await?;
            save_file(&file, output.as_deref())
        }
        FilesCommand::View { id, output } => {
            let file = client.files().view(&FileId::new(id)).await?;
            save_file(&file, output.as_deref())
        }
    }
}

async fn share(client: &ShareboxClient, out: &Output, args: ShareArgs) -> Result<()> {
    let mut request = ShareRequest::with_user(FileId::new(args.id), args.share_type, args.recipient);
    request.expires_in = args.expires_in;
    request.one_time = args.one_time;

    let link = client.files().share(&request).await?;
    out.show(&link, || {
        println!("Shared. Link: {}", link.shared_link);
        if let Some(expires) = link.expires_at {
            println!("Expires: {}", expires.format("%Y-%m-%d %H:%M UTC"));
        }
    })
}

async fn admin(client: &ShareboxClient, out: &Output, cmd: AdminCommand) -> Result<()> {
    let admin = client.admin();
    match cmd {
        AdminCommand::Users => {
            let users = admin.list_users().await?;
            out.show(&users, || {
                for user in &users {
                    let mut flags = Vec::new();
                    if user.is_superuser {
                        flags.push("superuser");
                    }
                    if user.is_staff {
                        flags.push("staff");
                    }
                    if !user.is_active {
                        flags.push("inactive");
                    }
                    if !user.mfa_enabled {
                        flags.push("no-mfa");
                    }
                    println!("{:>6} {:<32} {}", user.id, user.email, flags.join(","));
                }
            })
        }
        AdminCommand::User { id } => {
            let user = admin.get_user(id).await?;
            out.show(&user, || {
                println!("{} {} <{}>", user.first_name, user.last_name, user.email);
                println!("active={} staff={} superuser={} mfa={} verified={}",
                    user.is_active, user.is_staff, user.is_superuser, user.mfa_enabled, user.email_verified);
            })
        }
        AdminCommand::Files => {
            let files = admin.list_files().await?;
            out.show(&files, || {
                for file in &files {
                    let owner = file.owner.map(|o| o.to_string()).unwrap_or_default();
                    println!("{:<38} {:<30} owner {}", file.id, file.name, owner);
                }
            })
        }
        AdminCommand::Promote { id, revoke } => {
            let message = admin.make_superuser(id, !revoke).await?;
            println!("{}", message);
            Ok(())
        }
        AdminCommand::UpdateUser {
            id,
            first_name,
            last_name,
            email,
            active,
            staff,
            email_verified,
        } => {
            let update = AdminUserUpdate {
                first_name,
                last_name,
                email,
                is_active: active,
                is_staff: staff,
                email_verified,
            };
            let user = admin.update_user(id, &update).await?;
            out.show(&user, || println!("Updated user {} <{}>.", user.id, user.email))
        }
        AdminCommand::DeleteUser { id } => {
            admin.delete_user(id).await?;
            println!("User {} deleted.", id);
            Ok(())
        }
        AdminCommand::DeleteFile { id } => {
            admin.delete_file(&FileId::new(id)).await?;
            println!("File deleted.");
            Ok(())
        }
    }
}

struct Output {
    json: bool,
}

impl Output {
    /// Print `value` as JSON, or run the human-readable printer.
    fn show<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}

/// Write a downloaded file, refusing to overwrite an existing one.
fn save_file(file: &DownloadedFile, output: Option<&Path>) -> Result<()> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(safe_file_name(&file.filename)),
    };
    let mut out = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(out) => out,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            bail!("{} already exists", path.display())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to create {}", path.display()))
        }
    };
    out.write_all(&file.data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved {} ({} bytes).", path.display(), file.data.len());
    Ok(())
}

/// Server-provided names are reduced to their last path component.
fn safe_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        "download".to_string()
    } else {
        base.to_string()
    }
}
