//! strata CLI: a thin command-line front end over `strata_core::Repository`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use strata_core::commit::Commit;
use strata_core::merge::MergeOutcome;
use strata_core::state::Drift;
use strata_core::Repository;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata", about = "strata: a small local version control system", version)]
struct Cli {
    /// Run as if started in this directory.
    #[arg(short = 'C', global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new strata repository.
    Init,

    /// Stage a file for the next commit.
    Add {
        /// File name in the working directory.
        file: String,
    },

    /// Record the staged changes.
    Commit {
        /// Commit message.
        message: String,
    },

    /// Unstage a file, or stage its removal if it is tracked.
    Rm {
        file: String,
    },

    /// Show history of the current branch.
    Log {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Show every commit ever made.
    GlobalLog {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Print the ids of commits with the given message.
    Find {
        message: String,
    },

    /// Show branches, staged files and working-directory changes.
    Status {
        /// Output format: "human" (default) or "json".
        #[arg(long, default_value = "human")]
        format: String,
    },

    /// Switch branches, or restore a file: `checkout <branch>`,
    /// `checkout -- <file>`, `checkout <commit> -- <file>`.
    Checkout {
        /// Branch name, or commit id when a file follows `--`.
        target: Option<String>,

        /// File to restore.
        #[arg(last = true)]
        file: Option<String>,
    },

    /// Create a branch at the current commit.
    Branch {
        name: String,
    },

    /// Delete a branch pointer.
    RmBranch {
        name: String,
    },

    /// Move the current branch to a commit and check it out.
    Reset {
        /// Commit id (supports unambiguous prefix).
        commit: String,
    },

    /// Merge a branch into the current branch.
    Merge {
        branch: String,
    },
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("STRATA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cwd = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir().unwrap_or_else(|e| {
            eprintln!("error: cannot determine current directory: {e}");
            process::exit(1);
        }),
    };
    debug!(dir = %cwd.display(), "running command");

    let result = match cli.command {
        Commands::Init => cmd_init(&cwd),
        Commands::Add { file } => cmd_add(&cwd, &file),
        Commands::Commit { message } => cmd_commit(&cwd, &message),
        Commands::Rm { file } => cmd_rm(&cwd, &file),
        Commands::Log { format } => cmd_log(&cwd, &format),
        Commands::GlobalLog { format } => cmd_global_log(&cwd, &format),
        Commands::Find { message } => cmd_find(&cwd, &message),
        Commands::Status { format } => cmd_status(&cwd, &format),
        Commands::Checkout { target, file } => cmd_checkout(&cwd, target, file),
        Commands::Branch { name } => cmd_branch(&cwd, &name),
        Commands::RmBranch { name } => cmd_rm_branch(&cwd, &name),
        Commands::Reset { commit } => cmd_reset(&cwd, &commit),
        Commands::Merge { branch } => cmd_merge(&cwd, &branch),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn cmd_init(cwd: &Path) -> CmdResult {
    Repository::init(cwd)?;
    println!("initialized strata repository in .strata/");
    Ok(())
}

fn cmd_add(cwd: &Path, file: &str) -> CmdResult {
    Repository::open(cwd)?.add(file)?;
    Ok(())
}

fn cmd_commit(cwd: &Path, message: &str) -> CmdResult {
    let commit = Repository::open(cwd)?.commit(message)?;
    println!("[{}] {}", commit.short_id(), commit.message());
    Ok(())
}

fn cmd_rm(cwd: &Path, file: &str) -> CmdResult {
    Repository::open(cwd)?.rm(file)?;
    Ok(())
}

/// First seven characters of an id, or the whole id when shorter.
fn abbrev(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

fn print_commit(commit: &Commit) {
    println!("===");
    println!("commit {}", commit.id());
    if let (Some(parent), Some(merged)) = (commit.parent(), commit.merge_parent()) {
        println!("Merge: {} {}", abbrev(parent), abbrev(merged));
    }
    println!(
        "Date: {}",
        commit.timestamp().format("%a %b %-d %H:%M:%S %Y %z")
    );
    println!("{}", commit.message());
    println!();
}

fn print_commits(commits: &[Commit], format: &str) -> CmdResult {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(commits)?);
        }
        _ => {
            for commit in commits {
                print_commit(commit);
            }
        }
    }
    Ok(())
}

fn cmd_log(cwd: &Path, format: &str) -> CmdResult {
    let commits = Repository::open(cwd)?.log()?;
    print_commits(&commits, format)
}

fn cmd_global_log(cwd: &Path, format: &str) -> CmdResult {
    let commits = Repository::open(cwd)?.global_log()?;
    print_commits(&commits, format)
}

fn cmd_find(cwd: &Path, message: &str) -> CmdResult {
    let ids = Repository::open(cwd)?.find(message)?;
    if ids.is_empty() {
        println!("Found no commit with that message.");
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn cmd_status(cwd: &Path, format: &str) -> CmdResult {
    let status = Repository::open(cwd)?.status()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("=== Branches ===");
    for branch in &status.branches {
        let marker = if branch.current { "*" } else { "" };
        println!("{marker}{}", branch.name);
    }
    println!();

    println!("=== Staged Files ===");
    for name in &status.staged {
        println!("{name}");
    }
    println!();

    println!("=== Removed Files ===");
    for name in &status.removed {
        println!("{name}");
    }
    println!();

    println!("=== Modifications Not Staged For Commit ===");
    for change in &status.unstaged {
        let kind = match change.drift {
            Drift::Modified => "modified",
            Drift::Deleted => "deleted",
        };
        println!("{} ({kind})", change.name);
    }
    println!();

    println!("=== Untracked Files ===");
    for name in &status.untracked {
        println!("{name}");
    }
    println!();

    Ok(())
}

fn cmd_checkout(cwd: &Path, target: Option<String>, file: Option<String>) -> CmdResult {
    let repo = Repository::open(cwd)?;

    match (target, file) {
        (commit, Some(file)) => repo.checkout_file(commit.as_deref(), &file)?,
        (Some(branch), None) => {
            let summary = repo.checkout_branch(&branch)?;
            debug!(
                created = summary.created.len(),
                modified = summary.modified.len(),
                deleted = summary.deleted.len(),
                "checked out branch"
            );
        }
        (None, None) => return Err("usage: checkout <branch> | [<commit>] -- <file>".into()),
    }

    Ok(())
}

fn cmd_branch(cwd: &Path, name: &str) -> CmdResult {
    Repository::open(cwd)?.branch(name)?;
    Ok(())
}

fn cmd_rm_branch(cwd: &Path, name: &str) -> CmdResult {
    Repository::open(cwd)?.rm_branch(name)?;
    Ok(())
}

fn cmd_reset(cwd: &Path, commit: &str) -> CmdResult {
    Repository::open(cwd)?.reset(commit)?;
    Ok(())
}

fn cmd_merge(cwd: &Path, branch: &str) -> CmdResult {
    let outcome = Repository::open(cwd)?.merge(branch)?;

    match outcome {
        MergeOutcome::FastForward { .. } => println!("Current branch fast-forwarded."),
        MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty() => {
            println!("Encountered a merge conflict.");
            for name in conflicts {
                println!("  conflict: {name}");
            }
        }
        MergeOutcome::Merged { commit, .. } => {
            println!("[{}] {}", commit.short_id(), commit.message());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_handles_short_ids() {
        assert_eq!(abbrev("0123456789abcdef"), "0123456");
        assert_eq!(abbrev("abc"), "abc");
        assert_eq!(abbrev(""), "");
    }
}
