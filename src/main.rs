use std::{fs, path::PathBuf};

use anyhow::Context;
use comma_v::{Id, Num, Sym};
use rcs_core::{
    keyword,
    ops::{self, DepositRequest, RetrieveRequest},
    resolve::Criteria,
    Config, Repository,
};
use structopt::StructOpt;

mod cli;
use cli::{Admin, Command, Opt};

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    rcs_core::cleanup::install_signal_handlers().context("installing signal handlers")?;

    let opt = Opt::from_args();
    let cfg = Config {
        temp_dir: opt.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
        ..Config::default()
    };

    match opt.command {
        Command::Ci {
            archive,
            working_file,
            message,
            revision,
            state,
            author,
        } => ci(&cfg, &opt.diff, &archive, &working_file, message, revision, state, author),
        Command::Co {
            archive,
            revision,
            mode,
            output,
        } => co(&cfg, &archive, revision, mode, output),
        Command::Rlog { archive } => rlog(&cfg, &archive),
        Command::Rcs { archive, admin } => rcs_admin(&cfg, &archive, admin),
    }
}

fn ci(
    cfg: &Config,
    diff_bin: &str,
    archive: &PathBuf,
    working_file: &PathBuf,
    message: String,
    revision: Option<String>,
    state: Option<String>,
    author: Option<String>,
) -> anyhow::Result<()> {
    let repo = Repository::load(archive, cfg.mem_limit).context("loading archive")?;
    let working_text = fs::read(working_file).context("reading working file")?;

    let req = DepositRequest {
        working_text,
        author: Id(author.unwrap_or_else(whoami).into_bytes()),
        log_message: message.into_bytes(),
        state: state.map(|s| Id(s.into_bytes())),
        revision: revision.map(|r| Num(r.into_bytes())),
    };

    let outcome = ops::deposit(&repo, cfg, diff_bin, req)?;
    if outcome.unchanged {
        println!("{}: file is unchanged; not depositing", archive.display());
        return Ok(());
    }

    ops::commit_archive(archive, &cfg.suffix, &outcome.archive_bytes, None)?;
    fs::remove_file(working_file).context("removing working file")?;
    println!("{}  <--  {}", outcome.new_revision, working_file.display());
    println!("new revision: {}", outcome.new_revision);
    Ok(())
}

fn co(
    cfg: &Config,
    archive: &PathBuf,
    revision: Option<String>,
    mode: String,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let repo = Repository::load(archive, cfg.mem_limit).context("loading archive")?;
    let mode = keyword::Mode::parse(mode.as_bytes()).context("parsing -k mode")?;

    let req = RetrieveRequest {
        designator: revision.unwrap_or_default(),
        criteria: Criteria::default(),
        working_value: None,
        mode,
        archive_path: archive.to_string_lossy().to_string(),
        locker: None,
    };

    let (rev, text) = ops::retrieve(&repo, &req)?;
    let out_path = output.unwrap_or_else(|| working_file_for(archive));
    fs::write(&out_path, &text).context("writing working file")?;
    println!("{}  -->  {}", rev, out_path.display());
    Ok(())
}

fn rlog(cfg: &Config, archive: &PathBuf) -> anyhow::Result<()> {
    let repo = Repository::load(archive, cfg.mem_limit).context("loading archive")?;
    println!("RCS file: {}", archive.display());
    if let Some(head) = repo.head() {
        println!("head: {}", head);
    }
    println!("symbolic names:");
    for (name, num) in &repo.file.admin.symbols {
        println!("\t{}: {}", String::from_utf8_lossy(name), num);
    }
    println!("total revisions: {}", repo.file.delta.len());
    Ok(())
}

fn rcs_admin(cfg: &Config, archive: &PathBuf, admin: Admin) -> anyhow::Result<()> {
    let mut repo = Repository::load(archive, cfg.mem_limit).context("loading archive")?;

    match admin {
        Admin::Lock { revision, who } => {
            ops::lock_revision(&mut repo, &Num(revision.into_bytes()), &Id(who.into_bytes()))?;
        }
        Admin::Unlock { revision, who, force } => {
            ops::unlock_revision(&mut repo, &Num(revision.into_bytes()), &Id(who.into_bytes()), force)?;
        }
        Admin::Tag { name, revision, force } => {
            ops::tag(&mut repo, Sym(name.into_bytes()), Num(revision.into_bytes()), force)?;
        }
    }

    let bytes = ops::rewrite(&repo);
    ops::commit_archive(archive, &cfg.suffix, &bytes, None)?;
    Ok(())
}

fn working_file_for(archive: &PathBuf) -> PathBuf {
    let name = archive.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let stripped = name.strip_suffix(",v").unwrap_or(name);
    archive.with_file_name(stripped)
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}
