use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(about = "a file-based revision control core")]
pub struct Opt {
    #[structopt(long, help = "path to the diff executable used for deposit")]
    pub diff: String,

    #[structopt(long, parse(from_os_str), help = "temp-directory hint for SFFs")]
    pub temp_dir: Option<PathBuf>,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(about = "deposit a new revision")]
    Ci {
        #[structopt(parse(from_os_str))]
        archive: PathBuf,
        #[structopt(parse(from_os_str))]
        working_file: PathBuf,
        #[structopt(short = "-m", long)]
        message: String,
        #[structopt(short, long)]
        revision: Option<String>,
        #[structopt(short, long)]
        state: Option<String>,
        #[structopt(short, long)]
        author: Option<String>,
    },

    #[structopt(about = "retrieve a revision into a working file")]
    Co {
        #[structopt(parse(from_os_str))]
        archive: PathBuf,
        #[structopt(short, long)]
        revision: Option<String>,
        #[structopt(short = "-k", long, default_value = "kv")]
        mode: String,
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    #[structopt(about = "print a summary log of an archive")]
    Rlog {
        #[structopt(parse(from_os_str))]
        archive: PathBuf,
    },

    #[structopt(about = "administer locks and symbolic names")]
    Rcs {
        #[structopt(parse(from_os_str))]
        archive: PathBuf,
        #[structopt(subcommand)]
        admin: Admin,
    },
}

#[derive(Debug, StructOpt)]
pub enum Admin {
    #[structopt(about = "lock a revision")]
    Lock { revision: String, who: String },

    #[structopt(about = "unlock a revision")]
    Unlock {
        revision: String,
        who: String,
        #[structopt(short, long)]
        force: bool,
    },

    #[structopt(about = "add or move a symbolic name")]
    Tag {
        name: String,
        revision: String,
        #[structopt(short, long)]
        force: bool,
    },
}
