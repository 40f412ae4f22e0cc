use crate::compiler::DEFAULT_MAX_NESTING;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pseudoblocks",
    about = "Compile block pseudocode into Scratch 3 script graphs."
)]
pub struct Args {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT", help = "Write JSON here instead of stdout.")]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "JSON table of known names with \"globals\", \"locals\" and \"sprites\" lists."
    )]
    pub names: Option<PathBuf>,

    #[arg(long, help = "Emit a Scratch 3 blocks object instead of the block graph.")]
    pub sb3: bool,

    #[arg(long, help = "Use random UUID block ids instead of block_1, block_2, ...")]
    pub uuid_ids: bool,

    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_MAX_NESTING,
        help = "Maximum expression and condition nesting depth."
    )]
    pub max_nesting: usize,
}
