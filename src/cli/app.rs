use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ibdnav")]
#[command(about = "Read-only InnoDB tablespace navigator")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Buffer pool size in 16 KiB frames
    #[arg(long, default_value_t = 1024, global = true)]
    pub frames: usize,

    /// Use memory-mapped I/O for the tablespace file
    #[arg(long, global = true)]
    pub mmap: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the FSP header, extent lists and segments of a tablespace
    Space {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        /// List every extent and segment
        #[arg(short, long)]
        verbose: bool,

        /// Print buffer pool statistics afterwards
        #[arg(long)]
        stats: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Decode a single page by its page type
    Page {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        /// Page number
        #[arg(short, long)]
        page: u64,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Walk the record chain of an index page
    Records {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        /// Page number of an INDEX page
        #[arg(short, long)]
        page: u64,

        /// Also list the page directory slots
        #[arg(short, long)]
        dir: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Scan a B+Tree from its root page
    Scan {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        /// Root page number of the index (3 for the clustered index of a file-per-table space)
        #[arg(short, long, default_value_t = 3)]
        root: u64,

        /// Byte length of the key fields in node pointer records
        #[arg(short = 'k', long = "key-len", default_value_t = 4)]
        key_len: usize,

        /// Only count records whose key starts with these bytes (hex)
        #[arg(long)]
        key: Option<String>,

        /// Print buffer pool statistics afterwards
        #[arg(long)]
        stats: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
