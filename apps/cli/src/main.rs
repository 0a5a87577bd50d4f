use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use canopy_common::{decode_json, desensitize, safe_json_parse, write_atomic, MaskKind};
use canopy_settings::{Preferences, PreferencesStore, DEFAULT_CONFIG_FILE};
use canopy_tree::{
    build_tree, merge_nodes, remove_nodes, search_with_relations, select_related_nodes,
    tree_to_flat, update_check_status_flat, update_check_status_nested, NodeId, TreeNode,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(
    name = "canopy",
    about = "Reconcile flat and nested tree records",
    author,
    version
)]
struct Cli {
    /// 偏好設定檔路徑；預設為目前目錄下的 canopy.json。 / Preferences file (defaults to ./canopy.json).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 輸出檔案；預設為標準輸出。 / Write the result to FILE instead of stdout.
    #[arg(long, short = 'o', global = true, value_name = "FILE")]
    output: Option<PathBuf>,

    /// 日誌層級，覆寫偏好設定。 / Log level; overrides the preferences file.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// 無法解析的輸入視為空集合。 / Treat unparsable input as an empty collection.
    #[arg(long, global = true)]
    lenient: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 將扁平列表組成巢狀樹。 / Build a nested forest from a flat list.
    Build(InputArgs),
    /// 將巢狀樹轉為扁平列表。 / Flatten a nested forest (children before parents).
    Flatten(InputArgs),
    /// 勾選節點並更新祖先狀態。 / Check nodes and re-aggregate their ancestors.
    Check(CheckArgs),
    /// 依關鍵字搜尋並帶出祖先與子孫。 / Search names and include ancestors and descendants.
    Search(SearchArgs),
    /// 取得選取節點的祖先與子孫。 / Expand a selection with its ancestors and descendants.
    Select(SelectionArgs),
    /// 移除節點及其直接子節點。 / Remove nodes and their direct children.
    Remove(SelectionArgs),
    /// 合併新節點至扁平列表。 / Merge new nodes into a flat list.
    Merge(MergeArgs),
    /// 遮蔽敏感字串。 / Mask a sensitive value.
    Mask(MaskArgs),
    /// 管理偏好設定。 / Manage the preferences file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct InputArgs {
    /// JSON 節點陣列；`-` 代表標準輸入。 / JSON array of nodes; `-` reads stdin.
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,

    /// 要勾選的節點 ID。 / Ids of the nodes to check.
    #[arg(long = "select", short = 's', value_name = "ID", required = true, num_args = 1..)]
    ids: Vec<NodeId>,

    /// 輸入為巢狀樹而非扁平列表。 / Input is a nested forest rather than a flat list.
    #[arg(long)]
    nested: bool,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    input: InputArgs,

    /// 搜尋關鍵字（區分大小寫）。 / Keyword matched against names (case sensitive).
    keyword: String,

    /// 標記符合的節點。 / Mark matches with `isMatched`.
    #[arg(long, conflicts_with = "no_mark")]
    mark: bool,

    /// 不標記符合的節點。 / Do not mark matches.
    #[arg(long)]
    no_mark: bool,
}

#[derive(Args)]
struct SelectionArgs {
    #[command(flatten)]
    input: InputArgs,

    /// 選取的節點 ID。 / Ids of the selected nodes.
    #[arg(long = "select", short = 's', value_name = "ID", required = true, num_args = 1..)]
    ids: Vec<NodeId>,
}

#[derive(Args)]
struct MergeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// 要合併的節點 JSON 陣列。 / JSON array of nodes to merge in.
    #[arg(value_name = "INCOMING")]
    incoming: PathBuf,
}

#[derive(Args)]
struct MaskArgs {
    /// 原始字串。 / Value to mask.
    value: String,

    /// 資料類型：mobile 或 idcard。 / Value kind: mobile or idcard.
    #[arg(long, value_name = "KIND")]
    kind: MaskKind,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// 顯示目前生效的偏好設定。 / Print the effective preferences.
    Show,
    /// 寫入預設偏好設定檔。 / Write a default preferences file.
    Init {
        /// 覆寫既有檔案。 / Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// 匯出偏好設定至指定檔案。 / Export the effective preferences to FILE.
    Export {
        #[arg(value_name = "FILE")]
        destination: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Settings shared by every subcommand once flags and preferences are merged.
struct Session {
    store: PreferencesStore,
    output: Option<PathBuf>,
    lenient: bool,
}

impl Session {
    fn preferences(&self) -> &Preferences {
        self.store.preferences()
    }

    fn read_nodes(&self, path: &Path) -> Result<Vec<TreeNode>> {
        let contents = read_input(path)?;
        if self.lenient {
            let (err, nodes) = safe_json_parse(&contents, Vec::new());
            if let Some(err) = err {
                warn!(path = %path.display(), error = %err, "treating unparsable input as empty");
            }
            return Ok(nodes);
        }
        decode_json(&contents).with_context(|| format!("invalid node list in {}", path.display()))
    }

    fn emit<T: Serialize>(&self, value: &T) -> Result<()> {
        let mut payload = if self.preferences().output.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .context("failed to encode output")?;
        payload.push('\n');
        self.write(payload.as_bytes())
    }

    fn write(&self, payload: &[u8]) -> Result<()> {
        match &self.output {
            Some(path) => write_atomic(path, payload)
                .with_context(|| format!("failed to write {}", path.display())),
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(payload).context("failed to write stdout")?;
                stdout.flush().context("failed to write stdout")
            }
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        output,
        log_level,
        lenient,
        command,
    } = Cli::parse();

    let config_path = config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let store = PreferencesStore::load(&config_path)?;
    let level = match log_level {
        Some(level) => level.into(),
        None => store
            .preferences()
            .logging
            .level
            .parse::<Level>()
            .unwrap_or(Level::WARN),
    };
    init_tracing(level);

    let session = Session {
        store,
        output,
        lenient,
    };
    match command {
        Commands::Build(args) => execute_build(&session, args),
        Commands::Flatten(args) => execute_flatten(&session, args),
        Commands::Check(args) => execute_check(&session, args),
        Commands::Search(args) => execute_search(&session, args),
        Commands::Select(args) => execute_select(&session, args),
        Commands::Remove(args) => execute_remove(&session, args),
        Commands::Merge(args) => execute_merge(&session, args),
        Commands::Mask(args) => execute_mask(&session, args),
        Commands::Config(command) => execute_config(&session, command),
    }
}

fn init_tracing(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn execute_build(session: &Session, args: InputArgs) -> Result<()> {
    let nodes = session.read_nodes(&args.input)?;
    let forest = build_tree(&nodes);
    info!(records = nodes.len(), roots = forest.len(), "build complete");
    session.emit(&forest)
}

fn execute_flatten(session: &Session, args: InputArgs) -> Result<()> {
    let forest = session.read_nodes(&args.input)?;
    let flat = tree_to_flat(&forest);
    info!(roots = forest.len(), records = flat.len(), "flatten complete");
    session.emit(&flat)
}

fn execute_check(session: &Session, args: CheckArgs) -> Result<()> {
    let mut nodes = session.read_nodes(&args.input.input)?;
    let resolved = if args.nested {
        update_check_status_nested(&mut nodes, &args.ids)
    } else {
        update_check_status_flat(&mut nodes, &args.ids)
    };
    if resolved < args.ids.len() {
        warn!(
            requested = args.ids.len(),
            resolved, "some selected ids were not found"
        );
    }
    session.emit(&nodes)
}

fn execute_search(session: &Session, args: SearchArgs) -> Result<()> {
    let nodes = session.read_nodes(&args.input.input)?;
    let mark = if args.no_mark {
        false
    } else {
        args.mark || session.preferences().search.mark_matches
    };
    let related = search_with_relations(&nodes, &args.keyword, mark);
    info!(keyword = %args.keyword, related = related.len(), "search complete");
    session.emit(&related)
}

fn execute_select(session: &Session, args: SelectionArgs) -> Result<()> {
    let nodes = session.read_nodes(&args.input.input)?;
    let related = select_related_nodes(&nodes, &args.ids);
    info!(selected = args.ids.len(), related = related.len(), "select complete");
    session.emit(&related)
}

fn execute_remove(session: &Session, args: SelectionArgs) -> Result<()> {
    let nodes = session.read_nodes(&args.input.input)?;
    let remaining = remove_nodes(&nodes, &args.ids);
    info!(
        removed = nodes.len() - remaining.len(),
        remaining = remaining.len(),
        "remove complete"
    );
    session.emit(&remaining)
}

fn execute_merge(session: &Session, args: MergeArgs) -> Result<()> {
    if args.input.input.as_os_str() == "-" && args.incoming.as_os_str() == "-" {
        bail!("only one of the inputs can be read from stdin");
    }
    let mut nodes = session.read_nodes(&args.input.input)?;
    let incoming = session.read_nodes(&args.incoming)?;
    let offered = incoming.len();
    let merged = merge_nodes(&mut nodes, incoming);
    info!(offered, merged, total = nodes.len(), "merge complete");
    session.emit(&nodes)
}

fn execute_mask(session: &Session, args: MaskArgs) -> Result<()> {
    let mut masked = desensitize(&args.value, args.kind);
    masked.push('\n');
    session.write(masked.as_bytes())
}

fn execute_config(session: &Session, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => session.emit(session.preferences()),
        ConfigCommand::Init { force } => {
            let path = session.store.path();
            if path.exists() && !force {
                bail!(
                    "preferences file '{}' already exists (use --force to overwrite)",
                    path.display()
                );
            }
            PreferencesStore::new(path, Preferences::default()).save()?;
            println!("Wrote default preferences to {}", path.display());
            Ok(())
        }
        ConfigCommand::Export { destination } => {
            session.store.export_to(&destination)?;
            println!("Exported preferences to {}", destination.display());
            Ok(())
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut contents = String::new();
        io::stdin()
            .read_to_string(&mut contents)
            .context("failed to read stdin")?;
        return Ok(contents);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
