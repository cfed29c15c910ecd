/// Command line front end: parse arguments, mount the configured board,
/// print it or apply one move through the engine.
use crate::config::{self, BoardConfig, ConfigError};
use crate::rest_store::{RestItemStore, RestStageRegistry};
use stageboard_core::board::BoardState;
use stageboard_core::drag::{DragError, DropTarget};
use stageboard_core::geometry::ItemBounds;
use stageboard_core::notify::{NoticeKind, NotificationSink};
use stageboard_core::storage::StoreError;
use stageboard_core::sync::SyncOutcome;
use stageboard_core::types::BoardKind;
use stageboard_core::KanbanEngine;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

/// Stageboard - move cards on a hosted Kanban board
#[derive(Debug, Parser)]
#[command(name = "stageboard")]
#[command(version)]
#[command(about = "Move cards on a hosted Kanban board", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/stageboard/board.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(config::default_config_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print every stage with its cards
    Show,
    /// Move a card, optionally to a slot in the stage
    Move {
        /// Card id
        item_id: String,
        /// Destination stage key
        stage_key: String,
        /// Slot in the destination stage (0 = top)
        index: Option<usize>,
    },
    /// Write a config file
    Init {
        /// Backend root, e.g. https://crm.example.com/api
        base_url: String,
        #[arg(value_enum, default_value_t = BoardArg::Leads)]
        board: BoardArg,
    },
    /// Print the config file location
    ConfigPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BoardArg {
    Leads,
    Tickets,
}

impl From<BoardArg> for BoardKind {
    fn from(value: BoardArg) -> Self {
        match value {
            BoardArg::Leads => BoardKind::Leads,
            BoardArg::Tickets => BoardKind::Tickets,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not load board: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Drag(#[from] DragError),

    #[error("Unknown stage {0}")]
    UnknownStage(String),

    #[error("Move not saved: {0}")]
    NotSaved(StoreError),
}

/// Where `move ... <index>` lands: over the card currently at `index` in the
/// stage, or the end of the stage when `index` is past the last card.
pub fn resolve_target(
    board: &BoardState,
    stage_key: &str,
    index: Option<usize>,
) -> Result<DropTarget, CliError> {
    let items = board
        .items(stage_key)
        .ok_or_else(|| CliError::UnknownStage(stage_key.to_string()))?;
    let Some(index) = index else {
        return Ok(DropTarget::stage(stage_key));
    };
    match items.get(index) {
        Some(item) => Ok(DropTarget::item(item.id.clone())),
        // A pointer below every card appends.
        None => {
            let bounds = items
                .iter()
                .enumerate()
                .map(|(i, item)| ItemBounds::new(item.id.clone(), i as f64, 1.0))
                .collect();
            Ok(DropTarget::stage_at(stage_key, f64::INFINITY, bounds))
        }
    }
}

/// Prints notices for a terminal user.
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, kind: NoticeKind, title: &str, detail: Option<&str>) {
        let line = match detail {
            Some(detail) => format!("{}: {}", title, detail),
            None => title.to_string(),
        };
        match kind {
            NoticeKind::Success => println!("{}", line),
            NoticeKind::Error => eprintln!("{}", line),
        }
    }
}

pub fn render_board(board: &BoardState) -> String {
    let mut out = String::new();
    for (column, summary) in board.columns().iter().zip(board.summaries()) {
        let marker = if column.stage.is_won {
            " (won)"
        } else if column.stage.is_lost {
            " (lost)"
        } else {
            ""
        };
        out.push_str(&format!(
            "{} [{}]{} - {} cards",
            summary.label, summary.key, marker, summary.item_count
        ));
        if summary.total_value_cents != 0 {
            out.push_str(&format!(
                ", {}.{:02}",
                summary.total_value_cents / 100,
                (summary.total_value_cents % 100).abs()
            ));
        }
        out.push('\n');
        for (index, item) in column.items.iter().enumerate() {
            out.push_str(&format!("  {:>3}. {} {}\n", index, item.id, item.title));
        }
    }
    out
}

async fn mount(path: &std::path::Path, config: &BoardConfig) -> Result<KanbanEngine, CliError> {
    let board_url = config.board_url(path)?;
    let token = config.api_token();
    let registry = RestStageRegistry::new(&board_url, token, config.board);
    let store = Arc::new(RestItemStore::new(&board_url, token));
    Ok(KanbanEngine::mount(&registry, store, Arc::new(ConsoleSink), config.engine_config()).await?)
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let path = cli.config_path();
    match cli.command {
        Command::ConfigPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::Init { base_url, board } => {
            let mut config = config::load_config(&path);
            config.base_url = Some(base_url);
            config.board = board.into();
            config.board_url(&path)?;
            config::save_config(&path, &config)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Command::Show => {
            let config = config::load_config(&path);
            let engine = mount(&path, &config).await?;
            print!("{}", engine.with_board(render_board));
            Ok(())
        }
        Command::Move {
            item_id,
            stage_key,
            index,
        } => {
            let config = config::load_config(&path);
            let mut engine = mount(&path, &config).await?;
            let target = engine.with_board(|board| resolve_target(board, &stage_key, index))?;
            match engine.move_item(&item_id, target).await? {
                None => {
                    println!("{} is already there", item_id);
                    Ok(())
                }
                Some(SyncOutcome::Committed) => Ok(()),
                // The stage change stuck; the sink already reported the order.
                Some(SyncOutcome::ReorderFailed(_)) => Ok(()),
                Some(SyncOutcome::RolledBack { error, .. }) => Err(CliError::NotSaved(error)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stageboard_core::types::{Item, Stage};

    fn parse(line: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("stageboard").chain(line.split_whitespace()))
    }

    fn board() -> BoardState {
        BoardState::load(
            vec![
                Stage::new("novo", "Novo", 0),
                Stage::new("ganho", "Ganho", 1).won(),
            ],
            vec![
                Item::new("L1", "novo", 0).with_title("Acme").with_value_cents(150_050),
                Item::new("L2", "novo", 1),
            ],
        )
    }

    #[test]
    fn test_parse_move_with_index() {
        let cli = parse("--config /tmp/b.json move L1 ganho 2").unwrap();
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/b.json"));
        assert_eq!(
            cli.command,
            Command::Move {
                item_id: "L1".to_string(),
                stage_key: "ganho".to_string(),
                index: Some(2),
            }
        );
    }

    #[test]
    fn test_config_flag_after_subcommand() {
        let cli = parse("show --config /tmp/b.json").unwrap();
        assert_eq!(cli.command, Command::Show);
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/b.json"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("move L1").is_err());
        assert!(parse("move L1 novo x").is_err());
        assert!(parse("init http://h crm").is_err());
        assert!(parse("show --config").is_err());
    }

    #[test]
    fn test_parse_init_defaults_to_leads() {
        let cli = parse("init https://api.example").unwrap();
        assert_eq!(
            cli.command,
            Command::Init {
                base_url: "https://api.example".to_string(),
                board: BoardArg::Leads,
            }
        );
        let cli = parse("init https://api.example tickets").unwrap();
        assert!(matches!(cli.command, Command::Init { board: BoardArg::Tickets, .. }));
    }

    #[test]
    fn test_resolve_target() {
        let board = board();
        assert_eq!(resolve_target(&board, "ganho", None).unwrap(), DropTarget::stage("ganho"));
        assert_eq!(resolve_target(&board, "novo", Some(1)).unwrap(), DropTarget::item("L2"));
        assert!(matches!(
            resolve_target(&board, "novo", Some(9)).unwrap(),
            DropTarget::Stage { pointer_y: Some(_), .. }
        ));
        assert!(matches!(
            resolve_target(&board, "arquivado", None),
            Err(CliError::UnknownStage(_))
        ));
    }

    #[test]
    fn test_render_board() {
        let text = render_board(&board());
        assert_eq!(
            text,
            "Novo [novo] - 2 cards, 1500.50\n    0. L1 Acme\n    1. L2 \nGanho [ganho] (won) - 0 cards\n"
        );
    }

    #[tokio::test]
    async fn test_init_writes_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("board.json");
        run(Cli {
            config: Some(path.clone()),
            command: Command::Init {
                base_url: "http://localhost:8080".to_string(),
                board: BoardArg::Tickets,
            },
        })
        .await
        .unwrap();

        let config = config::load_config(&path);
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.board, BoardKind::Tickets);
    }

    #[tokio::test]
    async fn test_show_without_base_url_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = run(Cli {
            config: Some(dir.path().join("board.json")),
            command: Command::Show,
        })
        .await;
        assert!(matches!(
            result,
            Err(CliError::Config(ConfigError::MissingBaseUrl(_)))
        ));
    }
}
