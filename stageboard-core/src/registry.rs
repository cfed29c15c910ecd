/// Stage registry helpers: normalizing the stage list a board renders,
/// the default presets for the leads and tickets boards, and stage slugs.
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{BoardKind, Stage};

/// Key of the stage a board falls back to when the registry returns nothing.
pub const DEFAULT_STAGE_KEY: &str = "default";
pub const DEFAULT_STAGE_LABEL: &str = "Default";

static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Turn a human label into a stage key: lowercase, runs of anything outside
/// `[a-z0-9]` collapsed to `_`, no leading or trailing `_`.
pub fn slugify(label: &str) -> String {
    let lower = label.trim().to_lowercase();
    NON_SLUG_RE
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

/// Sort stages by ordinal and drop repeated keys (first occurrence wins).
/// An empty list becomes the single implicit default stage.
pub fn normalize_stages(stages: Vec<Stage>) -> Vec<Stage> {
    let mut stages = stages;
    stages.sort_by_key(|s| s.ordinal);

    let mut seen = HashSet::new();
    stages.retain(|stage| {
        if seen.insert(stage.key.clone()) {
            true
        } else {
            log::warn!(
                "[stageboard.registry.duplicate] Ignoring repeated stage key {}",
                stage.key
            );
            false
        }
    });

    if stages.is_empty() {
        log::debug!("[stageboard.registry.empty] No stages registered, using implicit default");
        stages.push(Stage::new(DEFAULT_STAGE_KEY, DEFAULT_STAGE_LABEL, 0));
    }
    stages
}

/// Ordinal for a stage appended after the existing ones.
pub fn next_ordinal(stages: &[Stage]) -> i64 {
    stages.iter().map(|s| s.ordinal).max().map_or(0, |max| max + 1)
}

/// The stages a freshly provisioned board starts with.
pub fn default_stages(kind: BoardKind) -> Vec<Stage> {
    match kind {
        BoardKind::Leads => vec![
            Stage::new("novo", "Novo", 0),
            Stage::new("contato_inicial", "Contato Inicial", 1),
            Stage::new("qualificado", "Qualificado", 2),
            Stage::new("proposta", "Proposta", 3),
            Stage::new("negociacao", "Negociação", 4),
            Stage::new("ganho", "Ganho", 5).won(),
            Stage::new("perdido", "Perdido", 6).lost(),
        ],
        BoardKind::Tickets => vec![
            Stage::new("open", "Aberto", 0),
            Stage::new("in-progress", "Em Progresso", 1),
            Stage::new("waiting", "Aguardando", 2),
            Stage::new("resolved", "Resolvido", 3),
            Stage::new("closed", "Fechado", 4),
        ],
    }
}
